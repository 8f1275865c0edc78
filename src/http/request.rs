//! Request specifications and deterministic cache signatures.

// std
use std::fmt::Write as _;
// crates.io
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// A query parameter value: a single scalar or an array of scalars.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
	/// Single scalar value.
	Single(String),
	/// Repeated values submitted under one key.
	Many(Vec<String>),
}
impl From<&str> for QueryValue {
	fn from(value: &str) -> Self {
		Self::Single(value.to_owned())
	}
}
impl From<String> for QueryValue {
	fn from(value: String) -> Self {
		Self::Single(value)
	}
}
impl<S> From<Vec<S>> for QueryValue
where
	S: Into<String>,
{
	fn from(values: Vec<S>) -> Self {
		Self::Many(values.into_iter().map(Into::into).collect())
	}
}

/// Immutable description of one backend request.
///
/// Construct with [`RequestSpec::get`] and friends, then layer query parameters and a body on
/// with the consuming builder methods. The spec never changes once handed to the client.
#[derive(Clone, Debug)]
pub struct RequestSpec {
	method: Method,
	path: String,
	query: Vec<(String, QueryValue)>,
	body: Option<Value>,
	auth_exempt: bool,
	bypass_cache: bool,
}
impl RequestSpec {
	/// Describe a GET request for the given path.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Describe a POST request for the given path.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Describe a PATCH request for the given path.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// Describe a DELETE request for the given path.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			body: None,
			auth_exempt: false,
			bypass_cache: false,
		}
	}

	/// Append a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Attach a JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Mark the path as exempt from bearer injection and refresh-on-401 handling.
	pub fn auth_exempt(mut self) -> Self {
		self.auth_exempt = true;

		self
	}

	/// Skip the cache lookup for this request, forcing a network dispatch.
	pub fn bypass_cache(mut self) -> Self {
		self.bypass_cache = true;

		self
	}

	/// HTTP method of the request.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Backend path the request targets.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Query parameters in insertion order.
	pub fn query(&self) -> &[(String, QueryValue)] {
		&self.query
	}

	/// JSON body, if any.
	pub fn body(&self) -> Option<&Value> {
		self.body.as_ref()
	}

	/// Whether the request was marked auth-exempt at construction.
	pub fn is_auth_exempt(&self) -> bool {
		self.auth_exempt
	}

	/// Whether the request opted out of the cache lookup.
	pub fn bypasses_cache(&self) -> bool {
		self.bypass_cache
	}

	/// Whether responses to this request may be cached: only non-bypassing reads qualify.
	pub fn is_cacheable(&self) -> bool {
		self.method == Method::GET && !self.bypass_cache
	}
}

/// Deterministic cache key derived from a request's method, path, query, and body.
///
/// Two specs with identical method, path, parameters, and body yield identical signatures
/// regardless of query insertion order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestSignature(String);
impl RequestSignature {
	/// Compute the signature for a request spec.
	pub fn compute(spec: &RequestSpec) -> Self {
		let mut hasher = Sha256::new();

		hasher.update(spec.method().as_str().as_bytes());
		hasher.update(b"\n");
		hasher.update(spec.path().as_bytes());
		hasher.update(b"\n");

		let mut pairs: Vec<(&str, String)> = spec
			.query()
			.iter()
			.map(|(key, value)| (key.as_str(), serialize_query_value(value)))
			.collect();

		pairs.sort();

		for (key, value) in pairs {
			hasher.update(key.as_bytes());
			hasher.update(b"=");
			hasher.update(value.as_bytes());
			hasher.update(b"\n");
		}

		if let Some(body) = spec.body() {
			hasher.update(body.to_string().as_bytes());
		}

		let digest = hasher.finalize();
		let mut hex = String::with_capacity(digest.len() * 2);

		for byte in digest {
			let _ = write!(hex, "{byte:02x}");
		}

		Self(hex)
	}

	/// Wrap a precomputed signature string; intended for diagnostics and tests.
	pub fn from_raw(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	/// The signature as a hex string.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

// JSON form so a scalar containing commas can never collide with an array value.
fn serialize_query_value(value: &QueryValue) -> String {
	serde_json::to_string(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn identical_specs_share_a_signature() {
		let a = RequestSpec::get("/pets").with_query("user", "1").with_query("limit", "20");
		let b = RequestSpec::get("/pets").with_query("user", "1").with_query("limit", "20");

		assert_eq!(RequestSignature::compute(&a), RequestSignature::compute(&b));
	}

	#[test]
	fn query_insertion_order_is_irrelevant() {
		let a = RequestSpec::get("/pets").with_query("user", "1").with_query("limit", "20");
		let b = RequestSpec::get("/pets").with_query("limit", "20").with_query("user", "1");

		assert_eq!(RequestSignature::compute(&a), RequestSignature::compute(&b));
	}

	#[test]
	fn differing_components_change_the_signature() {
		let base = RequestSpec::get("/pets").with_query("user", "1");

		let other_path = RequestSpec::get("/sitters").with_query("user", "1");
		let other_query = RequestSpec::get("/pets").with_query("user", "2");
		let other_method = RequestSpec::post("/pets").with_query("user", "1");
		let with_body = RequestSpec::get("/pets")
			.with_query("user", "1")
			.with_body(json!({"archived": false}));

		for other in [&other_path, &other_query, &other_method, &with_body] {
			assert_ne!(RequestSignature::compute(&base), RequestSignature::compute(other));
		}
	}

	#[test]
	fn array_values_hash_distinctly_from_scalars() {
		let scalar = RequestSpec::get("/pets").with_query("status", "boarded,walking");
		let array = RequestSpec::get("/pets").with_query("status", vec!["boarded", "walking"]);

		assert_ne!(RequestSignature::compute(&scalar), RequestSignature::compute(&array));
	}

	#[test]
	fn only_plain_reads_are_cacheable() {
		assert!(RequestSpec::get("/pets").is_cacheable());
		assert!(!RequestSpec::get("/pets").bypass_cache().is_cacheable());
		assert!(!RequestSpec::post("/pets").is_cacheable());
		assert!(!RequestSpec::patch("/pets/1").is_cacheable());
		assert!(!RequestSpec::delete("/pets/1").is_cacheable());
	}
}
