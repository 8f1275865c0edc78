//! Network dispatch and response classification.

// crates.io
use http::StatusCode;
use reqwest::Client;
use serde_json::Value;
use url::Url;
// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	http::request::{QueryValue, RequestSpec},
};

/// Outcome of a successful dispatch: a 2xx response with its parsed payload.
#[derive(Clone, Debug)]
pub struct Dispatched {
	/// HTTP status returned by the backend.
	pub status: StatusCode,
	/// Parsed JSON payload; `Value::Null` when the body was empty.
	pub body: Arc<Value>,
}

/// Execute one HTTP request against the backend and classify the outcome.
///
/// `refreshable` marks whether a 401 surfaces as the expired-token signal. It is false for
/// auth-exempt paths, so a 401 from the refresh endpoint itself can never recurse into
/// another refresh cycle.
pub async fn dispatch(
	client: &Client,
	config: &GatewayConfig,
	spec: &RequestSpec,
	bearer: Option<&str>,
	refreshable: bool,
) -> Result<Dispatched> {
	let url = endpoint_with_query(config, spec);
	let mut builder =
		client.request(spec.method().clone(), url.clone()).timeout(config.request_timeout);

	if let Some(token) = bearer {
		builder = builder.bearer_auth(token);
	}
	if let Some(body) = spec.body() {
		builder = builder.json(body);
	}

	let started = Instant::now();
	let response = builder.send().await.map_err(|err| classify_transport(err, &url, config))?;
	let elapsed = started.elapsed();
	let status = response.status();

	if status == StatusCode::UNAUTHORIZED && refreshable {
		return Err(Error::AuthExpired { url });
	}
	if !status.is_success() {
		let body = response.text().await.ok();

		return Err(Error::HttpStatus { status, url, body });
	}

	let bytes = response.bytes().await.map_err(|err| classify_transport(err, &url, config))?;
	let body = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).map_err(|err| Error::MalformedResponse {
			url: url.clone(),
			reason: err.to_string(),
		})?
	};

	tracing::debug!(
		method = %spec.method(),
		%url,
		status = %status,
		elapsed = ?elapsed,
		"dispatch complete"
	);

	Ok(Dispatched { status, body: Arc::new(body) })
}

fn classify_transport(err: reqwest::Error, url: &Url, config: &GatewayConfig) -> Error {
	if err.is_timeout() {
		Error::RequestTimeout { url: url.clone(), timeout: config.request_timeout }
	} else {
		Error::from(err)
	}
}

fn endpoint_with_query(config: &GatewayConfig, spec: &RequestSpec) -> Url {
	let mut url = config.endpoint_url(spec.path());

	if !spec.query().is_empty() {
		let mut pairs = url.query_pairs_mut();

		for (key, value) in spec.query() {
			match value {
				QueryValue::Single(scalar) => {
					pairs.append_pair(key, scalar);
				},
				QueryValue::Many(values) =>
					for value in values {
						pairs.append_pair(key, value);
					},
			}
		}
	}

	url
}
