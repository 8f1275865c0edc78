//! Gateway configuration and validation.
//!
//! One [`GatewayConfig`] describes a backend session: where requests go, how long cached
//! responses live, and which paths are exempt from bearer-token injection.

// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::_prelude::*;

/// Default bound on the number of cached responses.
pub const DEFAULT_CACHE_CAPACITY: usize = 500;
/// Default time-to-live for cached responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(300_000);
/// Default per-dispatch timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Default path of the token refresh endpoint.
pub const DEFAULT_REFRESH_PATH: &str = "/refresh";
/// Default path of the login endpoint.
pub const DEFAULT_LOGIN_PATH: &str = "/login";
/// Default path of the logout endpoint.
pub const DEFAULT_LOGOUT_PATH: &str = "/logout";
/// Paths that never receive a bearer header and never trigger a refresh cycle.
pub const DEFAULT_AUTH_EXEMPT_PATHS: &[&str] =
	&["/login", "/register", "/forgot-password", "/verify-reset-code", "/logout", "/refresh"];

/// Configuration describing how the gateway client reaches and caches a backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
	/// Base URL every request path is joined onto.
	pub base_url: Url,
	/// Maximum number of responses retained by the cache before LRU eviction.
	#[serde(default = "default_cache_capacity")]
	pub cache_capacity: usize,
	/// Time-to-live applied to every cached response.
	#[serde(default = "default_cache_ttl")]
	pub cache_ttl: Duration,
	/// Timeout applied to each network dispatch.
	#[serde(default = "default_request_timeout")]
	pub request_timeout: Duration,
	/// Path of the token refresh endpoint, exchanged against the implicit refresh credential.
	#[serde(default = "default_refresh_path")]
	pub refresh_path: String,
	/// Path of the login endpoint.
	#[serde(default = "default_login_path")]
	pub login_path: String,
	/// Path of the logout endpoint.
	#[serde(default = "default_logout_path")]
	pub logout_path: String,
	/// Paths exempt from bearer injection and refresh-on-401 handling.
	#[serde(default = "default_auth_exempt_paths")]
	pub auth_exempt_paths: Vec<String>,
}
impl GatewayConfig {
	/// Construct a configuration with default cache and timeout settings.
	pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
		let base_url = Url::parse(base_url.as_ref())?;

		Ok(Self {
			base_url,
			cache_capacity: DEFAULT_CACHE_CAPACITY,
			cache_ttl: DEFAULT_CACHE_TTL,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			refresh_path: DEFAULT_REFRESH_PATH.into(),
			login_path: DEFAULT_LOGIN_PATH.into(),
			logout_path: DEFAULT_LOGOUT_PATH.into(),
			auth_exempt_paths: DEFAULT_AUTH_EXEMPT_PATHS.iter().map(|p| (*p).into()).collect(),
		})
	}

	/// Whether the given request path is exempt from bearer injection and refresh handling.
	pub fn is_auth_exempt(&self, path: &str) -> bool {
		let path = normalize_path(path);

		self.auth_exempt_paths.iter().any(|exempt| exempt.as_str() == path)
	}

	/// Resolve a request path against the configured base URL.
	///
	/// The base URL's own path is preserved whether or not it carries a trailing slash.
	pub fn endpoint_url(&self, path: &str) -> Url {
		let path = normalize_path(path);
		let mut url = self.base_url.clone();
		let base_path = url.path().trim_end_matches('/').to_owned();

		url.set_path(&format!("{base_path}{path}"));

		url
	}

	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.base_url.host_str().is_none() {
			return Err(Error::Validation {
				field: "base_url",
				reason: "Must include a host component.".into(),
			});
		}
		if self.base_url.cannot_be_a_base() {
			return Err(Error::Validation {
				field: "base_url",
				reason: "Must be a base URL that request paths can be joined onto.".into(),
			});
		}
		if self.cache_capacity == 0 {
			return Err(Error::Validation {
				field: "cache_capacity",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.cache_ttl.is_zero() {
			return Err(Error::Validation {
				field: "cache_ttl",
				reason: "Must be greater than zero.".into(),
			});
		}
		if self.request_timeout < Duration::from_millis(100) {
			return Err(Error::Validation {
				field: "request_timeout",
				reason: "Must be at least 100 ms.".into(),
			});
		}

		for (field, path) in [
			("refresh_path", &self.refresh_path),
			("login_path", &self.login_path),
			("logout_path", &self.logout_path),
		] {
			if !path.starts_with('/') {
				return Err(Error::Validation { field, reason: "Must start with '/'.".into() });
			}
			if !self.is_auth_exempt(path) {
				return Err(Error::Validation {
					field,
					reason: "Must be listed in auth_exempt_paths to avoid refresh cycles.".into(),
				});
			}
		}
		for path in &self.auth_exempt_paths {
			if !path.starts_with('/') {
				return Err(Error::Validation {
					field: "auth_exempt_paths",
					reason: format!("Entry '{path}' must start with '/'."),
				});
			}
		}

		Ok(())
	}
}

/// Canonical path form used for exemption matching: a single leading slash, no trailing slash.
fn normalize_path(path: &str) -> &str {
	let path = path.trim();

	if path.len() > 1 { path.trim_end_matches('/') } else { path }
}

fn default_cache_capacity() -> usize {
	DEFAULT_CACHE_CAPACITY
}

fn default_cache_ttl() -> Duration {
	DEFAULT_CACHE_TTL
}

fn default_request_timeout() -> Duration {
	DEFAULT_REQUEST_TIMEOUT
}

fn default_refresh_path() -> String {
	DEFAULT_REFRESH_PATH.into()
}

fn default_login_path() -> String {
	DEFAULT_LOGIN_PATH.into()
}

fn default_logout_path() -> String {
	DEFAULT_LOGOUT_PATH.into()
}

fn default_auth_exempt_paths() -> Vec<String> {
	DEFAULT_AUTH_EXEMPT_PATHS.iter().map(|p| (*p).into()).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn make_config() -> GatewayConfig {
		GatewayConfig::new("https://api.pawfectstays.app/v1/").expect("config")
	}

	#[test]
	fn defaults_match_documented_values() {
		let config = make_config();

		assert_eq!(config.cache_capacity, 500);
		assert_eq!(config.cache_ttl, Duration::from_secs(300));
		assert_eq!(config.request_timeout, Duration::from_secs(10));
		assert!(config.validate().is_ok());
	}

	#[test]
	fn exempt_paths_match_with_or_without_trailing_slash() {
		let config = make_config();

		assert!(config.is_auth_exempt("/login"));
		assert!(config.is_auth_exempt("/login/"));
		assert!(config.is_auth_exempt("/refresh"));
		assert!(!config.is_auth_exempt("/pets"));
		assert!(!config.is_auth_exempt("/login/history"));
	}

	#[test]
	fn endpoint_url_joins_onto_base() {
		let config = make_config();

		assert_eq!(config.endpoint_url("/pets").as_str(), "https://api.pawfectstays.app/v1/pets");

		let config = GatewayConfig::new("https://api.pawfectstays.app/v1").expect("config");

		assert_eq!(config.endpoint_url("/pets").as_str(), "https://api.pawfectstays.app/v1/pets");
	}

	#[test]
	fn rejects_zero_capacity_and_short_timeout() {
		let mut config = make_config();

		config.cache_capacity = 0;
		assert!(matches!(
			config.validate(),
			Err(Error::Validation { field: "cache_capacity", .. })
		));

		let mut config = make_config();

		config.request_timeout = Duration::from_millis(50);
		assert!(matches!(
			config.validate(),
			Err(Error::Validation { field: "request_timeout", .. })
		));
	}

	#[test]
	fn rejects_refresh_path_missing_from_exempt_list() {
		let mut config = make_config();

		config.refresh_path = "/token/refresh".into();

		assert!(matches!(config.validate(), Err(Error::Validation { field: "refresh_path", .. })));
	}
}
