//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the gateway client crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Http(#[from] http::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("Device is offline; the request was not dispatched.")]
	NetworkUnavailable,
	#[error("Request to {url} exceeded the {timeout:?} dispatch timeout.")]
	RequestTimeout { url: url::Url, timeout: std::time::Duration },
	#[error("Access token rejected by {url}; a refresh is required.")]
	AuthExpired { url: url::Url },
	#[error("Session could not be refreshed; re-authentication is required.")]
	AuthRequired,
	#[error("Upstream HTTP status {status} from {url}: {body:?}")]
	HttpStatus { status: http::StatusCode, url: url::Url, body: Option<String> },
	#[error("Malformed response body from {url}: {reason}")]
	MalformedResponse { url: url::Url, reason: String },
	#[error("Token storage error: {0}")]
	TokenStore(String),
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// Whether this error is the expired-access-token signal that permits a refresh cycle.
	pub fn is_auth_expired(&self) -> bool {
		matches!(self, Self::AuthExpired { .. })
	}

	/// Whether this error terminates the session and requires interactive re-authentication.
	pub fn is_auth_required(&self) -> bool {
		matches!(self, Self::AuthRequired)
	}
}
