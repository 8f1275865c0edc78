//! The gateway client: the request pipeline every screen funnels through.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use http::StatusCode;
use reqwest::{Client, redirect::Policy};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	cache::store::ResponseCache,
	config::GatewayConfig,
	http::{
		dispatch::dispatch,
		request::{RequestSignature, RequestSpec},
	},
	metrics::{ClientMetrics, ClientMetricsSnapshot},
	refresh::{RefreshCoordinator, RefreshSnapshot},
	session::{AlwaysOnline, ConnectivityProbe, MemoryTokenStore, ReauthHook, TokenStore},
};

/// Origin of a delivered response payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseSource {
	/// The payload came back from a network dispatch.
	Network,
	/// The payload was served from the response cache without network I/O.
	Cache,
}

/// A successful response delivered to the caller.
///
/// Cache hits are an ordinary success value tagged [`ResponseSource::Cache`], never an error
/// channel the caller has to unwrap.
#[derive(Clone, Debug)]
pub struct GatewayResponse {
	/// HTTP status of the originating response.
	pub status: StatusCode,
	/// Shared handle to the parsed JSON payload.
	pub body: Arc<Value>,
	/// Whether the payload came from the network or the cache.
	pub source: ResponseSource,
}

/// Point-in-time view of the client session for diagnostics screens.
#[derive(Clone, Debug)]
pub struct ClientStatus {
	/// Refresh coordinator state.
	pub refresh: RefreshSnapshot,
	/// Whether an access token is currently stored.
	pub token_present: bool,
	/// Number of entries currently held by the response cache.
	pub cached_entries: usize,
	/// Session telemetry counters.
	pub metrics: ClientMetricsSnapshot,
}

/// Builder wiring platform collaborators into an [`ApiGatewayClient`].
pub struct ApiGatewayClientBuilder {
	config: GatewayConfig,
	tokens: Arc<dyn TokenStore>,
	connectivity: Arc<dyn ConnectivityProbe>,
	reauth_hook: Option<ReauthHook>,
	http: Option<Client>,
}
impl ApiGatewayClientBuilder {
	/// Start a builder from the given configuration.
	pub fn new(config: GatewayConfig) -> Self {
		Self {
			config,
			tokens: Arc::new(MemoryTokenStore::new()),
			connectivity: Arc::new(AlwaysOnline),
			reauth_hook: None,
			http: None,
		}
	}

	/// Use the host's durable token store instead of the in-memory default.
	pub fn token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
		self.tokens = tokens;

		self
	}

	/// Use the host's connectivity probe instead of the always-online default.
	pub fn connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
		self.connectivity = probe;

		self
	}

	/// Register the callback fired once per failed refresh cycle (navigate to login).
	pub fn on_reauth_required(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
		self.reauth_hook = Some(Arc::new(hook));

		self
	}

	/// Supply a preconfigured HTTP client (primarily for tests).
	pub fn http_client(mut self, client: Client) -> Self {
		self.http = Some(client);

		self
	}

	/// Validate the configuration and construct the client.
	pub fn build(self) -> Result<ApiGatewayClient> {
		self.config.validate()?;

		let http = match self.http {
			Some(client) => client,
			None => Client::builder()
				.redirect(Policy::limited(10))
				.user_agent(format!("gateway-client/{}", env!("CARGO_PKG_VERSION")))
				.connect_timeout(Duration::from_secs(5))
				.build()?,
		};
		let http = Arc::new(http);
		let config = Arc::new(self.config);
		let metrics = ClientMetrics::new();
		let cache = Arc::new(ResponseCache::new(config.cache_capacity, config.cache_ttl));
		let coordinator = Arc::new(RefreshCoordinator::new(
			http.clone(),
			config.clone(),
			self.tokens.clone(),
			metrics.clone(),
			self.reauth_hook,
		));

		Ok(ApiGatewayClient {
			http,
			config,
			cache,
			tokens: self.tokens,
			connectivity: self.connectivity,
			coordinator,
			metrics,
		})
	}
}

/// Orchestrates the full request lifecycle for one backend session.
///
/// Cheap to clone; clones share the cache, token store, and refresh coordinator, which is
/// what keeps the single-flight and cache invariants session-wide.
#[derive(Clone)]
pub struct ApiGatewayClient {
	http: Arc<Client>,
	config: Arc<GatewayConfig>,
	cache: Arc<ResponseCache>,
	tokens: Arc<dyn TokenStore>,
	connectivity: Arc<dyn ConnectivityProbe>,
	coordinator: Arc<RefreshCoordinator>,
	metrics: Arc<ClientMetrics>,
}
impl ApiGatewayClient {
	/// Construct a client with default collaborators.
	pub fn new(config: GatewayConfig) -> Result<Self> {
		Self::builder(config).build()
	}

	/// Start an [`ApiGatewayClientBuilder`] for custom wiring.
	pub fn builder(config: GatewayConfig) -> ApiGatewayClientBuilder {
		ApiGatewayClientBuilder::new(config)
	}

	/// Run one request through the pipeline.
	///
	/// Order per attempt: connectivity gate, cache lookup, bearer injection, dispatch,
	/// response caching. An expired-token failure triggers at most one single-flight refresh
	/// followed by one replay that re-enters the pipeline from the top; a second rejection
	/// for the same request surfaces as [`Error::AuthRequired`].
	#[tracing::instrument(skip(self, spec), fields(method = %spec.method(), path = spec.path()))]
	pub async fn request(&self, spec: RequestSpec) -> Result<GatewayResponse> {
		let exempt = spec.is_auth_exempt() || self.config.is_auth_exempt(spec.path());
		let mut refresh_spent = false;

		loop {
			if !self.connectivity.is_online().await {
				return Err(Error::NetworkUnavailable);
			}

			let signature = spec.is_cacheable().then(|| RequestSignature::compute(&spec));

			if let Some(signature) = &signature
				&& let Some((status, body)) = self.cache.get(signature).await
			{
				self.metrics.record_hit();

				tracing::debug!(signature = signature.as_str(), "served from response cache");

				return Ok(GatewayResponse { status, body, source: ResponseSource::Cache });
			}

			self.metrics.record_miss();

			// The generation is captured before the token read so a refresh that completes
			// while this dispatch is in flight is detected instead of repeated.
			let observed_generation = self.coordinator.generation().await;
			let bearer = if exempt { None } else { self.tokens.get().await? };

			match dispatch(&self.http, &self.config, &spec, bearer.as_deref(), !exempt).await {
				Ok(dispatched) => {
					// Dispatch only succeeds on 2xx, so every cacheable success lands here.
					if let Some(signature) = signature {
						self.cache.insert(signature, dispatched.status, dispatched.body.clone()).await;
					}

					return Ok(GatewayResponse {
						status: dispatched.status,
						body: dispatched.body,
						source: ResponseSource::Network,
					});
				},
				Err(Error::AuthExpired { url }) => {
					if refresh_spent {
						tracing::warn!(%url, "token still rejected after refresh");

						return Err(Error::AuthRequired);
					}

					refresh_spent = true;

					tracing::debug!(%url, "access token rejected; entering refresh cycle");

					self.coordinator.refreshed_token(observed_generation).await?;
				},
				Err(err) => return Err(err),
			}
		}
	}

	/// Authenticate against the login endpoint and store the returned access token.
	///
	/// The backend also sets the server-side refresh credential (cookie); this layer never
	/// reads it.
	pub async fn login(&self, credentials: Value) -> Result<GatewayResponse> {
		let spec =
			RequestSpec::post(self.config.login_path.clone()).auth_exempt().with_body(credentials);
		let response = self.request(spec).await?;
		let token = response
			.body
			.get("accessToken")
			.and_then(Value::as_str)
			.map(str::to_owned)
			.ok_or_else(|| Error::MalformedResponse {
				url: self.config.endpoint_url(&self.config.login_path),
				reason: "Login response is missing the accessToken field.".into(),
			})?;

		self.tokens.set(token).await?;
		self.coordinator.note_token_replaced().await;

		Ok(response)
	}

	/// End the session: notify the backend, drop the token, and clear the response cache.
	///
	/// The backend call is best-effort; its failure never keeps the local session alive.
	pub async fn logout(&self) -> Result<()> {
		let spec = RequestSpec::post(self.config.logout_path.clone()).auth_exempt();

		if let Err(err) = self.request(spec).await {
			tracing::warn!(error = %err, "logout call failed; clearing local session anyway");
		}

		self.tokens.remove().await?;
		self.cache.clear().await;

		Ok(())
	}

	/// Capture a status snapshot for diagnostics screens.
	pub async fn status(&self) -> ClientStatus {
		ClientStatus {
			refresh: self.coordinator.snapshot().await,
			token_present: matches!(self.tokens.get().await, Ok(Some(_))),
			cached_entries: self.cache.len().await,
			metrics: self.metrics.snapshot(),
		}
	}

	/// Configuration this client was built with.
	pub fn config(&self) -> &GatewayConfig {
		&self.config
	}
}
impl Debug for ApiGatewayClient {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("ApiGatewayClient").field("config", &self.config).finish_non_exhaustive()
	}
}
