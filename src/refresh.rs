//! Single-flight token refresh coordination.
//!
//! When many in-flight requests fail with an expired token at once, exactly one of them
//! becomes the refresh leader; the rest enqueue as waiters and resume, in FIFO order, once
//! the single refresh call settles. The `Idle -> Refreshing` transition happens atomically
//! under the state lock, so two tasks can never both observe `Idle` and both start a refresh.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use reqwest::Client;
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};
// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	http::{dispatch::dispatch, request::RequestSpec},
	metrics::ClientMetrics,
	session::{ReauthHook, TokenStore},
};

/// Refresh lifecycle phase visible in status reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No refresh is in flight.
	Idle,
	/// A refresh call is running; expired-token failures enqueue as waiters.
	Refreshing,
}

/// Point-in-time view of the coordinator for status reporting.
#[derive(Clone, Debug)]
pub struct RefreshSnapshot {
	/// Current lifecycle phase.
	pub phase: RefreshPhase,
	/// Count of token generations this session; bumps on every successful refresh.
	pub generation: u64,
	/// Wall-clock timestamp of the most recent successful refresh.
	pub last_refresh_at: Option<DateTime<Utc>>,
}

/// Owns the single-flight refresh state machine for one client session.
pub struct RefreshCoordinator {
	http: Arc<Client>,
	config: Arc<GatewayConfig>,
	tokens: Arc<dyn TokenStore>,
	metrics: Arc<ClientMetrics>,
	reauth_hook: Option<ReauthHook>,
	slot: Mutex<RefreshSlot>,
}
impl RefreshCoordinator {
	/// Build a coordinator sharing the client's HTTP handle, config, and token store.
	pub fn new(
		http: Arc<Client>,
		config: Arc<GatewayConfig>,
		tokens: Arc<dyn TokenStore>,
		metrics: Arc<ClientMetrics>,
		reauth_hook: Option<ReauthHook>,
	) -> Self {
		Self {
			http,
			config,
			tokens,
			metrics,
			reauth_hook,
			slot: Mutex::new(RefreshSlot {
				state: RefreshState::Idle,
				generation: 0,
				last_refresh_at: None,
			}),
		}
	}

	/// Token generation observed right now; callers capture this before dispatching.
	pub async fn generation(&self) -> u64 {
		self.slot.lock().await.generation
	}

	/// Record that the token was replaced outside a refresh cycle (login).
	///
	/// Requests dispatched with the previous token then short-circuit to the stored one
	/// instead of triggering a redundant refresh.
	pub async fn note_token_replaced(&self) {
		self.slot.lock().await.generation += 1;
	}

	/// Capture coordinator state for status reporting.
	pub async fn snapshot(&self) -> RefreshSnapshot {
		let slot = self.slot.lock().await;
		let phase = match slot.state {
			RefreshState::Idle => RefreshPhase::Idle,
			RefreshState::Refreshing { .. } => RefreshPhase::Refreshing,
		};

		RefreshSnapshot { phase, generation: slot.generation, last_refresh_at: slot.last_refresh_at }
	}

	/// Obtain a token newer than the one the caller dispatched with.
	///
	/// At most one refresh HTTP call runs per coordinator regardless of how many callers
	/// arrive concurrently. If the stored token already superseded `observed_generation`,
	/// it is returned without any network call.
	#[tracing::instrument(skip(self))]
	pub async fn refreshed_token(&self, observed_generation: u64) -> Result<String> {
		let role = {
			let mut slot = self.slot.lock().await;

			if slot.generation > observed_generation {
				Role::AlreadyRefreshed
			} else {
				match &mut slot.state {
					RefreshState::Idle => {
						slot.state = RefreshState::Refreshing { waiters: Vec::new() };

						Role::Leader
					},
					RefreshState::Refreshing { waiters } => {
						let (tx, rx) = oneshot::channel();

						waiters.push(tx);

						Role::Waiter(rx)
					},
				}
			}
		};

		match role {
			Role::AlreadyRefreshed => {
				tracing::debug!("token already superseded by a concurrent refresh");

				self.tokens.get().await?.ok_or(Error::AuthRequired)
			},
			Role::Waiter(rx) => {
				tracing::debug!("queued behind the in-flight refresh");

				match rx.await {
					Ok(outcome) => outcome,
					Err(_) => Err(Error::AuthRequired),
				}
			},
			Role::Leader => self.run_refresh().await,
		}
	}

	async fn run_refresh(&self) -> Result<String> {
		tracing::debug!("token refresh started");

		let started = Instant::now();
		let outcome = self.execute_refresh().await;

		// The token store settles before any waiter resumes: a successful refresh stored the
		// new token inside execute_refresh, and a failed one must not leave a stale token
		// behind for replays to pick up.
		if outcome.is_err()
			&& let Err(remove_err) = self.tokens.remove().await
		{
			tracing::warn!(error = %remove_err, "failed to clear token after refresh failure");
		}

		let drained = {
			let mut slot = self.slot.lock().await;
			let waiters = match std::mem::replace(&mut slot.state, RefreshState::Idle) {
				RefreshState::Refreshing { waiters } => waiters,
				RefreshState::Idle => Vec::new(),
			};
			let drained = waiters.len();

			match &outcome {
				Ok(token) => {
					slot.generation += 1;
					slot.last_refresh_at = Some(Utc::now());

					// Waiters resume in FIFO enqueue order.
					for tx in waiters {
						let _ = tx.send(Ok(token.clone()));
					}
				},
				Err(_) =>
					for tx in waiters {
						let _ = tx.send(Err(Error::AuthRequired));
					},
			}

			drained
		};

		match outcome {
			Ok(token) => {
				self.metrics.record_refresh_success(started.elapsed());

				tracing::debug!(waiters = drained, "token refresh complete");

				Ok(token)
			},
			Err(err) => {
				self.metrics.record_refresh_error();

				if let Some(hook) = &self.reauth_hook {
					hook();
				}

				tracing::warn!(
					error = %err,
					waiters = drained,
					"token refresh failed; session requires re-authentication"
				);

				Err(Error::AuthRequired)
			},
		}
	}

	async fn execute_refresh(&self) -> Result<String> {
		let spec = RequestSpec::post(self.config.refresh_path.clone()).auth_exempt();
		// The refresh credential travels server-side (cookie); no bearer header, and a 401
		// here is terminal rather than a trigger for another cycle.
		let dispatched = dispatch(&self.http, &self.config, &spec, None, false).await?;
		let token = dispatched
			.body
			.get("accessToken")
			.and_then(Value::as_str)
			.map(str::to_owned)
			.ok_or_else(|| Error::MalformedResponse {
				url: self.config.endpoint_url(&self.config.refresh_path),
				reason: "Refresh response is missing the accessToken field.".into(),
			})?;

		self.tokens.set(token.clone()).await?;

		Ok(token)
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("RefreshCoordinator").finish_non_exhaustive()
	}
}

#[derive(Debug)]
struct RefreshSlot {
	state: RefreshState,
	generation: u64,
	last_refresh_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum RefreshState {
	Idle,
	Refreshing { waiters: Vec<oneshot::Sender<std::result::Result<String, Error>>> },
}

enum Role {
	Leader,
	Waiter(oneshot::Receiver<std::result::Result<String, Error>>),
	AlreadyRefreshed,
}
