//! Async HTTP gateway client with bounded response caching, connectivity guarding, and
//! single-flight token refresh — the shared request layer of the Pawfect Stays mobile apps.
//!
//! Every screen funnels its backend calls through one [`ApiGatewayClient`] per session. The
//! client short-circuits repeated reads via a TTL-bounded LRU cache, refreshes an expired
//! access token exactly once no matter how many requests fail concurrently, checks device
//! connectivity before touching the network, and signals the host to re-authenticate when
//! refresh itself fails.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod http;
pub mod metrics;
pub mod session;

mod client;
mod config;
mod error;
mod refresh;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

pub use crate::{
	client::{
		ApiGatewayClient, ApiGatewayClientBuilder, ClientStatus, GatewayResponse, ResponseSource,
	},
	config::GatewayConfig,
	error::{Error, Result},
	http::request::{QueryValue, RequestSpec},
	refresh::{RefreshPhase, RefreshSnapshot},
	session::{
		AlwaysOnline, ConnectivityProbe, MemoryTokenStore, ReauthHook, SharedConnectivity,
		TokenStore,
	},
};
