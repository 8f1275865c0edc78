//! Session collaborators: token storage, connectivity probing, and re-authentication
//! signalling.
//!
//! These are the seams the hosting application plugs its platform services into. The crate
//! ships in-memory defaults so the client is usable (and testable) without any wiring.

// std
use std::{
	fmt::{Debug, Formatter, Result as FmtResult},
	sync::atomic::{AtomicBool, Ordering},
};
// crates.io
use async_trait::async_trait;
use tokio::sync::RwLock;
// self
use crate::_prelude::*;

/// Durable storage for the single session access token.
///
/// The token is opaque to this crate; at most one value is valid at a time. Only the gateway
/// client and its refresh coordinator write through this trait.
#[async_trait]
pub trait TokenStore: Send + Sync {
	/// Read the current access token, if one is stored.
	async fn get(&self) -> Result<Option<String>>;

	/// Replace the stored access token.
	async fn set(&self, token: String) -> Result<()>;

	/// Remove the stored access token.
	async fn remove(&self) -> Result<()>;
}

/// Device connectivity probe consulted before any network dispatch.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
	/// Whether the device currently reports an online network path.
	async fn is_online(&self) -> bool;
}

/// Callback invoked once per failed refresh cycle to route the host back to its login screen.
pub type ReauthHook = Arc<dyn Fn() + Send + Sync>;

/// In-memory [`TokenStore`] used as the default and in tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
	token: RwLock<Option<String>>,
}
impl MemoryTokenStore {
	/// Create an empty in-memory token store.
	pub fn new() -> Self {
		Self::default()
	}
}
#[async_trait]
impl TokenStore for MemoryTokenStore {
	async fn get(&self) -> Result<Option<String>> {
		Ok(self.token.read().await.clone())
	}

	async fn set(&self, token: String) -> Result<()> {
		*self.token.write().await = Some(token);

		Ok(())
	}

	async fn remove(&self) -> Result<()> {
		*self.token.write().await = None;

		Ok(())
	}
}

/// Probe that always reports an online device; the default when the host registers none.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOnline;
#[async_trait]
impl ConnectivityProbe for AlwaysOnline {
	async fn is_online(&self) -> bool {
		true
	}
}

/// Probe backed by a shared flag, letting tests and hosts flip connectivity at runtime.
#[derive(Clone, Default)]
pub struct SharedConnectivity {
	online: Arc<AtomicBool>,
}
impl SharedConnectivity {
	/// Create a probe reporting the given initial state.
	pub fn new(online: bool) -> Self {
		Self { online: Arc::new(AtomicBool::new(online)) }
	}

	/// Update the reported connectivity state.
	pub fn set_online(&self, online: bool) {
		self.online.store(online, Ordering::Relaxed);
	}
}
impl Debug for SharedConnectivity {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("SharedConnectivity")
			.field("online", &self.online.load(Ordering::Relaxed))
			.finish()
	}
}
#[async_trait]
impl ConnectivityProbe for SharedConnectivity {
	async fn is_online(&self) -> bool {
		self.online.load(Ordering::Relaxed)
	}
}
