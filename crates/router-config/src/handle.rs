//! Atomically swappable configuration handle.

use crate::types::RouterConfig;
use arc_swap::ArcSwap;
use std::sync::Arc;
use tracing::info;

/// Shared handle to the live configuration.
///
/// Readers take a cheap snapshot per request; updates replace the whole
/// config atomically, so a request in flight keeps the parameters it started
/// with and the new values apply from the next request on.
pub struct ConfigHandle {
	inner: ArcSwap<RouterConfig>,
}

impl ConfigHandle {
	pub fn new(config: RouterConfig) -> Self {
		Self {
			inner: ArcSwap::from_pointee(config),
		}
	}

	/// Snapshot of the current configuration.
	pub fn load(&self) -> Arc<RouterConfig> {
		self.inner.load_full()
	}

	/// Replace the configuration. Takes effect for subsequent requests only.
	pub fn store(&self, config: RouterConfig) {
		info!("Applying configuration update");
		self.inner.store(Arc::new(config));
	}
}

impl Default for ConfigHandle {
	fn default() -> Self {
		Self::new(RouterConfig::default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_snapshot_survives_update() {
		let handle = ConfigHandle::default();
		let before = handle.load();

		let mut updated = RouterConfig::default();
		updated.routing.max_hops = 5;
		handle.store(updated);

		// The old snapshot is unchanged; new loads see the update.
		assert_eq!(before.routing.max_hops, 3);
		assert_eq!(handle.load().routing.max_hops, 5);
	}
}
