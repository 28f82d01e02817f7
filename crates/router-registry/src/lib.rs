//! Source registry: the catalog of liquidity sources.
//!
//! Sources are registered by an administrator, soft-deactivated (never hard
//! deleted while historical references exist), and listed per token pair for
//! the quote cycle. Weight and priority updates land in the catalog
//! immediately but only reach routing on the next quote cycle, because every
//! quote cycle reads a fresh snapshot and routes keep the copies they were
//! built with.

pub mod implementations;

use dashmap::DashMap;
use router_types::{
	LiquiditySource, RegistryEvent, Result, RouterError, SourceDescriptor, SourceId, TokenId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// A source as held by the registry.
#[derive(Clone)]
pub struct RegisteredSource {
	pub id: SourceId,
	pub descriptor: SourceDescriptor,
	pub active: bool,
	pub source: Arc<dyn LiquiditySource>,
}

/// Snapshot of one source handed to a quote cycle. Holds the descriptor
/// values as of snapshot time, so later admin updates cannot shift a route
/// mid-computation.
#[derive(Clone)]
pub struct SourceSnapshot {
	pub id: SourceId,
	pub descriptor: SourceDescriptor,
	pub source: Arc<dyn LiquiditySource>,
}

/// Catalog of liquidity sources.
pub struct SourceRegistry {
	sources: DashMap<SourceId, RegisteredSource>,
	/// Duplicate rejection: one registration per external handle.
	handles: DashMap<String, SourceId>,
	notifications: broadcast::Sender<RegistryEvent>,
}

impl SourceRegistry {
	pub fn new() -> Self {
		let (notifications, _) = broadcast::channel(256);
		Self {
			sources: DashMap::new(),
			handles: DashMap::new(),
			notifications,
		}
	}

	/// Registration/removal notifications, consumed by the metrics
	/// aggregator for bootstrap.
	pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
		self.notifications.subscribe()
	}

	/// Register a new source. Rejects duplicates of the same external handle
	/// and negative weights.
	pub fn register(
		&self,
		source: Arc<dyn LiquiditySource>,
		descriptor: SourceDescriptor,
	) -> Result<SourceId> {
		if descriptor.weight < Decimal::ZERO {
			return Err(RouterError::Registry("weight must not be negative".into()));
		}
		if self.handles.contains_key(&descriptor.handle) {
			return Err(RouterError::Registry(format!(
				"source '{}' already registered",
				descriptor.handle
			)));
		}

		let id = SourceId::new();
		self.handles.insert(descriptor.handle.clone(), id);
		info!(source = %id, handle = %descriptor.handle, kind = %descriptor.kind, "Registered liquidity source");

		let event = RegistryEvent::SourceRegistered {
			source: id,
			kind: descriptor.kind,
			handle: descriptor.handle.clone(),
		};
		self.sources.insert(
			id,
			RegisteredSource { id, descriptor, active: true, source },
		);
		let _ = self.notifications.send(event);

		Ok(id)
	}

	/// Soft-deactivate a source; it stays in the catalog for historical
	/// references but is excluded from all future routing.
	pub fn deactivate(&self, id: SourceId) -> Result<()> {
		let mut entry = self
			.sources
			.get_mut(&id)
			.ok_or_else(|| RouterError::Registry(format!("unknown source {}", id)))?;
		entry.active = false;
		info!(source = %id, "Deactivated liquidity source");
		drop(entry);

		let _ = self
			.notifications
			.send(RegistryEvent::SourceDeactivated { source: id });
		Ok(())
	}

	pub fn update_weight(&self, id: SourceId, weight: Decimal) -> Result<()> {
		if weight < Decimal::ZERO {
			return Err(RouterError::Registry("weight must not be negative".into()));
		}
		let mut entry = self
			.sources
			.get_mut(&id)
			.ok_or_else(|| RouterError::Registry(format!("unknown source {}", id)))?;
		entry.descriptor.weight = weight;
		debug!(source = %id, %weight, "Updated source weight");
		Ok(())
	}

	pub fn update_priority(&self, id: SourceId, priority: u32) -> Result<()> {
		let mut entry = self
			.sources
			.get_mut(&id)
			.ok_or_else(|| RouterError::Registry(format!("unknown source {}", id)))?;
		entry.descriptor.priority = priority;
		debug!(source = %id, priority, "Updated source priority");
		Ok(())
	}

	/// Active sources able to trade the given pair, either direction.
	pub fn list(&self, token_a: &TokenId, token_b: &TokenId) -> Vec<SourceId> {
		self.snapshot(token_a, token_b)
			.into_iter()
			.map(|s| s.id)
			.collect()
	}

	/// Snapshot of active sources for a pair, taken once per quote cycle.
	pub fn snapshot(&self, token_a: &TokenId, token_b: &TokenId) -> Vec<SourceSnapshot> {
		self.sources
			.iter()
			.filter(|entry| entry.active)
			.filter(|entry| {
				entry.source.pairs().iter().any(|(x, y)| {
					(x == token_a && y == token_b) || (x == token_b && y == token_a)
				})
			})
			.map(|entry| SourceSnapshot {
				id: entry.id,
				descriptor: entry.descriptor.clone(),
				source: entry.source.clone(),
			})
			.collect()
	}

	/// Snapshot of every active source.
	pub fn snapshot_all(&self) -> Vec<SourceSnapshot> {
		self.sources
			.iter()
			.filter(|entry| entry.active)
			.map(|entry| SourceSnapshot {
				id: entry.id,
				descriptor: entry.descriptor.clone(),
				source: entry.source.clone(),
			})
			.collect()
	}

	pub fn get(&self, id: SourceId) -> Option<SourceSnapshot> {
		self.sources.get(&id).map(|entry| SourceSnapshot {
			id: entry.id,
			descriptor: entry.descriptor.clone(),
			source: entry.source.clone(),
		})
	}

	pub fn is_active(&self, id: SourceId) -> bool {
		self.sources.get(&id).map(|e| e.active).unwrap_or(false)
	}

	/// Every token that appears in some active source's pair list.
	pub fn tokens(&self) -> Vec<TokenId> {
		let mut tokens: Vec<TokenId> = self
			.sources
			.iter()
			.filter(|entry| entry.active)
			.flat_map(|entry| {
				entry
					.source
					.pairs()
					.into_iter()
					.flat_map(|(a, b)| [a, b])
			})
			.collect();
		tokens.sort();
		tokens.dedup();
		tokens
	}
}

impl Default for SourceRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::amm::AmmSource;
	use router_types::SourceKind;
	use rust_decimal_macros::dec;

	fn descriptor(handle: &str) -> SourceDescriptor {
		SourceDescriptor {
			handle: handle.to_string(),
			kind: SourceKind::Amm,
			priority: 1,
			weight: Decimal::ONE,
		}
	}

	fn pool(handle: &str) -> (Arc<dyn LiquiditySource>, SourceDescriptor) {
		let amm = AmmSource::new(
			TokenId::from("USDC"),
			TokenId::from("DAI"),
			dec!(100000),
			dec!(100000),
			dec!(0.003),
			dec!(0.5),
		);
		(Arc::new(amm), descriptor(handle))
	}

	#[test]
	fn test_register_and_list() {
		let registry = SourceRegistry::new();
		let (source, desc) = pool("amm-1");
		let id = registry.register(source, desc).unwrap();

		let listed = registry.list(&TokenId::from("USDC"), &TokenId::from("DAI"));
		assert_eq!(listed, vec![id]);

		// Reverse direction finds the same source.
		let listed = registry.list(&TokenId::from("DAI"), &TokenId::from("USDC"));
		assert_eq!(listed, vec![id]);
	}

	#[test]
	fn test_duplicate_handle_rejected() {
		let registry = SourceRegistry::new();
		let (source, desc) = pool("amm-1");
		registry.register(source, desc).unwrap();

		let (source, desc) = pool("amm-1");
		assert!(matches!(
			registry.register(source, desc),
			Err(RouterError::Registry(_))
		));
	}

	#[test]
	fn test_deactivated_source_excluded() {
		let registry = SourceRegistry::new();
		let (source, desc) = pool("amm-1");
		let id = registry.register(source, desc).unwrap();

		registry.deactivate(id).unwrap();
		assert!(registry
			.list(&TokenId::from("USDC"), &TokenId::from("DAI"))
			.is_empty());
		// Still in the catalog for historical references.
		assert!(registry.get(id).is_some());
	}

	#[test]
	fn test_negative_weight_rejected() {
		let registry = SourceRegistry::new();
		let (source, desc) = pool("amm-1");
		let id = registry.register(source, desc).unwrap();

		assert!(registry.update_weight(id, dec!(-1)).is_err());
		assert!(registry.update_weight(id, dec!(2)).is_ok());
	}

	#[test]
	fn test_registration_notification() {
		let registry = SourceRegistry::new();
		let mut rx = registry.subscribe();

		let (source, desc) = pool("amm-1");
		let id = registry.register(source, desc).unwrap();

		match rx.try_recv().unwrap() {
			RegistryEvent::SourceRegistered { source, .. } => assert_eq!(source, id),
			other => panic!("unexpected event: {:?}", other),
		}
	}
}
