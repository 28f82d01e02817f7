//! Token adjacency built from a registry snapshot.

use router_registry::SourceSnapshot;
use router_types::TokenId;
use std::collections::HashMap;

/// Adjacency over tokens, with the sources serving each edge.
///
/// Built once per route search from a registry snapshot, so admin changes
/// landing mid-search cannot shift the graph under the frontier. Sources with
/// weight zero stay registered but are left out of the graph entirely.
pub struct TokenGraph {
	edges: HashMap<TokenId, HashMap<TokenId, Vec<SourceSnapshot>>>,
}

impl TokenGraph {
	pub fn build(snapshots: Vec<SourceSnapshot>) -> Self {
		let mut edges: HashMap<TokenId, HashMap<TokenId, Vec<SourceSnapshot>>> = HashMap::new();
		for snap in snapshots {
			if snap.descriptor.weight.is_zero() {
				continue;
			}
			for (a, b) in snap.source.pairs() {
				edges
					.entry(a.clone())
					.or_default()
					.entry(b.clone())
					.or_default()
					.push(snap.clone());
				edges
					.entry(b)
					.or_default()
					.entry(a)
					.or_default()
					.push(snap.clone());
			}
		}
		Self { edges }
	}

	pub fn contains(&self, token: &TokenId) -> bool {
		self.edges.contains_key(token)
	}

	/// Neighbors of `token` with the sources serving each edge.
	pub fn neighbors(&self, token: &TokenId) -> impl Iterator<Item = (&TokenId, &[SourceSnapshot])> {
		self.edges
			.get(token)
			.into_iter()
			.flat_map(|m| m.iter().map(|(t, s)| (t, s.as_slice())))
	}

	pub fn token_count(&self) -> usize {
		self.edges.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_registry::implementations::AmmSource;
	use router_registry::SourceRegistry;
	use router_types::{SourceDescriptor, SourceKind};
	use rust_decimal::Decimal;
	use rust_decimal_macros::dec;
	use std::sync::Arc;

	fn register_pool(registry: &SourceRegistry, handle: &str, a: &str, b: &str, weight: Decimal) {
		let pool = AmmSource::new(
			TokenId::from(a),
			TokenId::from(b),
			dec!(100000),
			dec!(100000),
			dec!(0.003),
			dec!(0.5),
		);
		registry
			.register(
				Arc::new(pool),
				SourceDescriptor {
					handle: handle.to_string(),
					kind: SourceKind::Amm,
					priority: 1,
					weight,
				},
			)
			.unwrap();
	}

	#[test]
	fn test_edges_are_bidirectional() {
		let registry = SourceRegistry::new();
		register_pool(&registry, "amm-1", "USDC", "WETH", Decimal::ONE);

		let graph = TokenGraph::build(registry.snapshot_all());
		assert!(graph.contains(&TokenId::from("USDC")));
		assert!(graph.contains(&TokenId::from("WETH")));
		assert_eq!(graph.neighbors(&TokenId::from("WETH")).count(), 1);
	}

	#[test]
	fn test_zero_weight_source_excluded() {
		let registry = SourceRegistry::new();
		register_pool(&registry, "amm-1", "USDC", "WETH", Decimal::ZERO);

		let graph = TokenGraph::build(registry.snapshot_all());
		assert!(!graph.contains(&TokenId::from("USDC")));
	}

	#[test]
	fn test_parallel_sources_share_an_edge() {
		let registry = SourceRegistry::new();
		register_pool(&registry, "amm-1", "USDC", "WETH", Decimal::ONE);
		register_pool(&registry, "amm-2", "USDC", "WETH", Decimal::ONE);

		let graph = TokenGraph::build(registry.snapshot_all());
		let (_, sources) = graph
			.neighbors(&TokenId::from("USDC"))
			.next()
			.unwrap();
		assert_eq!(sources.len(), 2);
	}
}
