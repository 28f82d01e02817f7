//! Best-first route search.

use crate::graph::TokenGraph;
use crate::split::{self, HopAllocation};
use priority_queue::PriorityQueue;
use router_config::ConfigHandle;
use router_metrics::MetricsAggregator;
use router_quote::QuoteService;
use router_registry::{SourceRegistry, SourceSnapshot};
use router_types::{
	Result, Route, RouteHop, RouteId, RouterError, TokenId,
};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Frontier ordering: shallower partial paths expand first, larger carried
/// amounts break ties. Intermediate amounts are denominated in different
/// tokens, so the frontier only orders exploration; route selection happens
/// over the complete candidates at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Priority {
	hops_used: usize,
	amount: Decimal,
}

impl Ord for Priority {
	fn cmp(&self, other: &Self) -> Ordering {
		other
			.hops_used
			.cmp(&self.hops_used)
			.then(self.amount.cmp(&other.amount))
	}
}

impl PartialOrd for Priority {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

#[derive(Clone)]
struct SearchNode {
	token: TokenId,
	amount: Decimal,
	gas: Decimal,
	/// Product of (1 - hop slippage) along the path so far.
	fill_factor: Decimal,
	hops: Vec<RouteHop>,
	visited: HashSet<TokenId>,
}

/// Finds the best route for a pair and amount.
pub struct RouteFinder {
	registry: Arc<SourceRegistry>,
	quotes: Arc<QuoteService>,
	metrics: Arc<MetricsAggregator>,
	config: Arc<ConfigHandle>,
}

impl RouteFinder {
	pub fn new(
		registry: Arc<SourceRegistry>,
		quotes: Arc<QuoteService>,
		metrics: Arc<MetricsAggregator>,
		config: Arc<ConfigHandle>,
	) -> Self {
		Self { registry, quotes, metrics, config }
	}

	/// Find the best route from `token_in` to `token_out` for `amount_in`
	/// under `max_slippage` (falling back to the configured default bound).
	///
	/// Candidates are compared by expected output, then gas, then source
	/// reliability. A route is only returned while its quotes are fresh; the
	/// returned route carries its own expiry.
	#[instrument(skip(self), fields(%token_in, %token_out, %amount_in))]
	pub async fn find(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
		max_slippage: Option<Decimal>,
	) -> Result<Route> {
		if amount_in <= Decimal::ZERO {
			return Err(RouterError::InvalidRequest(
				"amount_in must be positive".into(),
			));
		}
		if token_in == token_out {
			return Err(RouterError::InvalidRequest(
				"token_in and token_out must differ".into(),
			));
		}

		let config = self.config.load();
		let max_slippage = max_slippage.unwrap_or(config.routing.default_max_slippage);
		let quoted_at = Instant::now();

		let graph = TokenGraph::build(self.registry.snapshot_all());
		if !graph.contains(token_in) {
			return Err(RouterError::NoLiquidity {
				token_in: token_in.clone(),
				token_out: token_out.clone(),
			});
		}

		let mut nodes: Vec<SearchNode> = vec![SearchNode {
			token: token_in.clone(),
			amount: amount_in,
			gas: Decimal::ZERO,
			fill_factor: Decimal::ONE,
			hops: Vec::new(),
			visited: HashSet::from([token_in.clone()]),
		}];
		let mut frontier = PriorityQueue::new();
		frontier.push(0usize, Priority { hops_used: 0, amount: amount_in });

		let mut candidates: Vec<SearchNode> = Vec::new();
		let mut any_edge_quoted = false;

		while let Some((idx, _)) = frontier.pop() {
			let node = nodes[idx].clone();
			if node.token == *token_out {
				candidates.push(node);
				continue;
			}
			if node.hops.len() >= config.routing.max_hops {
				continue;
			}

			for (next, edge_sources) in graph.neighbors(&node.token) {
				if node.visited.contains(next) {
					continue;
				}

				let allocation = match self
					.allocate_hop(edge_sources, &node.token, next, node.amount, &config)
					.await
				{
					Some(allocation) => allocation,
					None => continue,
				};
				any_edge_quoted = true;

				let mut visited = node.visited.clone();
				visited.insert(next.clone());
				let mut hops = node.hops.clone();
				hops.push(RouteHop {
					token_in: node.token.clone(),
					token_out: next.clone(),
					amount_in: node.amount,
					legs: allocation.legs,
				});

				let child = SearchNode {
					token: next.clone(),
					amount: allocation.expected_out,
					gas: node.gas + allocation.gas,
					fill_factor: node.fill_factor * (Decimal::ONE - allocation.slippage),
					hops,
					visited,
				};
				let priority = Priority {
					hops_used: child.hops.len(),
					amount: child.amount,
				};
				nodes.push(child);
				frontier.push(nodes.len() - 1, priority);
			}
		}

		if candidates.is_empty() {
			return if any_edge_quoted {
				Err(RouterError::NoViableRoute { max_slippage })
			} else {
				Err(RouterError::NoLiquidity {
					token_in: token_in.clone(),
					token_out: token_out.clone(),
				})
			};
		}

		let within_bound: Vec<SearchNode> = candidates
			.into_iter()
			.filter(|c| Decimal::ONE - c.fill_factor <= max_slippage)
			.collect();
		if within_bound.is_empty() {
			return Err(RouterError::NoViableRoute { max_slippage });
		}

		let best = within_bound
			.into_iter()
			.max_by(|a, b| {
				a.amount
					.cmp(&b.amount)
					.then(b.gas.cmp(&a.gas))
					.then(
						self.route_reliability(a)
							.cmp(&self.route_reliability(b)),
					)
			})
			.ok_or(RouterError::NoViableRoute { max_slippage })?;

		let reliability = self.route_reliability(&best);
		let ttl = Duration::from_millis(config.quotes.quote_ttl_ms);
		let route = Route {
			id: RouteId::new(),
			token_in: token_in.clone(),
			token_out: token_out.clone(),
			amount_in,
			total_expected_out: best.amount,
			price_impact: Decimal::ONE - best.fill_factor,
			gas_estimate: best.gas,
			reliability,
			hops: best.hops,
			quoted_at,
			expires_at: quoted_at + ttl,
		};
		debug!(
			route = %route.id,
			hops = route.hop_count(),
			expected_out = %route.total_expected_out,
			impact = %route.price_impact,
			"Route computed"
		);
		Ok(route)
	}

	/// Rank the edge's sources by output at this amount, keep the top k, and
	/// split the hop across them. `None` means this edge cannot carry the
	/// amount and the path is abandoned.
	async fn allocate_hop(
		&self,
		edge_sources: &[SourceSnapshot],
		token_in: &TokenId,
		token_out: &TokenId,
		amount: Decimal,
		config: &router_config::RouterConfig,
	) -> Option<HopAllocation> {
		let quotes = self
			.quotes
			.collect_from(edge_sources, token_in, token_out, amount)
			.await
			.ok()?;

		let mut ranked = quotes;
		ranked.sort_by(|a, b| b.amount_out.cmp(&a.amount_out));
		let chosen: Vec<SourceSnapshot> = ranked
			.iter()
			.take(config.routing.top_k_split)
			.filter_map(|q| edge_sources.iter().find(|s| s.id == q.source).cloned())
			.collect();

		split::allocate(&chosen, token_in, token_out, amount, config.routing.split_slices)
			.await
			.ok()
	}

	/// Mean reliability over the distinct sources a candidate touches.
	fn route_reliability(&self, node: &SearchNode) -> Decimal {
		let sources: HashSet<_> = node
			.hops
			.iter()
			.flat_map(|h| h.legs.iter().map(|l| l.source))
			.collect();
		if sources.is_empty() {
			return Decimal::ZERO;
		}
		let sum: Decimal = sources
			.iter()
			.map(|s| self.metrics.reliability(*s))
			.sum();
		sum / Decimal::from(sources.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_registry::implementations::AmmSource;
	use router_types::{SourceDescriptor, SourceKind};
	use rust_decimal_macros::dec;

	fn register_pool(
		registry: &SourceRegistry,
		handle: &str,
		a: &str,
		b: &str,
		reserve_a: Decimal,
		reserve_b: Decimal,
	) {
		let pool = AmmSource::new(
			TokenId::from(a),
			TokenId::from(b),
			reserve_a,
			reserve_b,
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
					weight: Decimal::ONE,
				},
			)
			.unwrap();
	}

	fn finder(registry: Arc<SourceRegistry>) -> RouteFinder {
		let metrics = Arc::new(MetricsAggregator::default());
		let config = Arc::new(ConfigHandle::default());
		let quotes = Arc::new(QuoteService::new(
			registry.clone(),
			metrics.clone(),
			config.clone(),
			None,
		));
		RouteFinder::new(registry, quotes, metrics, config)
	}

	#[tokio::test]
	async fn test_direct_route() {
		let registry = Arc::new(SourceRegistry::new());
		register_pool(&registry, "amm-1", "USDC", "DAI", dec!(1000000), dec!(1000000));

		let finder = finder(registry);
		let route = finder
			.find(&TokenId::from("USDC"), &TokenId::from("DAI"), dec!(1000), None)
			.await
			.unwrap();

		assert_eq!(route.hop_count(), 1);
		assert!(route.split_conserved());
		assert!(route.total_expected_out > dec!(995));
		assert!(route.total_expected_out < dec!(1000));
		assert!(!route.is_expired());
	}

	#[tokio::test]
	async fn test_multi_hop_route() {
		let registry = Arc::new(SourceRegistry::new());
		register_pool(&registry, "amm-1", "USDC", "WETH", dec!(1000000), dec!(500));
		register_pool(&registry, "amm-2", "WETH", "DAI", dec!(500), dec!(1000000));

		let finder = finder(registry);
		let route = finder
			.find(&TokenId::from("USDC"), &TokenId::from("DAI"), dec!(1000), None)
			.await
			.unwrap();

		assert_eq!(route.hop_count(), 2);
		assert_eq!(route.hops[0].token_out, TokenId::from("WETH"));
		assert!(route.split_conserved());
	}

	#[tokio::test]
	async fn test_split_route_beats_single_source() {
		let registry = Arc::new(SourceRegistry::new());
		register_pool(&registry, "amm-1", "USDC", "DAI", dec!(100000), dec!(100000));
		register_pool(&registry, "amm-2", "USDC", "DAI", dec!(100000), dec!(100000));

		let single_registry = Arc::new(SourceRegistry::new());
		register_pool(&single_registry, "amm-1", "USDC", "DAI", dec!(100000), dec!(100000));

		let amount = dec!(20000);
		let split_route = finder(registry)
			.find(&TokenId::from("USDC"), &TokenId::from("DAI"), amount, Some(dec!(0.2)))
			.await
			.unwrap();
		let single_route = finder(single_registry)
			.find(&TokenId::from("USDC"), &TokenId::from("DAI"), amount, Some(dec!(0.2)))
			.await
			.unwrap();

		assert_eq!(split_route.hops[0].legs.len(), 2);
		assert!(split_route.total_expected_out > single_route.total_expected_out);
	}

	#[tokio::test]
	async fn test_hop_limit_bounds_search() {
		let registry = Arc::new(SourceRegistry::new());
		// A -> B -> C -> D -> E needs four hops; the default limit is three.
		register_pool(&registry, "amm-1", "A", "B", dec!(100000), dec!(100000));
		register_pool(&registry, "amm-2", "B", "C", dec!(100000), dec!(100000));
		register_pool(&registry, "amm-3", "C", "D", dec!(100000), dec!(100000));
		register_pool(&registry, "amm-4", "D", "E", dec!(100000), dec!(100000));

		let finder = finder(registry);
		let reachable = finder
			.find(&TokenId::from("A"), &TokenId::from("D"), dec!(100), None)
			.await;
		assert!(reachable.is_ok());

		let unreachable = finder
			.find(&TokenId::from("A"), &TokenId::from("E"), dec!(100), None)
			.await;
		assert!(matches!(
			unreachable,
			Err(RouterError::NoViableRoute { .. })
		));
	}

	#[tokio::test]
	async fn test_slippage_bound_rejects_route() {
		let registry = Arc::new(SourceRegistry::new());
		register_pool(&registry, "amm-1", "USDC", "DAI", dec!(10000), dec!(10000));

		let finder = finder(registry);
		// Pushing 20% of the pool depth cannot stay within one basis point.
		let result = finder
			.find(
				&TokenId::from("USDC"),
				&TokenId::from("DAI"),
				dec!(2000),
				Some(dec!(0.0001)),
			)
			.await;
		assert!(matches!(result, Err(RouterError::NoViableRoute { .. })));
	}

	#[tokio::test]
	async fn test_unknown_token_is_no_liquidity() {
		let registry = Arc::new(SourceRegistry::new());
		register_pool(&registry, "amm-1", "USDC", "DAI", dec!(100000), dec!(100000));

		let finder = finder(registry);
		let result = finder
			.find(&TokenId::from("WBTC"), &TokenId::from("DAI"), dec!(100), None)
			.await;
		assert!(matches!(result, Err(RouterError::NoLiquidity { .. })));
	}
}
