//! Cross-source divergence scanning.
//!
//! The scanner quotes every pair in both directions, pairs the source selling
//! the asset high with the source selling it cheap, and reports opportunities
//! whose profit stays positive after both legs' fees and gas. Opportunities
//! are ephemeral: they expire with their quotes and a stale one can only be
//! observed, never acted on.

use dashmap::DashMap;
use router_config::ConfigHandle;
use router_quote::{aggregate, QuoteService};
use router_registry::SourceRegistry;
use router_types::{
	ArbitrageOpportunity, OpportunityId, PriceQuote, Result, RouterError, TokenPair,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct ArbitrageScanner {
	registry: Arc<SourceRegistry>,
	quotes: Arc<QuoteService>,
	config: Arc<ConfigHandle>,
	opportunities: DashMap<OpportunityId, ArbitrageOpportunity>,
}

impl ArbitrageScanner {
	pub fn new(
		registry: Arc<SourceRegistry>,
		quotes: Arc<QuoteService>,
		config: Arc<ConfigHandle>,
	) -> Self {
		Self {
			registry,
			quotes,
			config,
			opportunities: DashMap::new(),
		}
	}

	/// Scan every served pair once. Newly found opportunities replace the
	/// previous scan's state for their pair; expired entries are pruned.
	pub async fn scan(&self) -> Vec<ArbitrageOpportunity> {
		self.prune();

		let mut found = Vec::new();
		for pair in self.served_pairs() {
			if let Some(opportunity) = self.scan_pair(&pair).await {
				info!(
					opportunity = %opportunity.id,
					pair = %pair,
					profit = %opportunity.estimated_profit,
					"Detected arbitrage opportunity"
				);
				self.opportunities
					.insert(opportunity.id, opportunity.clone());
				found.push(opportunity);
			}
		}
		found
	}

	/// Currently valid opportunities, most profitable first.
	pub fn opportunities(&self) -> Vec<ArbitrageOpportunity> {
		self.prune();
		let mut list: Vec<ArbitrageOpportunity> = self
			.opportunities
			.iter()
			.map(|o| o.clone())
			.filter(ArbitrageOpportunity::is_valid)
			.collect();
		list.sort_by(|a, b| b.estimated_profit.cmp(&a.estimated_profit));
		list
	}

	/// Claim an opportunity for execution. Fails when it has expired or its
	/// profit estimate no longer holds.
	pub fn take(&self, id: OpportunityId) -> Result<ArbitrageOpportunity> {
		let (_, opportunity) = self
			.opportunities
			.remove(&id)
			.ok_or_else(|| RouterError::ArbitrageStale(format!("unknown opportunity {}", id)))?;
		if !opportunity.is_valid() {
			return Err(RouterError::ArbitrageStale(format!(
				"opportunity {} expired",
				id
			)));
		}
		Ok(opportunity)
	}

	fn prune(&self) {
		self.opportunities.retain(|_, o| o.is_valid());
	}

	/// Canonical pairs served by at least one active source.
	fn served_pairs(&self) -> Vec<TokenPair> {
		let mut pairs = HashSet::new();
		for snap in self.registry.snapshot_all() {
			for (a, b) in snap.source.pairs() {
				pairs.insert(TokenPair::canonical(&a, &b));
			}
		}
		pairs.into_iter().collect()
	}

	/// Look for a spread on one pair.
	///
	/// Selling `a` quotes give each source's bid for the asset, buying-back
	/// quotes its ask. The best bid and best ask across distinct sources form
	/// the candidate; it must straddle the configured comparison price, and
	/// its profit net of gas must clear the configured minimum.
	async fn scan_pair(&self, pair: &TokenPair) -> Option<ArbitrageOpportunity> {
		let config = self.config.load();
		let probe = config.arbitrage.max_trade_amount;

		let snapshots = self.registry.snapshot(&pair.a, &pair.b);
		if snapshots.len() < 2 {
			return None;
		}

		// Sell side: a -> b. Price is b per a, net of the source's fee.
		let sell_quotes = self
			.quotes
			.collect_from(&snapshots, &pair.a, &pair.b, probe)
			.await
			.ok()?;
		let best_sell = sell_quotes
			.iter()
			.max_by(|x, y| x.price.cmp(&y.price))?;

		// Buy side: b -> a, probed at the b-value of the sell leg.
		let probe_b = probe * best_sell.price;
		if probe_b <= Decimal::ZERO {
			return None;
		}
		let buy_quotes = self
			.quotes
			.collect_from(&snapshots, &pair.b, &pair.a, probe_b)
			.await
			.ok()?;
		let best_buy = buy_quotes
			.iter()
			.filter(|q| q.source != best_sell.source)
			.filter(|q| q.price > Decimal::ZERO)
			.max_by(|x, y| x.price.cmp(&y.price))?;

		// b->a price is a per b; the ask for a is its reciprocal.
		let buy_price = Decimal::ONE / best_buy.price;
		let sell_price = best_sell.price;
		if sell_price <= buy_price {
			return None;
		}

		// Both legs must straddle the comparison price; a one-sided gap is a
		// level shift, not a divergence.
		let weights: HashMap<_, _> = snapshots
			.iter()
			.map(|s| (s.id, s.descriptor.weight))
			.collect();
		let comparison = self.comparison_price(&sell_quotes, &buy_quotes, &weights)?;
		if sell_price < comparison || buy_price > comparison {
			return None;
		}

		let feasible_amount = feasible(probe, best_sell, best_buy, buy_price);
		if feasible_amount <= Decimal::ZERO {
			return None;
		}

		let gross = (sell_price - buy_price) * feasible_amount;
		let costs = best_sell.gas_estimate + best_buy.gas_estimate;
		let profit = gross - costs;
		debug!(pair = %pair, %gross, %costs, "Evaluated spread");
		if profit <= config.arbitrage.min_profit {
			return None;
		}

		let now = Instant::now();
		Some(ArbitrageOpportunity {
			id: OpportunityId::new(),
			token_a: pair.a.clone(),
			token_b: pair.b.clone(),
			source_buy: best_buy.source,
			source_sell: best_sell.source,
			buy_price,
			sell_price,
			price_difference: sell_price - buy_price,
			feasible_amount,
			estimated_profit: profit,
			detected_at: now,
			expires_at: now + Duration::from_millis(config.arbitrage.opportunity_ttl_ms),
		})
	}

	/// Comparison price for the pair in b-per-a terms, over both quote sets.
	fn comparison_price(
		&self,
		sell_quotes: &[PriceQuote],
		buy_quotes: &[PriceQuote],
		weights: &HashMap<router_types::SourceId, Decimal>,
	) -> Option<Decimal> {
		let config = self.config.load();
		let mut combined: Vec<PriceQuote> = sell_quotes.to_vec();
		for quote in buy_quotes {
			if quote.price.is_zero() {
				continue;
			}
			let mut inverted = quote.clone();
			inverted.price = Decimal::ONE / quote.price;
			combined.push(inverted);
		}
		aggregate(&combined, weights, config.quotes.arbitrage_aggregation)
	}
}

/// Amount of `a` tradable within both legs' depth and the configured cap.
/// The sell leg's depth is quoted in `a`; the buy leg's input depth is in `b`
/// and converts at the ask.
fn feasible(cap: Decimal, sell: &PriceQuote, buy: &PriceQuote, buy_price: Decimal) -> Decimal {
	let buy_depth_in_a = if buy_price > Decimal::ZERO {
		buy.depth / buy_price
	} else {
		Decimal::ZERO
	};
	cap.min(sell.depth).min(buy_depth_in_a)
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_config::{ConfigHandle, RouterConfig};
	use router_metrics::MetricsAggregator;
	use router_registry::implementations::{AmmSource, FixedRateSource};
	use router_types::{SourceDescriptor, SourceKind, TokenId};
	use rust_decimal_macros::dec;

	fn descriptor(handle: &str) -> SourceDescriptor {
		SourceDescriptor {
			handle: handle.to_string(),
			kind: SourceKind::Amm,
			priority: 1,
			weight: Decimal::ONE,
		}
	}

	fn scanner(registry: Arc<SourceRegistry>, config: RouterConfig) -> ArbitrageScanner {
		let config = Arc::new(ConfigHandle::new(config));
		let quotes = Arc::new(QuoteService::new(
			registry.clone(),
			Arc::new(MetricsAggregator::default()),
			config.clone(),
			None,
		));
		ArbitrageScanner::new(registry, quotes, config)
	}

	/// Venue selling WETH at `sell_rate` USDC and buying it back at
	/// `buy_rate` USDC, both directions flat.
	fn venue(
		registry: &SourceRegistry,
		handle: &str,
		sell_rate: Decimal,
		depth: Decimal,
		gas: Decimal,
	) {
		let source = FixedRateSource::new(
			TokenId::from("ETH"),
			TokenId::from("USDC"),
			SourceKind::OrderBook,
			sell_rate,
			Decimal::ZERO,
			gas,
			depth,
		);
		registry.register(Arc::new(source), descriptor(handle)).unwrap();
	}

	fn buy_venue(
		registry: &SourceRegistry,
		handle: &str,
		ask: Decimal,
		depth_usdc: Decimal,
		gas: Decimal,
	) {
		let source = FixedRateSource::new(
			TokenId::from("USDC"),
			TokenId::from("ETH"),
			SourceKind::OrderBook,
			Decimal::ONE / ask,
			Decimal::ZERO,
			gas,
			depth_usdc,
		);
		registry.register(Arc::new(source), descriptor(handle)).unwrap();
	}

	#[tokio::test]
	async fn test_spread_net_of_costs_is_reported() {
		let registry = Arc::new(SourceRegistry::new());
		// Sell WETH at 100.5 on one venue, buy it back at 100 on another:
		// gross 50 over 100 WETH, minus 5 gas per leg, nets 40.
		venue(&registry, "bid-venue", dec!(100.5), dec!(100), dec!(5));
		buy_venue(&registry, "ask-venue", dec!(100), dec!(1000000), dec!(5));

		let mut config = RouterConfig::default();
		config.arbitrage.max_trade_amount = dec!(100);
		let scanner = scanner(registry, config);

		let found = scanner.scan().await;
		assert_eq!(found.len(), 1);
		let opportunity = &found[0];
		assert_eq!(opportunity.feasible_amount, dec!(100));
		assert_eq!(opportunity.price_difference, dec!(0.5));
		assert_eq!(opportunity.estimated_profit, dec!(40));
		assert!(opportunity.is_valid());
	}

	#[tokio::test]
	async fn test_spread_eaten_by_costs_is_dropped() {
		let registry = Arc::new(SourceRegistry::new());
		// Same 50 gross, but 30 gas per leg: net -10.
		venue(&registry, "bid-venue", dec!(100.5), dec!(100), dec!(30));
		buy_venue(&registry, "ask-venue", dec!(100), dec!(1000000), dec!(30));

		let mut config = RouterConfig::default();
		config.arbitrage.max_trade_amount = dec!(100);
		let scanner = scanner(registry, config);

		assert!(scanner.scan().await.is_empty());
	}

	#[tokio::test]
	async fn test_aligned_pools_show_no_opportunity() {
		let registry = Arc::new(SourceRegistry::new());
		for handle in ["amm-1", "amm-2"] {
			let pool = AmmSource::new(
				TokenId::from("ETH"),
				TokenId::from("USDC"),
				dec!(1000),
				dec!(100000),
				dec!(0.003),
				dec!(0.5),
			);
			registry.register(Arc::new(pool), descriptor(handle)).unwrap();
		}

		let mut config = RouterConfig::default();
		config.arbitrage.max_trade_amount = dec!(10);
		let scanner = scanner(registry, config);

		assert!(scanner.scan().await.is_empty());
	}

	#[tokio::test]
	async fn test_stale_opportunity_cannot_be_taken() {
		let registry = Arc::new(SourceRegistry::new());
		venue(&registry, "bid-venue", dec!(100.5), dec!(100), dec!(5));
		buy_venue(&registry, "ask-venue", dec!(100), dec!(1000000), dec!(5));

		let mut config = RouterConfig::default();
		config.arbitrage.max_trade_amount = dec!(100);
		config.arbitrage.opportunity_ttl_ms = 1;
		let scanner = scanner(registry, config);

		let found = scanner.scan().await;
		let id = found[0].id;

		tokio::time::sleep(Duration::from_millis(10)).await;
		assert!(matches!(
			scanner.take(id),
			Err(RouterError::ArbitrageStale(_))
		));
		assert!(scanner.opportunities().is_empty());
	}

	#[tokio::test]
	async fn test_single_source_pair_skipped() {
		let registry = Arc::new(SourceRegistry::new());
		venue(&registry, "bid-venue", dec!(100.5), dec!(100), dec!(5));

		let scanner = scanner(registry, RouterConfig::default());
		assert!(scanner.scan().await.is_empty());
	}
}
