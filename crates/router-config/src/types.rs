//! Configuration types for the routing engine.

use router_types::AggregationMethod;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
	/// Quote service settings
	pub quotes: QuoteConfig,
	/// Route search settings
	pub routing: RoutingConfig,
	/// Liquidity buffer settings
	pub buffers: BufferConfig,
	/// Arbitrage scanner settings
	pub arbitrage: ArbitrageConfig,
	/// Execution engine settings
	pub execution: ExecutionConfig,
	/// Logging and event bus
	pub monitoring: MonitoringConfig,
}

/// Quote service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuoteConfig {
	/// Per-source query timeout in milliseconds
	pub source_timeout_ms: u64,
	/// Quote freshness window in milliseconds
	pub quote_ttl_ms: u64,
	/// Maximum relative deviation from the oracle reference price before a
	/// quote is rejected
	pub oracle_deviation_threshold: Decimal,
	/// Aggregation backing cross-source comparison for arbitrage detection
	pub arbitrage_aggregation: AggregationMethod,
	/// Aggregation backing the oracle sanity check
	pub oracle_check_aggregation: AggregationMethod,
}

/// Route search configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
	/// Hop limit for the best-first search
	pub max_hops: usize,
	/// Slippage bound applied when the request does not carry one
	pub default_max_slippage: Decimal,
	/// Number of sources a single hop may be split across
	pub top_k_split: usize,
	/// Slices used by the marginal-equalizing split allocation
	pub split_slices: u32,
}

/// Buffer targets for one token
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BufferTokenConfig {
	pub total: Decimal,
	pub min: Decimal,
	pub max: Decimal,
	pub target: Decimal,
}

/// Liquidity buffer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BufferConfig {
	/// Utilization fraction that triggers a rebalance
	pub rebalance_utilization_threshold: Decimal,
	/// Fixed rebalance interval in seconds
	pub rebalance_interval_secs: u64,
	/// Per-token buffer sizing, keyed by token identifier
	pub tokens: HashMap<String, BufferTokenConfig>,
}

/// Arbitrage scanner configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArbitrageConfig {
	/// Minimum net profit for an opportunity to be reported
	pub min_profit: Decimal,
	/// Scan interval in seconds for the background loop
	pub scan_interval_secs: u64,
	/// Upper bound on the feasible amount per opportunity
	pub max_trade_amount: Decimal,
	/// Account credited with arbitrage profit
	pub beneficiary: String,
	/// Opportunity validity window in milliseconds
	pub opportunity_ttl_ms: u64,
}

/// Execution engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
	/// Per-step tolerance on realized vs expected output
	pub step_tolerance: Decimal,
	/// Deadline applied when the request does not carry one, in seconds
	pub default_deadline_secs: u64,
	/// Number of settled/reverted results retained for audit retrieval
	pub history_limit: usize,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
	/// Log level filter
	pub log_level: String,
	/// Event bus channel capacity
	pub event_capacity: usize,
}

impl Default for RouterConfig {
	fn default() -> Self {
		Self {
			quotes: QuoteConfig {
				source_timeout_ms: 500,
				quote_ttl_ms: 5_000,
				oracle_deviation_threshold: dec!(0.05),
				arbitrage_aggregation: AggregationMethod::BestOutput,
				oracle_check_aggregation: AggregationMethod::Median,
			},
			routing: RoutingConfig {
				max_hops: 3,
				default_max_slippage: dec!(0.01),
				top_k_split: 3,
				split_slices: 100,
			},
			buffers: BufferConfig {
				rebalance_utilization_threshold: dec!(0.75),
				rebalance_interval_secs: 60,
				tokens: HashMap::new(),
			},
			arbitrage: ArbitrageConfig {
				min_profit: Decimal::ZERO,
				scan_interval_secs: 5,
				max_trade_amount: dec!(10000),
				beneficiary: "protocol".to_string(),
				opportunity_ttl_ms: 5_000,
			},
			execution: ExecutionConfig {
				step_tolerance: dec!(0.005),
				default_deadline_secs: 30,
				history_limit: 1_000,
			},
			monitoring: MonitoringConfig {
				log_level: "info".to_string(),
				event_capacity: 1_024,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_config() {
		let config = RouterConfig::default();
		assert_eq!(config.routing.max_hops, 3);
		assert_eq!(config.quotes.quote_ttl_ms, 5_000);
		assert_eq!(config.monitoring.log_level, "info");
	}

	#[test]
	fn test_aggregation_knobs_are_independent() {
		let config = RouterConfig::default();
		assert_ne!(
			config.quotes.arbitrage_aggregation,
			config.quotes.oracle_check_aggregation
		);
	}
}
