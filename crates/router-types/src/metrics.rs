//! Rolling per-source performance metrics.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rolling performance record for one source. Mutated only by the metrics
/// aggregator; every other component reads a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetrics {
	/// Cumulative volume routed through the source, input-token denominated.
	pub volume: Decimal,
	pub trade_count: u64,
	pub success_count: u64,
	pub timeout_count: u64,
	/// EWMA of realized slippage per settled trade.
	pub avg_slippage: Decimal,
	/// EWMA of gas per settled step.
	pub avg_gas: Decimal,
	/// EWMA of quote response latency in milliseconds.
	pub avg_latency_ms: Decimal,
	/// success_count / trade_count, in [0, 1].
	pub success_rate: Decimal,
	/// Blended score in [0, 1] consumed by route ranking.
	pub reliability: Decimal,
}

impl Default for SourceMetrics {
	fn default() -> Self {
		Self {
			volume: Decimal::ZERO,
			trade_count: 0,
			success_count: 0,
			timeout_count: 0,
			avg_slippage: Decimal::ZERO,
			avg_gas: Decimal::ZERO,
			avg_latency_ms: Decimal::ZERO,
			// An unproven source starts neutral rather than trusted.
			success_rate: Decimal::ONE,
			reliability: Decimal::new(5, 1),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_is_neutral() {
		let metrics = SourceMetrics::default();
		assert_eq!(metrics.trade_count, 0);
		assert_eq!(metrics.reliability, Decimal::new(5, 1));
	}
}
