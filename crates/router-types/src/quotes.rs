//! Normalized price quotes.

use crate::common::{SourceId, TokenId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A source's normalized answer to "amount_in of token_in -> token_out".
///
/// Quotes are short-lived: `quoted_at` drives the TTL check and an expired
/// quote must never back an execution.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
	pub source: SourceId,
	pub token_in: TokenId,
	pub token_out: TokenId,
	pub amount_in: Decimal,
	pub amount_out: Decimal,
	/// Effective price: amount_out / amount_in.
	pub price: Decimal,
	pub slippage_estimate: Decimal,
	pub fee: Decimal,
	pub gas_estimate: Decimal,
	/// Input-side depth the source reported for this pair.
	pub depth: Decimal,
	/// Source confidence in [0, 1]; degrades with depth utilization.
	pub confidence: Decimal,
	pub quoted_at: Instant,
}

impl PriceQuote {
	pub fn is_fresh(&self, ttl: Duration) -> bool {
		self.quoted_at.elapsed() <= ttl
	}

	pub fn age(&self) -> Duration {
		self.quoted_at.elapsed()
	}
}

/// How a set of quotes is collapsed into one comparison price.
///
/// The arbitrage scanner and the oracle sanity check each carry their own
/// configured method; neither setting governs the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
	Median,
	Mean,
	/// Weighted by source routing weight.
	Weighted,
	/// The single best-output quote.
	BestOutput,
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn test_quote_freshness() {
		let quote = PriceQuote {
			source: SourceId::new(),
			token_in: TokenId::from("USDC"),
			token_out: TokenId::from("DAI"),
			amount_in: dec!(1000),
			amount_out: dec!(998),
			price: dec!(0.998),
			slippage_estimate: dec!(0.001),
			fee: dec!(2),
			gas_estimate: dec!(0.5),
			depth: dec!(100000),
			confidence: dec!(0.95),
			quoted_at: Instant::now(),
		};

		assert!(quote.is_fresh(Duration::from_secs(5)));
		assert!(!quote.is_fresh(Duration::ZERO));
	}
}
