//! In-memory reference oracle.
//!
//! Backs the oracle sanity check in deployments that pin reference prices by
//! hand, and serves as the oracle double in tests.

use async_trait::async_trait;
use dashmap::DashMap;
use router_types::{unix_now, OraclePrice, PriceOracle, Result, RouterError, TokenId};
use rust_decimal::Decimal;

pub struct FixedOracle {
	prices: DashMap<TokenId, Decimal>,
}

impl FixedOracle {
	pub fn new() -> Self {
		Self { prices: DashMap::new() }
	}

	pub fn set(&self, token: TokenId, price: Decimal) {
		self.prices.insert(token, price);
	}
}

impl Default for FixedOracle {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl PriceOracle for FixedOracle {
	async fn get_price(&self, token: &TokenId) -> Result<OraclePrice> {
		let price = self
			.prices
			.get(token)
			.map(|p| *p)
			.ok_or_else(|| RouterError::SourceUnavailable(format!("no oracle price for {}", token)))?;

		Ok(OraclePrice {
			price,
			confidence: Decimal::ONE,
			timestamp: unix_now(),
		})
	}
}
