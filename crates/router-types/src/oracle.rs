//! Reference price oracle interface.
//!
//! The engine consumes an already-aggregated reference price and uses it only
//! to sanity-bound quotes. It is never the execution price.

use crate::common::{Timestamp, TokenId};
use crate::errors::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OraclePrice {
	pub price: Decimal,
	/// Oracle-reported confidence in [0, 1].
	pub confidence: Decimal,
	pub timestamp: Timestamp,
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
	/// Reference price for `token` in the system's quote unit.
	async fn get_price(&self, token: &TokenId) -> Result<OraclePrice>;
}
