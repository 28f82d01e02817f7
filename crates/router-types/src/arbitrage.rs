//! Cross-source price divergence opportunities.

use crate::common::{OpportunityId, SourceId, TokenId};
use rust_decimal::Decimal;
use std::time::Instant;

/// A detected price gap between two sources for the same pair.
///
/// Ephemeral: valid only while both underlying quotes remain fresh and the
/// estimated profit (already net of fees and gas) stays positive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageOpportunity {
	pub id: OpportunityId,
	pub token_a: TokenId,
	pub token_b: TokenId,
	pub source_buy: SourceId,
	pub source_sell: SourceId,
	pub buy_price: Decimal,
	pub sell_price: Decimal,
	pub price_difference: Decimal,
	/// Amount tradable within both sources' quoted depth.
	pub feasible_amount: Decimal,
	/// Net of buy fee, sell fee and gas for both legs.
	pub estimated_profit: Decimal,
	pub detected_at: Instant,
	pub expires_at: Instant,
}

impl ArbitrageOpportunity {
	pub fn is_valid(&self) -> bool {
		self.estimated_profit > Decimal::ZERO && Instant::now() < self.expires_at
	}
}
