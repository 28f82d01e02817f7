//! Liquidity source trait and related types.
//!
//! A source is one external venue the engine can trade against: an AMM pool,
//! an order book, a lending-pool swap leg or a bridge. Sources interact with
//! the engine through a two-phase reserve-then-commit protocol: `reserve`
//! locks an amount at a price without any externally visible effect, `commit`
//! applies a reservation, `abort` drops it. A commit of a live reservation
//! must not fail; anything that can go wrong has to be surfaced at reserve
//! time so the execution engine can abort the whole trade atomically.

use crate::common::TokenId;
use crate::errors::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of liquidity source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
	Amm,
	OrderBook,
	LendingPool,
	Bridge,
}

impl fmt::Display for SourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			SourceKind::Amm => "amm",
			SourceKind::OrderBook => "order_book",
			SourceKind::LendingPool => "lending_pool",
			SourceKind::Bridge => "bridge",
		};
		write!(f, "{}", s)
	}
}

/// Static registration attributes for a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
	/// External handle (address, venue id); unique per (handle, pair set).
	pub handle: String,
	pub kind: SourceKind,
	/// Admin-assigned priority; higher is preferred on exact ties.
	pub priority: u32,
	/// Routing weight, must be >= 0. Zero removes the source from ranking
	/// without deactivating it.
	pub weight: Decimal,
}

/// Raw answer of a single source to "amount_in -> ?".
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuote {
	pub amount_out: Decimal,
	/// Fee charged by the source, denominated in the output token.
	pub fee: Decimal,
	/// Estimated relative slippage for this amount against the marginal price.
	pub slippage_estimate: Decimal,
	/// Gas cost estimate for executing one step on this source.
	pub gas_estimate: Decimal,
	/// Depth the source can serve near this price.
	pub depth: Decimal,
}

/// A price lock taken against a source during the reserve phase.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReservation {
	pub reservation_id: uuid::Uuid,
	pub token_in: TokenId,
	pub token_out: TokenId,
	pub amount_in: Decimal,
	/// Output locked in by the source for this reservation.
	pub amount_out: Decimal,
	pub fee: Decimal,
}

/// Realized outcome of a committed step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepFill {
	pub amount_in: Decimal,
	pub amount_out: Decimal,
	pub fee_paid: Decimal,
	pub gas_used: Decimal,
}

/// One external liquidity venue.
#[async_trait]
pub trait LiquiditySource: Send + Sync {
	fn kind(&self) -> SourceKind;

	/// Token pairs this source can trade, both directions implied.
	fn pairs(&self) -> Vec<(TokenId, TokenId)>;

	/// Quote an exchange without side effects.
	async fn quote(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
	) -> Result<SourceQuote>;

	/// Lock `amount_in` at the current price. Fails if the output would fall
	/// below `min_amount_out` or depth is insufficient; no external effect
	/// either way.
	async fn reserve(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
		min_amount_out: Decimal,
	) -> Result<StepReservation>;

	/// Apply a reservation. Must succeed for any reservation this source
	/// returned from `reserve` and has not yet seen aborted.
	async fn commit(&self, reservation: StepReservation) -> Result<StepFill>;

	/// Drop a reservation, releasing the locked liquidity.
	async fn abort(&self, reservation: StepReservation) -> Result<()>;

	/// Flat per-step gas estimate for this venue.
	fn gas_estimate(&self) -> Decimal;
}
