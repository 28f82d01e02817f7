//! Swap request/result types and the trade lifecycle.

use crate::common::{RouteId, Timestamp, TokenId, TradeId};
use crate::errors::RouterError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Caller-selected protection level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapProtection {
	/// Route through live liquidity; output bounded by `min_amount_out`.
	BestEffort,
	/// Settle at `guaranteed_rate` from the buffer, or fail if the buffer
	/// cannot cover the trade.
	Guaranteed,
	/// Prefer the buffer, degrade to a best-effort route when the buffer is
	/// insufficient.
	GuaranteedOrBestEffort,
}

/// User intent for a swap.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
	pub token_in: TokenId,
	pub token_out: TokenId,
	pub amount_in: Decimal,
	/// Lower output bound for best-effort execution.
	pub min_amount_out: Option<Decimal>,
	/// Pre-committed rate for buffer-backed execution.
	pub guaranteed_rate: Option<Decimal>,
	pub max_slippage: Option<Decimal>,
	pub deadline: Instant,
	pub protection: SwapProtection,
	/// Account debited/credited on settlement.
	pub account: String,
}

impl SwapRequest {
	/// Structural validation; amounts and token identities only, liquidity
	/// checks happen later.
	pub fn validate(&self) -> Result<(), RouterError> {
		if self.amount_in <= Decimal::ZERO {
			return Err(RouterError::InvalidRequest("amount_in must be positive".into()));
		}
		if self.token_in == self.token_out {
			return Err(RouterError::InvalidRequest(
				"token_in and token_out must differ".into(),
			));
		}
		if let Some(min_out) = self.min_amount_out {
			if min_out < Decimal::ZERO {
				return Err(RouterError::InvalidRequest(
					"min_amount_out must not be negative".into(),
				));
			}
		}
		match self.protection {
			SwapProtection::Guaranteed | SwapProtection::GuaranteedOrBestEffort => {
				match self.guaranteed_rate {
					Some(rate) if rate > Decimal::ZERO => {}
					_ => {
						return Err(RouterError::InvalidRequest(
							"guaranteed trades require a positive guaranteed_rate".into(),
						))
					}
				}
			}
			SwapProtection::BestEffort => {}
		}
		Ok(())
	}
}

/// Trade lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStatus {
	Requested,
	Quoted,
	/// Buffer capacity reserved (guaranteed trades only).
	Reserved,
	Executing,
	Settled,
	Reverted,
	Expired,
}

impl TradeStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			TradeStatus::Settled | TradeStatus::Reverted | TradeStatus::Expired
		)
	}
}

/// Outcome of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapResult {
	pub trade_id: TradeId,
	pub token_in: TokenId,
	pub token_out: TokenId,
	pub amount_in: Decimal,
	pub amount_out: Decimal,
	/// amount_out / amount_in as realized.
	pub realized_rate: Decimal,
	/// Relative shortfall of realized output against the quoted expectation.
	pub slippage: Decimal,
	pub fees_paid: Decimal,
	pub gas_paid: Decimal,
	pub routes_used: Vec<RouteId>,
	pub status: TradeStatus,
	/// Machine-readable failure reason for non-settled outcomes.
	pub failure: Option<RouterError>,
	pub settled_at: Timestamp,
}

impl SwapResult {
	pub fn is_success(&self) -> bool {
		self.status == TradeStatus::Settled
	}

	/// A reverted/expired outcome for a trade that moved no assets.
	pub fn failed(trade_id: TradeId, request: &SwapRequest, status: TradeStatus, reason: RouterError) -> Self {
		Self {
			trade_id,
			token_in: request.token_in.clone(),
			token_out: request.token_out.clone(),
			amount_in: request.amount_in,
			amount_out: Decimal::ZERO,
			realized_rate: Decimal::ZERO,
			slippage: Decimal::ZERO,
			fees_paid: Decimal::ZERO,
			gas_paid: Decimal::ZERO,
			routes_used: vec![],
			status,
			failure: Some(reason),
			settled_at: crate::common::unix_now(),
		}
	}
}
