//! Liquidity buffers backing guaranteed-rate trades.
//!
//! The manager holds one reserve per configured token. Guaranteed trades
//! reserve capacity up front, then either commit (stock leaves the buffer at
//! settlement) or release (the reservation is dropped and capacity returns).
//! The buffer invariant `available + utilized == total` holds through every
//! transition, including while reservations are outstanding.

pub mod locks;

pub use locks::PairLocks;

use dashmap::DashMap;
use router_config::ConfigHandle;
use router_types::{
	BufferTargets, LiquidityBuffer, Result, RouterError, TokenId,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One token moved back toward its target during a rebalance pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceOutcome {
	pub token: TokenId,
	/// Net stock movement: positive when the buffer was topped up from the
	/// replenishment inventory, negative when excess was skimmed back.
	pub moved: Decimal,
	pub available_after: Decimal,
	pub utilized_after: Decimal,
}

pub struct BufferManager {
	buffers: DashMap<TokenId, LiquidityBuffer>,
	config: Arc<ConfigHandle>,
}

impl BufferManager {
	/// Seed buffers from the configured per-token sizing.
	pub fn new(config: Arc<ConfigHandle>) -> Self {
		let buffers = DashMap::new();
		for (token, sizing) in &config.load().buffers.tokens {
			let token = TokenId::new(token.clone());
			buffers.insert(
				token.clone(),
				LiquidityBuffer::new(
					token,
					sizing.total,
					BufferTargets { min: sizing.min, max: sizing.max, target: sizing.target },
				),
			);
		}
		Self { buffers, config }
	}

	pub fn status(&self, token: &TokenId) -> Option<LiquidityBuffer> {
		self.buffers.get(token).map(|b| b.clone())
	}

	pub fn status_all(&self) -> Vec<LiquidityBuffer> {
		self.buffers.iter().map(|b| b.clone()).collect()
	}

	/// Reserve capacity for a guaranteed trade. Fails without side effect when
	/// the buffer cannot cover the amount.
	pub fn reserve(&self, token: &TokenId, amount: Decimal) -> Result<()> {
		if amount <= Decimal::ZERO {
			return Err(RouterError::InvalidRequest(
				"reserve amount must be positive".into(),
			));
		}
		let mut buffer = self.buffers.get_mut(token).ok_or_else(|| {
			RouterError::BufferInsufficient {
				token: token.clone(),
				requested: amount,
				available: Decimal::ZERO,
			}
		})?;
		if amount > buffer.available {
			return Err(RouterError::BufferInsufficient {
				token: token.clone(),
				requested: amount,
				available: buffer.available,
			});
		}
		buffer.available -= amount;
		buffer.utilized += amount;
		debug!(%token, %amount, available = %buffer.available, "Reserved buffer capacity");
		Ok(())
	}

	/// Drop a reservation; capacity returns to the pool.
	pub fn release(&self, token: &TokenId, amount: Decimal) -> Result<()> {
		let mut buffer = self
			.buffers
			.get_mut(token)
			.ok_or_else(|| RouterError::InvalidRequest(format!("no buffer for {}", token)))?;
		if amount > buffer.utilized {
			return Err(RouterError::InvalidRequest(format!(
				"release of {} exceeds utilized {}",
				amount, buffer.utilized
			)));
		}
		buffer.utilized -= amount;
		buffer.available += amount;
		Ok(())
	}

	/// Settle a reservation: the stock leaves the buffer.
	pub fn commit(&self, token: &TokenId, amount: Decimal) -> Result<()> {
		let mut buffer = self
			.buffers
			.get_mut(token)
			.ok_or_else(|| RouterError::InvalidRequest(format!("no buffer for {}", token)))?;
		if amount > buffer.utilized {
			return Err(RouterError::InvalidRequest(format!(
				"commit of {} exceeds utilized {}",
				amount, buffer.utilized
			)));
		}
		buffer.utilized -= amount;
		buffer.total -= amount;
		debug!(%token, %amount, total = %buffer.total, "Committed buffer stock");
		Ok(())
	}

	/// Add stock, e.g. the input side of a settled guaranteed trade.
	/// Tokens without a configured buffer are ignored.
	pub fn deposit(&self, token: &TokenId, amount: Decimal) {
		if let Some(mut buffer) = self.buffers.get_mut(token) {
			buffer.total += amount;
			buffer.available += amount;
		}
	}

	/// Whether a quiescent buffer sits outside its configured band.
	fn out_of_band(buffer: &LiquidityBuffer) -> bool {
		buffer.available < buffer.targets.min || buffer.available > buffer.targets.max
	}

	/// Move every out-of-band buffer back toward its target available level.
	///
	/// Top-ups draw on the replenishment inventory, excess is skimmed back to
	/// it. A buffer with reservations in flight is inside some trade's
	/// critical path and is deferred to a later pass, so rebalancing and
	/// execution on the same token never interleave. Called by the periodic
	/// loop and after settlements that push utilization over the threshold.
	pub fn rebalance(&self) -> Vec<RebalanceOutcome> {
		let mut outcomes = Vec::new();

		for mut entry in self.buffers.iter_mut() {
			if entry.utilized > Decimal::ZERO || !Self::out_of_band(&entry) {
				continue;
			}
			outcomes.push(Self::apply_rebalance(&mut entry));
		}
		outcomes
	}

	/// Rebalance one token's buffer; `None` when it is in band, unknown, or
	/// carrying reservations.
	pub fn rebalance_token(&self, token: &TokenId) -> Option<RebalanceOutcome> {
		let mut entry = self.buffers.get_mut(token)?;
		if entry.utilized > Decimal::ZERO || !Self::out_of_band(&entry) {
			return None;
		}
		Some(Self::apply_rebalance(&mut entry))
	}

	fn apply_rebalance(entry: &mut LiquidityBuffer) -> RebalanceOutcome {
		let moved = entry.targets.target - entry.available;
		entry.available += moved;
		entry.total += moved;

		if !entry.invariant_holds() {
			// Should be unreachable; log loudly rather than poisoning state.
			warn!(token = %entry.token, "Buffer invariant violated after rebalance");
		}
		info!(
			token = %entry.token,
			%moved,
			available = %entry.available,
			"Rebalanced buffer"
		);
		RebalanceOutcome {
			token: entry.token.clone(),
			moved,
			available_after: entry.available,
			utilized_after: entry.utilized,
		}
	}

	/// Whether any buffer is past the utilization threshold, used to trigger
	/// an off-interval rebalance after a settlement.
	pub fn over_threshold(&self) -> bool {
		let threshold = self.config.load().buffers.rebalance_utilization_threshold;
		self.buffers.iter().any(|b| b.utilization() > threshold)
	}
}
