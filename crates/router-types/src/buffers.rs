//! Per-token liquidity buffers backing guaranteed-rate trades.

use crate::common::TokenId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Allocation targets for one token's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferTargets {
	pub min: Decimal,
	pub max: Decimal,
	pub target: Decimal,
}

/// Reserve state for one token.
///
/// Invariant: `available + utilized == total` and `0 <= available <= total`,
/// at all times, including while a reservation is held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityBuffer {
	pub token: TokenId,
	pub total: Decimal,
	pub available: Decimal,
	pub utilized: Decimal,
	pub targets: BufferTargets,
}

impl LiquidityBuffer {
	pub fn new(token: TokenId, total: Decimal, targets: BufferTargets) -> Self {
		Self {
			token,
			total,
			available: total,
			utilized: Decimal::ZERO,
			targets,
		}
	}

	/// Fraction of the buffer currently committed, in [0, 1].
	pub fn utilization(&self) -> Decimal {
		if self.total.is_zero() {
			return Decimal::ZERO;
		}
		self.utilized / self.total
	}

	pub fn invariant_holds(&self) -> bool {
		self.available + self.utilized == self.total
			&& self.available >= Decimal::ZERO
			&& self.available <= self.total
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn test_fresh_buffer_invariant() {
		let buffer = LiquidityBuffer::new(
			TokenId::from("USDC"),
			dec!(10000),
			BufferTargets { min: dec!(2000), max: dec!(12000), target: dec!(8000) },
		);
		assert!(buffer.invariant_holds());
		assert_eq!(buffer.utilization(), Decimal::ZERO);
	}

	#[test]
	fn test_utilization() {
		let mut buffer = LiquidityBuffer::new(
			TokenId::from("USDC"),
			dec!(1000),
			BufferTargets { min: dec!(100), max: dec!(1500), target: dec!(800) },
		);
		buffer.available = dec!(750);
		buffer.utilized = dec!(250);
		assert!(buffer.invariant_holds());
		assert_eq!(buffer.utilization(), dec!(0.25));
	}
}
