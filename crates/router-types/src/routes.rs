//! Route representation: ordered hops, each possibly split across sources.

use crate::common::{RouteId, SourceId, TokenId};
use rust_decimal::Decimal;
use std::time::{Duration, Instant};

/// One leg through one source.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStep {
	pub source: SourceId,
	pub token_in: TokenId,
	pub token_out: TokenId,
	pub amount_in: Decimal,
	pub expected_amount_out: Decimal,
	pub fee: Decimal,
	pub gas_estimate: Decimal,
}

/// One hop from token_in to token_out, possibly split across parallel legs.
/// Leg inputs sum to the hop's total input.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteHop {
	pub token_in: TokenId,
	pub token_out: TokenId,
	pub amount_in: Decimal,
	pub legs: Vec<RouteStep>,
}

impl RouteHop {
	pub fn expected_out(&self) -> Decimal {
		self.legs.iter().map(|l| l.expected_amount_out).sum()
	}

	/// Split conservation: leg inputs must sum to the hop input.
	pub fn split_conserved(&self) -> bool {
		let total: Decimal = self.legs.iter().map(|l| l.amount_in).sum();
		total == self.amount_in
	}
}

/// A full route from token_in to token_out.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
	pub id: RouteId,
	pub token_in: TokenId,
	pub token_out: TokenId,
	pub amount_in: Decimal,
	pub hops: Vec<RouteHop>,
	pub total_expected_out: Decimal,
	/// Relative difference between the marginal price and the effective price.
	pub price_impact: Decimal,
	pub gas_estimate: Decimal,
	/// Aggregate reliability of the sources involved, in [0, 1].
	pub reliability: Decimal,
	pub quoted_at: Instant,
	pub expires_at: Instant,
}

impl Route {
	pub fn is_expired(&self) -> bool {
		Instant::now() >= self.expires_at
	}

	pub fn hop_count(&self) -> usize {
		self.hops.len()
	}

	/// Split conservation across every hop of the route.
	pub fn split_conserved(&self) -> bool {
		if let Some(first) = self.hops.first() {
			if first.amount_in != self.amount_in {
				return false;
			}
		}
		self.hops.iter().all(RouteHop::split_conserved)
	}

	pub fn ttl_remaining(&self) -> Duration {
		self.expires_at.saturating_duration_since(Instant::now())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn step(amount_in: Decimal, out: Decimal) -> RouteStep {
		RouteStep {
			source: SourceId::new(),
			token_in: TokenId::from("USDC"),
			token_out: TokenId::from("DAI"),
			amount_in,
			expected_amount_out: out,
			fee: dec!(0.1),
			gas_estimate: dec!(0.5),
		}
	}

	#[test]
	fn test_split_conservation() {
		let hop = RouteHop {
			token_in: TokenId::from("USDC"),
			token_out: TokenId::from("DAI"),
			amount_in: dec!(1000),
			legs: vec![step(dec!(400), dec!(399)), step(dec!(600), dec!(601))],
		};
		assert!(hop.split_conserved());
		assert_eq!(hop.expected_out(), dec!(1000));

		let broken = RouteHop {
			amount_in: dec!(1000),
			legs: vec![step(dec!(400), dec!(399)), step(dec!(500), dec!(501))],
			..hop
		};
		assert!(!broken.split_conserved());
	}

	#[test]
	fn test_route_expiry() {
		let now = Instant::now();
		let route = Route {
			id: RouteId::new(),
			token_in: TokenId::from("USDC"),
			token_out: TokenId::from("DAI"),
			amount_in: dec!(1000),
			hops: vec![],
			total_expected_out: dec!(998),
			price_impact: dec!(0.001),
			gas_estimate: dec!(0.5),
			reliability: dec!(0.99),
			quoted_at: now,
			expires_at: now,
		};
		assert!(route.is_expired());
	}
}
