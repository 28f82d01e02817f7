//! Constant-product AMM source.
//!
//! Price is a deterministic function of the reserves; the reserve phase locks
//! output liquidity so concurrent reservations cannot double-book it.

use async_trait::async_trait;
use dashmap::DashMap;
use router_types::{
	LiquiditySource, Result, RouterError, SourceKind, SourceQuote, StepFill, StepReservation,
	TokenId,
};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::debug;

struct Reserves {
	a: Decimal,
	b: Decimal,
}

struct Held {
	token_in: TokenId,
	amount_in: Decimal,
	amount_out: Decimal,
}

/// A two-token constant-product pool.
pub struct AmmSource {
	token_a: TokenId,
	token_b: TokenId,
	reserves: RwLock<Reserves>,
	/// Fee rate charged on input, e.g. 0.003 for 30 bps.
	fee_rate: Decimal,
	gas: Decimal,
	held: DashMap<uuid::Uuid, Held>,
}

impl AmmSource {
	pub fn new(
		token_a: TokenId,
		token_b: TokenId,
		reserve_a: Decimal,
		reserve_b: Decimal,
		fee_rate: Decimal,
		gas: Decimal,
	) -> Self {
		Self {
			token_a,
			token_b,
			reserves: RwLock::new(Reserves { a: reserve_a, b: reserve_b }),
			fee_rate,
			gas,
			held: DashMap::new(),
		}
	}

	fn oriented(&self, token_in: &TokenId, token_out: &TokenId) -> Result<bool> {
		if token_in == &self.token_a && token_out == &self.token_b {
			Ok(true)
		} else if token_in == &self.token_b && token_out == &self.token_a {
			Ok(false)
		} else {
			Err(RouterError::SourceUnavailable(format!(
				"pair {}/{} not served by this pool",
				token_in, token_out
			)))
		}
	}

	/// Constant-product output for `amount_in`, fee on input.
	fn compute_out(reserve_in: Decimal, reserve_out: Decimal, amount_in: Decimal, fee_rate: Decimal) -> (Decimal, Decimal, Decimal) {
		let amount_in_after_fee = amount_in * (Decimal::ONE - fee_rate);
		let amount_out = reserve_out * amount_in_after_fee / (reserve_in + amount_in_after_fee);
		let gross_out = reserve_out * amount_in / (reserve_in + amount_in);
		let fee_out = gross_out - amount_out;
		// Price impact against the marginal price, fee excluded.
		let impact = amount_in_after_fee / (reserve_in + amount_in_after_fee);
		(amount_out, fee_out, impact)
	}
}

#[async_trait]
impl LiquiditySource for AmmSource {
	fn kind(&self) -> SourceKind {
		SourceKind::Amm
	}

	fn pairs(&self) -> Vec<(TokenId, TokenId)> {
		vec![(self.token_a.clone(), self.token_b.clone())]
	}

	async fn quote(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
	) -> Result<SourceQuote> {
		let a_to_b = self.oriented(token_in, token_out)?;
		let reserves = self.reserves.read().await;
		let (reserve_in, reserve_out) = if a_to_b {
			(reserves.a, reserves.b)
		} else {
			(reserves.b, reserves.a)
		};

		if amount_in >= reserve_in {
			return Err(RouterError::SourceUnavailable(
				"amount exceeds pool depth".into(),
			));
		}

		let (amount_out, fee, impact) =
			Self::compute_out(reserve_in, reserve_out, amount_in, self.fee_rate);

		Ok(SourceQuote {
			amount_out,
			fee,
			slippage_estimate: impact,
			gas_estimate: self.gas,
			depth: reserve_in,
		})
	}

	async fn reserve(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
		min_amount_out: Decimal,
	) -> Result<StepReservation> {
		let a_to_b = self.oriented(token_in, token_out)?;
		let mut reserves = self.reserves.write().await;
		let (reserve_in, reserve_out) = if a_to_b {
			(reserves.a, reserves.b)
		} else {
			(reserves.b, reserves.a)
		};

		if amount_in >= reserve_in {
			return Err(RouterError::SourceUnavailable(
				"amount exceeds pool depth".into(),
			));
		}

		let (amount_out, fee, _) =
			Self::compute_out(reserve_in, reserve_out, amount_in, self.fee_rate);
		if amount_out < min_amount_out {
			return Err(RouterError::SlippageExceeded {
				bound: min_amount_out,
				realized: amount_out,
			});
		}

		// Hold the output side; input lands at commit.
		if a_to_b {
			reserves.b -= amount_out;
		} else {
			reserves.a -= amount_out;
		}

		let reservation_id = uuid::Uuid::new_v4();
		self.held.insert(
			reservation_id,
			Held {
				token_in: token_in.clone(),
				amount_in,
				amount_out,
			},
		);
		debug!(%reservation_id, %amount_in, %amount_out, "Reserved AMM liquidity");

		Ok(StepReservation {
			reservation_id,
			token_in: token_in.clone(),
			token_out: token_out.clone(),
			amount_in,
			amount_out,
			fee,
		})
	}

	async fn commit(&self, reservation: StepReservation) -> Result<StepFill> {
		let (_, held) = self
			.held
			.remove(&reservation.reservation_id)
			.ok_or_else(|| RouterError::SourceUnavailable("unknown reservation".into()))?;

		let mut reserves = self.reserves.write().await;
		if held.token_in == self.token_a {
			reserves.a += held.amount_in;
		} else {
			reserves.b += held.amount_in;
		}

		Ok(StepFill {
			amount_in: held.amount_in,
			amount_out: held.amount_out,
			fee_paid: reservation.fee,
			gas_used: self.gas,
		})
	}

	async fn abort(&self, reservation: StepReservation) -> Result<()> {
		let (_, held) = self
			.held
			.remove(&reservation.reservation_id)
			.ok_or_else(|| RouterError::SourceUnavailable("unknown reservation".into()))?;

		let mut reserves = self.reserves.write().await;
		if held.token_in == self.token_a {
			reserves.b += held.amount_out;
		} else {
			reserves.a += held.amount_out;
		}
		debug!(reservation = %reservation.reservation_id, "Aborted AMM reservation");
		Ok(())
	}

	fn gas_estimate(&self) -> Decimal {
		self.gas
	}
}
