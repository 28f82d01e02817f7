//! Fixed-rate source: a lending-pool swap leg or bridge with a posted rate.
//!
//! No price impact; depth and response latency are configurable, which also
//! makes this the venue of choice for exercising quote timeouts in tests.

use async_trait::async_trait;
use dashmap::DashMap;
use router_types::{
	LiquiditySource, Result, RouterError, SourceKind, SourceQuote, StepFill, StepReservation,
	TokenId,
};
use rust_decimal::Decimal;
use std::time::Duration;

pub struct FixedRateSource {
	token_in: TokenId,
	token_out: TokenId,
	kind: SourceKind,
	/// Posted rate: output per unit input, before fee.
	rate: Decimal,
	/// Fee rate charged on output.
	fee_rate: Decimal,
	gas: Decimal,
	depth: Decimal,
	/// Artificial response delay.
	latency: Option<Duration>,
	held: DashMap<uuid::Uuid, (Decimal, Decimal, Decimal)>,
}

impl FixedRateSource {
	pub fn new(
		token_in: TokenId,
		token_out: TokenId,
		kind: SourceKind,
		rate: Decimal,
		fee_rate: Decimal,
		gas: Decimal,
		depth: Decimal,
	) -> Self {
		Self {
			token_in,
			token_out,
			kind,
			rate,
			fee_rate,
			gas,
			depth,
			latency: None,
			held: DashMap::new(),
		}
	}

	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = Some(latency);
		self
	}

	fn check_pair(&self, token_in: &TokenId, token_out: &TokenId) -> Result<()> {
		if token_in == &self.token_in && token_out == &self.token_out {
			Ok(())
		} else {
			Err(RouterError::SourceUnavailable(format!(
				"pair {}/{} not served",
				token_in, token_out
			)))
		}
	}

	fn compute(&self, amount_in: Decimal) -> (Decimal, Decimal) {
		let gross = amount_in * self.rate;
		let fee = gross * self.fee_rate;
		(gross - fee, fee)
	}
}

#[async_trait]
impl LiquiditySource for FixedRateSource {
	fn kind(&self) -> SourceKind {
		self.kind
	}

	fn pairs(&self) -> Vec<(TokenId, TokenId)> {
		vec![(self.token_in.clone(), self.token_out.clone())]
	}

	async fn quote(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
	) -> Result<SourceQuote> {
		self.check_pair(token_in, token_out)?;
		if let Some(latency) = self.latency {
			tokio::time::sleep(latency).await;
		}
		if amount_in > self.depth {
			return Err(RouterError::SourceUnavailable(
				"amount exceeds posted depth".into(),
			));
		}

		let (amount_out, fee) = self.compute(amount_in);
		Ok(SourceQuote {
			amount_out,
			fee,
			slippage_estimate: Decimal::ZERO,
			gas_estimate: self.gas,
			depth: self.depth,
		})
	}

	async fn reserve(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
		min_amount_out: Decimal,
	) -> Result<StepReservation> {
		self.check_pair(token_in, token_out)?;
		if amount_in > self.depth {
			return Err(RouterError::SourceUnavailable(
				"amount exceeds posted depth".into(),
			));
		}

		let (amount_out, fee) = self.compute(amount_in);
		if amount_out < min_amount_out {
			return Err(RouterError::SlippageExceeded {
				bound: min_amount_out,
				realized: amount_out,
			});
		}

		let reservation_id = uuid::Uuid::new_v4();
		self.held.insert(reservation_id, (amount_in, amount_out, fee));

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
		let (_, (amount_in, amount_out, fee)) = self
			.held
			.remove(&reservation.reservation_id)
			.ok_or_else(|| RouterError::SourceUnavailable("unknown reservation".into()))?;

		Ok(StepFill {
			amount_in,
			amount_out,
			fee_paid: fee,
			gas_used: self.gas,
		})
	}

	async fn abort(&self, reservation: StepReservation) -> Result<()> {
		self.held
			.remove(&reservation.reservation_id)
			.ok_or_else(|| RouterError::SourceUnavailable("unknown reservation".into()))?;
		Ok(())
	}

	fn gas_estimate(&self) -> Decimal {
		self.gas
	}
}
