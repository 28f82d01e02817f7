//! Order-book source: price levels instead of a reserve curve.

use async_trait::async_trait;
use dashmap::DashMap;
use router_types::{
	LiquiditySource, Result, RouterError, SourceKind, SourceQuote, StepFill, StepReservation,
	TokenId,
};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

/// One price level. `price` is quote-per-base, `quantity` is in base units.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
	pub price: Decimal,
	pub quantity: Decimal,
}

struct Book {
	/// Buy side, descending by price. Consumed when selling base.
	bids: Vec<Level>,
	/// Sell side, ascending by price. Consumed when buying base.
	asks: Vec<Level>,
}

struct Held {
	selling_base: bool,
	/// Consumed (price, base quantity) slices, for restore on abort.
	consumed: Vec<(Decimal, Decimal)>,
	amount_in: Decimal,
	amount_out: Decimal,
}

/// An order book for one base/quote pair.
pub struct OrderBookSource {
	base: TokenId,
	quote_token: TokenId,
	book: RwLock<Book>,
	/// Fee rate charged on output.
	fee_rate: Decimal,
	gas: Decimal,
	held: DashMap<uuid::Uuid, Held>,
}

/// Result of walking one side of the book.
struct Walk {
	amount_out: Decimal,
	consumed: Vec<(Decimal, Decimal)>,
}

impl OrderBookSource {
	pub fn new(
		base: TokenId,
		quote_token: TokenId,
		mut bids: Vec<Level>,
		mut asks: Vec<Level>,
		fee_rate: Decimal,
		gas: Decimal,
	) -> Self {
		bids.sort_by(|x, y| y.price.cmp(&x.price));
		asks.sort_by(|x, y| x.price.cmp(&y.price));
		Self {
			base,
			quote_token,
			book: RwLock::new(Book { bids, asks }),
			fee_rate,
			gas,
			held: DashMap::new(),
		}
	}

	/// Sell `amount_in` base into the bids; returns quote out.
	fn walk_bids(bids: &[Level], amount_in: Decimal) -> Result<Walk> {
		let mut remaining = amount_in;
		let mut out = Decimal::ZERO;
		let mut consumed = Vec::new();
		for level in bids {
			if remaining.is_zero() {
				break;
			}
			let take = remaining.min(level.quantity);
			out += take * level.price;
			consumed.push((level.price, take));
			remaining -= take;
		}
		if remaining > Decimal::ZERO {
			return Err(RouterError::SourceUnavailable(
				"amount exceeds book depth".into(),
			));
		}
		Ok(Walk { amount_out: out, consumed })
	}

	/// Spend `amount_in` quote into the asks; returns base out.
	fn walk_asks(asks: &[Level], amount_in: Decimal) -> Result<Walk> {
		let mut remaining = amount_in;
		let mut out = Decimal::ZERO;
		let mut consumed = Vec::new();
		for level in asks {
			if remaining.is_zero() {
				break;
			}
			let level_cost = level.quantity * level.price;
			let spend = remaining.min(level_cost);
			let base_taken = spend / level.price;
			out += base_taken;
			consumed.push((level.price, base_taken));
			remaining -= spend;
		}
		if remaining > Decimal::ZERO {
			return Err(RouterError::SourceUnavailable(
				"amount exceeds book depth".into(),
			));
		}
		Ok(Walk { amount_out: out, consumed })
	}

	fn direction(&self, token_in: &TokenId, token_out: &TokenId) -> Result<bool> {
		if token_in == &self.base && token_out == &self.quote_token {
			Ok(true)
		} else if token_in == &self.quote_token && token_out == &self.base {
			Ok(false)
		} else {
			Err(RouterError::SourceUnavailable(format!(
				"pair {}/{} not served by this book",
				token_in, token_out
			)))
		}
	}

	fn quote_walk(&self, book: &Book, selling_base: bool, amount_in: Decimal) -> Result<Walk> {
		if selling_base {
			Self::walk_bids(&book.bids, amount_in)
		} else {
			Self::walk_asks(&book.asks, amount_in)
		}
	}

	fn best_price(book: &Book, selling_base: bool) -> Option<Decimal> {
		if selling_base {
			book.bids.first().map(|l| l.price)
		} else {
			book.asks.first().map(|l| l.price)
		}
	}

	fn side_depth(book: &Book, selling_base: bool) -> Decimal {
		if selling_base {
			book.bids.iter().map(|l| l.quantity).sum()
		} else {
			book.asks.iter().map(|l| l.quantity * l.price).sum()
		}
	}

	fn consume(book: &mut Book, selling_base: bool, consumed: &[(Decimal, Decimal)]) {
		let side = if selling_base { &mut book.bids } else { &mut book.asks };
		for (price, qty) in consumed {
			if let Some(level) = side.iter_mut().find(|l| l.price == *price) {
				level.quantity -= qty;
			}
		}
		side.retain(|l| l.quantity > Decimal::ZERO);
	}

	fn restore(book: &mut Book, selling_base: bool, consumed: &[(Decimal, Decimal)]) {
		let side = if selling_base { &mut book.bids } else { &mut book.asks };
		for (price, qty) in consumed {
			if let Some(level) = side.iter_mut().find(|l| l.price == *price) {
				level.quantity += qty;
			} else {
				side.push(Level { price: *price, quantity: *qty });
			}
		}
		if selling_base {
			side.sort_by(|x, y| y.price.cmp(&x.price));
		} else {
			side.sort_by(|x, y| x.price.cmp(&y.price));
		}
	}
}

#[async_trait]
impl LiquiditySource for OrderBookSource {
	fn kind(&self) -> SourceKind {
		SourceKind::OrderBook
	}

	fn pairs(&self) -> Vec<(TokenId, TokenId)> {
		vec![(self.base.clone(), self.quote_token.clone())]
	}

	async fn quote(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
	) -> Result<SourceQuote> {
		let selling_base = self.direction(token_in, token_out)?;
		let book = self.book.read().await;
		let walk = self.quote_walk(&book, selling_base, amount_in)?;

		let fee = walk.amount_out * self.fee_rate;
		let amount_out = walk.amount_out - fee;

		// Impact: shortfall of the effective price against the top of book.
		let slippage_estimate = match Self::best_price(&book, selling_base) {
			Some(best) if best > Decimal::ZERO && amount_in > Decimal::ZERO => {
				let effective = walk.amount_out / amount_in;
				let reference = if selling_base { best } else { Decimal::ONE / best };
				if reference > Decimal::ZERO {
					(Decimal::ONE - effective / reference).max(Decimal::ZERO)
				} else {
					Decimal::ZERO
				}
			}
			_ => Decimal::ZERO,
		};

		Ok(SourceQuote {
			amount_out,
			fee,
			slippage_estimate,
			gas_estimate: self.gas,
			depth: Self::side_depth(&book, selling_base),
		})
	}

	async fn reserve(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
		min_amount_out: Decimal,
	) -> Result<StepReservation> {
		let selling_base = self.direction(token_in, token_out)?;
		let mut book = self.book.write().await;
		let walk = self.quote_walk(&book, selling_base, amount_in)?;

		let fee = walk.amount_out * self.fee_rate;
		let amount_out = walk.amount_out - fee;
		if amount_out < min_amount_out {
			return Err(RouterError::SlippageExceeded {
				bound: min_amount_out,
				realized: amount_out,
			});
		}

		Self::consume(&mut book, selling_base, &walk.consumed);

		let reservation_id = uuid::Uuid::new_v4();
		self.held.insert(
			reservation_id,
			Held {
				selling_base,
				consumed: walk.consumed,
				amount_in,
				amount_out,
			},
		);

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

		let mut book = self.book.write().await;
		Self::restore(&mut book, held.selling_base, &held.consumed);
		Ok(())
	}

	fn gas_estimate(&self) -> Decimal {
		self.gas
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	fn book() -> OrderBookSource {
		OrderBookSource::new(
			TokenId::from("WETH"),
			TokenId::from("USDC"),
			vec![
				Level { price: dec!(100), quantity: dec!(10) },
				Level { price: dec!(99), quantity: dec!(20) },
			],
			vec![
				Level { price: dec!(101), quantity: dec!(10) },
				Level { price: dec!(102), quantity: dec!(20) },
			],
			dec!(0.001),
			dec!(0.3),
		)
	}

	#[tokio::test]
	async fn test_sell_walks_bids() {
		let book = book();
		let quote = book
			.quote(&TokenId::from("WETH"), &TokenId::from("USDC"), dec!(15))
			.await
			.unwrap();

		// 10 @ 100 + 5 @ 99 = 1495 gross, minus 0.1% fee.
		let gross = dec!(1495);
		assert_eq!(quote.amount_out, gross - gross * dec!(0.001));
		assert!(quote.slippage_estimate > Decimal::ZERO);
	}

	#[tokio::test]
	async fn test_buy_walks_asks() {
		let book = book();
		let quote = book
			.quote(&TokenId::from("USDC"), &TokenId::from("WETH"), dec!(1010))
			.await
			.unwrap();

		// 1010 quote buys exactly 10 base at 101, minus fee.
		let gross = dec!(10);
		assert_eq!(quote.amount_out, gross - gross * dec!(0.001));
	}

	#[tokio::test]
	async fn test_depth_exhaustion() {
		let book = book();
		let result = book
			.quote(&TokenId::from("WETH"), &TokenId::from("USDC"), dec!(31))
			.await;
		assert!(matches!(result, Err(RouterError::SourceUnavailable(_))));
	}

	#[tokio::test]
	async fn test_reserve_consumes_and_abort_restores() {
		let book = book();
		let before = book
			.quote(&TokenId::from("WETH"), &TokenId::from("USDC"), dec!(10))
			.await
			.unwrap();

		let reservation = book
			.reserve(
				&TokenId::from("WETH"),
				&TokenId::from("USDC"),
				dec!(10),
				Decimal::ZERO,
			)
			.await
			.unwrap();

		// Top level consumed: selling again now fills at 99.
		let during = book
			.quote(&TokenId::from("WETH"), &TokenId::from("USDC"), dec!(10))
			.await
			.unwrap();
		assert!(during.amount_out < before.amount_out);

		book.abort(reservation).await.unwrap();
		let after = book
			.quote(&TokenId::from("WETH"), &TokenId::from("USDC"), dec!(10))
			.await
			.unwrap();
		assert_eq!(after.amount_out, before.amount_out);
	}
}
