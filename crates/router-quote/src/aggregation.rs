//! Collapsing a quote set into one comparison price.

use router_types::{AggregationMethod, PriceQuote, SourceId};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Aggregate quote prices with the given method. Returns `None` for an empty
/// set. `weights` carries per-source routing weights for the weighted method;
/// absent sources count with weight one.
pub fn aggregate(
	quotes: &[PriceQuote],
	weights: &HashMap<SourceId, Decimal>,
	method: AggregationMethod,
) -> Option<Decimal> {
	if quotes.is_empty() {
		return None;
	}

	match method {
		AggregationMethod::Median => {
			let mut prices: Vec<Decimal> = quotes.iter().map(|q| q.price).collect();
			prices.sort();
			let mid = prices.len() / 2;
			if prices.len() % 2 == 1 {
				Some(prices[mid])
			} else {
				Some((prices[mid - 1] + prices[mid]) / Decimal::TWO)
			}
		}
		AggregationMethod::Mean => {
			let sum: Decimal = quotes.iter().map(|q| q.price).sum();
			Some(sum / Decimal::from(quotes.len()))
		}
		AggregationMethod::Weighted => {
			let mut weighted = Decimal::ZERO;
			let mut total = Decimal::ZERO;
			for quote in quotes {
				let weight = weights.get(&quote.source).copied().unwrap_or(Decimal::ONE);
				weighted += quote.price * weight;
				total += weight;
			}
			if total.is_zero() {
				None
			} else {
				Some(weighted / total)
			}
		}
		AggregationMethod::BestOutput => quotes
			.iter()
			.max_by(|a, b| a.amount_out.cmp(&b.amount_out))
			.map(|q| q.price),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_types::TokenId;
	use rust_decimal_macros::dec;
	use std::time::Instant;

	fn quote(price: Decimal, amount_out: Decimal) -> PriceQuote {
		PriceQuote {
			source: SourceId::new(),
			token_in: TokenId::from("USDC"),
			token_out: TokenId::from("DAI"),
			amount_in: dec!(1000),
			amount_out,
			price,
			slippage_estimate: Decimal::ZERO,
			fee: Decimal::ZERO,
			gas_estimate: Decimal::ZERO,
			depth: dec!(1000000),
			confidence: Decimal::ONE,
			quoted_at: Instant::now(),
		}
	}

	#[test]
	fn test_median_odd_and_even() {
		let weights = HashMap::new();
		let quotes = vec![
			quote(dec!(1.0), dec!(1000)),
			quote(dec!(3.0), dec!(3000)),
			quote(dec!(2.0), dec!(2000)),
		];
		assert_eq!(
			aggregate(&quotes, &weights, AggregationMethod::Median),
			Some(dec!(2.0))
		);

		let quotes = &quotes[..2];
		assert_eq!(
			aggregate(quotes, &weights, AggregationMethod::Median),
			Some(dec!(2.0))
		);
	}

	#[test]
	fn test_weighted_uses_source_weights() {
		let heavy = quote(dec!(2.0), dec!(2000));
		let light = quote(dec!(1.0), dec!(1000));

		let mut weights = HashMap::new();
		weights.insert(heavy.source, dec!(3));
		weights.insert(light.source, dec!(1));

		let result = aggregate(&[heavy, light], &weights, AggregationMethod::Weighted).unwrap();
		assert_eq!(result, dec!(1.75));
	}

	#[test]
	fn test_best_output_picks_largest_fill() {
		let weights = HashMap::new();
		let mut deep = quote(dec!(0.98), dec!(1960));
		deep.amount_in = dec!(2000);
		let quotes = vec![quote(dec!(0.99), dec!(990)), deep];
		// Larger output wins even at a worse unit price.
		assert_eq!(
			aggregate(&quotes, &weights, AggregationMethod::BestOutput),
			Some(dec!(0.98))
		);
	}

	#[test]
	fn test_empty_set_has_no_aggregate() {
		let weights = HashMap::new();
		assert_eq!(aggregate(&[], &weights, AggregationMethod::Mean), None);
	}
}
