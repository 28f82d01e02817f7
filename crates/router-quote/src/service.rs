//! Concurrent quote collection.

use crate::aggregation::aggregate;
use router_config::ConfigHandle;
use router_metrics::MetricsAggregator;
use router_registry::{SourceRegistry, SourceSnapshot};
use router_types::{
	PriceOracle, PriceQuote, Result, RouterError, SourceQuote, TokenId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Collects and normalizes quotes from every eligible source.
///
/// Each source is queried concurrently under the configured per-source
/// deadline; a source that misses the deadline is skipped for this cycle and
/// the miss is recorded against its metrics. The request only fails with
/// `NoLiquidity` when no source produced a usable quote.
pub struct QuoteService {
	registry: Arc<SourceRegistry>,
	metrics: Arc<MetricsAggregator>,
	config: Arc<ConfigHandle>,
	oracle: Option<Arc<dyn PriceOracle>>,
}

impl QuoteService {
	pub fn new(
		registry: Arc<SourceRegistry>,
		metrics: Arc<MetricsAggregator>,
		config: Arc<ConfigHandle>,
		oracle: Option<Arc<dyn PriceOracle>>,
	) -> Self {
		Self { registry, metrics, config, oracle }
	}

	/// Quote `amount_in` of `token_in` into `token_out` across all active
	/// sources serving the pair.
	pub async fn collect(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
	) -> Result<Vec<PriceQuote>> {
		if amount_in <= Decimal::ZERO {
			return Err(RouterError::InvalidRequest(
				"amount_in must be positive".into(),
			));
		}

		let snapshots = self.registry.snapshot(token_in, token_out);
		self.collect_from(&snapshots, token_in, token_out, amount_in)
			.await
	}

	/// Quote against an explicit source snapshot, reusing one registry read
	/// across the several amounts a route search probes.
	pub async fn collect_from(
		&self,
		snapshots: &[SourceSnapshot],
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
	) -> Result<Vec<PriceQuote>> {
		let config = self.config.load();
		let deadline = Duration::from_millis(config.quotes.source_timeout_ms);

		let futures = snapshots.iter().map(|snap| {
			let source = snap.source.clone();
			let id = snap.id;
			async move {
				let started = Instant::now();
				let outcome =
					tokio::time::timeout(deadline, source.quote(token_in, token_out, amount_in))
						.await;
				(id, started.elapsed(), outcome)
			}
		});

		let mut quotes = Vec::with_capacity(snapshots.len());
		for (id, elapsed, outcome) in futures::future::join_all(futures).await {
			match outcome {
				Ok(Ok(raw)) => {
					self.metrics
						.record_quote_latency(id, Decimal::from(elapsed.as_millis() as u64));
					quotes.push(normalize(id, token_in, token_out, amount_in, raw));
				}
				Ok(Err(error)) => {
					debug!(source = %id, %error, "Source declined to quote");
				}
				Err(_) => {
					warn!(source = %id, "Source missed the quote deadline");
					self.metrics.record_timeout(id);
				}
			}
		}

		if let Some(oracle) = &self.oracle {
			quotes = self
				.apply_oracle_bound(oracle, snapshots, quotes, token_in, token_out)
				.await?;
		}

		if quotes.is_empty() {
			return Err(RouterError::NoLiquidity {
				token_in: token_in.clone(),
				token_out: token_out.clone(),
			});
		}
		Ok(quotes)
	}

	/// The single best quote for a pair and amount.
	pub async fn best(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
	) -> Result<PriceQuote> {
		let quotes = self.collect(token_in, token_out, amount_in).await?;
		quotes
			.into_iter()
			.max_by(|a, b| a.amount_out.cmp(&b.amount_out))
			.ok_or(RouterError::NoLiquidity {
				token_in: token_in.clone(),
				token_out: token_out.clone(),
			})
	}

	/// Drop quotes whose price deviates from the oracle reference beyond the
	/// configured threshold. Missing oracle coverage for either token leaves
	/// the quote set untouched rather than blocking the pair.
	async fn apply_oracle_bound(
		&self,
		oracle: &Arc<dyn PriceOracle>,
		snapshots: &[SourceSnapshot],
		quotes: Vec<PriceQuote>,
		token_in: &TokenId,
		token_out: &TokenId,
	) -> Result<Vec<PriceQuote>> {
		let (price_in, price_out) =
			match (oracle.get_price(token_in).await, oracle.get_price(token_out).await) {
				(Ok(a), Ok(b)) => (a, b),
				_ => {
					debug!(%token_in, %token_out, "Oracle has no reference for pair, skipping sanity bound");
					return Ok(quotes);
				}
			};
		if price_out.price.is_zero() {
			return Ok(quotes);
		}
		let reference = price_in.price / price_out.price;
		if reference.is_zero() {
			return Ok(quotes);
		}

		let config = self.config.load();
		let threshold = config.quotes.oracle_deviation_threshold;
		let kept: Vec<PriceQuote> = quotes
			.into_iter()
			.filter(|quote| {
				let deviation = ((quote.price - reference) / reference).abs();
				if deviation > threshold {
					warn!(
						source = %quote.source,
						%deviation,
						%reference,
						price = %quote.price,
						"Rejected quote deviating from oracle reference"
					);
					false
				} else {
					true
				}
			})
			.collect();

		// Cross-check the surviving consensus against the reference; a
		// deviating aggregate points at a market-wide dislocation rather
		// than one bad source.
		let weights: HashMap<_, _> = snapshots
			.iter()
			.map(|s| (s.id, s.descriptor.weight))
			.collect();
		if let Some(consensus) = aggregate(&kept, &weights, config.quotes.oracle_check_aggregation) {
			let deviation = ((consensus - reference) / reference).abs();
			if deviation > threshold {
				warn!(%token_in, %token_out, %consensus, %reference, "Quote consensus deviates from oracle reference");
			}
		}

		Ok(kept)
	}
}

/// Normalize a raw source answer into the engine's quote form.
fn normalize(
	source: router_types::SourceId,
	token_in: &TokenId,
	token_out: &TokenId,
	amount_in: Decimal,
	raw: SourceQuote,
) -> PriceQuote {
	let confidence = if raw.depth > Decimal::ZERO {
		(Decimal::ONE - amount_in / raw.depth).max(Decimal::ZERO)
	} else {
		dec!(0.5)
	};

	PriceQuote {
		source,
		token_in: token_in.clone(),
		token_out: token_out.clone(),
		amount_in,
		amount_out: raw.amount_out,
		price: raw.amount_out / amount_in,
		slippage_estimate: raw.slippage_estimate,
		fee: raw.fee,
		gas_estimate: raw.gas_estimate,
		depth: raw.depth,
		confidence,
		quoted_at: Instant::now(),
	}
}
