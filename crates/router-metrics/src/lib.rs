//! Per-source performance tracking.
//!
//! The aggregator owns every [`SourceMetrics`] record; other components feed
//! it observations (quote latencies, timeouts, settled and failed trades) and
//! read snapshots. Reliability is a blended score recomputed on every
//! observation and consumed by route ranking, so a consistently slow or
//! failing source drifts down the rankings without any manual intervention.

use dashmap::DashMap;
use router_types::{RegistryEvent, SourceId, SourceMetrics};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

/// EWMA smoothing factor for slippage, gas and latency.
const SMOOTHING: Decimal = dec!(0.2);

/// Latency at or beyond which the latency score bottoms out, in milliseconds.
const LATENCY_CEILING_MS: Decimal = dec!(1000);

pub struct MetricsAggregator {
	metrics: DashMap<SourceId, SourceMetrics>,
	/// Consecutive quote timeouts per source; reset by any successful quote.
	consecutive_timeouts: DashMap<SourceId, u64>,
	/// Consecutive timeouts at which a source becomes a deactivation candidate.
	timeout_threshold: u64,
}

impl MetricsAggregator {
	pub fn new(timeout_threshold: u64) -> Self {
		Self {
			metrics: DashMap::new(),
			consecutive_timeouts: DashMap::new(),
			timeout_threshold,
		}
	}

	/// Seed a neutral record so an unproven source ranks mid-field instead of
	/// being absent from snapshots.
	pub fn bootstrap(&self, source: SourceId) {
		self.metrics.entry(source).or_default();
	}

	/// Mirror registry lifecycle changes into the metrics table.
	pub fn apply_registry_event(&self, event: &RegistryEvent) {
		match event {
			RegistryEvent::SourceRegistered { source, .. } => self.bootstrap(*source),
			RegistryEvent::SourceDeactivated { source } => {
				self.consecutive_timeouts.remove(source);
			}
		}
	}

	/// A source answered a quote within the deadline.
	pub fn record_quote_latency(&self, source: SourceId, latency_ms: Decimal) {
		self.consecutive_timeouts.remove(&source);
		let mut entry = self.metrics.entry(source).or_default();
		entry.avg_latency_ms = ewma(entry.avg_latency_ms, latency_ms);
		recompute(&mut entry);
	}

	/// A source failed to answer a quote within the deadline.
	pub fn record_timeout(&self, source: SourceId) {
		let mut streak = self.consecutive_timeouts.entry(source).or_insert(0);
		*streak += 1;
		let streak = *streak;

		let mut entry = self.metrics.entry(source).or_default();
		entry.timeout_count += 1;
		// A timeout is observed latency at the ceiling.
		entry.avg_latency_ms = ewma(entry.avg_latency_ms, LATENCY_CEILING_MS);
		recompute(&mut entry);
		drop(entry);

		if streak >= self.timeout_threshold {
			warn!(%source, streak, "Source is a deactivation candidate after repeated quote timeouts");
		}
	}

	/// A trade step through this source settled.
	pub fn record_settlement(
		&self,
		source: SourceId,
		volume_in: Decimal,
		realized_slippage: Decimal,
		gas_used: Decimal,
	) {
		let mut entry = self.metrics.entry(source).or_default();
		entry.volume += volume_in;
		entry.trade_count += 1;
		entry.success_count += 1;
		entry.avg_slippage = ewma(entry.avg_slippage, realized_slippage);
		entry.avg_gas = ewma(entry.avg_gas, gas_used);
		recompute(&mut entry);
		debug!(%source, %volume_in, %realized_slippage, "Recorded settlement");
	}

	/// A trade step through this source was reserved but reverted.
	pub fn record_failure(&self, source: SourceId) {
		let mut entry = self.metrics.entry(source).or_default();
		entry.trade_count += 1;
		recompute(&mut entry);
	}

	pub fn snapshot(&self, source: SourceId) -> Option<SourceMetrics> {
		self.metrics.get(&source).map(|e| e.clone())
	}

	pub fn snapshot_all(&self) -> Vec<(SourceId, SourceMetrics)> {
		self.metrics
			.iter()
			.map(|e| (*e.key(), e.value().clone()))
			.collect()
	}

	/// Reliability for ranking; unknown sources score neutral.
	pub fn reliability(&self, source: SourceId) -> Decimal {
		self.metrics
			.get(&source)
			.map(|e| e.reliability)
			.unwrap_or(dec!(0.5))
	}

	/// Sources whose consecutive-timeout streak has crossed the threshold.
	/// Advisory only; deactivation stays an administrative decision.
	pub fn deactivation_candidates(&self) -> Vec<SourceId> {
		self.consecutive_timeouts
			.iter()
			.filter(|e| *e.value() >= self.timeout_threshold)
			.map(|e| *e.key())
			.collect()
	}
}

impl Default for MetricsAggregator {
	fn default() -> Self {
		Self::new(5)
	}
}

fn ewma(old: Decimal, sample: Decimal) -> Decimal {
	if old.is_zero() {
		sample
	} else {
		SMOOTHING * sample + (Decimal::ONE - SMOOTHING) * old
	}
}

/// Reliability blends completion rate, realized slippage and responsiveness.
/// A source with no history keeps the neutral default.
fn recompute(m: &mut SourceMetrics) {
	if m.trade_count > 0 {
		m.success_rate = Decimal::from(m.success_count) / Decimal::from(m.trade_count);
	}

	let attempts = m.trade_count + m.timeout_count;
	if attempts == 0 && m.avg_latency_ms.is_zero() {
		return;
	}

	let completion = if attempts > 0 {
		Decimal::from(m.success_count) / Decimal::from(attempts)
	} else {
		Decimal::ONE
	};
	let slippage_score = (Decimal::ONE - m.avg_slippage).max(Decimal::ZERO);
	let latency_score =
		Decimal::ONE - (m.avg_latency_ms / LATENCY_CEILING_MS).min(Decimal::ONE);

	m.reliability = dec!(0.6) * completion + dec!(0.25) * slippage_score + dec!(0.15) * latency_score;
}
