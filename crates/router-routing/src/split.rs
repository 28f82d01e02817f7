//! Split allocation for one hop.
//!
//! An amount is divided across the candidate sources by greedy marginal
//! equalization: the amount is cut into slices and each slice goes to the
//! source whose next slice yields the most additional output. On curved
//! venues (AMMs, order books) this converges on the allocation where marginal
//! outputs are equal; on flat venues everything lands on the best rate.

use router_registry::SourceSnapshot;
use router_types::{Result, RouteStep, RouterError, SourceQuote, TokenId};
use rust_decimal::Decimal;

/// Outcome of allocating one hop across parallel legs.
#[derive(Debug, Clone)]
pub struct HopAllocation {
	pub legs: Vec<RouteStep>,
	pub expected_out: Decimal,
	pub gas: Decimal,
	/// Amount-weighted slippage estimate across the legs.
	pub slippage: Decimal,
}

struct Lane<'a> {
	snap: &'a SourceSnapshot,
	allocated: Decimal,
	current_out: Decimal,
	last_quote: Option<SourceQuote>,
	/// Set when the source can no longer absorb another slice.
	exhausted: bool,
}

/// Allocate `amount_in` of the hop across `candidates`.
///
/// Callers pass candidates already screened for responsiveness this cycle;
/// a source failing mid-allocation just stops receiving slices.
pub async fn allocate(
	candidates: &[SourceSnapshot],
	token_in: &TokenId,
	token_out: &TokenId,
	amount_in: Decimal,
	slices: u32,
) -> Result<HopAllocation> {
	if candidates.is_empty() {
		return Err(RouterError::SourceUnavailable(
			"no candidate sources for hop".into(),
		));
	}
	if amount_in <= Decimal::ZERO {
		return Err(RouterError::InvalidRequest("hop amount must be positive".into()));
	}

	let mut lanes: Vec<Lane> = candidates
		.iter()
		.map(|snap| Lane {
			snap,
			allocated: Decimal::ZERO,
			current_out: Decimal::ZERO,
			last_quote: None,
			exhausted: false,
		})
		.collect();

	let slice = amount_in / Decimal::from(slices.max(1));
	let mut remaining = amount_in;

	while remaining > Decimal::ZERO {
		// The final slice absorbs rounding so leg inputs sum exactly.
		let take = if remaining <= slice * Decimal::TWO {
			remaining
		} else {
			slice
		};

		let mut best: Option<(usize, Decimal, SourceQuote)> = None;
		for (idx, lane) in lanes.iter_mut().enumerate() {
			if lane.exhausted {
				continue;
			}
			let probe = lane.allocated + take;
			match lane
				.snap
				.source
				.quote(token_in, token_out, probe)
				.await
			{
				Ok(quote) => {
					let marginal = quote.amount_out - lane.current_out;
					let better = match &best {
						None => true,
						Some((best_idx, best_marginal, _)) => {
							marginal > *best_marginal
								|| (marginal == *best_marginal
									&& lane.snap.descriptor.priority
										> lanes_priority(candidates, *best_idx))
						}
					};
					if better {
						best = Some((idx, marginal, quote));
					}
				}
				Err(_) => {
					lane.exhausted = true;
				}
			}
		}

		match best {
			Some((idx, _, quote)) => {
				let lane = &mut lanes[idx];
				lane.allocated += take;
				lane.current_out = quote.amount_out;
				lane.last_quote = Some(quote);
				remaining -= take;
			}
			None => {
				return Err(RouterError::SourceUnavailable(
					"candidate depth exhausted before the hop was fully allocated".into(),
				));
			}
		}
	}

	let mut legs = Vec::new();
	let mut expected_out = Decimal::ZERO;
	let mut gas = Decimal::ZERO;
	let mut weighted_slippage = Decimal::ZERO;
	for lane in lanes {
		if lane.allocated.is_zero() {
			continue;
		}
		let Some(quote) = lane.last_quote else {
			continue;
		};
		expected_out += quote.amount_out;
		gas += quote.gas_estimate;
		weighted_slippage += quote.slippage_estimate * lane.allocated;
		legs.push(RouteStep {
			source: lane.snap.id,
			token_in: token_in.clone(),
			token_out: token_out.clone(),
			amount_in: lane.allocated,
			expected_amount_out: quote.amount_out,
			fee: quote.fee,
			gas_estimate: quote.gas_estimate,
		});
	}

	Ok(HopAllocation {
		legs,
		expected_out,
		gas,
		slippage: weighted_slippage / amount_in,
	})
}

fn lanes_priority(candidates: &[SourceSnapshot], idx: usize) -> u32 {
	candidates[idx].descriptor.priority
}
