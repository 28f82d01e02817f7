//! Bounded audit trail of terminal trade results.

use router_types::{SwapResult, TradeId};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Keeps the most recent terminal results, oldest evicted first.
pub struct TradeHistory {
	entries: Mutex<VecDeque<SwapResult>>,
	limit: usize,
}

impl TradeHistory {
	pub fn new(limit: usize) -> Self {
		Self {
			entries: Mutex::new(VecDeque::with_capacity(limit.min(1024))),
			limit: limit.max(1),
		}
	}

	pub fn push(&self, result: SwapResult) {
		let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
		if entries.len() == self.limit {
			entries.pop_front();
		}
		entries.push_back(result);
	}

	pub fn get(&self, trade_id: TradeId) -> Option<SwapResult> {
		let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
		entries.iter().find(|r| r.trade_id == trade_id).cloned()
	}

	/// Most recent results first, at most `limit`.
	pub fn recent(&self, limit: usize) -> Vec<SwapResult> {
		let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
		entries.iter().rev().take(limit).cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
