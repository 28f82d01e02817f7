//! Per-pair execution locks.

use dashmap::DashMap;
use router_types::TokenPair;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes operations touching the same token pair.
///
/// Two swaps over the same pair, in either direction, execute one after the
/// other; swaps over disjoint pairs run concurrently. The pair key is
/// canonical, so A/B and B/A contend on the same lock.
pub struct PairLocks {
	locks: DashMap<TokenPair, Arc<Mutex<()>>>,
}

impl PairLocks {
	pub fn new() -> Self {
		Self { locks: DashMap::new() }
	}

	pub async fn acquire(&self, pair: &TokenPair) -> OwnedMutexGuard<()> {
		let lock = self
			.locks
			.entry(pair.clone())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone();
		lock.lock_owned().await
	}
}

impl Default for PairLocks {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_types::TokenId;
	use std::time::Duration;

	#[tokio::test]
	async fn test_same_pair_serializes() {
		let locks = Arc::new(PairLocks::new());
		let pair = TokenPair::canonical(&TokenId::from("USDC"), &TokenId::from("DAI"));

		let guard = locks.acquire(&pair).await;

		let contender = {
			let locks = locks.clone();
			let reversed = TokenPair::canonical(&TokenId::from("DAI"), &TokenId::from("USDC"));
			tokio::spawn(async move { locks.acquire(&reversed).await })
		};

		// The reversed pair maps to the same lock and must block.
		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(!contender.is_finished());

		drop(guard);
		contender.await.unwrap();
	}

	#[tokio::test]
	async fn test_disjoint_pairs_run_concurrently() {
		let locks = PairLocks::new();
		let first = TokenPair::canonical(&TokenId::from("USDC"), &TokenId::from("DAI"));
		let second = TokenPair::canonical(&TokenId::from("WETH"), &TokenId::from("WBTC"));

		let _guard = locks.acquire(&first).await;
		// Acquiring an unrelated pair must not block.
		let _other = locks.acquire(&second).await;
	}
}
