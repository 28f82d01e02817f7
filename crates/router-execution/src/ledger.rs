//! In-memory settlement ledger.

use async_trait::async_trait;
use dashmap::DashMap;
use router_types::{Result, RouterError, SettlementLedger, TokenId};
use rust_decimal::Decimal;

/// Balance-checked in-memory ledger.
///
/// Debits fail on insufficient funds, which is exactly the failure mode the
/// engine's abort path has to handle, so this doubles as the ledger used in
/// atomicity tests.
pub struct MemoryLedger {
	balances: DashMap<(String, TokenId), Decimal>,
}

impl MemoryLedger {
	pub fn new() -> Self {
		Self { balances: DashMap::new() }
	}

	pub fn with_balance(self, account: &str, token: TokenId, amount: Decimal) -> Self {
		self.balances.insert((account.to_string(), token), amount);
		self
	}

	pub fn balance(&self, account: &str, token: &TokenId) -> Decimal {
		self.balances
			.get(&(account.to_string(), token.clone()))
			.map(|b| *b)
			.unwrap_or(Decimal::ZERO)
	}
}

impl Default for MemoryLedger {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl SettlementLedger for MemoryLedger {
	async fn debit(&self, account: &str, token: &TokenId, amount: Decimal) -> Result<()> {
		let key = (account.to_string(), token.clone());
		let mut balance = self.balances.entry(key).or_insert(Decimal::ZERO);
		if *balance < amount {
			return Err(RouterError::Ledger(format!(
				"insufficient {} balance for {}: {} < {}",
				token, account, *balance, amount
			)));
		}
		*balance -= amount;
		Ok(())
	}

	async fn credit(&self, account: &str, token: &TokenId, amount: Decimal) -> Result<()> {
		let key = (account.to_string(), token.clone());
		*self.balances.entry(key).or_insert(Decimal::ZERO) += amount;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[tokio::test]
	async fn test_debit_requires_funds() {
		let ledger = MemoryLedger::new().with_balance("alice", TokenId::from("USDC"), dec!(100));

		ledger.debit("alice", &TokenId::from("USDC"), dec!(60)).await.unwrap();
		assert_eq!(ledger.balance("alice", &TokenId::from("USDC")), dec!(40));

		let result = ledger.debit("alice", &TokenId::from("USDC"), dec!(50)).await;
		assert!(matches!(result, Err(RouterError::Ledger(_))));
		// Failed debit leaves the balance untouched.
		assert_eq!(ledger.balance("alice", &TokenId::from("USDC")), dec!(40));
	}
}
