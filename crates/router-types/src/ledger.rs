//! Accounting ledger interface.
//!
//! The execution engine calls the ledger only inside the commit step of a
//! `Settled` transition; a reverted or expired trade never reaches it.

use crate::common::TokenId;
use crate::errors::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait SettlementLedger: Send + Sync {
	async fn debit(&self, account: &str, token: &TokenId, amount: Decimal) -> Result<()>;

	async fn credit(&self, account: &str, token: &TokenId, amount: Decimal) -> Result<()>;
}
