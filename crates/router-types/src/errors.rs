//! Error taxonomy for the routing engine.
//!
//! Per-source failures (`SourceUnavailable`) are absorbed by the quote and
//! routing layers and never surface to the caller while other liquidity
//! remains. Execution-phase errors are terminal for the request: the engine
//! reports them through a `Reverted` result and never retries on its own.

use crate::common::TokenId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RouterError {
	#[error("no liquidity source responded for {token_in}/{token_out}")]
	NoLiquidity { token_in: TokenId, token_out: TokenId },

	#[error("no route satisfies slippage bound {max_slippage}")]
	NoViableRoute { max_slippage: Decimal },

	#[error("realized output {realized} below bound {bound}")]
	SlippageExceeded { bound: Decimal, realized: Decimal },

	#[error("deadline expired")]
	DeadlineExpired,

	#[error("buffer for {token} insufficient: requested {requested}, available {available}")]
	BufferInsufficient {
		token: TokenId,
		requested: Decimal,
		available: Decimal,
	},

	#[error("source unavailable: {0}")]
	SourceUnavailable(String),

	#[error("invalid request: {0}")]
	InvalidRequest(String),

	#[error("arbitrage opportunity stale: {0}")]
	ArbitrageStale(String),

	#[error("registry error: {0}")]
	Registry(String),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("ledger error: {0}")]
	Ledger(String),
}

impl RouterError {
	/// Whether this error is local to one source and recoverable by routing
	/// around it, as opposed to terminal for the whole request.
	pub fn is_source_local(&self) -> bool {
		matches!(self, RouterError::SourceUnavailable(_))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_source_local_classification() {
		assert!(RouterError::SourceUnavailable("timeout".into()).is_source_local());
		assert!(!RouterError::DeadlineExpired.is_source_local());
	}
}
