//! Trade execution: reserve, verify, commit.
//!
//! The engine turns a swap request into a terminal [`SwapResult`]. Execution
//! is atomic: every step of a route is first reserved (price locked, no
//! external effect), the aggregate output is verified against the caller's
//! bound, and only then is everything committed. Any failure before the
//! commit point aborts all reservations and reverts the trade with no assets
//! moved. The engine never retries a failed trade on its own.

pub mod engine;
pub mod history;
pub mod ledger;

pub use engine::ExecutionEngine;
pub use history::TradeHistory;
pub use ledger::MemoryLedger;
