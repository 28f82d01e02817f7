//! Shared types for the liquidity routing engine.
//!
//! Every crate in the workspace builds on the definitions here: token and
//! entity identifiers, the quote/route/swap data model, the error taxonomy,
//! domain events, and the traits that external collaborators (liquidity
//! sources, the reference price oracle, the settlement ledger) implement.

pub mod arbitrage;
pub mod buffers;
pub mod common;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod metrics;
pub mod oracle;
pub mod quotes;
pub mod routes;
pub mod sources;
pub mod swaps;

pub use arbitrage::*;
pub use buffers::*;
pub use common::*;
pub use errors::*;
pub use events::*;
pub use ledger::*;
pub use metrics::*;
pub use oracle::*;
pub use quotes::*;
pub use routes::*;
pub use sources::*;
pub use swaps::*;
