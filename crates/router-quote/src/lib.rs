//! Quote collection and normalization.
//!
//! The quote service fans a request out to every eligible source under a
//! per-source deadline, normalizes the answers into [`PriceQuote`]s and
//! applies the oracle sanity bound. Everything downstream (routing, the
//! arbitrage scanner) consumes these normalized quotes.

pub mod aggregation;
pub mod oracle;
pub mod service;

pub use aggregation::aggregate;
pub use oracle::FixedOracle;
pub use service::QuoteService;

pub use router_types::PriceQuote;
