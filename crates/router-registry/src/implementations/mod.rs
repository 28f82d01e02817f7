//! Concrete liquidity source implementations.

pub mod amm;
pub mod fixed;
pub mod orderbook;

pub use amm::AmmSource;
pub use fixed::FixedRateSource;
pub use orderbook::{Level, OrderBookSource};
