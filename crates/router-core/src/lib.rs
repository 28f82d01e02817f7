//! Engine assembly and public facade.
//!
//! Downstream callers build a [`RouterEngine`] from a configuration, a
//! settlement ledger and an optional reference oracle, register their
//! liquidity sources and drive everything through the facade: quotes, route
//! search, execution, buffers, arbitrage and metrics. Background maintenance
//! (rebalancing, scanning, registry mirroring) runs in spawned tasks between
//! `start` and `shutdown`.

pub mod engine;
pub mod event_bus;
pub mod telemetry;

pub use engine::RouterEngine;
pub use event_bus::EventBus;
pub use telemetry::init_logging;

pub use router_config::{load_config, ConfigHandle, RouterConfig};
pub use router_types::{
	RouterError, SwapProtection, SwapRequest, SwapResult, TokenId, TradeStatus,
};
