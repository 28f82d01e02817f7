//! Route search: multi-hop, split-aware pathfinding over the source graph.
//!
//! The finder builds a token graph from a registry snapshot, explores paths
//! up to the configured hop limit with a best-first frontier, allocates each
//! hop across the top sources by marginal output, and returns the single best
//! route under the caller's slippage bound.

pub mod finder;
pub mod graph;
pub mod split;

pub use finder::RouteFinder;
pub use graph::TokenGraph;
