//! Common identifiers used throughout the routing engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp (Unix seconds)
pub type Timestamp = u64;

/// Current Unix timestamp in seconds.
pub fn unix_now() -> Timestamp {
	chrono::Utc::now().timestamp() as Timestamp
}

/// Identifier for a token/asset. Chain-abstract: the engine never interprets
/// the contents beyond equality and ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(String);

impl TokenId {
	pub fn new(symbol: impl Into<String>) -> Self {
		Self(symbol.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for TokenId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for TokenId {
	fn from(s: &str) -> Self {
		Self(s.to_string())
	}
}

/// An unordered token pair in canonical (lexicographic) order.
///
/// Used as the key for per-pair execution locks so that two requests touching
/// the same pair in opposite directions serialize against each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPair {
	pub a: TokenId,
	pub b: TokenId,
}

impl TokenPair {
	/// Build the canonical pair for two tokens, regardless of direction.
	pub fn canonical(x: &TokenId, y: &TokenId) -> Self {
		if x <= y {
			Self { a: x.clone(), b: y.clone() }
		} else {
			Self { a: y.clone(), b: x.clone() }
		}
	}
}

impl fmt::Display for TokenPair {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.a, self.b)
	}
}

macro_rules! uuid_id {
	($(#[$doc:meta])* $name:ident) => {
		$(#[$doc])*
		#[derive(
			Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
		)]
		pub struct $name(uuid::Uuid);

		impl $name {
			#[allow(clippy::new_without_default)]
			pub fn new() -> Self {
				Self(uuid::Uuid::new_v4())
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}
	};
}

uuid_id!(
	/// Identifier for a registered liquidity source.
	SourceId
);
uuid_id!(
	/// Identifier for a computed route.
	RouteId
);
uuid_id!(
	/// Identifier for a trade (swap request) through the execution engine.
	TradeId
);
uuid_id!(
	/// Identifier for a detected arbitrage opportunity.
	OpportunityId
);
