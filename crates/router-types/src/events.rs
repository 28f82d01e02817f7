//! Domain events emitted by the routing engine.
//!
//! Events carry the identifiers and numeric outcomes needed for audit and for
//! metrics replay; they never carry full quote or route payloads.

use crate::common::{OpportunityId, RouteId, SourceId, TokenId, TradeId};
use crate::sources::SourceKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RouterEvent {
	Registry(RegistryEvent),
	Route(RouteEvent),
	Trade(TradeEvent),
	Buffer(BufferEvent),
	Arbitrage(ArbitrageEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistryEvent {
	SourceRegistered {
		source: SourceId,
		kind: SourceKind,
		handle: String,
	},
	SourceDeactivated {
		source: SourceId,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RouteEvent {
	RouteComputed {
		route: RouteId,
		token_in: TokenId,
		token_out: TokenId,
		amount_in: Decimal,
		expected_out: Decimal,
		price_impact: Decimal,
		hops: usize,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TradeEvent {
	TradeSettled {
		trade: TradeId,
		amount_in: Decimal,
		amount_out: Decimal,
		realized_rate: Decimal,
		slippage: Decimal,
		fees_paid: Decimal,
	},
	TradeReverted {
		trade: TradeId,
		reason: String,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BufferEvent {
	BufferRebalanced {
		token: TokenId,
		moved: Decimal,
		available_after: Decimal,
		utilized_after: Decimal,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArbitrageEvent {
	ArbitrageDetected {
		opportunity: OpportunityId,
		token_a: TokenId,
		token_b: TokenId,
		source_buy: SourceId,
		source_sell: SourceId,
		estimated_profit: Decimal,
	},
}
