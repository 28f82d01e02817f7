//! The router engine facade.
//!
//! Wires every component together behind one handle: quoting, route search,
//! execution, buffers, the arbitrage scanner and metrics. Also owns the
//! background loops (buffer rebalancing, arbitrage scanning, registry event
//! mirroring) and their shutdown.

use crate::event_bus::EventBus;
use router_arbitrage::ArbitrageScanner;
use router_buffer::{BufferManager, PairLocks, RebalanceOutcome};
use router_config::{ConfigHandle, RouterConfig};
use router_execution::ExecutionEngine;
use router_metrics::MetricsAggregator;
use router_quote::QuoteService;
use router_registry::SourceRegistry;
use router_routing::RouteFinder;
use router_types::{
	ArbitrageEvent, ArbitrageOpportunity, BufferEvent, LiquidityBuffer, LiquiditySource,
	OpportunityId, PriceOracle, PriceQuote, Result, Route, RouteEvent, RouterEvent,
	SettlementLedger, SourceDescriptor, SourceId, SourceMetrics, SwapProtection, SwapRequest,
	SwapResult, TokenId, TradeEvent, TradeStatus,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct RouterEngine {
	config: Arc<ConfigHandle>,
	registry: Arc<SourceRegistry>,
	metrics: Arc<MetricsAggregator>,
	quotes: Arc<QuoteService>,
	finder: Arc<RouteFinder>,
	buffers: Arc<BufferManager>,
	scanner: Arc<ArbitrageScanner>,
	execution: Arc<ExecutionEngine>,
	events: EventBus,
	shutdown: broadcast::Sender<()>,
	tasks: Mutex<JoinSet<()>>,
}

impl RouterEngine {
	pub fn new(
		config: RouterConfig,
		ledger: Arc<dyn SettlementLedger>,
		oracle: Option<Arc<dyn PriceOracle>>,
	) -> Self {
		let events = EventBus::new(config.monitoring.event_capacity);
		let config = Arc::new(ConfigHandle::new(config));
		let registry = Arc::new(SourceRegistry::new());
		let metrics = Arc::new(MetricsAggregator::default());
		let quotes = Arc::new(QuoteService::new(
			registry.clone(),
			metrics.clone(),
			config.clone(),
			oracle,
		));
		let finder = Arc::new(RouteFinder::new(
			registry.clone(),
			quotes.clone(),
			metrics.clone(),
			config.clone(),
		));
		let buffers = Arc::new(BufferManager::new(config.clone()));
		let scanner = Arc::new(ArbitrageScanner::new(
			registry.clone(),
			quotes.clone(),
			config.clone(),
		));
		let execution = Arc::new(ExecutionEngine::new(
			registry.clone(),
			finder.clone(),
			buffers.clone(),
			Arc::new(PairLocks::new()),
			ledger,
			metrics.clone(),
			config.clone(),
		));
		let (shutdown, _) = broadcast::channel(1);

		Self {
			config,
			registry,
			metrics,
			quotes,
			finder,
			buffers,
			scanner,
			execution,
			events,
			shutdown,
			tasks: Mutex::new(JoinSet::new()),
		}
	}

	/// Spawn the background loops. Idempotent startup is not supported; call
	/// once after construction.
	pub async fn start(&self) {
		info!("Starting router engine");
		let mut tasks = self.tasks.lock().await;

		// Mirror registry lifecycle into metrics and onto the bus.
		{
			let mut rx = self.registry.subscribe();
			let metrics = self.metrics.clone();
			let events = self.events.clone();
			let mut shutdown = self.shutdown.subscribe();
			tasks.spawn(async move {
				loop {
					tokio::select! {
						received = rx.recv() => match received {
							Ok(event) => {
								metrics.apply_registry_event(&event);
								events.publish(RouterEvent::Registry(event));
							}
							Err(broadcast::error::RecvError::Lagged(missed)) => {
								warn!(missed, "Registry event mirror lagged");
							}
							Err(broadcast::error::RecvError::Closed) => break,
						},
						_ = shutdown.recv() => break,
					}
				}
			});
		}

		// Periodic buffer rebalancing.
		{
			let buffers = self.buffers.clone();
			let config = self.config.clone();
			let events = self.events.clone();
			let mut shutdown = self.shutdown.subscribe();
			tasks.spawn(async move {
				loop {
					let interval =
						Duration::from_secs(config.load().buffers.rebalance_interval_secs.max(1));
					tokio::select! {
						_ = tokio::time::sleep(interval) => {
							publish_rebalances(&events, buffers.rebalance());
						}
						_ = shutdown.recv() => break,
					}
				}
			});
		}

		// Periodic arbitrage scanning.
		{
			let scanner = self.scanner.clone();
			let config = self.config.clone();
			let events = self.events.clone();
			let mut shutdown = self.shutdown.subscribe();
			tasks.spawn(async move {
				loop {
					let interval =
						Duration::from_secs(config.load().arbitrage.scan_interval_secs.max(1));
					tokio::select! {
						_ = tokio::time::sleep(interval) => {
							for opportunity in scanner.scan().await {
								publish_opportunity(&events, &opportunity);
							}
						}
						_ = shutdown.recv() => break,
					}
				}
			});
		}
	}

	/// Stop the background loops and wait for them to finish.
	pub async fn shutdown(&self) {
		info!("Shutting down router engine");
		let _ = self.shutdown.send(());
		let mut tasks = self.tasks.lock().await;
		while tasks.join_next().await.is_some() {}
	}

	pub fn subscribe(&self) -> broadcast::Receiver<RouterEvent> {
		self.events.subscribe()
	}

	pub fn config(&self) -> Arc<ConfigHandle> {
		self.config.clone()
	}

	// --- registry surface ---

	pub fn register_source(
		&self,
		source: Arc<dyn LiquiditySource>,
		descriptor: SourceDescriptor,
	) -> Result<SourceId> {
		self.registry.register(source, descriptor)
	}

	pub fn deactivate_source(&self, id: SourceId) -> Result<()> {
		self.registry.deactivate(id)
	}

	pub fn update_source_weight(&self, id: SourceId, weight: Decimal) -> Result<()> {
		self.registry.update_weight(id, weight)
	}

	pub fn update_source_priority(&self, id: SourceId, priority: u32) -> Result<()> {
		self.registry.update_priority(id, priority)
	}

	// --- quoting and routing ---

	pub async fn get_quotes(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
	) -> Result<Vec<PriceQuote>> {
		self.quotes.collect(token_in, token_out, amount_in).await
	}

	pub async fn best_quote(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
	) -> Result<PriceQuote> {
		self.quotes.best(token_in, token_out, amount_in).await
	}

	pub async fn find_route(
		&self,
		token_in: &TokenId,
		token_out: &TokenId,
		amount_in: Decimal,
		max_slippage: Option<Decimal>,
	) -> Result<Route> {
		let route = self
			.finder
			.find(token_in, token_out, amount_in, max_slippage)
			.await?;
		self.events.publish(RouterEvent::Route(RouteEvent::RouteComputed {
			route: route.id,
			token_in: route.token_in.clone(),
			token_out: route.token_out.clone(),
			amount_in: route.amount_in,
			expected_out: route.total_expected_out,
			price_impact: route.price_impact,
			hops: route.hop_count(),
		}));
		Ok(route)
	}

	// --- execution ---

	/// Execute a swap end to end and publish its terminal event.
	pub async fn execute_swap(&self, request: SwapRequest) -> Result<SwapResult> {
		let result = self.execution.execute(request).await?;
		self.publish_trade_outcome(&result);

		// A settled trade can push a buffer over its threshold; do not wait
		// for the next interval.
		if result.status == TradeStatus::Settled && self.buffers.over_threshold() {
			debug!("Buffer over utilization threshold, rebalancing now");
			publish_rebalances(&self.events, self.buffers.rebalance());
		}
		Ok(result)
	}

	/// Execute a trade at a caller-committed rate, settled from the token_out
	/// buffer at exactly that rate.
	pub async fn execute_guaranteed_trade(
		&self,
		token_in: TokenId,
		token_out: TokenId,
		amount_in: Decimal,
		guaranteed_rate: Decimal,
		deadline: Instant,
		account: impl Into<String>,
	) -> Result<SwapResult> {
		self.execute_swap(SwapRequest {
			token_in,
			token_out,
			amount_in,
			min_amount_out: None,
			guaranteed_rate: Some(guaranteed_rate),
			max_slippage: None,
			deadline,
			protection: SwapProtection::Guaranteed,
			account: account.into(),
		})
		.await
	}

	/// Claim a detected opportunity and execute it as one atomic round trip.
	/// The surplus settles to the configured beneficiary account, which funds
	/// the outbound leg.
	pub async fn execute_arbitrage(&self, id: OpportunityId) -> Result<SwapResult> {
		let opportunity = self.scanner.take(id)?;
		let config = self.config.load();
		let deadline =
			Instant::now() + Duration::from_secs(config.execution.default_deadline_secs);
		let result = self
			.execution
			.execute_arbitrage(&opportunity, &config.arbitrage.beneficiary, deadline)
			.await?;
		self.publish_trade_outcome(&result);
		Ok(result)
	}

	fn publish_trade_outcome(&self, result: &SwapResult) {
		match result.status {
			TradeStatus::Settled => {
				self.events.publish(RouterEvent::Trade(TradeEvent::TradeSettled {
					trade: result.trade_id,
					amount_in: result.amount_in,
					amount_out: result.amount_out,
					realized_rate: result.realized_rate,
					slippage: result.slippage,
					fees_paid: result.fees_paid,
				}));
			}
			_ => {
				let reason = result
					.failure
					.as_ref()
					.map(|e| e.to_string())
					.unwrap_or_else(|| "unknown".to_string());
				self.events.publish(RouterEvent::Trade(TradeEvent::TradeReverted {
					trade: result.trade_id,
					reason,
				}));
			}
		}
	}

	pub fn trade(&self, trade_id: router_types::TradeId) -> Option<SwapResult> {
		self.execution.trade(trade_id)
	}

	pub fn recent_trades(&self, limit: usize) -> Vec<SwapResult> {
		self.execution.recent_trades(limit)
	}

	// --- buffers, arbitrage, metrics ---

	pub fn buffer_status(&self, token: &TokenId) -> Option<LiquidityBuffer> {
		self.buffers.status(token)
	}

	pub fn buffers_status(&self) -> Vec<LiquidityBuffer> {
		self.buffers.status_all()
	}

	/// Run one rebalance pass immediately, outside the interval.
	pub fn rebalance_buffers(&self) -> Vec<RebalanceOutcome> {
		let outcomes = self.buffers.rebalance();
		publish_rebalances(&self.events, outcomes.clone());
		outcomes
	}

	/// Rebalance one token's buffer immediately; `None` when it is in band.
	pub fn rebalance_buffer(&self, token: &TokenId) -> Option<RebalanceOutcome> {
		let outcome = self.buffers.rebalance_token(token)?;
		publish_rebalances(&self.events, vec![outcome.clone()]);
		Some(outcome)
	}

	pub fn arbitrage_opportunities(&self) -> Vec<ArbitrageOpportunity> {
		self.scanner.opportunities()
	}

	/// Run one arbitrage scan immediately, outside the interval.
	pub async fn scan_arbitrage(&self) -> Vec<ArbitrageOpportunity> {
		let found = self.scanner.scan().await;
		for opportunity in &found {
			publish_opportunity(&self.events, opportunity);
		}
		found
	}

	pub fn source_metrics(&self, source: SourceId) -> Option<SourceMetrics> {
		self.metrics.snapshot(source)
	}

	pub fn all_source_metrics(&self) -> Vec<(SourceId, SourceMetrics)> {
		self.metrics.snapshot_all()
	}

	/// Sources flagged for deactivation after repeated quote timeouts.
	pub fn deactivation_candidates(&self) -> Vec<SourceId> {
		self.metrics.deactivation_candidates()
	}
}

fn publish_rebalances(events: &EventBus, outcomes: Vec<RebalanceOutcome>) {
	for outcome in outcomes {
		events.publish(RouterEvent::Buffer(BufferEvent::BufferRebalanced {
			token: outcome.token,
			moved: outcome.moved,
			available_after: outcome.available_after,
			utilized_after: outcome.utilized_after,
		}));
	}
}

fn publish_opportunity(events: &EventBus, opportunity: &ArbitrageOpportunity) {
	events.publish(RouterEvent::Arbitrage(ArbitrageEvent::ArbitrageDetected {
		opportunity: opportunity.id,
		token_a: opportunity.token_a.clone(),
		token_b: opportunity.token_b.clone(),
		source_buy: opportunity.source_buy,
		source_sell: opportunity.source_sell,
		estimated_profit: opportunity.estimated_profit,
	}));
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_execution::MemoryLedger;
	use router_registry::implementations::AmmSource;
	use router_types::{RegistryEvent, SourceKind};
	use rust_decimal_macros::dec;

	fn engine() -> RouterEngine {
		let ledger =
			MemoryLedger::new().with_balance("alice", TokenId::from("USDC"), dec!(1000000));
		RouterEngine::new(RouterConfig::default(), Arc::new(ledger), None)
	}

	fn register_pool(engine: &RouterEngine, handle: &str) -> SourceId {
		let pool = AmmSource::new(
			TokenId::from("USDC"),
			TokenId::from("DAI"),
			dec!(1000000),
			dec!(1000000),
			dec!(0.003),
			dec!(0.5),
		);
		engine
			.register_source(
				Arc::new(pool),
				SourceDescriptor {
					handle: handle.to_string(),
					kind: SourceKind::Amm,
					priority: 1,
					weight: Decimal::ONE,
				},
			)
			.unwrap()
	}

	fn request() -> SwapRequest {
		SwapRequest {
			token_in: TokenId::from("USDC"),
			token_out: TokenId::from("DAI"),
			amount_in: dec!(1000),
			min_amount_out: Some(dec!(990)),
			guaranteed_rate: None,
			max_slippage: None,
			deadline: Instant::now() + Duration::from_secs(30),
			protection: SwapProtection::BestEffort,
			account: "alice".into(),
		}
	}

	#[tokio::test]
	async fn test_swap_end_to_end_with_events() {
		let engine = engine();
		register_pool(&engine, "amm-1");
		let mut events = engine.subscribe();

		let result = engine.execute_swap(request()).await.unwrap();
		assert_eq!(result.status, TradeStatus::Settled);

		match events.recv().await.unwrap() {
			RouterEvent::Trade(TradeEvent::TradeSettled { trade, amount_out, .. }) => {
				assert_eq!(trade, result.trade_id);
				assert_eq!(amount_out, result.amount_out);
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_failed_swap_publishes_revert() {
		let engine = engine();
		register_pool(&engine, "amm-1");
		let mut events = engine.subscribe();

		let mut req = request();
		req.min_amount_out = Some(dec!(99999));
		let result = engine.execute_swap(req).await.unwrap();
		assert_eq!(result.status, TradeStatus::Reverted);

		match events.recv().await.unwrap() {
			RouterEvent::Trade(TradeEvent::TradeReverted { trade, .. }) => {
				assert_eq!(trade, result.trade_id)
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_route_computation_publishes_event() {
		let engine = engine();
		register_pool(&engine, "amm-1");
		let mut events = engine.subscribe();

		let route = engine
			.find_route(&TokenId::from("USDC"), &TokenId::from("DAI"), dec!(1000), None)
			.await
			.unwrap();

		match events.recv().await.unwrap() {
			RouterEvent::Route(RouteEvent::RouteComputed { route: id, hops, .. }) => {
				assert_eq!(id, route.id);
				assert_eq!(hops, 1);
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[tokio::test]
	async fn test_registry_events_reach_subscribers() {
		let engine = engine();
		engine.start().await;
		let mut events = engine.subscribe();

		let id = register_pool(&engine, "amm-1");

		match events.recv().await.unwrap() {
			RouterEvent::Registry(RegistryEvent::SourceRegistered { source, .. }) => {
				assert_eq!(source, id)
			}
			other => panic!("unexpected event: {:?}", other),
		}

		// The mirror also bootstrapped metrics for the new source.
		assert!(engine.source_metrics(id).is_some());

		engine.shutdown().await;
	}

	#[tokio::test]
	async fn test_shutdown_stops_background_tasks() {
		let engine = engine();
		engine.start().await;
		engine.shutdown().await;
	}

	#[tokio::test]
	async fn test_guaranteed_trade_settles_at_committed_rate() {
		let mut config = RouterConfig::default();
		config.buffers.tokens.insert(
			"DAI".to_string(),
			router_config::BufferTokenConfig {
				total: dec!(4000),
				min: dec!(500),
				max: dec!(6000),
				target: dec!(3000),
			},
		);
		let ledger =
			MemoryLedger::new().with_balance("alice", TokenId::from("USDC"), dec!(1000000));
		let engine = RouterEngine::new(config, Arc::new(ledger), None);
		let mut events = engine.subscribe();

		let result = engine
			.execute_guaranteed_trade(
				TokenId::from("USDC"),
				TokenId::from("DAI"),
				dec!(1000),
				dec!(0.998),
				Instant::now() + Duration::from_secs(30),
				"alice",
			)
			.await
			.unwrap();

		assert_eq!(result.status, TradeStatus::Settled);
		assert_eq!(result.amount_out, dec!(998));
		assert_eq!(result.realized_rate, dec!(0.998));

		match events.recv().await.unwrap() {
			RouterEvent::Trade(TradeEvent::TradeSettled { realized_rate, .. }) => {
				assert_eq!(realized_rate, dec!(0.998))
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	fn register_fixed(
		engine: &RouterEngine,
		handle: &str,
		token_in: &str,
		token_out: &str,
		rate: Decimal,
		depth: Decimal,
	) {
		let venue = router_registry::implementations::FixedRateSource::new(
			TokenId::from(token_in),
			TokenId::from(token_out),
			SourceKind::OrderBook,
			rate,
			Decimal::ZERO,
			dec!(1),
			depth,
		);
		engine
			.register_source(
				Arc::new(venue),
				SourceDescriptor {
					handle: handle.to_string(),
					kind: SourceKind::OrderBook,
					priority: 1,
					weight: Decimal::ONE,
				},
			)
			.unwrap();
	}

	#[tokio::test]
	async fn test_detected_opportunity_executes_to_beneficiary() {
		let mut config = RouterConfig::default();
		config.arbitrage.max_trade_amount = dec!(100);
		let ledger = Arc::new(
			MemoryLedger::new().with_balance("protocol", TokenId::from("ETH"), dec!(1000)),
		);
		let engine = RouterEngine::new(config, ledger.clone(), None);

		// One venue bids 100.5 for ETH, the other asks 100.
		register_fixed(&engine, "bid-venue", "ETH", "USDC", dec!(100.5), dec!(100));
		register_fixed(&engine, "ask-venue", "USDC", "ETH", dec!(0.01), dec!(1000000));

		let found = engine.scan_arbitrage().await;
		assert_eq!(found.len(), 1);
		let id = found[0].id;

		let result = engine.execute_arbitrage(id).await.unwrap();
		assert_eq!(result.status, TradeStatus::Settled);
		assert_eq!(result.amount_out, dec!(100.5));
		assert_eq!(
			ledger.balance("protocol", &TokenId::from("ETH")),
			dec!(1000.5)
		);

		// Claimed once: the opportunity is gone.
		assert!(engine.execute_arbitrage(id).await.is_err());
	}
}
