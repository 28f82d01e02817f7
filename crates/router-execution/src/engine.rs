//! The execution engine.

use crate::history::TradeHistory;
use dashmap::DashMap;
use router_buffer::{BufferManager, PairLocks};
use router_config::ConfigHandle;
use router_metrics::MetricsAggregator;
use router_registry::SourceRegistry;
use router_routing::RouteFinder;
use router_types::{
	unix_now, ArbitrageOpportunity, LiquiditySource, Result, Route, RouteHop, RouteId,
	RouteStep, RouterError, SettlementLedger, SourceId, StepFill, StepReservation,
	SwapProtection, SwapRequest, SwapResult, TokenPair, TradeId, TradeStatus,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// One reserved step awaiting commit or abort.
struct ReservedStep {
	source_id: SourceId,
	source: Arc<dyn LiquiditySource>,
	reservation: StepReservation,
	/// Output the route planned for this step at this scale.
	planned_out: Decimal,
}

pub struct ExecutionEngine {
	registry: Arc<SourceRegistry>,
	finder: Arc<RouteFinder>,
	buffers: Arc<BufferManager>,
	locks: Arc<PairLocks>,
	ledger: Arc<dyn SettlementLedger>,
	metrics: Arc<MetricsAggregator>,
	config: Arc<ConfigHandle>,
	history: TradeHistory,
	/// Lifecycle state of trades still in flight.
	active: DashMap<TradeId, TradeStatus>,
}

impl ExecutionEngine {
	pub fn new(
		registry: Arc<SourceRegistry>,
		finder: Arc<RouteFinder>,
		buffers: Arc<BufferManager>,
		locks: Arc<PairLocks>,
		ledger: Arc<dyn SettlementLedger>,
		metrics: Arc<MetricsAggregator>,
		config: Arc<ConfigHandle>,
	) -> Self {
		let history_limit = config.load().execution.history_limit;
		Self {
			registry,
			finder,
			buffers,
			locks,
			ledger,
			metrics,
			config,
			history: TradeHistory::new(history_limit),
			active: DashMap::new(),
		}
	}

	/// Execute a swap to a terminal result. Structural validation errors are
	/// returned as `Err`; every execution failure lands in the result's
	/// `failure` field with a `Reverted` or `Expired` status.
	#[instrument(skip(self, request), fields(token_in = %request.token_in, token_out = %request.token_out))]
	pub async fn execute(&self, request: SwapRequest) -> Result<SwapResult> {
		request.validate()?;

		let trade_id = TradeId::new();
		self.active.insert(trade_id, TradeStatus::Requested);
		info!(trade = %trade_id, amount = %request.amount_in, "Accepted swap request");

		// Serialize against other trades touching this pair.
		let pair = TokenPair::canonical(&request.token_in, &request.token_out);
		let _guard = self.locks.acquire(&pair).await;

		let result = self.run(trade_id, &request).await;
		self.active.remove(&trade_id);
		self.history.push(result.clone());
		Ok(result)
	}

	/// Execute a claimed price-divergence opportunity as one atomic round
	/// trip: sell `token_a` into `token_b` on the sell source, buy it back on
	/// the buy source. Both legs go through the same reserve/commit path as a
	/// routed swap, so either both settle or neither does. `account` must
	/// hold the feasible amount of `token_a`; the round trip is required to
	/// return at least its input, and the surplus stays with the account.
	pub async fn execute_arbitrage(
		&self,
		opportunity: &ArbitrageOpportunity,
		account: &str,
		deadline: Instant,
	) -> Result<SwapResult> {
		if opportunity.feasible_amount <= Decimal::ZERO {
			return Err(RouterError::InvalidRequest(
				"opportunity has no feasible amount".into(),
			));
		}

		let trade_id = TradeId::new();
		self.active.insert(trade_id, TradeStatus::Requested);
		info!(
			trade = %trade_id,
			opportunity = %opportunity.id,
			amount = %opportunity.feasible_amount,
			"Executing arbitrage round trip"
		);

		let pair = TokenPair::canonical(&opportunity.token_a, &opportunity.token_b);
		let _guard = self.locks.acquire(&pair).await;

		let request = SwapRequest {
			token_in: opportunity.token_a.clone(),
			token_out: opportunity.token_a.clone(),
			amount_in: opportunity.feasible_amount,
			min_amount_out: Some(opportunity.feasible_amount),
			guaranteed_rate: None,
			max_slippage: None,
			deadline,
			protection: SwapProtection::BestEffort,
			account: account.to_string(),
		};
		let route = round_trip_route(opportunity);

		// A round trip cannot be re-quoted through the route finder; a spread
		// that outlived its window is simply gone.
		let result = if route.is_expired() {
			self.fail(
				trade_id,
				&request,
				TradeStatus::Reverted,
				RouterError::ArbitrageStale(format!(
					"opportunity {} expired before execution",
					opportunity.id
				)),
			)
		} else {
			self.execute_route(trade_id, &request, route).await
		};
		self.active.remove(&trade_id);
		self.history.push(result.clone());
		Ok(result)
	}

	pub fn status(&self, trade_id: TradeId) -> Option<TradeStatus> {
		self.active
			.get(&trade_id)
			.map(|s| *s)
			.or_else(|| self.history.get(trade_id).map(|r| r.status))
	}

	pub fn trade(&self, trade_id: TradeId) -> Option<SwapResult> {
		self.history.get(trade_id)
	}

	pub fn recent_trades(&self, limit: usize) -> Vec<SwapResult> {
		self.history.recent(limit)
	}

	async fn run(&self, trade_id: TradeId, request: &SwapRequest) -> SwapResult {
		if Instant::now() >= request.deadline {
			return self.fail(trade_id, request, TradeStatus::Expired, RouterError::DeadlineExpired);
		}

		match request.protection {
			SwapProtection::BestEffort => self.run_best_effort(trade_id, request).await,
			SwapProtection::Guaranteed => match self.run_guaranteed(trade_id, request).await {
				Ok(result) => result,
				Err(reason) => self.fail(trade_id, request, TradeStatus::Reverted, reason),
			},
			SwapProtection::GuaranteedOrBestEffort => {
				match self.run_guaranteed(trade_id, request).await {
					Ok(result) => result,
					Err(RouterError::BufferInsufficient { token, requested, available }) => {
						debug!(
							trade = %trade_id,
							%token, %requested, %available,
							"Buffer insufficient, degrading to best-effort route"
						);
						self.run_best_effort(trade_id, request).await
					}
					Err(reason) => self.fail(trade_id, request, TradeStatus::Reverted, reason),
				}
			}
		}
	}

	/// Settle from the buffer at the pre-committed rate.
	///
	/// Returns `Err` for failures that happened before anything moved, so the
	/// caller can decide between reverting and degrading.
	async fn run_guaranteed(
		&self,
		trade_id: TradeId,
		request: &SwapRequest,
	) -> std::result::Result<SwapResult, RouterError> {
		// Validation guarantees the rate is present and positive.
		let rate = request
			.guaranteed_rate
			.ok_or_else(|| RouterError::InvalidRequest("guaranteed_rate missing".into()))?;
		let amount_out = request.amount_in * rate;

		self.buffers.reserve(&request.token_out, amount_out)?;
		self.active.insert(trade_id, TradeStatus::Reserved);

		if Instant::now() >= request.deadline {
			self.release_buffer(&request.token_out, amount_out);
			return Ok(self.fail(
				trade_id,
				request,
				TradeStatus::Expired,
				RouterError::DeadlineExpired,
			));
		}

		if let Err(reason) = self
			.ledger
			.debit(&request.account, &request.token_in, request.amount_in)
			.await
		{
			self.release_buffer(&request.token_out, amount_out);
			return Ok(self.fail(trade_id, request, TradeStatus::Reverted, reason));
		}
		if let Err(reason) = self
			.ledger
			.credit(&request.account, &request.token_out, amount_out)
			.await
		{
			// Put the debit back before reverting; the buffer is untouched.
			if let Err(error) = self
				.ledger
				.credit(&request.account, &request.token_in, request.amount_in)
				.await
			{
				error!(trade = %trade_id, %error, "Failed to restore debit after credit failure");
			}
			self.release_buffer(&request.token_out, amount_out);
			return Ok(self.fail(trade_id, request, TradeStatus::Reverted, reason));
		}

		if let Err(error) = self.buffers.commit(&request.token_out, amount_out) {
			error!(trade = %trade_id, %error, "Buffer commit failed after ledger settlement");
		}
		// The input side replenishes its buffer when one is configured.
		self.buffers.deposit(&request.token_in, request.amount_in);

		info!(trade = %trade_id, %amount_out, "Settled guaranteed trade from buffer");
		Ok(SwapResult {
			trade_id,
			token_in: request.token_in.clone(),
			token_out: request.token_out.clone(),
			amount_in: request.amount_in,
			amount_out,
			realized_rate: rate,
			slippage: Decimal::ZERO,
			fees_paid: Decimal::ZERO,
			gas_paid: Decimal::ZERO,
			routes_used: vec![],
			status: TradeStatus::Settled,
			failure: None,
			settled_at: unix_now(),
		})
	}

	async fn run_best_effort(&self, trade_id: TradeId, request: &SwapRequest) -> SwapResult {
		self.active.insert(trade_id, TradeStatus::Quoted);
		let route = match self
			.finder
			.find(
				&request.token_in,
				&request.token_out,
				request.amount_in,
				request.max_slippage,
			)
			.await
		{
			Ok(route) => route,
			Err(reason) => return self.fail(trade_id, request, TradeStatus::Reverted, reason),
		};

		self.execute_route(trade_id, request, route).await
	}

	/// Execute a specific route for a request. An expired route is re-quoted
	/// once rather than executed on stale prices; the fresh route then has to
	/// satisfy the same output bound.
	pub async fn execute_route(
		&self,
		trade_id: TradeId,
		request: &SwapRequest,
		route: Route,
	) -> SwapResult {
		let route = if route.is_expired() {
			debug!(trade = %trade_id, route = %route.id, "Route expired, re-quoting");
			match self
				.finder
				.find(
					&request.token_in,
					&request.token_out,
					request.amount_in,
					request.max_slippage,
				)
				.await
			{
				Ok(fresh) => fresh,
				Err(reason) => {
					return self.fail(trade_id, request, TradeStatus::Reverted, reason)
				}
			}
		} else {
			route
		};

		let config = self.config.load();
		let max_slippage = request
			.max_slippage
			.unwrap_or(config.routing.default_max_slippage);
		let min_out = request
			.min_amount_out
			.unwrap_or_else(|| route.total_expected_out * (Decimal::ONE - max_slippage));

		self.active.insert(trade_id, TradeStatus::Executing);

		// Reserve phase: lock every step, no external effect yet.
		let (reserved, total_out) = match self
			.reserve_route(&route, config.execution.step_tolerance)
			.await
		{
			Ok(outcome) => outcome,
			Err(reason) => {
				let status = if reason == RouterError::DeadlineExpired {
					TradeStatus::Expired
				} else {
					TradeStatus::Reverted
				};
				return self.fail(trade_id, request, status, reason);
			}
		};

		// The aggregate bound and the deadline are checked while everything
		// is still abortable.
		if total_out < min_out {
			self.abort_all(reserved).await;
			return self.fail(
				trade_id,
				request,
				TradeStatus::Reverted,
				RouterError::SlippageExceeded { bound: min_out, realized: total_out },
			);
		}
		if Instant::now() >= request.deadline {
			self.abort_all(reserved).await;
			return self.fail(
				trade_id,
				request,
				TradeStatus::Expired,
				RouterError::DeadlineExpired,
			);
		}

		// The commit step of the Settled transition. The ledger half runs
		// first, while every reservation is still abortable: a refusal
		// unwinds to net zero and the trade reverts with no external effect.
		// Source commits follow and cannot fail.
		if let Err(reason) = self
			.ledger
			.debit(&request.account, &request.token_in, request.amount_in)
			.await
		{
			self.abort_all(reserved).await;
			return self.fail(trade_id, request, TradeStatus::Reverted, reason);
		}
		if let Err(reason) = self
			.ledger
			.credit(&request.account, &request.token_out, total_out)
			.await
		{
			if let Err(error) = self
				.ledger
				.credit(&request.account, &request.token_in, request.amount_in)
				.await
			{
				error!(trade = %trade_id, %error, "Failed to restore debit after credit failure");
			}
			self.abort_all(reserved).await;
			return self.fail(trade_id, request, TradeStatus::Reverted, reason);
		}

		let fills = self.commit_all(trade_id, reserved).await;

		let fees_paid: Decimal = fills.iter().map(|(_, f)| f.fee_paid).sum();
		let gas_paid: Decimal = fills.iter().map(|(_, f)| f.gas_used).sum();
		let slippage = if route.total_expected_out > Decimal::ZERO {
			((route.total_expected_out - total_out) / route.total_expected_out)
				.max(Decimal::ZERO)
		} else {
			Decimal::ZERO
		};

		info!(
			trade = %trade_id,
			route = %route.id,
			amount_out = %total_out,
			%slippage,
			"Settled trade"
		);
		SwapResult {
			trade_id,
			token_in: request.token_in.clone(),
			token_out: request.token_out.clone(),
			amount_in: request.amount_in,
			amount_out: total_out,
			realized_rate: total_out / request.amount_in,
			slippage,
			fees_paid,
			gas_paid,
			routes_used: vec![route.id],
			status: TradeStatus::Settled,
			failure: None,
			settled_at: unix_now(),
		}
	}

	/// Reserve every step of the route in order. Later hops are scaled to the
	/// realized output of the hop before them; each leg's reservation must
	/// stay within the per-step tolerance of its scaled expectation. On any
	/// failure, everything reserved so far is aborted.
	async fn reserve_route(
		&self,
		route: &Route,
		tolerance: Decimal,
	) -> std::result::Result<(Vec<ReservedStep>, Decimal), RouterError> {
		let mut reserved: Vec<ReservedStep> = Vec::new();
		let mut carried = route.amount_in;

		for hop in &route.hops {
			if hop.amount_in.is_zero() || hop.legs.is_empty() {
				self.abort_all(reserved).await;
				return Err(RouterError::InvalidRequest("malformed route hop".into()));
			}
			let factor = carried / hop.amount_in;
			let mut hop_out = Decimal::ZERO;
			let mut remaining = carried;

			for (index, leg) in hop.legs.iter().enumerate() {
				// The last leg absorbs scaling remainders so hop inputs are
				// conserved exactly.
				let amount_in = if index + 1 == hop.legs.len() {
					remaining
				} else {
					leg.amount_in * factor
				};
				let planned_out = leg.expected_amount_out * factor;
				let min_out = planned_out * (Decimal::ONE - tolerance);

				let snapshot = match self.registry.get(leg.source) {
					Some(snapshot) if self.registry.is_active(leg.source) => snapshot,
					_ => {
						self.abort_all(reserved).await;
						return Err(RouterError::SourceUnavailable(format!(
							"source {} no longer active",
							leg.source
						)));
					}
				};

				match snapshot
					.source
					.reserve(&leg.token_in, &leg.token_out, amount_in, min_out)
					.await
				{
					Ok(reservation) => {
						hop_out += reservation.amount_out;
						reserved.push(ReservedStep {
							source_id: leg.source,
							source: snapshot.source.clone(),
							reservation,
							planned_out,
						});
					}
					Err(reason) => {
						warn!(source = %leg.source, %reason, "Step reservation failed");
						self.metrics.record_failure(leg.source);
						self.abort_all(reserved).await;
						return Err(reason);
					}
				}
				remaining -= amount_in;
			}
			carried = hop_out;
		}

		Ok((reserved, carried))
	}

	async fn abort_all(&self, reserved: Vec<ReservedStep>) {
		for step in reserved {
			if let Err(error) = step.source.abort(step.reservation).await {
				error!(source = %step.source_id, %error, "Failed to abort reservation");
			}
		}
	}

	/// Commit every reservation. The source contract makes this infallible
	/// for live reservations; a violation is logged and the remaining steps
	/// are still committed, since partially aborting is no longer possible.
	async fn commit_all(
		&self,
		trade_id: TradeId,
		reserved: Vec<ReservedStep>,
	) -> Vec<(SourceId, StepFill)> {
		let mut fills = Vec::with_capacity(reserved.len());
		for step in reserved {
			match step.source.commit(step.reservation).await {
				Ok(fill) => {
					let step_slippage = if step.planned_out > Decimal::ZERO {
						((step.planned_out - fill.amount_out) / step.planned_out)
							.max(Decimal::ZERO)
					} else {
						Decimal::ZERO
					};
					self.metrics.record_settlement(
						step.source_id,
						fill.amount_in,
						step_slippage,
						fill.gas_used,
					);
					fills.push((step.source_id, fill));
				}
				Err(error) => {
					error!(
						trade = %trade_id,
						source = %step.source_id,
						%error,
						"Commit failed for a live reservation"
					);
					self.metrics.record_failure(step.source_id);
				}
			}
		}
		fills
	}

	fn release_buffer(&self, token: &router_types::TokenId, amount: Decimal) {
		if let Err(error) = self.buffers.release(token, amount) {
			error!(%token, %error, "Failed to release buffer reservation");
		}
	}

	fn fail(
		&self,
		trade_id: TradeId,
		request: &SwapRequest,
		status: TradeStatus,
		reason: RouterError,
	) -> SwapResult {
		warn!(trade = %trade_id, %reason, ?status, "Trade did not settle");
		SwapResult::failed(trade_id, request, status, reason)
	}
}

/// Plan a two-hop round trip from a detected opportunity: token_a sold on the
/// sell source at the observed bid, bought back on the buy source at the
/// observed ask. Expiry follows the opportunity's own freshness window.
fn round_trip_route(opportunity: &ArbitrageOpportunity) -> Route {
	let amount_in = opportunity.feasible_amount;
	let mid_amount = amount_in * opportunity.sell_price;
	let back_amount = mid_amount / opportunity.buy_price;

	Route {
		id: RouteId::new(),
		token_in: opportunity.token_a.clone(),
		token_out: opportunity.token_a.clone(),
		amount_in,
		hops: vec![
			RouteHop {
				token_in: opportunity.token_a.clone(),
				token_out: opportunity.token_b.clone(),
				amount_in,
				legs: vec![RouteStep {
					source: opportunity.source_sell,
					token_in: opportunity.token_a.clone(),
					token_out: opportunity.token_b.clone(),
					amount_in,
					expected_amount_out: mid_amount,
					fee: Decimal::ZERO,
					gas_estimate: Decimal::ZERO,
				}],
			},
			RouteHop {
				token_in: opportunity.token_b.clone(),
				token_out: opportunity.token_a.clone(),
				amount_in: mid_amount,
				legs: vec![RouteStep {
					source: opportunity.source_buy,
					token_in: opportunity.token_b.clone(),
					token_out: opportunity.token_a.clone(),
					amount_in: mid_amount,
					expected_amount_out: back_amount,
					fee: Decimal::ZERO,
					gas_estimate: Decimal::ZERO,
				}],
			},
		],
		total_expected_out: back_amount,
		price_impact: Decimal::ZERO,
		gas_estimate: Decimal::ZERO,
		reliability: Decimal::ONE,
		quoted_at: opportunity.detected_at,
		expires_at: opportunity.expires_at,
	}
}
