pub mod locks;

#[cfg(test)]
mod tests;

use crate::allocation::AllocationEngine;
use crate::best_execution::{BestExecutionAnalyzer, BestExecutionReport};
use crate::compliance::PreTradeComplianceGate;
use crate::config::EngineConfig;
use crate::error::{OmsError, Result};
use crate::execution::ExecutionRecorder;
use crate::reference::ReferenceData;
use crate::store::MemoryStore;
use crate::validator::{OrderDraft, OrderValidator, ValidationContext, ValidationReport};
use chrono::{DateTime, Utc};
use locks::{OrderLocks, VersionedWriter};
use log::{info, warn};
use oms::{
    AllocationRepository, AllocationRequest, CancelOrderRequest, ClientOrderId,
    ComplianceProvider, CreateOrderRequest, EventPublisher, ExecutionReport, ExecutionRepository,
    InstrumentLookup, InstrumentSnapshot, MarketDataProvider, ModifyOrderRequest, Order,
    OrderAllocation, OrderEvent, OrderEventKind, OrderExecution, OrderId, OrderQuery,
    OrderRepository, OrderState, OrderStatus, PortfolioLookup, PortfolioSnapshot,
    RepositoryError, TenantId, VenueUpdate,
};
use std::sync::Arc;
use uuid::Uuid;

/// Everything the engine talks to, injected at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub orders: Arc<dyn OrderRepository>,
    pub executions: Arc<dyn ExecutionRepository>,
    pub allocations: Arc<dyn AllocationRepository>,
    pub portfolios: Arc<dyn PortfolioLookup>,
    pub instruments: Arc<dyn InstrumentLookup>,
    pub compliance: Arc<dyn ComplianceProvider>,
    pub market_data: Arc<dyn MarketDataProvider>,
    pub publisher: Arc<dyn EventPublisher>,
}

impl Collaborators {
    /// Wires the in-memory store and reference data.
    pub fn in_memory(
        store: Arc<MemoryStore>,
        reference: Arc<ReferenceData>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            orders: store.clone(),
            executions: store.clone(),
            allocations: store,
            portfolios: reference.clone(),
            instruments: reference.clone(),
            compliance: reference.clone(),
            market_data: reference,
            publisher,
        }
    }
}

/// The order management core.
///
/// Owns the order lifecycle: every mutation of an order goes through one of
/// the operations below, runs under that order's lock, is persisted with a
/// version check and then announced on the publisher. Reference data and
/// compliance are consulted before the lock is taken.
pub struct OrderManager {
    config: EngineConfig,
    orders: Arc<dyn OrderRepository>,
    executions: Arc<dyn ExecutionRepository>,
    allocations: Arc<dyn AllocationRepository>,
    portfolios: Arc<dyn PortfolioLookup>,
    instruments: Arc<dyn InstrumentLookup>,
    publisher: Arc<dyn EventPublisher>,
    validator: OrderValidator,
    gate: PreTradeComplianceGate,
    allocation_engine: AllocationEngine,
    writer: Arc<VersionedWriter>,
    recorder: ExecutionRecorder,
    analyzer: BestExecutionAnalyzer,
}

impl OrderManager {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            orders,
            executions,
            allocations,
            portfolios,
            instruments,
            compliance,
            market_data,
            publisher,
        } = collaborators;

        let writer = Arc::new(VersionedWriter::new(
            orders.clone(),
            OrderLocks::new(config.concurrency.lock_prune_threshold),
            config.concurrency.max_version_retries,
        ));
        let recorder = ExecutionRecorder::new(
            orders.clone(),
            executions.clone(),
            allocations.clone(),
            writer.clone(),
            config.settlement_days,
        );

        Self {
            validator: OrderValidator::with_default_checks(config.risk.clone(), config.costs.clone()),
            gate: PreTradeComplianceGate::new(compliance),
            allocation_engine: AllocationEngine::new(),
            analyzer: BestExecutionAnalyzer::new(market_data, config.best_execution.clone()),
            writer,
            recorder,
            orders,
            executions,
            allocations,
            portfolios,
            instruments,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates, gates and stores a new order.
    ///
    /// # Arguments
    ///
    /// * `request` - The order to create.
    ///
    /// # Returns
    ///
    /// * `Order` - The stored order in `NEW` / `VALIDATED`.
    ///
    /// A blocked order is still stored, in `SUSPENDED` / `FAILED`, and the
    /// call fails with `ComplianceBlocked`. Validation failures store nothing.
    pub fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let now = Utc::now();
        let (portfolio, instrument) = self.resolve(&request)?;
        if portfolio.is_none() && !request.portfolio_id.is_blank() {
            return Err(OmsError::NotFound {
                entity: "portfolio",
                id: request.portfolio_id.to_string(),
            });
        }
        if instrument.is_none() && !request.instrument_id.is_blank() {
            return Err(OmsError::NotFound {
                entity: "instrument",
                id: request.instrument_id.to_string(),
            });
        }

        let report = self.validator.validate(
            &OrderDraft::from_request(&request),
            &ValidationContext::new(portfolio.as_ref(), instrument.as_ref(), now),
        );
        if !report.is_valid {
            warn!(
                "Rejected order for {} {}: {}",
                request.portfolio_id, request.instrument_id, report
            );
            return Err(OmsError::Validation(report));
        }

        let client_order_id = match request.client_order_id.clone().filter(|c| !c.is_blank()) {
            Some(id) => {
                if self
                    .orders
                    .find_by_client_order_id(&request.tenant_id, &id)?
                    .is_some()
                {
                    return Err(OmsError::DuplicateClientOrderId(id));
                }
                id
            }
            None => self.next_client_order_id(now),
        };
        let settlement_currency = request
            .settlement_currency
            .clone()
            .or_else(|| instrument.as_ref().map(|i| i.trading_currency.clone()))
            .unwrap_or_else(|| "USD".to_string());
        let order = Order::from_request(
            &request,
            client_order_id.clone(),
            instrument.as_ref().map(|i| i.last_price),
            settlement_currency,
            report.risk_score,
            now,
        );

        let allocations = match order.allocation_method() {
            Some(method) => self.allocation_engine.allocate(
                order.id(),
                order.quantity(),
                method,
                &request.allocations,
                now,
            )?,
            None => Vec::new(),
        };

        // The verdict is known before the order becomes visible, and the
        // order stays under its lock until the verdict is applied.
        let result = self.gate.check(&order);
        let order_id = order.id();
        let (stored, gated) = self.writer.locks().with_lock(order_id, || -> Result<(Order, Order)> {
            let stored = self.orders.insert(&order, &allocations).map_err(|e| match e {
                RepositoryError::Duplicate(_) => {
                    OmsError::DuplicateClientOrderId(client_order_id.clone())
                }
                other => other.into(),
            })?;

            let now = Utc::now();
            let mut next = stored.clone();
            next.attach_compliance_flags(&result.flags);
            let advanced = if result.passed {
                next.advance(OrderStatus::New, OrderState::Validated, now)
            } else {
                next.advance_with_reason(
                    OrderStatus::Suspended,
                    OrderState::Failed,
                    "blocked by pre-trade compliance",
                    now,
                )
            };
            advanced.map_err(|e| OmsError::from_transition(order_id, e))?;
            let gated = self.orders.update(&next, stored.version())?;
            Ok((stored, gated))
        })?;

        info!(
            "Created order {} ({}): {:?} {:?} {} {} risk score {:?}",
            stored.client_order_id(),
            stored.id(),
            stored.side(),
            stored.order_type(),
            stored.quantity(),
            stored.instrument_id(),
            stored.risk_score()
        );
        self.publish(
            &stored,
            OrderEventKind::OrderCreated {
                status: stored.status(),
                state: stored.state(),
                quantity: stored.quantity(),
            },
        );

        info!(
            "Order {} is {}/{} after pre-trade compliance",
            gated.client_order_id(),
            gated.status(),
            gated.state()
        );
        self.publish(
            &gated,
            OrderEventKind::PreTradeCheckCompleted {
                passed: result.passed,
                flags: result.flags.clone(),
            },
        );

        if result.passed {
            Ok(gated)
        } else {
            Err(OmsError::ComplianceBlocked {
                order_id,
                flags: result.blocking_flags(),
            })
        }
    }

    /// Changes quantity and/or prices of a working order.
    ///
    /// The amended order is re-validated against current reference data. A
    /// new quantity at or below what is already filled is rejected.
    pub fn modify_order(&self, order_id: OrderId, request: ModifyOrderRequest) -> Result<Order> {
        let snapshot = self.get_order_by_id(order_id)?;
        let portfolio = self
            .portfolios
            .portfolio(snapshot.portfolio_id(), snapshot.tenant_id())?;
        let instrument = self
            .instruments
            .instrument(snapshot.instrument_id(), snapshot.tenant_id())?;

        let (stored, amendment) = self.writer.run(order_id, |current| {
            let now = Utc::now();
            let mut next = current.clone();
            let amendment = next
                .amend(
                    request.quantity,
                    request.limit_price,
                    request.stop_price,
                    request.modified_by.clone(),
                    now,
                )
                .map_err(|e| OmsError::from_amend(order_id, current.status(), e))?;

            let splits: Vec<AllocationRequest> = self
                .allocations
                .list_for_order(order_id)?
                .iter()
                .map(|a| {
                    AllocationRequest::new(a.account_id().as_str(), a.requested_quantity())
                        .with_priority(a.priority())
                })
                .collect();
            let report = self.validator.validate(
                &OrderDraft::from_order(&next, splits),
                &ValidationContext::new(portfolio.as_ref(), instrument.as_ref(), now),
            );
            if !report.is_valid {
                return Err(OmsError::Validation(report));
            }
            next.rescore(report.risk_score);

            let stored = self.orders.update(&next, current.version())?;
            Ok((stored, amendment))
        })
        .inspect_err(|e| warn!("Modify of order {} rejected: {}", order_id, e))?;

        info!(
            "Modified order {}: quantity {} -> {}, limit {:?} -> {:?}, risk score {:?}",
            stored.client_order_id(),
            amendment.old_quantity,
            amendment.new_quantity,
            amendment.old_limit_price,
            amendment.new_limit_price,
            stored.risk_score()
        );
        self.publish(&stored, OrderEventKind::OrderModified { amendment });
        Ok(stored)
    }

    /// Moves a working order to `PENDING_CANCEL` until the venue confirms.
    ///
    /// Quantity already filled stays filled; the cancel covers the remainder.
    pub fn cancel_order(&self, order_id: OrderId, request: CancelOrderRequest) -> Result<Order> {
        let stored = self
            .writer
            .run(order_id, |current| {
                if !current.status().is_modifiable() {
                    return Err(OmsError::conflict(
                        order_id,
                        current.status(),
                        format!("order cannot be cancelled in status {}", current.status()),
                    ));
                }
                let mut next = current.clone();
                next.request_cancel(request.cancelled_by.clone(), request.reason.clone(), Utc::now())
                    .map_err(|e| OmsError::from_transition(order_id, e))?;
                Ok(self.orders.update(&next, current.version())?)
            })
            .inspect_err(|e| warn!("Cancel of order {} rejected: {}", order_id, e))?;

        info!(
            "Cancel requested for order {} with {} of {} filled",
            stored.client_order_id(),
            stored.filled_quantity(),
            stored.quantity()
        );
        self.publish(
            &stored,
            OrderEventKind::OrderCancelRequested {
                reason: request.reason,
            },
        );
        Ok(stored)
    }

    /// Applies a fill report. See [`ExecutionRecorder::record`].
    pub fn record_execution(&self, report: ExecutionReport) -> Result<OrderExecution> {
        let fill = self.recorder.record(&report)?;
        if !fill.duplicate {
            self.publish(
                &fill.order,
                OrderEventKind::OrderExecution {
                    execution_id: fill.execution.id(),
                    price: fill.execution.price(),
                    quantity: fill.execution.quantity(),
                    filled_quantity: fill.order.filled_quantity(),
                    remaining_quantity: fill.order.remaining_quantity(),
                    average_fill_price: fill.order.average_fill_price(),
                    status: fill.order.status(),
                },
            );
        }
        Ok(fill.execution)
    }

    /// Applies an acknowledgement from the venue.
    pub fn apply_venue_update(&self, order_id: OrderId, update: VenueUpdate) -> Result<Order> {
        let (stored, from) = self
            .writer
            .run(order_id, |current| {
                let now = Utc::now();
                let mut next = current.clone();
                let status = current.status();
                let advanced = match &update {
                    VenueUpdate::Submitted => next.advance(status, OrderState::Submitted, now),
                    VenueUpdate::Acknowledged => next.advance(status, OrderState::Acknowledged, now),
                    VenueUpdate::CancelConfirmed => {
                        next.advance(OrderStatus::Canceled, OrderState::Completed, now)
                    }
                    VenueUpdate::Rejected { reason } => next.advance_with_reason(
                        OrderStatus::Rejected,
                        OrderState::Failed,
                        reason.clone(),
                        now,
                    ),
                    VenueUpdate::Expired => next.advance(OrderStatus::Expired, OrderState::Completed, now),
                };
                advanced.map_err(|e| OmsError::from_transition(order_id, e))?;

                let stored = self.orders.update(&next, current.version())?;
                if stored.status().is_terminal() {
                    self.finalize_allocations(order_id, now)?;
                }
                Ok((stored, status))
            })
            .inspect_err(|e| warn!("Venue update {:?} for order {} rejected: {}", update, order_id, e))?;

        info!(
            "Order {} {} -> {}/{} on venue update",
            stored.client_order_id(),
            from,
            stored.status(),
            stored.state()
        );
        let reason = match update {
            VenueUpdate::Rejected { reason } => Some(reason),
            _ => None,
        };
        self.publish(
            &stored,
            OrderEventKind::OrderStatusChanged {
                from,
                to: stored.status(),
                state: stored.state(),
                reason,
            },
        );
        Ok(stored)
    }

    /// Runs the validator without storing anything.
    pub fn validate_order(&self, request: &CreateOrderRequest) -> Result<ValidationReport> {
        let (portfolio, instrument) = self.resolve(request)?;
        Ok(self.validator.validate(
            &OrderDraft::from_request(request),
            &ValidationContext::new(portfolio.as_ref(), instrument.as_ref(), Utc::now()),
        ))
    }

    pub fn search_orders(&self, query: &OrderQuery) -> Result<Vec<Order>> {
        Ok(self.orders.search(query)?)
    }

    pub fn get_order_by_id(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get(order_id)?
            .ok_or_else(|| OmsError::order_not_found(order_id))
    }

    pub fn get_order_by_client_id(
        &self,
        tenant_id: &TenantId,
        client_order_id: &ClientOrderId,
    ) -> Result<Order> {
        self.orders
            .find_by_client_order_id(tenant_id, client_order_id)?
            .ok_or_else(|| OmsError::NotFound {
                entity: "order",
                id: client_order_id.to_string(),
            })
    }

    pub fn executions_for(&self, order_id: OrderId) -> Result<Vec<OrderExecution>> {
        self.get_order_by_id(order_id)?;
        Ok(self.executions.list_for_order(order_id)?)
    }

    pub fn allocations_for(&self, order_id: OrderId) -> Result<Vec<OrderAllocation>> {
        self.get_order_by_id(order_id)?;
        Ok(self.allocations.list_for_order(order_id)?)
    }

    /// Execution quality of an order against the market around its lifetime.
    pub fn generate_best_execution_report(&self, order_id: OrderId) -> Result<BestExecutionReport> {
        let order = self.get_order_by_id(order_id)?;
        let executions = self.executions.list_for_order(order_id)?;
        Ok(self.analyzer.analyze(&order, &executions))
    }

    fn resolve(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<(Option<PortfolioSnapshot>, Option<InstrumentSnapshot>)> {
        let portfolio = self
            .portfolios
            .portfolio(&request.portfolio_id, &request.tenant_id)?;
        let instrument = self
            .instruments
            .instrument(&request.instrument_id, &request.tenant_id)?;
        Ok((portfolio, instrument))
    }

    fn finalize_allocations(&self, order_id: OrderId, now: DateTime<Utc>) -> Result<()> {
        let mut allocations = self.allocations.list_for_order(order_id)?;
        if allocations.is_empty() {
            return Ok(());
        }
        self.allocation_engine.finalize(&mut allocations, now);
        self.allocations.update_all(&allocations)?;
        Ok(())
    }

    /// `<prefix>-<yyyymmdd>-<8 hex>`.
    fn next_client_order_id(&self, now: DateTime<Utc>) -> ClientOrderId {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        ClientOrderId::new(format!(
            "{}-{}-{}",
            self.config.client_order_id_prefix,
            now.format("%Y%m%d"),
            suffix
        ))
    }

    fn publish(&self, order: &Order, kind: OrderEventKind) {
        let event = OrderEvent::for_order(order, kind);
        let name = event.name();
        if let Err(e) = self.publisher.publish(event) {
            warn!("Failed to publish {} for order {}: {}", name, order.id(), e);
        }
    }
}
