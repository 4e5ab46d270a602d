use crate::allocation::AllocationEngine;
use crate::engine::locks::VersionedWriter;
use crate::error::{OmsError, Result};
use chrono::Utc;
use log::{info, warn};
use oms::model::order::FillOutcome;
use oms::{
    AllocationRepository, ExecutionReport, ExecutionRepository, Order, OrderExecution,
    OrderRepository,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Result of applying one execution report.
#[derive(Debug, Clone)]
pub struct RecordedFill {
    pub execution: OrderExecution,
    /// The order as persisted after the fill.
    pub order: Order,
    pub outcome: Option<FillOutcome>,
    /// The report repeated an already recorded trade id; nothing was applied.
    pub duplicate: bool,
}

/// Applies fill reports to orders and their allocations.
pub struct ExecutionRecorder {
    orders: Arc<dyn OrderRepository>,
    executions: Arc<dyn ExecutionRepository>,
    allocations: Arc<dyn AllocationRepository>,
    writer: Arc<VersionedWriter>,
    engine: AllocationEngine,
    settlement_days: u32,
}

impl ExecutionRecorder {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        executions: Arc<dyn ExecutionRepository>,
        allocations: Arc<dyn AllocationRepository>,
        writer: Arc<VersionedWriter>,
        settlement_days: u32,
    ) -> Self {
        Self {
            orders,
            executions,
            allocations,
            writer,
            engine: AllocationEngine::new(),
            settlement_days,
        }
    }

    /// Records a fill against its order.
    ///
    /// The execution, the updated order and the redistributed allocations are
    /// written in one versioned step under the order's lock, so fills of one
    /// order are applied in the order they are received.
    ///
    /// # Arguments
    ///
    /// * `report` - The venue's fill report.
    ///
    /// # Returns
    ///
    /// * `RecordedFill` - The stored execution and the order after the fill.
    ///   Fails with `NotFound` for an unknown order and `Conflict` when the
    ///   order does not accept the fill; the caller must retry or dead-letter
    ///   such reports.
    pub fn record(&self, report: &ExecutionReport) -> Result<RecordedFill> {
        if report.quantity <= Decimal::ZERO {
            return Err(OmsError::invalid(
                "Execution",
                Some("quantity"),
                format!("fill quantity must be positive, got {}", report.quantity),
            ));
        }
        if report.price <= Decimal::ZERO {
            return Err(OmsError::invalid(
                "Execution",
                Some("price"),
                format!("fill price must be positive, got {}", report.price),
            ));
        }

        let order_id = report.order_id;
        let recorded = self.writer.run(order_id, |current| {
            if let Some(trade_id) = report.trade_id.as_deref() {
                if let Some(existing) = self.executions.find_by_trade_id(order_id, trade_id)? {
                    return Ok(RecordedFill {
                        execution: existing,
                        order: current,
                        outcome: None,
                        duplicate: true,
                    });
                }
            }

            let now = Utc::now();
            let mut next = current.clone();
            let outcome = next
                .apply_fill(report.price, report.quantity, now)
                .map_err(|e| OmsError::from_fill(order_id, current.status(), e))?;

            let execution = OrderExecution::new(
                order_id,
                current.tenant_id().clone(),
                report.price,
                report.quantity,
                report.venue.clone(),
                report.venue_type,
                report.trade_id.clone(),
                report.executed_at.unwrap_or(now),
                self.settlement_days,
                report.reported_by.clone(),
            );

            let mut allocations = self.allocations.list_for_order(order_id)?;
            if let Some(method) = next.allocation_method().filter(|_| !allocations.is_empty()) {
                self.engine.distribute(
                    &mut allocations,
                    method,
                    next.filled_quantity(),
                    report.price,
                    now,
                );
                if outcome.completed {
                    self.engine.finalize(&mut allocations, now);
                }
            }

            let stored = self
                .orders
                .record_fill(&next, current.version(), &execution, &allocations)?;
            Ok(RecordedFill {
                execution,
                order: stored,
                outcome: Some(outcome),
                duplicate: false,
            })
        });

        match &recorded {
            Ok(fill) if fill.duplicate => info!(
                "Duplicate fill {} for order {} ignored",
                fill.execution.trade_id(),
                order_id
            ),
            Ok(fill) => info!(
                "Recorded fill {} @ {} on {} for order {}: filled {}/{} ({})",
                report.quantity,
                report.price,
                report.venue,
                fill.order.client_order_id(),
                fill.order.filled_quantity(),
                fill.order.quantity(),
                fill.order.status()
            ),
            Err(e) => warn!("Fill for order {} rejected: {}", order_id, e),
        }
        recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::locks::OrderLocks;
    use crate::store::MemoryStore;
    use oms::model::order::{OrderState, OrderStatus};
    use oms::{
        AllocationMethod, AllocationRequest, AllocationStatus, ClientOrderId, CreateOrderRequest,
        OrderSide, OrderType, VenueType,
    };
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<MemoryStore>,
        recorder: ExecutionRecorder,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let writer = Arc::new(VersionedWriter::new(store.clone(), OrderLocks::new(64), 3));
        let recorder = ExecutionRecorder::new(store.clone(), store.clone(), store.clone(), writer, 2);
        Fixture { store, recorder }
    }

    fn working_order(store: &MemoryStore, request: CreateOrderRequest) -> Order {
        let mut order =
            Order::from_request(&request, ClientOrderId::new("C-1"), None, "USD", None, Utc::now());
        order
            .advance(OrderStatus::New, OrderState::Validated, Utc::now())
            .unwrap();
        let allocations = match order.allocation_method() {
            Some(method) => AllocationEngine::new()
                .allocate(order.id(), order.quantity(), method, &request.allocations, Utc::now())
                .unwrap(),
            None => Vec::new(),
        };
        store.insert(&order, &allocations).unwrap()
    }

    fn buy(quantity: Decimal) -> CreateOrderRequest {
        CreateOrderRequest::new("T1", "PF-1", "AAPL", OrderType::Market, OrderSide::Buy, quantity)
    }

    #[test]
    fn fills_update_quantities_and_average() {
        let f = fixture();
        let order = working_order(&f.store, buy(dec!(150)));

        f.recorder
            .record(&ExecutionReport::new(order.id(), dec!(10), dec!(100), "XNAS", VenueType::Exchange))
            .unwrap();
        let last = f
            .recorder
            .record(&ExecutionReport::new(order.id(), dec!(12), dec!(50), "XNAS", VenueType::Exchange))
            .unwrap();

        assert_eq!(last.order.status(), OrderStatus::Filled);
        assert_eq!(last.order.state(), OrderState::Completed);
        assert_eq!(last.order.remaining_quantity(), dec!(0));
        assert_eq!(last.order.average_fill_price().unwrap().round_dp(2), dec!(10.67));
        assert_eq!(
            ExecutionRepository::list_for_order(f.store.as_ref(), order.id())
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn repeated_trade_id_is_applied_once() {
        let f = fixture();
        let order = working_order(&f.store, buy(dec!(100)));
        let report = ExecutionReport::new(order.id(), dec!(10), dec!(40), "XNAS", VenueType::Exchange)
            .with_trade_id("TR-1");

        let first = f.recorder.record(&report).unwrap();
        let second = f.recorder.record(&report).unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(second.execution.id(), first.execution.id());
        assert_eq!(second.order.filled_quantity(), dec!(40));
    }

    #[test]
    fn overfill_is_a_conflict() {
        let f = fixture();
        let order = working_order(&f.store, buy(dec!(10)));
        let err = f
            .recorder
            .record(&ExecutionReport::new(order.id(), dec!(10), dec!(11), "XNAS", VenueType::Exchange))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
    }

    #[test]
    fn unknown_order_is_not_found() {
        let f = fixture();
        let err = f
            .recorder
            .record(&ExecutionReport::new(
                oms::OrderId::new(),
                dec!(10),
                dec!(1),
                "XNAS",
                VenueType::Exchange,
            ))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn fills_are_distributed_to_allocations() {
        let f = fixture();
        let request = buy(dec!(100)).with_allocations(
            AllocationMethod::Proportional,
            vec![
                AllocationRequest::new("ACC-A", dec!(60)),
                AllocationRequest::new("ACC-B", dec!(40)),
            ],
        );
        let order = working_order(&f.store, request);

        f.recorder
            .record(&ExecutionReport::new(order.id(), dec!(10), dec!(50), "XNAS", VenueType::Exchange))
            .unwrap();
        let split: Vec<Decimal> = AllocationRepository::list_for_order(f.store.as_ref(), order.id())
            .unwrap()
            .iter()
            .map(|a| a.allocated_quantity())
            .collect();
        assert_eq!(split, vec![dec!(30), dec!(20)]);

        f.recorder
            .record(&ExecutionReport::new(order.id(), dec!(10), dec!(50), "XNAS", VenueType::Exchange))
            .unwrap();
        let allocations = AllocationRepository::list_for_order(f.store.as_ref(), order.id()).unwrap();
        assert!(allocations
            .iter()
            .all(|a| a.status() == AllocationStatus::Allocated));
        assert_eq!(
            allocations.iter().map(|a| a.allocated_quantity()).collect::<Vec<_>>(),
            vec![dec!(60), dec!(40)]
        );
    }
}
