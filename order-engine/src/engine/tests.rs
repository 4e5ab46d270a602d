use super::*;
use crate::error::ErrorKind;
use oms::{
    AllocationMethod, AllocationStatus, CollaboratorError, ComplianceFlagType,
    ConcentrationVerdict, InstrumentId, LiquidityTier, OrderSide, OrderType, Severity,
    TimeInForce, VenueType,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{mpsc, Mutex};
use std::thread;

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<OrderEvent>>,
}

impl RecordingPublisher {
    fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: OrderEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

struct FailingPublisher;

impl EventPublisher for FailingPublisher {
    fn publish(&self, _event: OrderEvent) -> anyhow::Result<()> {
        anyhow::bail!("broker down")
    }
}

struct TestManager {
    manager: OrderManager,
    reference: Arc<ReferenceData>,
    events: Arc<RecordingPublisher>,
}

fn create_test_manager() -> TestManager {
    let reference = Arc::new(ReferenceData::new());
    reference
        .upsert_portfolio(PortfolioSnapshot::new("PF-1", "T1", dec!(1_000_000)))
        .unwrap();
    reference
        .upsert_instrument(
            InstrumentSnapshot::new("AAPL", dec!(50)).with_liquidity(LiquidityTier::High),
        )
        .unwrap();
    let events = Arc::new(RecordingPublisher::default());
    let manager = OrderManager::new(
        EngineConfig::default(),
        Collaborators::in_memory(Arc::new(MemoryStore::new()), reference.clone(), events.clone()),
    );
    TestManager {
        manager,
        reference,
        events,
    }
}

fn market_buy(quantity: Decimal) -> CreateOrderRequest {
    CreateOrderRequest::new("T1", "PF-1", "AAPL", OrderType::Market, OrderSide::Buy, quantity)
}

fn fill(order_id: OrderId, price: Decimal, quantity: Decimal) -> ExecutionReport {
    ExecutionReport::new(order_id, price, quantity, "XNAS", VenueType::Exchange)
}

#[test]
fn test_create_small_market_order() {
    let t = create_test_manager();

    let order = t.manager.create_order(market_buy(dec!(100))).unwrap();

    assert_eq!(order.status(), OrderStatus::New);
    assert_eq!(order.state(), OrderState::Validated);
    assert_eq!(order.version(), 2);
    assert_eq!(order.arrival_price(), Some(dec!(50)));
    assert!((order.risk_score().unwrap() - 10.5).abs() < 1e-9);
    assert!(order.client_order_id().as_str().starts_with("ORD-"));
    assert_eq!(order.client_order_id().as_str().len(), "ORD-20260101-ABCDEF12".len());
    assert_eq!(t.events.names(), vec!["order-created", "pre-trade-check-completed"]);
}

#[test]
fn test_validation_failure_stores_nothing() {
    let t = create_test_manager();

    let err = t.manager.create_order(market_buy(dec!(0))).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(t
        .manager
        .search_orders(&OrderQuery::for_tenant("T1"))
        .unwrap()
        .is_empty());
    assert!(t.events.names().is_empty());
}

#[test]
fn test_unknown_portfolio_is_not_found() {
    let t = create_test_manager();
    let request =
        CreateOrderRequest::new("T1", "PF-404", "AAPL", OrderType::Market, OrderSide::Buy, dec!(1));

    let err = t.manager.create_order(request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_restricted_instrument_is_suspended() {
    let t = create_test_manager();
    t.reference
        .restrict(TenantId::new("T1"), InstrumentId::new("AAPL"))
        .unwrap();

    let err = t.manager.create_order(market_buy(dec!(10))).unwrap_err();

    let OmsError::ComplianceBlocked { order_id, flags } = err else {
        panic!("expected a compliance block, got {:?}", err);
    };
    assert_eq!(flags[0].flag_type, ComplianceFlagType::RestrictedInstrument);
    let order = t.manager.get_order_by_id(order_id).unwrap();
    assert_eq!(order.status(), OrderStatus::Suspended);
    assert_eq!(order.state(), OrderState::Failed);
    assert_eq!(order.compliance_flags().len(), 1);
}

/// Restricted-list lookup that holds the gate open until the test releases it.
struct HeldRestrictedList {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl ComplianceProvider for HeldRestrictedList {
    fn is_restricted(
        &self,
        _tenant_id: &TenantId,
        _instrument_id: &InstrumentId,
    ) -> std::result::Result<bool, CollaboratorError> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        Ok(true)
    }

    fn check_concentration(
        &self,
        _order: &Order,
    ) -> std::result::Result<ConcentrationVerdict, CollaboratorError> {
        Ok(ConcentrationVerdict::pass())
    }
}

#[test]
fn test_cancel_racing_the_gate_cannot_rescue_a_blocked_order() {
    let t = create_test_manager();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let mut collaborators = Collaborators::in_memory(
        Arc::new(MemoryStore::new()),
        t.reference.clone(),
        t.events.clone(),
    );
    collaborators.compliance = Arc::new(HeldRestrictedList {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let manager = Arc::new(OrderManager::new(EngineConfig::default(), collaborators));
    let tenant = TenantId::new("T1");
    let client_id = ClientOrderId::new("C-RACE");

    let creator = {
        let manager = manager.clone();
        thread::spawn(move || manager.create_order(market_buy(dec!(100)).with_client_order_id("C-RACE")))
    };
    entered_rx.recv().unwrap();

    // Not visible while compliance is still deciding.
    let err = manager.get_order_by_client_id(&tenant, &client_id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let canceller = {
        let manager = manager.clone();
        let (tenant, client_id) = (tenant.clone(), client_id.clone());
        thread::spawn(move || loop {
            if let Ok(order) = manager.get_order_by_client_id(&tenant, &client_id) {
                break manager.cancel_order(order.id(), CancelOrderRequest::default());
            }
            thread::yield_now();
        })
    };
    release_tx.send(()).unwrap();

    let created = creator.join().unwrap();
    let cancel = canceller.join().unwrap();
    let OmsError::ComplianceBlocked { order_id, .. } = created.unwrap_err() else {
        panic!("expected a compliance block");
    };
    assert_eq!(cancel.unwrap_err().kind(), ErrorKind::Conflict);

    let fill_err = manager
        .record_execution(fill(order_id, dec!(50), dec!(100)))
        .unwrap_err();
    assert_eq!(fill_err.kind(), ErrorKind::Conflict);

    let order = manager.get_order_by_id(order_id).unwrap();
    assert_eq!(order.status(), OrderStatus::Suspended);
    assert_eq!(order.state(), OrderState::Failed);
    assert_eq!(order.filled_quantity(), dec!(0));
}

#[test]
fn test_error_concentration_flag_does_not_block() {
    let t = create_test_manager();
    t.reference
        .set_concentration_verdict(
            TenantId::new("T1"),
            InstrumentId::new("AAPL"),
            ConcentrationVerdict::breach(Severity::Error, "sector limit"),
        )
        .unwrap();

    let order = t.manager.create_order(market_buy(dec!(10))).unwrap();

    assert_eq!(order.status(), OrderStatus::New);
    assert!(order.compliance_flags()[0].requires_approval);
}

#[test]
fn test_duplicate_client_order_id_conflicts() {
    let t = create_test_manager();
    t.manager
        .create_order(market_buy(dec!(1)).with_client_order_id("MY-1"))
        .unwrap();

    let err = t
        .manager
        .create_order(market_buy(dec!(1)).with_client_order_id("MY-1"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let found = t
        .manager
        .get_order_by_client_id(&TenantId::new("T1"), &ClientOrderId::new("MY-1"))
        .unwrap();
    assert_eq!(found.quantity(), dec!(1));
}

#[test]
fn test_fills_complete_the_order() {
    let t = create_test_manager();
    let order = t.manager.create_order(market_buy(dec!(150))).unwrap();

    t.manager.record_execution(fill(order.id(), dec!(10), dec!(100))).unwrap();
    t.manager.record_execution(fill(order.id(), dec!(12), dec!(50))).unwrap();

    let order = t.manager.get_order_by_id(order.id()).unwrap();
    assert_eq!(order.status(), OrderStatus::Filled);
    assert_eq!(order.filled_quantity(), dec!(150));
    assert_eq!(order.remaining_quantity(), dec!(0));
    assert_eq!(order.average_fill_price().unwrap().round_dp(2), dec!(10.67));
    assert_eq!(t.manager.executions_for(order.id()).unwrap().len(), 2);
    assert_eq!(
        t.events.names().iter().filter(|n| **n == "order-execution").count(),
        2
    );
}

#[test]
fn test_filled_order_rejects_modify_and_cancel() {
    let t = create_test_manager();
    let order = t.manager.create_order(market_buy(dec!(10))).unwrap();
    t.manager.record_execution(fill(order.id(), dec!(50), dec!(10))).unwrap();

    let modify = t
        .manager
        .modify_order(order.id(), ModifyOrderRequest::quantity(dec!(20)))
        .unwrap_err();
    let cancel = t
        .manager
        .cancel_order(order.id(), CancelOrderRequest::default())
        .unwrap_err();

    assert_eq!(modify.kind(), ErrorKind::Conflict);
    assert_eq!(cancel.kind(), ErrorKind::Conflict);
    assert_eq!(
        t.manager.get_order_by_id(order.id()).unwrap().status(),
        OrderStatus::Filled
    );
}

#[test]
fn test_modify_below_filled_is_rejected() {
    let t = create_test_manager();
    let order = t.manager.create_order(market_buy(dec!(100))).unwrap();
    t.manager.record_execution(fill(order.id(), dec!(50), dec!(60))).unwrap();

    let err = t
        .manager
        .modify_order(order.id(), ModifyOrderRequest::quantity(dec!(50)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let order = t
        .manager
        .modify_order(order.id(), ModifyOrderRequest::quantity(dec!(80)))
        .unwrap();
    assert_eq!(order.quantity(), dec!(80));
    assert_eq!(order.remaining_quantity(), dec!(20));
    assert!(order.quantities_balance());
}

#[test]
fn test_modify_rescores_the_order() {
    let t = create_test_manager();
    let order = t.manager.create_order(market_buy(dec!(100))).unwrap();
    assert!((order.risk_score().unwrap() - 10.5).abs() < 1e-9);

    // 2000 x 50 is 10% of the portfolio.
    let modified = t
        .manager
        .modify_order(order.id(), ModifyOrderRequest::quantity(dec!(2000)))
        .unwrap();

    assert!((modified.risk_score().unwrap() - 20.0).abs() < 1e-9);
    let stored = t.manager.get_order_by_id(order.id()).unwrap();
    assert_eq!(stored.risk_score(), modified.risk_score());
}

#[test]
fn test_modify_revalidates_prices() {
    let t = create_test_manager();
    let order = t.manager.create_order(market_buy(dec!(10))).unwrap();

    let err = t
        .manager
        .modify_order(order.id(), ModifyOrderRequest::limit_price(dec!(49)))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(t.manager.get_order_by_id(order.id()).unwrap().limit_price(), None);
}

#[test]
fn test_cancel_then_confirm() {
    let t = create_test_manager();
    let order = t.manager.create_order(market_buy(dec!(100))).unwrap();
    t.manager.record_execution(fill(order.id(), dec!(50), dec!(30))).unwrap();

    let pending = t
        .manager
        .cancel_order(
            order.id(),
            CancelOrderRequest {
                reason: Some("client request".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(pending.status(), OrderStatus::PendingCancel);
    assert_eq!(pending.state(), OrderState::Working);
    assert_eq!(pending.filled_quantity(), dec!(30));

    // A late partial fill still lands on the unfilled remainder.
    t.manager.record_execution(fill(order.id(), dec!(50), dec!(10))).unwrap();

    let cancelled = t
        .manager
        .apply_venue_update(order.id(), VenueUpdate::CancelConfirmed)
        .unwrap();
    assert_eq!(cancelled.status(), OrderStatus::Canceled);
    assert_eq!(cancelled.filled_quantity(), dec!(40));
    assert!(cancelled.quantities_balance());

    let err = t
        .manager
        .cancel_order(order.id(), CancelOrderRequest::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_venue_updates_move_forward_only() {
    let t = create_test_manager();
    let order = t.manager.create_order(market_buy(dec!(10))).unwrap();

    let submitted = t
        .manager
        .apply_venue_update(order.id(), VenueUpdate::Submitted)
        .unwrap();
    assert_eq!(submitted.state(), OrderState::Submitted);
    assert_eq!(submitted.status(), OrderStatus::New);

    t.manager
        .apply_venue_update(order.id(), VenueUpdate::Acknowledged)
        .unwrap();
    let err = t
        .manager
        .apply_venue_update(order.id(), VenueUpdate::Submitted)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = t
        .manager
        .apply_venue_update(order.id(), VenueUpdate::CancelConfirmed)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let rejected = t
        .manager
        .apply_venue_update(
            order.id(),
            VenueUpdate::Rejected {
                reason: "market closed".to_string(),
            },
        )
        .unwrap();
    assert_eq!(rejected.status(), OrderStatus::Rejected);
    assert_eq!(rejected.status_reason(), Some("market closed"));
}

#[test]
fn test_block_order_allocations() {
    let t = create_test_manager();
    let request = market_buy(dec!(100)).with_allocations(
        AllocationMethod::Proportional,
        vec![
            AllocationRequest::new("ACC-A", dec!(60)),
            AllocationRequest::new("ACC-B", dec!(40)),
        ],
    );
    let order = t.manager.create_order(request).unwrap();

    t.manager.record_execution(fill(order.id(), dec!(50), dec!(50))).unwrap();
    let split: Vec<Decimal> = t
        .manager
        .allocations_for(order.id())
        .unwrap()
        .iter()
        .map(|a| a.allocated_quantity())
        .collect();
    assert_eq!(split, vec![dec!(30), dec!(20)]);

    t.manager
        .cancel_order(order.id(), CancelOrderRequest::default())
        .unwrap();
    t.manager
        .apply_venue_update(order.id(), VenueUpdate::CancelConfirmed)
        .unwrap();
    let allocations = t.manager.allocations_for(order.id()).unwrap();
    assert!(allocations
        .iter()
        .all(|a| a.status() == AllocationStatus::Partial));
}

#[test]
fn test_validate_order_reports_without_storing() {
    let t = create_test_manager();
    let request = market_buy(dec!(10)).with_time_in_force(TimeInForce::Gtd, None);

    let report = t.manager.validate_order(&request).unwrap();

    assert!(!report.is_valid);
    assert_eq!(report.errors[0].check, "TimeInForce");
    assert!(t
        .manager
        .search_orders(&OrderQuery::for_tenant("T1"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_best_execution_report_for_filled_order() {
    let t = create_test_manager();
    let order = t.manager.create_order(market_buy(dec!(100))).unwrap();
    t.manager.record_execution(fill(order.id(), dec!(50), dec!(100))).unwrap();

    let report = t.manager.generate_best_execution_report(order.id()).unwrap();

    assert_eq!(report.fill_rate, 1.0);
    assert_eq!(report.arrival_price, Some(dec!(50)));
    assert_eq!(report.implementation_shortfall_bps, Some(0.0));
    assert!(report.benchmarks.is_none());
}

#[test]
fn test_publisher_failure_does_not_undo_transition() {
    let reference = Arc::new(ReferenceData::new());
    reference
        .upsert_portfolio(PortfolioSnapshot::new("PF-1", "T1", dec!(1_000_000)))
        .unwrap();
    reference
        .upsert_instrument(InstrumentSnapshot::new("AAPL", dec!(50)))
        .unwrap();
    let manager = OrderManager::new(
        EngineConfig::default(),
        Collaborators::in_memory(Arc::new(MemoryStore::new()), reference, Arc::new(FailingPublisher)),
    );

    let order = manager.create_order(market_buy(dec!(10))).unwrap();
    assert_eq!(order.status(), OrderStatus::New);
}

#[test]
fn test_unknown_order_operations_are_not_found() {
    let t = create_test_manager();
    let id = OrderId::new();
    assert_eq!(
        t.manager
            .record_execution(fill(id, dec!(1), dec!(1)))
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        t.manager
            .cancel_order(id, CancelOrderRequest::default())
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        t.manager.executions_for(id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}
