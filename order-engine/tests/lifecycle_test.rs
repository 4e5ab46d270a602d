use oms::{
    AllocationMethod, AllocationRequest, AllocationStatus, CancelOrderRequest, CreateOrderRequest,
    ExecutionReport, InstrumentId, InstrumentSnapshot, LiquidityTier, ModifyOrderRequest,
    OrderQuery, OrderSide, OrderState, OrderStatus, OrderType, PortfolioSnapshot, TenantId,
    VenueType, VenueUpdate,
};
use order_engine::events::EventBus;
use order_engine::reference::ReferenceData;
use order_engine::store::MemoryStore;
use order_engine::{Collaborators, EngineConfig, ErrorKind, OmsError, OrderManager};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn setup() -> (OrderManager, Arc<ReferenceData>) {
    let reference = Arc::new(ReferenceData::new());
    reference
        .upsert_portfolio(PortfolioSnapshot::new("PF-1", "T1", dec!(1_000_000)))
        .unwrap();
    reference
        .upsert_instrument(
            InstrumentSnapshot::new("AAPL", dec!(50)).with_liquidity(LiquidityTier::High),
        )
        .unwrap();
    let manager = OrderManager::new(
        EngineConfig::default(),
        Collaborators::in_memory(
            Arc::new(MemoryStore::new()),
            reference.clone(),
            Arc::new(EventBus::new(64)),
        ),
    );
    (manager, reference)
}

fn order(quantity: Decimal) -> CreateOrderRequest {
    CreateOrderRequest::new("T1", "PF-1", "AAPL", OrderType::Market, OrderSide::Buy, quantity)
}

fn fill(order_id: oms::OrderId, price: Decimal, quantity: Decimal) -> ExecutionReport {
    ExecutionReport::new(order_id, price, quantity, "XNAS", VenueType::Exchange)
}

#[test]
fn test_small_market_order_scenario() {
    let (manager, _) = setup();

    let report = manager.validate_order(&order(dec!(100))).unwrap();
    assert!(report.is_valid);
    assert!(report.warnings.is_empty());
    assert_eq!(report.order_value, Some(dec!(5000)));
    assert!((report.risk_score.unwrap() - 10.5).abs() < 1e-9);

    let created = manager.create_order(order(dec!(100))).unwrap();
    assert_eq!(created.status(), OrderStatus::New);
    assert_eq!(created.state(), OrderState::Validated);
}

#[test]
fn test_two_fills_weighted_average() {
    let (manager, _) = setup();
    let created = manager.create_order(order(dec!(150))).unwrap();

    manager.record_execution(fill(created.id(), dec!(10), dec!(100))).unwrap();
    let partial = manager.get_order_by_id(created.id()).unwrap();
    assert_eq!(partial.status(), OrderStatus::PartiallyFilled);
    assert_eq!(partial.state(), OrderState::Working);

    manager.record_execution(fill(created.id(), dec!(12), dec!(50))).unwrap();
    let filled = manager.get_order_by_id(created.id()).unwrap();
    assert_eq!(filled.filled_quantity(), dec!(150));
    assert_eq!(filled.remaining_quantity(), dec!(0));
    assert_eq!(filled.status(), OrderStatus::Filled);
    assert_eq!(filled.average_fill_price().unwrap().round_dp(2), dec!(10.67));

    // Reconstructible from the execution list.
    let executions = manager.executions_for(created.id()).unwrap();
    let notional: Decimal = executions.iter().map(|e| e.notional()).sum();
    let quantity: Decimal = executions.iter().map(|e| e.quantity()).sum();
    assert_eq!(filled.average_fill_price(), Some(notional / quantity));
}

#[test]
fn test_terminal_orders_refuse_modify_and_cancel() {
    let (manager, _) = setup();

    let filled = manager.create_order(order(dec!(10))).unwrap();
    manager.record_execution(fill(filled.id(), dec!(50), dec!(10))).unwrap();

    let cancelled = manager.create_order(order(dec!(10))).unwrap();
    manager
        .cancel_order(cancelled.id(), CancelOrderRequest::default())
        .unwrap();
    manager
        .apply_venue_update(cancelled.id(), VenueUpdate::CancelConfirmed)
        .unwrap();

    for id in [filled.id(), cancelled.id()] {
        let before = manager.get_order_by_id(id).unwrap();
        let modify = manager
            .modify_order(id, ModifyOrderRequest::quantity(dec!(5)))
            .unwrap_err();
        let cancel = manager
            .cancel_order(id, CancelOrderRequest::default())
            .unwrap_err();
        assert_eq!(modify.kind(), ErrorKind::Conflict);
        assert_eq!(cancel.kind(), ErrorKind::Conflict);
        assert_eq!(manager.get_order_by_id(id).unwrap().version(), before.version());
    }
}

#[test]
fn test_proportional_block_allocation() {
    let (manager, _) = setup();
    let request = order(dec!(100)).with_allocations(
        AllocationMethod::Proportional,
        vec![
            AllocationRequest::new("ACC-60", dec!(60)),
            AllocationRequest::new("ACC-40", dec!(40)),
        ],
    );
    let created = manager.create_order(request).unwrap();

    manager.record_execution(fill(created.id(), dec!(50), dec!(50))).unwrap();
    let allocated: Vec<Decimal> = manager
        .allocations_for(created.id())
        .unwrap()
        .iter()
        .map(|a| a.allocated_quantity())
        .collect();
    assert_eq!(allocated, vec![dec!(30), dec!(20)]);

    manager.record_execution(fill(created.id(), dec!(50), dec!(50))).unwrap();
    let allocations = manager.allocations_for(created.id()).unwrap();
    assert_eq!(
        allocations.iter().map(|a| a.allocated_quantity()).collect::<Vec<_>>(),
        vec![dec!(60), dec!(40)]
    );
    assert!(allocations
        .iter()
        .all(|a| a.status() == AllocationStatus::Allocated));
}

#[test]
fn test_restricted_instrument_never_reaches_new() {
    let (manager, reference) = setup();
    reference
        .restrict(TenantId::new("T1"), InstrumentId::new("AAPL"))
        .unwrap();

    let err = manager.create_order(order(dec!(10))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ComplianceBlock);
    let OmsError::ComplianceBlocked { order_id, .. } = err else {
        unreachable!();
    };

    let suspended = manager.get_order_by_id(order_id).unwrap();
    assert_eq!(suspended.status(), OrderStatus::Suspended);
    assert_eq!(suspended.state(), OrderState::Failed);
    assert!(manager
        .record_execution(fill(order_id, dec!(50), dec!(1)))
        .is_err());
    assert_eq!(
        manager
            .search_orders(&OrderQuery::for_tenant("T1").statuses([OrderStatus::New]))
            .unwrap()
            .len(),
        0
    );
}

#[test]
fn test_modify_below_filled_is_not_truncated() {
    let (manager, _) = setup();
    let created = manager.create_order(order(dec!(100))).unwrap();
    manager.record_execution(fill(created.id(), dec!(50), dec!(70))).unwrap();

    for quantity in [dec!(70), dec!(40)] {
        let err = manager
            .modify_order(created.id(), ModifyOrderRequest::quantity(quantity))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    let unchanged = manager.get_order_by_id(created.id()).unwrap();
    assert_eq!(unchanged.quantity(), dec!(100));
    assert_eq!(unchanged.remaining_quantity(), dec!(30));
}

#[test]
fn test_duplicate_trade_id_is_not_reapplied() {
    let (manager, _) = setup();
    let created = manager.create_order(order(dec!(100))).unwrap();
    let report = fill(created.id(), dec!(50), dec!(25)).with_trade_id("TRADE-1");

    let first = manager.record_execution(report.clone()).unwrap();
    let second = manager.record_execution(report).unwrap();

    assert_eq!(first.id(), second.id());
    let after = manager.get_order_by_id(created.id()).unwrap();
    assert_eq!(after.filled_quantity(), dec!(25));
    assert_eq!(manager.executions_for(created.id()).unwrap().len(), 1);
}

#[test]
fn test_expired_order_is_terminal() {
    let (manager, _) = setup();
    let created = manager.create_order(order(dec!(100))).unwrap();
    manager.record_execution(fill(created.id(), dec!(50), dec!(10))).unwrap();

    let expired = manager
        .apply_venue_update(created.id(), VenueUpdate::Expired)
        .unwrap();
    assert_eq!(expired.status(), OrderStatus::Expired);
    assert_eq!(expired.state(), OrderState::Completed);
    assert_eq!(expired.filled_quantity(), dec!(10));

    let err = manager
        .record_execution(fill(created.id(), dec!(50), dec!(10)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}
