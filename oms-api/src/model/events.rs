//! Outbound notifications, one per applied transition.

use super::compliance::ComplianceFlag;
use super::ids::{ClientOrderId, ExecutionId, OrderId, TenantId};
use super::order::{Amendment, Order, OrderState, OrderStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub client_order_id: ClientOrderId,
    pub tenant_id: TenantId,
    /// Order version after the transition.
    pub version: u64,
    pub occurred_at: DateTime<Utc>,
    pub kind: OrderEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventKind {
    OrderCreated {
        status: OrderStatus,
        state: OrderState,
        quantity: Decimal,
    },
    OrderModified {
        amendment: Amendment,
    },
    OrderCancelRequested {
        reason: Option<String>,
    },
    OrderExecution {
        execution_id: ExecutionId,
        price: Decimal,
        quantity: Decimal,
        filled_quantity: Decimal,
        remaining_quantity: Decimal,
        average_fill_price: Option<Decimal>,
        status: OrderStatus,
    },
    PreTradeCheckCompleted {
        passed: bool,
        flags: Vec<ComplianceFlag>,
    },
    /// Driven by venue acknowledgements.
    OrderStatusChanged {
        from: OrderStatus,
        to: OrderStatus,
        state: OrderState,
        reason: Option<String>,
    },
}

impl OrderEvent {
    pub fn for_order(order: &Order, kind: OrderEventKind) -> Self {
        Self {
            order_id: order.id(),
            client_order_id: order.client_order_id().clone(),
            tenant_id: order.tenant_id().clone(),
            version: order.version(),
            occurred_at: Utc::now(),
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            OrderEventKind::OrderCreated { .. } => "order-created",
            OrderEventKind::OrderModified { .. } => "order-modified",
            OrderEventKind::OrderCancelRequested { .. } => "order-cancel-requested",
            OrderEventKind::OrderExecution { .. } => "order-execution",
            OrderEventKind::PreTradeCheckCompleted { .. } => "pre-trade-check-completed",
            OrderEventKind::OrderStatusChanged { .. } => "order-status-changed",
        }
    }
}
