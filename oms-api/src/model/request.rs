//! Inbound requests accepted by the order management core.

use super::allocation::{AllocationMethod, AllocationRequest};
use super::execution::VenueType;
use super::ids::{ClientOrderId, InstrumentId, OrderId, PortfolioId, TenantId, UserId};
use super::order::{OrderSide, OrderType, RiskLimits, TimeInForce};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn default_time_in_force() -> TimeInForce {
    TimeInForce::Day
}

fn system_user() -> UserId {
    UserId::new("system")
}

/// A request to create a new order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub tenant_id: TenantId,
    pub portfolio_id: PortfolioId,
    pub instrument_id: InstrumentId,
    /// Optional caller-chosen reference; generated when absent.
    #[serde(default)]
    pub client_order_id: Option<ClientOrderId>,
    pub order_type: OrderType,
    pub side: OrderSide,
    #[serde(default = "default_time_in_force")]
    pub time_in_force: TimeInForce,
    pub quantity: Decimal,
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    #[serde(default)]
    pub expire_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub risk_limits: Option<RiskLimits>,
    /// Sub-account split for block orders; empty for ordinary orders.
    #[serde(default)]
    pub allocations: Vec<AllocationRequest>,
    #[serde(default)]
    pub allocation_method: Option<AllocationMethod>,
    #[serde(default)]
    pub settlement_currency: Option<String>,
    #[serde(default = "system_user")]
    pub requested_by: UserId,
}

impl CreateOrderRequest {
    pub fn new(
        tenant_id: impl Into<String>,
        portfolio_id: impl Into<String>,
        instrument_id: impl Into<String>,
        order_type: OrderType,
        side: OrderSide,
        quantity: Decimal,
    ) -> Self {
        Self {
            tenant_id: TenantId::new(tenant_id),
            portfolio_id: PortfolioId::new(portfolio_id),
            instrument_id: InstrumentId::new(instrument_id),
            client_order_id: None,
            order_type,
            side,
            time_in_force: TimeInForce::Day,
            quantity,
            limit_price: None,
            stop_price: None,
            expire_at: None,
            risk_limits: None,
            allocations: Vec::new(),
            allocation_method: None,
            settlement_currency: None,
            requested_by: system_user(),
        }
    }

    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(ClientOrderId::new(id));
        self
    }

    pub fn with_limit_price(mut self, price: Decimal) -> Self {
        self.limit_price = Some(price);
        self
    }

    pub fn with_stop_price(mut self, price: Decimal) -> Self {
        self.stop_price = Some(price);
        self
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce, expire_at: Option<DateTime<Utc>>) -> Self {
        self.time_in_force = tif;
        self.expire_at = expire_at;
        self
    }

    pub fn with_risk_limits(mut self, limits: RiskLimits) -> Self {
        self.risk_limits = Some(limits);
        self
    }

    pub fn with_allocations(
        mut self,
        method: AllocationMethod,
        allocations: Vec<AllocationRequest>,
    ) -> Self {
        self.allocation_method = Some(method);
        self.allocations = allocations;
        self
    }

    pub fn requested_by(mut self, user: impl Into<String>) -> Self {
        self.requested_by = UserId::new(user);
        self
    }
}

/// Changes to a working order. `None` fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyOrderRequest {
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    #[serde(default = "system_user")]
    pub modified_by: UserId,
}

impl Default for ModifyOrderRequest {
    fn default() -> Self {
        Self {
            quantity: None,
            limit_price: None,
            stop_price: None,
            modified_by: system_user(),
        }
    }
}

impl ModifyOrderRequest {
    pub fn quantity(quantity: Decimal) -> Self {
        Self {
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    pub fn limit_price(price: Decimal) -> Self {
        Self {
            limit_price: Some(price),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default = "system_user")]
    pub cancelled_by: UserId,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Default for CancelOrderRequest {
    fn default() -> Self {
        Self {
            cancelled_by: system_user(),
            reason: None,
        }
    }
}

/// A fill reported by an execution venue or broker integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub order_id: OrderId,
    pub price: Decimal,
    pub quantity: Decimal,
    pub venue: String,
    pub venue_type: VenueType,
    /// Venue trade reference; repeated reports with the same id are not re-applied.
    #[serde(default)]
    pub trade_id: Option<String>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default = "system_user")]
    pub reported_by: UserId,
}

impl ExecutionReport {
    pub fn new(
        order_id: OrderId,
        price: Decimal,
        quantity: Decimal,
        venue: impl Into<String>,
        venue_type: VenueType,
    ) -> Self {
        Self {
            order_id,
            price,
            quantity,
            venue: venue.into(),
            venue_type,
            trade_id: None,
            executed_at: None,
            reported_by: system_user(),
        }
    }

    pub fn with_trade_id(mut self, trade_id: impl Into<String>) -> Self {
        self.trade_id = Some(trade_id.into());
        self
    }

    pub fn executed_at(mut self, at: DateTime<Utc>) -> Self {
        self.executed_at = Some(at);
        self
    }
}

/// Acknowledgements coming back from the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VenueUpdate {
    Submitted,
    Acknowledged,
    CancelConfirmed,
    Rejected { reason: String },
    Expired,
}
