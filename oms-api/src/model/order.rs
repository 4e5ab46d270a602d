//! The order entity and its lifecycle state machine.
//!
//! An [`Order`] is only ever mutated through the transition methods defined
//! here (`advance`, `apply_fill`, `amend`, `request_cancel`, ...). Each of them
//! either applies completely or leaves the order untouched, so the quantity
//! invariant `filled_quantity + remaining_quantity == quantity` holds at every
//! observable point.

use super::allocation::AllocationMethod;
use super::compliance::ComplianceFlag;
use super::ids::{ClientOrderId, InstrumentId, OrderId, PortfolioId, TenantId, UserId};
use super::request::CreateOrderRequest;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    MarketOnOpen,
    MarketOnClose,
}

impl OrderType {
    pub fn requires_limit_price(self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn requires_stop_price(self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }

    /// Orders that execute at whatever the market offers.
    pub fn is_market(self) -> bool {
        matches!(
            self,
            OrderType::Market | OrderType::MarketOnOpen | OrderType::MarketOnClose
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
    SellShort,
}

impl OrderSide {
    /// +1 for orders that increase the position, -1 otherwise.
    pub fn sign(self) -> Decimal {
        match self {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell | OrderSide::SellShort => Decimal::NEGATIVE_ONE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
    Fok,
    /// Good till date; the order carries an `expire_at`.
    Gtd,
}

/// Externally visible lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingNew,
    New,
    PartiallyFilled,
    Filled,
    PendingCancel,
    Canceled,
    Rejected,
    Expired,
    Suspended,
}

impl OrderStatus {
    /// Statuses from which the core performs no further transitions.
    ///
    /// `Suspended` is terminal here: leaving it requires a manual approval
    /// workflow that lives outside this crate.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::Suspended
        )
    }

    /// Statuses that accept modify and cancel requests.
    pub fn is_modifiable(self) -> bool {
        matches!(
            self,
            OrderStatus::PendingNew | OrderStatus::New | OrderStatus::PartiallyFilled
        )
    }

    /// Statuses that accept execution reports.
    pub fn accepts_fills(self) -> bool {
        matches!(
            self,
            OrderStatus::New | OrderStatus::PartiallyFilled | OrderStatus::PendingCancel
        )
    }

    /// The forward-only transition graph.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            PendingNew => matches!(next, New | Suspended | Rejected | PendingCancel),
            New => matches!(
                next,
                PartiallyFilled | Filled | PendingCancel | Rejected | Expired | Suspended
            ),
            PartiallyFilled => matches!(next, PartiallyFilled | Filled | PendingCancel | Expired),
            PendingCancel => matches!(next, PendingCancel | Filled | Canceled),
            Filled | Canceled | Rejected | Expired | Suspended => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::PendingNew => "PENDING_NEW",
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::PendingCancel => "PENDING_CANCEL",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Suspended => "SUSPENDED",
        };
        f.write_str(s)
    }
}

/// Processing state, orthogonal to [`OrderStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Created,
    Validated,
    Submitted,
    Acknowledged,
    Working,
    Completed,
    Failed,
}

impl OrderState {
    fn rank(self) -> u8 {
        match self {
            OrderState::Created => 0,
            OrderState::Validated => 1,
            OrderState::Submitted => 2,
            OrderState::Acknowledged => 3,
            OrderState::Working => 4,
            OrderState::Completed | OrderState::Failed => 5,
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, OrderState::Completed | OrderState::Failed)
    }

    /// Processing only moves forward; staying in a non-final state is allowed.
    pub fn can_advance_to(self, next: OrderState) -> bool {
        !self.is_final() && next.rank() >= self.rank()
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_uppercase())
    }
}

/// Per-order limits supplied with the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Hard cap on the notional value of this order.
    #[serde(default)]
    pub max_order_value: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition {from}/{from_state} -> {to}/{to_state}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub from_state: OrderState,
    pub to: OrderStatus,
    pub to_state: OrderState,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FillError {
    #[error("order in status {0} does not accept fills")]
    NotFillable(OrderStatus),
    #[error("fill quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),
    #[error("fill price must be positive, got {0}")]
    NonPositivePrice(Decimal),
    #[error("fill of {requested} exceeds remaining quantity {remaining}")]
    Overfill {
        requested: Decimal,
        remaining: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmendError {
    #[error("order in status {0} cannot be modified")]
    NotModifiable(OrderStatus),
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),
    #[error("new quantity {requested} must exceed filled quantity {filled}")]
    BelowFilled { requested: Decimal, filled: Decimal },
    #[error("modification changes nothing")]
    NoChange,
}

/// Before/after values of an applied modification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amendment {
    pub old_quantity: Decimal,
    pub new_quantity: Decimal,
    pub old_limit_price: Option<Decimal>,
    pub new_limit_price: Option<Decimal>,
    pub old_stop_price: Option<Decimal>,
    pub new_stop_price: Option<Decimal>,
}

/// What a fill did to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOutcome {
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    version: u64,
    tenant_id: TenantId,
    portfolio_id: PortfolioId,
    instrument_id: InstrumentId,
    client_order_id: ClientOrderId,
    order_type: OrderType,
    side: OrderSide,
    time_in_force: TimeInForce,
    expire_at: Option<DateTime<Utc>>,
    quantity: Decimal,
    filled_quantity: Decimal,
    remaining_quantity: Decimal,
    limit_price: Option<Decimal>,
    stop_price: Option<Decimal>,
    average_fill_price: Option<Decimal>,
    arrival_price: Option<Decimal>,
    status: OrderStatus,
    state: OrderState,
    compliance_flags: Vec<ComplianceFlag>,
    risk_limits: RiskLimits,
    risk_score: Option<f64>,
    allocation_method: Option<AllocationMethod>,
    settlement_currency: String,
    status_reason: Option<String>,
    created_by: UserId,
    modified_by: Option<UserId>,
    cancelled_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Builds a fresh `PENDING_NEW` / `CREATED` order from an accepted request.
    pub fn from_request(
        request: &CreateOrderRequest,
        client_order_id: ClientOrderId,
        arrival_price: Option<Decimal>,
        settlement_currency: impl Into<String>,
        risk_score: Option<f64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            version: 0,
            tenant_id: request.tenant_id.clone(),
            portfolio_id: request.portfolio_id.clone(),
            instrument_id: request.instrument_id.clone(),
            client_order_id,
            order_type: request.order_type,
            side: request.side,
            time_in_force: request.time_in_force,
            expire_at: request.expire_at,
            quantity: request.quantity,
            filled_quantity: Decimal::ZERO,
            remaining_quantity: request.quantity,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            average_fill_price: None,
            arrival_price,
            status: OrderStatus::PendingNew,
            state: OrderState::Created,
            compliance_flags: Vec::new(),
            risk_limits: request.risk_limits.clone().unwrap_or_default(),
            risk_score,
            allocation_method: if request.allocations.is_empty() {
                None
            } else {
                Some(request.allocation_method.unwrap_or_default())
            },
            settlement_currency: settlement_currency.into(),
            status_reason: None,
            created_by: request.requested_by.clone(),
            modified_by: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Optimistic-concurrency version, owned by the repository.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Called by repositories when a write is accepted.
    pub fn stamp_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn portfolio_id(&self) -> &PortfolioId {
        &self.portfolio_id
    }

    pub fn instrument_id(&self) -> &InstrumentId {
        &self.instrument_id
    }

    pub fn client_order_id(&self) -> &ClientOrderId {
        &self.client_order_id
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn time_in_force(&self) -> TimeInForce {
        self.time_in_force
    }

    pub fn expire_at(&self) -> Option<DateTime<Utc>> {
        self.expire_at
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn filled_quantity(&self) -> Decimal {
        self.filled_quantity
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.remaining_quantity
    }

    pub fn limit_price(&self) -> Option<Decimal> {
        self.limit_price
    }

    pub fn stop_price(&self) -> Option<Decimal> {
        self.stop_price
    }

    /// The working price of the order: limit price, else stop price.
    pub fn price(&self) -> Option<Decimal> {
        self.limit_price.or(self.stop_price)
    }

    pub fn average_fill_price(&self) -> Option<Decimal> {
        self.average_fill_price
    }

    pub fn arrival_price(&self) -> Option<Decimal> {
        self.arrival_price
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn compliance_flags(&self) -> &[ComplianceFlag] {
        &self.compliance_flags
    }

    pub fn risk_limits(&self) -> &RiskLimits {
        &self.risk_limits
    }

    pub fn risk_score(&self) -> Option<f64> {
        self.risk_score
    }

    pub fn allocation_method(&self) -> Option<AllocationMethod> {
        self.allocation_method
    }

    pub fn settlement_currency(&self) -> &str {
        &self.settlement_currency
    }

    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    pub fn modified_by(&self) -> Option<&UserId> {
        self.modified_by.as_ref()
    }

    pub fn cancelled_by(&self) -> Option<&UserId> {
        self.cancelled_by.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    /// `filled + remaining == quantity`.
    pub fn quantities_balance(&self) -> bool {
        self.filled_quantity + self.remaining_quantity == self.quantity
    }

    /// Moves status and processing state together along their graphs.
    pub fn advance(
        &mut self,
        status: OrderStatus,
        state: OrderState,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let status_ok = status == self.status || self.status.can_transition_to(status);
        if !status_ok || !self.state.can_advance_to(state) {
            return Err(TransitionError {
                from: self.status,
                from_state: self.state,
                to: status,
                to_state: state,
            });
        }
        self.status = status;
        self.state = state;
        self.updated_at = now;
        Ok(())
    }

    /// Like [`Order::advance`] but records why the order ended up there.
    pub fn advance_with_reason(
        &mut self,
        status: OrderStatus,
        state: OrderState,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(status, state, now)?;
        self.status_reason = Some(reason.into());
        Ok(())
    }

    pub fn attach_compliance_flags(&mut self, flags: &[ComplianceFlag]) {
        self.compliance_flags.extend_from_slice(flags);
    }

    /// Replaces the risk score after the order's size or prices changed.
    pub fn rescore(&mut self, risk_score: Option<f64>) {
        self.risk_score = risk_score;
    }

    /// Applies one execution to the order's quantities and average price.
    ///
    /// A partial fill while a cancel is pending keeps `PENDING_CANCEL`: the
    /// cancel still covers whatever remains unfilled.
    pub fn apply_fill(
        &mut self,
        price: Decimal,
        quantity: Decimal,
        now: DateTime<Utc>,
    ) -> Result<FillOutcome, FillError> {
        if !self.status.accepts_fills() {
            return Err(FillError::NotFillable(self.status));
        }
        if quantity <= Decimal::ZERO {
            return Err(FillError::NonPositiveQuantity(quantity));
        }
        if price <= Decimal::ZERO {
            return Err(FillError::NonPositivePrice(price));
        }
        if quantity > self.remaining_quantity {
            return Err(FillError::Overfill {
                requested: quantity,
                remaining: self.remaining_quantity,
            });
        }

        let previous_status = self.status;
        let prev_filled = self.filled_quantity;
        let prev_avg = self.average_fill_price.unwrap_or(Decimal::ZERO);
        let new_filled = prev_filled + quantity;

        self.average_fill_price = Some((prev_avg * prev_filled + price * quantity) / new_filled);
        self.filled_quantity = new_filled;
        self.remaining_quantity = (self.quantity - new_filled).max(Decimal::ZERO);

        let completed = self.remaining_quantity.is_zero();
        let (status, state) = if completed {
            (OrderStatus::Filled, OrderState::Completed)
        } else if previous_status == OrderStatus::PendingCancel {
            (OrderStatus::PendingCancel, OrderState::Working)
        } else {
            (OrderStatus::PartiallyFilled, OrderState::Working)
        };
        self.status = status;
        self.state = state;
        self.updated_at = now;

        Ok(FillOutcome {
            previous_status,
            status,
            completed,
        })
    }

    /// Changes quantity and/or prices of a working order.
    ///
    /// `None` leaves a field untouched. The new quantity has to stay above
    /// what has already been filled.
    pub fn amend(
        &mut self,
        quantity: Option<Decimal>,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
        by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Amendment, AmendError> {
        if !self.status.is_modifiable() {
            return Err(AmendError::NotModifiable(self.status));
        }

        let new_quantity = quantity.unwrap_or(self.quantity);
        if new_quantity <= Decimal::ZERO {
            return Err(AmendError::NonPositiveQuantity(new_quantity));
        }
        if !self.filled_quantity.is_zero() && new_quantity <= self.filled_quantity {
            return Err(AmendError::BelowFilled {
                requested: new_quantity,
                filled: self.filled_quantity,
            });
        }

        let amendment = Amendment {
            old_quantity: self.quantity,
            new_quantity,
            old_limit_price: self.limit_price,
            new_limit_price: limit_price.or(self.limit_price),
            old_stop_price: self.stop_price,
            new_stop_price: stop_price.or(self.stop_price),
        };
        if amendment.old_quantity == amendment.new_quantity
            && amendment.old_limit_price == amendment.new_limit_price
            && amendment.old_stop_price == amendment.new_stop_price
        {
            return Err(AmendError::NoChange);
        }

        self.quantity = new_quantity;
        self.remaining_quantity = new_quantity - self.filled_quantity;
        self.limit_price = amendment.new_limit_price;
        self.stop_price = amendment.new_stop_price;
        self.modified_by = Some(by);
        self.updated_at = now;
        Ok(amendment)
    }

    /// Optimistically moves a working order to `PENDING_CANCEL`.
    pub fn request_cancel(
        &mut self,
        by: UserId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.advance(OrderStatus::PendingCancel, OrderState::Working, now)?;
        self.cancelled_by = Some(by);
        self.cancelled_at = Some(now);
        self.status_reason = reason;
        Ok(())
    }
}
