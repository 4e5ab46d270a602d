use super::ids::{ExecutionId, OrderId, TenantId, UserId};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of venue that produced a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VenueType {
    Exchange,
    Ecn,
    DarkPool,
    MarketMaker,
    Broker,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Pending,
    Settled,
    Failed,
}

/// One fill report. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExecution {
    id: ExecutionId,
    order_id: OrderId,
    tenant_id: TenantId,
    price: Decimal,
    quantity: Decimal,
    venue: String,
    venue_type: VenueType,
    trade_id: String,
    executed_at: DateTime<Utc>,
    settlement_date: NaiveDate,
    settlement_status: SettlementStatus,
    reported_by: UserId,
    recorded_at: DateTime<Utc>,
}

impl OrderExecution {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_id: OrderId,
        tenant_id: TenantId,
        price: Decimal,
        quantity: Decimal,
        venue: impl Into<String>,
        venue_type: VenueType,
        trade_id: Option<String>,
        executed_at: DateTime<Utc>,
        settlement_days: u32,
        reported_by: UserId,
    ) -> Self {
        let id = ExecutionId::new();
        Self {
            id,
            order_id,
            tenant_id,
            price,
            quantity,
            venue: venue.into(),
            venue_type,
            trade_id: trade_id.unwrap_or_else(|| id.to_string()),
            executed_at,
            settlement_date: settlement_date(executed_at.date_naive(), settlement_days),
            settlement_status: SettlementStatus::Pending,
            reported_by,
            recorded_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    pub fn venue_type(&self) -> VenueType {
        self.venue_type
    }

    pub fn trade_id(&self) -> &str {
        &self.trade_id
    }

    pub fn executed_at(&self) -> DateTime<Utc> {
        self.executed_at
    }

    pub fn settlement_date(&self) -> NaiveDate {
        self.settlement_date
    }

    pub fn settlement_status(&self) -> SettlementStatus {
        self.settlement_status
    }

    pub fn reported_by(&self) -> &UserId {
        &self.reported_by
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

/// Trade date plus `business_days`, skipping Saturdays and Sundays.
///
/// Exchange holidays are not modelled.
pub fn settlement_date(trade_date: NaiveDate, business_days: u32) -> NaiveDate {
    let mut date = trade_date;
    let mut remaining = business_days;
    while remaining > 0 {
        date += Duration::days(1);
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
        }
    }
    date
}

/// Quantity-weighted mean price of a set of executions.
pub fn weighted_average_price<'a>(
    executions: impl IntoIterator<Item = &'a OrderExecution>,
) -> Option<Decimal> {
    let (notional, quantity) = executions
        .into_iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(n, q), e| {
            (n + e.notional(), q + e.quantity())
        });
    if quantity.is_zero() {
        None
    } else {
        Some(notional / quantity)
    }
}
