use super::ids::{InstrumentId, PortfolioId, TenantId};
use super::order::{Order, OrderSide, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_limit() -> usize {
    100
}

/// Filter for order searches. Results are returned newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderQuery {
    pub tenant_id: TenantId,
    #[serde(default)]
    pub portfolio_id: Option<PortfolioId>,
    #[serde(default)]
    pub instrument_id: Option<InstrumentId>,
    /// Empty matches every status.
    #[serde(default)]
    pub statuses: Vec<OrderStatus>,
    #[serde(default)]
    pub side: Option<OrderSide>,
    #[serde(default)]
    pub created_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl OrderQuery {
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: TenantId::new(tenant_id),
            portfolio_id: None,
            instrument_id: None,
            statuses: Vec::new(),
            side: None,
            created_from: None,
            created_to: None,
            offset: 0,
            limit: default_limit(),
        }
    }

    pub fn portfolio(mut self, portfolio_id: impl Into<String>) -> Self {
        self.portfolio_id = Some(PortfolioId::new(portfolio_id));
        self
    }

    pub fn instrument(mut self, instrument_id: impl Into<String>) -> Self {
        self.instrument_id = Some(InstrumentId::new(instrument_id));
        self
    }

    pub fn statuses(mut self, statuses: impl IntoIterator<Item = OrderStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        order.tenant_id() == &self.tenant_id
            && self
                .portfolio_id
                .as_ref()
                .is_none_or(|p| order.portfolio_id() == p)
            && self
                .instrument_id
                .as_ref()
                .is_none_or(|i| order.instrument_id() == i)
            && (self.statuses.is_empty() || self.statuses.contains(&order.status()))
            && self.side.is_none_or(|s| order.side() == s)
            && self.created_from.is_none_or(|from| order.created_at() >= from)
            && self.created_to.is_none_or(|to| order.created_at() <= to)
    }
}
