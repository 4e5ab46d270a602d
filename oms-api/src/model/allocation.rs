use super::ids::{AllocationId, OrderId, PortfolioId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a block order's fills are split across sub-accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationMethod {
    /// Split by each account's share of the total requested quantity.
    #[default]
    Proportional,
    /// Fill the highest-priority accounts first, up to their requested quantity.
    Priority,
    /// Fixed quantities, filled in request order without recomputation.
    Manual,
    /// Proportional; rounding residue goes to the earliest request.
    Fifo,
    /// Proportional; rounding residue goes to the largest request.
    ProRata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStatus {
    Pending,
    Allocated,
    Partial,
    Failed,
}

/// One requested sub-account split at order creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub account_id: PortfolioId,
    pub quantity: Decimal,
    /// 1 is the highest priority. Only used by [`AllocationMethod::Priority`].
    #[serde(default)]
    pub priority: u32,
}

impl AllocationRequest {
    pub fn new(account_id: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            account_id: PortfolioId::new(account_id),
            quantity,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAllocation {
    id: AllocationId,
    order_id: OrderId,
    account_id: PortfolioId,
    method: AllocationMethod,
    priority: u32,
    /// Position of the request in the original list.
    sequence: usize,
    requested_quantity: Decimal,
    allocated_quantity: Decimal,
    allocated_value: Decimal,
    status: AllocationStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderAllocation {
    pub fn new(
        order_id: OrderId,
        request: &AllocationRequest,
        method: AllocationMethod,
        sequence: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AllocationId::new(),
            order_id,
            account_id: request.account_id.clone(),
            method,
            priority: request.priority,
            sequence,
            requested_quantity: request.quantity,
            allocated_quantity: Decimal::ZERO,
            allocated_value: Decimal::ZERO,
            status: AllocationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> AllocationId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn account_id(&self) -> &PortfolioId {
        &self.account_id
    }

    pub fn method(&self) -> AllocationMethod {
        self.method
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn requested_quantity(&self) -> Decimal {
        self.requested_quantity
    }

    pub fn allocated_quantity(&self) -> Decimal {
        self.allocated_quantity
    }

    pub fn allocated_value(&self) -> Decimal {
        self.allocated_value
    }

    pub fn outstanding_quantity(&self) -> Decimal {
        (self.requested_quantity - self.allocated_quantity).max(Decimal::ZERO)
    }

    pub fn average_price(&self) -> Option<Decimal> {
        if self.allocated_quantity.is_zero() {
            None
        } else {
            Some(self.allocated_value / self.allocated_quantity)
        }
    }

    pub fn status(&self) -> AllocationStatus {
        self.status
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Adds `quantity` filled at `price`. Allocations never shrink.
    pub fn allocate(&mut self, quantity: Decimal, price: Decimal, now: DateTime<Utc>) {
        if quantity <= Decimal::ZERO {
            return;
        }
        let quantity = quantity.min(self.outstanding_quantity());
        self.allocated_quantity += quantity;
        self.allocated_value += quantity * price;
        self.status = if self.allocated_quantity >= self.requested_quantity {
            AllocationStatus::Allocated
        } else {
            AllocationStatus::Partial
        };
        self.updated_at = now;
    }

    /// Settles the status once the order can receive no more fills.
    pub fn finalize(&mut self, now: DateTime<Utc>) {
        self.status = if self.allocated_quantity >= self.requested_quantity {
            AllocationStatus::Allocated
        } else if self.allocated_quantity.is_zero() {
            AllocationStatus::Failed
        } else {
            AllocationStatus::Partial
        };
        self.updated_at = now;
    }
}
