//! Persistence contracts, one per entity.
//!
//! Every order mutation goes through a version check: a write carrying a
//! stale `expected_version` fails with [`RepositoryError::VersionConflict`]
//! and the caller re-reads and retries.

use crate::model::allocation::OrderAllocation;
use crate::model::execution::OrderExecution;
use crate::model::ids::{ClientOrderId, ExecutionId, OrderId, TenantId};
use crate::model::order::Order;
use crate::model::query::OrderQuery;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },
    #[error("duplicate {0}")]
    Duplicate(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub trait OrderRepository: Send + Sync {
    /// Stores a new order together with its block allocations, as one unit.
    ///
    /// # Arguments
    ///
    /// * `order` - A freshly built order (version 0).
    /// * `allocations` - Its sub-account allocations, empty for ordinary orders.
    ///
    /// # Returns
    ///
    /// * `Result<Order, RepositoryError>` - The stored order stamped with version 1,
    ///   or `Duplicate` if the client order id is already taken within the tenant.
    ///   Nothing is written on error.
    fn insert(&self, order: &Order, allocations: &[OrderAllocation]) -> Result<Order, RepositoryError>;

    fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    fn find_by_client_order_id(
        &self,
        tenant_id: &TenantId,
        client_order_id: &ClientOrderId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Replaces the stored order if its version still equals `expected_version`.
    ///
    /// # Returns
    ///
    /// * `Result<Order, RepositoryError>` - The stored order with its version bumped.
    fn update(&self, order: &Order, expected_version: u64) -> Result<Order, RepositoryError>;

    /// Persists a fill as one unit: the updated order, the new execution and
    /// the allocations it touched.
    ///
    /// Nothing is written when the version check fails.
    fn record_fill(
        &self,
        order: &Order,
        expected_version: u64,
        execution: &OrderExecution,
        allocations: &[OrderAllocation],
    ) -> Result<Order, RepositoryError>;

    /// Orders matching `query`, newest first, paginated.
    fn search(&self, query: &OrderQuery) -> Result<Vec<Order>, RepositoryError>;
}

pub trait ExecutionRepository: Send + Sync {
    fn get(&self, id: ExecutionId) -> Result<Option<OrderExecution>, RepositoryError>;

    /// Executions of one order in the order they were recorded.
    fn list_for_order(&self, order_id: OrderId) -> Result<Vec<OrderExecution>, RepositoryError>;

    fn find_by_trade_id(
        &self,
        order_id: OrderId,
        trade_id: &str,
    ) -> Result<Option<OrderExecution>, RepositoryError>;
}

pub trait AllocationRepository: Send + Sync {
    /// Allocations of one order in request order.
    fn list_for_order(&self, order_id: OrderId) -> Result<Vec<OrderAllocation>, RepositoryError>;

    fn update_all(&self, allocations: &[OrderAllocation]) -> Result<(), RepositoryError>;
}
