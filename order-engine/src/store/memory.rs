use oms::{
    AllocationRepository, ClientOrderId, ExecutionId, ExecutionRepository, Order, OrderAllocation,
    OrderExecution, OrderId, OrderQuery, OrderRepository, RepositoryError, TenantId,
};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    client_ids: HashMap<(TenantId, ClientOrderId), OrderId>,
    executions: HashMap<ExecutionId, OrderExecution>,
    executions_by_order: HashMap<OrderId, Vec<ExecutionId>>,
    allocations: HashMap<OrderId, Vec<OrderAllocation>>,
}

impl State {
    fn check_version(&self, order: &Order, expected: u64) -> Result<(), RepositoryError> {
        let stored = self
            .orders
            .get(&order.id())
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "order",
                id: order.id().to_string(),
            })?;
        if stored.version() != expected {
            return Err(RepositoryError::VersionConflict {
                expected,
                actual: stored.version(),
            });
        }
        Ok(())
    }

    fn store_order(&mut self, order: &Order, version: u64) -> Order {
        let mut stored = order.clone();
        stored.stamp_version(version);
        self.orders.insert(stored.id(), stored.clone());
        stored
    }

    fn replace_allocations(&mut self, allocations: &[OrderAllocation]) {
        for allocation in allocations {
            if let Some(existing) = self
                .allocations
                .get_mut(&allocation.order_id())
                .and_then(|list| list.iter_mut().find(|a| a.id() == allocation.id()))
            {
                *existing = allocation.clone();
            }
        }
    }
}

/// Thread-safe in-memory implementation of all three repositories.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, RepositoryError> {
        self.state
            .read()
            .map_err(|_| RepositoryError::Backend("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, RepositoryError> {
        self.state
            .write()
            .map_err(|_| RepositoryError::Backend("store lock poisoned".to_string()))
    }
}

impl OrderRepository for MemoryStore {
    fn insert(&self, order: &Order, allocations: &[OrderAllocation]) -> Result<Order, RepositoryError> {
        let mut state = self.write()?;
        let key = (order.tenant_id().clone(), order.client_order_id().clone());
        if state.client_ids.contains_key(&key) {
            return Err(RepositoryError::Duplicate(format!(
                "client order id {}",
                order.client_order_id()
            )));
        }
        if state.orders.contains_key(&order.id()) {
            return Err(RepositoryError::Duplicate(format!("order {}", order.id())));
        }
        if let Some(stray) = allocations.iter().find(|a| a.order_id() != order.id()) {
            return Err(RepositoryError::Backend(format!(
                "allocation {} belongs to order {}, not {}",
                stray.id(),
                stray.order_id(),
                order.id()
            )));
        }
        state.client_ids.insert(key, order.id());
        if !allocations.is_empty() {
            state.allocations.insert(order.id(), allocations.to_vec());
        }
        Ok(state.store_order(order, 1))
    }

    fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.read()?.orders.get(&id).cloned())
    }

    fn find_by_client_order_id(
        &self,
        tenant_id: &TenantId,
        client_order_id: &ClientOrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let state = self.read()?;
        Ok(state
            .client_ids
            .get(&(tenant_id.clone(), client_order_id.clone()))
            .and_then(|id| state.orders.get(id))
            .cloned())
    }

    fn update(&self, order: &Order, expected_version: u64) -> Result<Order, RepositoryError> {
        let mut state = self.write()?;
        state.check_version(order, expected_version)?;
        Ok(state.store_order(order, expected_version + 1))
    }

    fn record_fill(
        &self,
        order: &Order,
        expected_version: u64,
        execution: &OrderExecution,
        allocations: &[OrderAllocation],
    ) -> Result<Order, RepositoryError> {
        let mut state = self.write()?;
        state.check_version(order, expected_version)?;
        if state.executions.contains_key(&execution.id()) {
            return Err(RepositoryError::Duplicate(format!("execution {}", execution.id())));
        }
        state.executions.insert(execution.id(), execution.clone());
        state
            .executions_by_order
            .entry(order.id())
            .or_default()
            .push(execution.id());
        state.replace_allocations(allocations);
        Ok(state.store_order(order, expected_version + 1))
    }

    fn search(&self, query: &OrderQuery) -> Result<Vec<Order>, RepositoryError> {
        let state = self.read()?;
        let mut matches: Vec<&Order> = state.orders.values().filter(|o| query.matches(o)).collect();
        matches.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(matches
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}

impl ExecutionRepository for MemoryStore {
    fn get(&self, id: ExecutionId) -> Result<Option<OrderExecution>, RepositoryError> {
        Ok(self.read()?.executions.get(&id).cloned())
    }

    fn list_for_order(&self, order_id: OrderId) -> Result<Vec<OrderExecution>, RepositoryError> {
        let state = self.read()?;
        Ok(state
            .executions_by_order
            .get(&order_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.executions.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn find_by_trade_id(
        &self,
        order_id: OrderId,
        trade_id: &str,
    ) -> Result<Option<OrderExecution>, RepositoryError> {
        let state = self.read()?;
        Ok(state.executions_by_order.get(&order_id).and_then(|ids| {
            ids.iter()
                .filter_map(|id| state.executions.get(id))
                .find(|e| e.trade_id() == trade_id)
                .cloned()
        }))
    }
}

impl AllocationRepository for MemoryStore {
    fn list_for_order(&self, order_id: OrderId) -> Result<Vec<OrderAllocation>, RepositoryError> {
        Ok(self
            .read()?
            .allocations
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    fn update_all(&self, allocations: &[OrderAllocation]) -> Result<(), RepositoryError> {
        self.write()?.replace_allocations(allocations);
        Ok(())
    }
}
