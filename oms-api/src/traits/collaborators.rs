//! Contracts of the external services the order core consults.
//!
//! All of them are synchronous and shareable across threads; the core calls
//! them before it takes any per-order lock.

use crate::model::compliance::ConcentrationVerdict;
use crate::model::events::OrderEvent;
use crate::model::ids::{InstrumentId, PortfolioId, TenantId};
use crate::model::market_data::MarketBar;
use crate::model::order::Order;
use crate::model::reference::{InstrumentSnapshot, PortfolioSnapshot};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator returned invalid data: {0}")]
    Invalid(String),
}

pub trait PortfolioLookup: Send + Sync {
    /// Resolves a portfolio within a tenant.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The portfolio does not exist for this tenant.
    fn portfolio(
        &self,
        id: &PortfolioId,
        tenant_id: &TenantId,
    ) -> Result<Option<PortfolioSnapshot>, CollaboratorError>;
}

pub trait InstrumentLookup: Send + Sync {
    fn instrument(
        &self,
        id: &InstrumentId,
        tenant_id: &TenantId,
    ) -> Result<Option<InstrumentSnapshot>, CollaboratorError>;
}

/// Restricted-list and concentration verdicts from the compliance rules engine.
pub trait ComplianceProvider: Send + Sync {
    fn is_restricted(
        &self,
        tenant_id: &TenantId,
        instrument_id: &InstrumentId,
    ) -> Result<bool, CollaboratorError>;

    fn check_concentration(&self, order: &Order) -> Result<ConcentrationVerdict, CollaboratorError>;
}

/// Fire-and-forget delivery of lifecycle notifications.
pub trait EventPublisher: Send + Sync {
    /// # Arguments
    ///
    /// * `event` - The notification to deliver.
    ///
    /// # Returns
    ///
    /// * `anyhow::Result<()>` - Delivery failures are reported but never undo the transition.
    fn publish(&self, event: OrderEvent) -> anyhow::Result<()>;
}

pub trait MarketDataProvider: Send + Sync {
    /// Bars of `instrument_id` with `from <= timestamp <= to`, oldest first.
    fn bars(
        &self,
        instrument_id: &InstrumentId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MarketBar>, CollaboratorError>;
}

impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    fn publish(&self, event: OrderEvent) -> anyhow::Result<()> {
        (**self).publish(event)
    }
}
