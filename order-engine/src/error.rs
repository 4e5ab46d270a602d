use crate::allocation::AllocationError;
use crate::validator::ValidationReport;
use oms::model::order::{AmendError, FillError, TransitionError};
use oms::{ClientOrderId, CollaboratorError, ComplianceFlag, OrderId, OrderStatus, RepositoryError};
use serde::Serialize;
use thiserror::Error;

/// Coarse error classes, stable for transport mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    ComplianceBlock,
    Concurrency,
    Internal,
}

#[derive(Debug, Error)]
pub enum OmsError {
    /// Malformed request or hard limit breach. Nothing was changed.
    #[error("validation failed: {0}")]
    Validation(ValidationReport),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The operation is not allowed in the order's current status.
    #[error("order {order_id} is {status}: {reason}")]
    Conflict {
        order_id: OrderId,
        status: OrderStatus,
        reason: String,
    },

    #[error("client order id {0} is already in use")]
    DuplicateClientOrderId(ClientOrderId),

    /// The order was stored but parked in SUSPENDED.
    #[error("order {order_id} blocked by pre-trade compliance")]
    ComplianceBlocked {
        order_id: OrderId,
        flags: Vec<ComplianceFlag>,
    },

    #[error("order {order_id} kept changing; gave up after {attempts} attempts")]
    ConcurrentModification { order_id: OrderId, attempts: u32 },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Repository(RepositoryError),
}

pub type Result<T> = std::result::Result<T, OmsError>;

impl OmsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OmsError::Validation(_) => ErrorKind::Validation,
            OmsError::NotFound { .. } => ErrorKind::NotFound,
            OmsError::Conflict { .. } | OmsError::DuplicateClientOrderId(_) => ErrorKind::Conflict,
            OmsError::ComplianceBlocked { .. } => ErrorKind::ComplianceBlock,
            OmsError::ConcurrentModification { .. } => ErrorKind::Concurrency,
            OmsError::Collaborator(_) | OmsError::Repository(_) => ErrorKind::Internal,
        }
    }

    pub fn order_not_found(id: OrderId) -> Self {
        OmsError::NotFound {
            entity: "order",
            id: id.to_string(),
        }
    }

    pub fn invalid(check: &str, field: Option<&str>, message: impl Into<String>) -> Self {
        OmsError::Validation(ValidationReport::rejected(check, field, message))
    }

    pub fn conflict(order_id: OrderId, status: OrderStatus, reason: impl Into<String>) -> Self {
        OmsError::Conflict {
            order_id,
            status,
            reason: reason.into(),
        }
    }

    /// Whether the failed write should be retried against a fresh read.
    pub fn is_version_conflict(&self) -> bool {
        matches!(
            self,
            OmsError::Repository(RepositoryError::VersionConflict { .. })
        )
    }

    pub(crate) fn from_transition(order_id: OrderId, e: TransitionError) -> Self {
        OmsError::conflict(order_id, e.from, e.to_string())
    }

    pub(crate) fn from_fill(order_id: OrderId, status: OrderStatus, e: FillError) -> Self {
        match e {
            FillError::NotFillable(_) | FillError::Overfill { .. } => {
                OmsError::conflict(order_id, status, e.to_string())
            }
            FillError::NonPositiveQuantity(_) => OmsError::invalid("Execution", Some("quantity"), e.to_string()),
            FillError::NonPositivePrice(_) => OmsError::invalid("Execution", Some("price"), e.to_string()),
        }
    }

    pub(crate) fn from_amend(order_id: OrderId, status: OrderStatus, e: AmendError) -> Self {
        match e {
            AmendError::NotModifiable(_) => OmsError::conflict(order_id, status, e.to_string()),
            AmendError::NonPositiveQuantity(_) | AmendError::BelowFilled { .. } => {
                OmsError::invalid("Modify", Some("quantity"), e.to_string())
            }
            AmendError::NoChange => OmsError::invalid("Modify", None, e.to_string()),
        }
    }
}

impl From<RepositoryError> for OmsError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound { entity, id } => OmsError::NotFound { entity, id },
            other => OmsError::Repository(other),
        }
    }
}

impl From<AllocationError> for OmsError {
    fn from(e: AllocationError) -> Self {
        OmsError::invalid("AllocationRequests", Some("allocations"), e.to_string())
    }
}
