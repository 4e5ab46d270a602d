use super::{Check, Finding, OrderDraft, ValidationContext};
use crate::allocation::validate_requests;

/// Block-order splits must be well formed and fit inside the order quantity.
pub struct AllocationRequestsCheck;

impl Check for AllocationRequestsCheck {
    fn name(&self) -> &str {
        "AllocationRequests"
    }

    fn check(&self, draft: &OrderDraft, _ctx: &ValidationContext) -> Vec<Finding> {
        if draft.allocations.is_empty() {
            return Vec::new();
        }
        let method = draft.allocation_method.unwrap_or_default();
        match validate_requests(draft.quantity, method, &draft.allocations) {
            Ok(()) => Vec::new(),
            Err(e) => vec![Finding::error(Some("allocations"), e.to_string())],
        }
    }
}
