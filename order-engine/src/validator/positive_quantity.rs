use super::{Check, Finding, OrderDraft, ValidationContext};
use rust_decimal::Decimal;

pub struct PositiveQuantityCheck;

impl Check for PositiveQuantityCheck {
    fn name(&self) -> &str {
        "PositiveQuantity"
    }

    fn check(&self, draft: &OrderDraft, _ctx: &ValidationContext) -> Vec<Finding> {
        if draft.quantity <= Decimal::ZERO {
            return vec![Finding::error(
                Some("quantity"),
                format!("quantity must be positive, got {}", draft.quantity),
            )];
        }
        Vec::new()
    }
}
