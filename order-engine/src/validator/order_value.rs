use super::{Check, Finding, OrderDraft, ValidationContext};
use oms::{RiskBreach, RiskBreachType, Severity};

/// Per-order notional cap supplied with the request.
pub struct OrderValueLimitCheck;

impl Check for OrderValueLimitCheck {
    fn name(&self) -> &str {
        "OrderValueLimit"
    }

    fn check(&self, draft: &OrderDraft, ctx: &ValidationContext) -> Vec<Finding> {
        let (Some(limit), Some(pricing)) = (draft.risk_limits.max_order_value, ctx.pricing) else {
            return Vec::new();
        };
        if pricing.order_value > limit {
            return vec![Finding::error(
                Some("risk_limits.max_order_value"),
                format!("order value {} exceeds limit {}", pricing.order_value, limit),
            )
            .with_breach(RiskBreach::new(
                RiskBreachType::OrderValue,
                Severity::Error,
                pricing.order_value,
                limit,
            ))];
        }
        Vec::new()
    }
}
