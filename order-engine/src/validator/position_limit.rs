use super::{Check, Finding, OrderDraft, ValidationContext};
use oms::{RiskBreach, RiskBreachType, Severity};

/// Hard cap on the absolute post-trade position in the instrument.
pub struct PositionLimitCheck;

impl Check for PositionLimitCheck {
    fn name(&self) -> &str {
        "PositionLimit"
    }

    fn check(&self, draft: &OrderDraft, ctx: &ValidationContext) -> Vec<Finding> {
        let Some(portfolio) = ctx.portfolio else {
            return Vec::new();
        };
        let Some(limit) = portfolio.max_position_size else {
            return Vec::new();
        };

        let current = portfolio.position(&draft.instrument_id);
        let post_trade = (current + draft.side.sign() * draft.quantity).abs();
        if post_trade > limit {
            return vec![Finding::error(
                Some("quantity"),
                format!(
                    "post-trade position {} exceeds position limit {}",
                    post_trade, limit
                ),
            )
            .with_breach(RiskBreach::new(
                RiskBreachType::PositionLimit,
                Severity::Error,
                post_trade,
                limit,
            ))];
        }
        Vec::new()
    }
}
