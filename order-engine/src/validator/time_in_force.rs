use super::{Check, Finding, OrderDraft, ValidationContext};
use oms::TimeInForce;

/// GTD orders need a future expiry; every other time in force must not have one.
pub struct TimeInForceCheck;

impl Check for TimeInForceCheck {
    fn name(&self) -> &str {
        "TimeInForce"
    }

    fn check(&self, draft: &OrderDraft, ctx: &ValidationContext) -> Vec<Finding> {
        match (draft.time_in_force, draft.expire_at) {
            (TimeInForce::Gtd, None) => vec![Finding::error(
                Some("expire_at"),
                "GTD order requires an expiry time",
            )],
            (TimeInForce::Gtd, Some(expire_at)) if expire_at <= ctx.now => vec![Finding::error(
                Some("expire_at"),
                format!("expiry time {} is not in the future", expire_at),
            )],
            (TimeInForce::Gtd, Some(_)) => Vec::new(),
            (tif, Some(_)) => vec![Finding::error(
                Some("expire_at"),
                format!("{:?} order must not carry an expiry time", tif),
            )],
            (_, None) => Vec::new(),
        }
    }
}
