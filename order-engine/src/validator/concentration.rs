use super::{Check, Finding, OrderDraft, ValidationContext};
use oms::{RiskBreach, RiskBreachType, Severity};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Soft limits on post-trade concentration and order size. Both only warn.
pub struct ConcentrationCheck {
    /// Fraction of portfolio value above which an order counts as large.
    pub large_order_fraction: f64,
}

impl Check for ConcentrationCheck {
    fn name(&self) -> &str {
        "Concentration"
    }

    fn check(&self, draft: &OrderDraft, ctx: &ValidationContext) -> Vec<Finding> {
        let (Some(portfolio), Some(pricing)) = (ctx.portfolio, ctx.pricing) else {
            return Vec::new();
        };
        if pricing.portfolio_value <= Decimal::ZERO {
            return vec![Finding::warning(
                Some("portfolio_id"),
                "portfolio value is zero; concentration cannot be assessed",
            )];
        }

        let mut findings = Vec::new();

        let order_fraction = pricing.order_value / pricing.portfolio_value;
        if let Some(threshold) = Decimal::from_f64(self.large_order_fraction) {
            if order_fraction > threshold {
                findings.push(Finding::warning(
                    Some("quantity"),
                    format!(
                        "order value {} is {}% of portfolio value",
                        pricing.order_value,
                        (order_fraction * Decimal::ONE_HUNDRED).round_dp(2)
                    ),
                ));
            }
        }

        if let Some(max) = portfolio.max_concentration {
            let current = portfolio.position(&draft.instrument_id);
            let post_trade = (current + draft.side.sign() * draft.quantity).abs();
            let concentration = post_trade * pricing.reference_price / pricing.portfolio_value;
            if concentration > max {
                findings.push(
                    Finding::warning(
                        Some("quantity"),
                        format!(
                            "post-trade concentration {} exceeds limit {}",
                            concentration.round_dp(4),
                            max
                        ),
                    )
                    .with_breach(RiskBreach::new(
                        RiskBreachType::Concentration,
                        Severity::Warning,
                        concentration,
                        max,
                    )),
                );
            }
        }
        findings
    }
}
