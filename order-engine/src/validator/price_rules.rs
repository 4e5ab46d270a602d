use super::{Check, Finding, OrderDraft, ValidationContext};
use rust_decimal::Decimal;

/// Limit and stop prices are required or forbidden depending on the order type.
///
/// | type                         | limit     | stop      |
/// |------------------------------|-----------|-----------|
/// | Market, MarketOnOpen/OnClose | forbidden | forbidden |
/// | Limit                        | required  | forbidden |
/// | Stop                         | forbidden | required  |
/// | StopLimit                    | required  | required  |
pub struct PriceRulesCheck;

impl Check for PriceRulesCheck {
    fn name(&self) -> &str {
        "PriceRules"
    }

    fn check(&self, draft: &OrderDraft, _ctx: &ValidationContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        let order_type = draft.order_type;

        match (order_type.requires_limit_price(), draft.limit_price) {
            (true, None) => findings.push(Finding::error(
                Some("limit_price"),
                format!("{:?} order requires a limit price", order_type),
            )),
            (false, Some(_)) => findings.push(Finding::error(
                Some("limit_price"),
                format!("{:?} order must not carry a limit price", order_type),
            )),
            _ => {}
        }
        match (order_type.requires_stop_price(), draft.stop_price) {
            (true, None) => findings.push(Finding::error(
                Some("stop_price"),
                format!("{:?} order requires a stop price", order_type),
            )),
            (false, Some(_)) => findings.push(Finding::error(
                Some("stop_price"),
                format!("{:?} order must not carry a stop price", order_type),
            )),
            _ => {}
        }

        for (field, price) in [("limit_price", draft.limit_price), ("stop_price", draft.stop_price)] {
            if let Some(price) = price.filter(|p| *p <= Decimal::ZERO) {
                findings.push(Finding::error(
                    Some(field),
                    format!("{} must be positive, got {}", field, price),
                ));
            }
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::fixtures::market_buy;
    use chrono::Utc;
    use oms::OrderType;
    use rust_decimal_macros::dec;

    fn run(draft: &OrderDraft) -> Vec<Finding> {
        PriceRulesCheck.check(draft, &ValidationContext::new(None, None, Utc::now()))
    }

    #[test]
    fn limit_order_needs_limit_price() {
        let mut draft = market_buy(dec!(10));
        draft.order_type = OrderType::Limit;
        assert_eq!(run(&draft)[0].field, Some("limit_price"));

        draft.limit_price = Some(dec!(10));
        assert!(run(&draft).is_empty());
    }

    #[test]
    fn stop_limit_needs_both_prices() {
        let mut draft = market_buy(dec!(10));
        draft.order_type = OrderType::StopLimit;
        assert_eq!(run(&draft).len(), 2);

        draft.limit_price = Some(dec!(10));
        draft.stop_price = Some(dec!(9.5));
        assert!(run(&draft).is_empty());
    }

    #[test]
    fn market_order_rejects_prices() {
        let mut draft = market_buy(dec!(10));
        draft.stop_price = Some(dec!(9));
        let findings = run(&draft);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].field, Some("stop_price"));
    }

    #[test]
    fn non_positive_price_is_an_error() {
        let mut draft = market_buy(dec!(10));
        draft.order_type = OrderType::Limit;
        draft.limit_price = Some(dec!(0));
        assert_eq!(run(&draft).len(), 1);
    }
}
