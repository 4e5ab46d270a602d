use super::{Check, Finding, OrderDraft, ValidationContext};

/// Portfolio and instrument must resolve and be active.
pub struct ReferenceDataCheck;

impl Check for ReferenceDataCheck {
    fn name(&self) -> &str {
        "ReferenceData"
    }

    fn check(&self, draft: &OrderDraft, ctx: &ValidationContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        match ctx.portfolio {
            None => findings.push(Finding::error(
                Some("portfolio_id"),
                format!("portfolio {} not found", draft.portfolio_id),
            )),
            Some(p) if !p.is_active => findings.push(Finding::error(
                Some("portfolio_id"),
                format!("portfolio {} is not active", draft.portfolio_id),
            )),
            Some(_) => {}
        }
        match ctx.instrument {
            None => findings.push(Finding::error(
                Some("instrument_id"),
                format!("instrument {} not found", draft.instrument_id),
            )),
            Some(i) if !i.is_active => findings.push(Finding::error(
                Some("instrument_id"),
                format!("instrument {} is not active", draft.instrument_id),
            )),
            Some(_) => {}
        }
        findings
    }
}
