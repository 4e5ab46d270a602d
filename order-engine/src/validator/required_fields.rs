use super::{Check, Finding, OrderDraft, ValidationContext};

/// Tenant, portfolio and instrument references must be present.
pub struct RequiredFieldsCheck;

impl Check for RequiredFieldsCheck {
    fn name(&self) -> &str {
        "RequiredFields"
    }

    fn check(&self, draft: &OrderDraft, _ctx: &ValidationContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        if draft.tenant_id.is_blank() {
            findings.push(Finding::error(Some("tenant_id"), "tenant is required"));
        }
        if draft.portfolio_id.is_blank() {
            findings.push(Finding::error(Some("portfolio_id"), "portfolio is required"));
        }
        if draft.instrument_id.is_blank() {
            findings.push(Finding::error(Some("instrument_id"), "instrument is required"));
        }
        findings
    }
}
