use log::{info, warn};
use oms::{
    ComplianceCheckResult, ComplianceFlag, ComplianceFlagType, ComplianceProvider, Order, Severity,
};
use std::sync::Arc;

/// One-shot pre-trade gate run on a new order before it is stored.
///
/// Consults the restricted list and the concentration verdict. Any BLOCKING
/// flag fails the gate. If the compliance service cannot be reached the gate
/// fails closed.
pub struct PreTradeComplianceGate {
    provider: Arc<dyn ComplianceProvider>,
}

impl PreTradeComplianceGate {
    pub fn new(provider: Arc<dyn ComplianceProvider>) -> Self {
        Self { provider }
    }

    pub fn check(&self, order: &Order) -> ComplianceCheckResult {
        let mut flags = Vec::new();

        match self
            .provider
            .is_restricted(order.tenant_id(), order.instrument_id())
        {
            Ok(true) => flags.push(ComplianceFlag::new(
                ComplianceFlagType::RestrictedInstrument,
                Severity::Blocking,
                format!("instrument {} is on the restricted list", order.instrument_id()),
            )),
            Ok(false) => {}
            Err(e) => {
                warn!("Restricted-list check failed for order {}: {}", order.id(), e);
                flags.push(unavailable(e.to_string()));
            }
        }

        match self.provider.check_concentration(order) {
            Ok(verdict) if !verdict.passed => flags.push(ComplianceFlag::new(
                ComplianceFlagType::ConcentrationLimit,
                verdict.severity,
                verdict.message,
            )),
            Ok(_) => {}
            Err(e) => {
                warn!("Concentration check failed for order {}: {}", order.id(), e);
                flags.push(unavailable(e.to_string()));
            }
        }

        let result = ComplianceCheckResult::from_flags(flags);
        if result.passed {
            info!(
                "Order {} passed pre-trade compliance ({} flags)",
                order.client_order_id(),
                result.flags.len()
            );
        } else {
            warn!(
                "Order {} blocked by pre-trade compliance: {:?}",
                order.client_order_id(),
                result
                    .blocking_flags()
                    .iter()
                    .map(|f| f.description.as_str())
                    .collect::<Vec<_>>()
            );
        }
        result
    }
}

fn unavailable(reason: String) -> ComplianceFlag {
    ComplianceFlag::new(
        ComplianceFlagType::ComplianceUnavailable,
        Severity::Blocking,
        format!("compliance service unavailable: {}", reason),
    )
}
