//! Pre-trade validation: well-formedness, reference data, limits, risk score
//! and cost estimate.
//!
//! The validator is a pure function over the snapshots it is handed. The
//! caller resolves portfolio and instrument data before calling it.

use crate::config::{CostModel, RiskScoring};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use oms::{
    AllocationMethod, AllocationRequest, CreateOrderRequest, InstrumentId, InstrumentSnapshot,
    Order, OrderSide, OrderType, PortfolioId, PortfolioSnapshot, RiskBreach, RiskLimits, TenantId,
    TimeInForce,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod allocation_requests;
pub mod concentration;
pub mod order_value;
pub mod position_limit;
pub mod positive_quantity;
pub mod price_rules;
pub mod reference_data;
pub mod required_fields;
pub mod scoring;
pub mod time_in_force;

pub use scoring::CostEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

/// One observation made by a [`Check`].
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub level: Level,
    pub field: Option<&'static str>,
    pub message: String,
    pub breach: Option<RiskBreach>,
}

impl Finding {
    pub fn error(field: Option<&'static str>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            field,
            message: message.into(),
            breach: None,
        }
    }

    pub fn warning(field: Option<&'static str>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            field,
            message: message.into(),
            breach: None,
        }
    }

    pub fn with_breach(mut self, breach: RiskBreach) -> Self {
        self.breach = Some(breach);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub check: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

/// Outcome of validating one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub breaches: Vec<RiskBreach>,
    /// Only computed for structurally valid orders.
    pub order_value: Option<Decimal>,
    pub risk_score: Option<f64>,
    pub cost_estimate: Option<CostEstimate>,
}

impl ValidationReport {
    fn empty() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            breaches: Vec::new(),
            order_value: None,
            risk_score: None,
            cost_estimate: None,
        }
    }

    /// A failed report carrying a single error.
    pub fn rejected(
        check: impl Into<String>,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        let mut report = Self::empty();
        report.errors.push(ValidationIssue {
            check: check.into(),
            field: field.map(str::to_string),
            message: message.into(),
        });
        report.is_valid = false;
        report
    }

    fn absorb(&mut self, check: &str, findings: Vec<Finding>) {
        for finding in findings {
            let issue = ValidationIssue {
                check: check.to_string(),
                field: finding.field.map(str::to_string),
                message: finding.message,
            };
            if let Some(breach) = finding.breach {
                self.breaches.push(breach);
            }
            match finding.level {
                Level::Error => self.errors.push(issue),
                Level::Warning => self.warnings.push(issue),
            }
        }
        self.is_valid = self.errors.is_empty();
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("no errors");
        }
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.check, e.message))
            .collect();
        f.write_str(&messages.join("; "))
    }
}

/// The order as it would exist after the request is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub tenant_id: TenantId,
    pub portfolio_id: PortfolioId,
    pub instrument_id: InstrumentId,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub time_in_force: TimeInForce,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub expire_at: Option<DateTime<Utc>>,
    pub risk_limits: RiskLimits,
    pub allocation_method: Option<AllocationMethod>,
    pub allocations: Vec<AllocationRequest>,
}

impl OrderDraft {
    pub fn from_request(request: &CreateOrderRequest) -> Self {
        Self {
            tenant_id: request.tenant_id.clone(),
            portfolio_id: request.portfolio_id.clone(),
            instrument_id: request.instrument_id.clone(),
            order_type: request.order_type,
            side: request.side,
            time_in_force: request.time_in_force,
            quantity: request.quantity,
            filled_quantity: Decimal::ZERO,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            expire_at: request.expire_at,
            risk_limits: request.risk_limits.clone().unwrap_or_default(),
            allocation_method: request.allocation_method,
            allocations: request.allocations.clone(),
        }
    }

    /// Draft of an existing order, used to re-validate a modification.
    pub fn from_order(order: &Order, allocations: Vec<AllocationRequest>) -> Self {
        Self {
            tenant_id: order.tenant_id().clone(),
            portfolio_id: order.portfolio_id().clone(),
            instrument_id: order.instrument_id().clone(),
            order_type: order.order_type(),
            side: order.side(),
            time_in_force: order.time_in_force(),
            quantity: order.quantity(),
            filled_quantity: order.filled_quantity(),
            limit_price: order.limit_price(),
            stop_price: order.stop_price(),
            expire_at: order.expire_at(),
            risk_limits: order.risk_limits().clone(),
            allocation_method: order.allocation_method(),
            allocations,
        }
    }

    /// Limit price, else stop price, else the instrument's last price.
    pub fn reference_price(&self, instrument: Option<&InstrumentSnapshot>) -> Option<Decimal> {
        self.limit_price
            .or(self.stop_price)
            .or_else(|| instrument.map(|i| i.last_price))
    }
}

/// Valuation of a structurally valid order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pricing {
    pub reference_price: Decimal,
    pub order_value: Decimal,
    pub portfolio_value: Decimal,
}

/// Everything a [`Check`] may consult besides the draft itself.
pub struct ValidationContext<'a> {
    pub portfolio: Option<&'a PortfolioSnapshot>,
    pub instrument: Option<&'a InstrumentSnapshot>,
    pub now: DateTime<Utc>,
    /// Set only for the limit checks, which run after the structural ones passed.
    pub pricing: Option<Pricing>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(
        portfolio: Option<&'a PortfolioSnapshot>,
        instrument: Option<&'a InstrumentSnapshot>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            portfolio,
            instrument,
            now,
            pricing: None,
        }
    }
}

pub trait Check: Send + Sync {
    fn name(&self) -> &str;

    /// Inspects the draft.
    ///
    /// # Arguments
    ///
    /// * `draft` - The order as it would exist after the request.
    /// * `ctx` - Reference snapshots and, for limit checks, the order valuation.
    ///
    /// # Returns
    ///
    /// * `Vec<Finding>` - Empty when the draft passes.
    fn check(&self, draft: &OrderDraft, ctx: &ValidationContext) -> Vec<Finding>;
}

pub struct OrderValidator {
    structural: Vec<Box<dyn Check>>,
    limits: Vec<Box<dyn Check>>,
    scoring: RiskScoring,
    costs: CostModel,
}

impl OrderValidator {
    pub fn new(scoring: RiskScoring, costs: CostModel) -> Self {
        Self {
            structural: Vec::new(),
            limits: Vec::new(),
            scoring,
            costs,
        }
    }

    /// The standard rule set, in evaluation order.
    pub fn with_default_checks(scoring: RiskScoring, costs: CostModel) -> Self {
        let large_order_fraction = scoring.large_order_fraction;
        let mut validator = Self::new(scoring, costs);
        validator.add_check(Box::new(required_fields::RequiredFieldsCheck));
        validator.add_check(Box::new(positive_quantity::PositiveQuantityCheck));
        validator.add_check(Box::new(price_rules::PriceRulesCheck));
        validator.add_check(Box::new(time_in_force::TimeInForceCheck));
        validator.add_check(Box::new(allocation_requests::AllocationRequestsCheck));
        validator.add_check(Box::new(reference_data::ReferenceDataCheck));
        validator.add_limit_check(Box::new(position_limit::PositionLimitCheck));
        validator.add_limit_check(Box::new(concentration::ConcentrationCheck {
            large_order_fraction,
        }));
        validator.add_limit_check(Box::new(order_value::OrderValueLimitCheck));
        validator
    }

    /// Adds a rule that runs on every draft.
    pub fn add_check(&mut self, check: Box<dyn Check>) {
        self.structural.push(check);
    }

    /// Adds a rule that only runs once the draft is structurally valid and priced.
    pub fn add_limit_check(&mut self, check: Box<dyn Check>) {
        self.limits.push(check);
    }

    pub fn validate(&self, draft: &OrderDraft, ctx: &ValidationContext) -> ValidationReport {
        let mut report = ValidationReport::empty();

        for check in &self.structural {
            let findings = check.check(draft, ctx);
            log_findings(check.name(), draft, &findings);
            report.absorb(check.name(), findings);
        }
        if !report.is_valid {
            return report;
        }

        let (Some(portfolio), Some(instrument)) = (ctx.portfolio, ctx.instrument) else {
            return report;
        };
        let Some(reference_price) = draft.reference_price(Some(instrument)) else {
            report.absorb(
                "Pricing",
                vec![Finding::error(Some("price"), "no reference price available")],
            );
            return report;
        };

        let pricing = Pricing {
            reference_price,
            order_value: draft.quantity * reference_price,
            portfolio_value: portfolio.total_value,
        };
        let priced = ValidationContext {
            portfolio: ctx.portfolio,
            instrument: ctx.instrument,
            now: ctx.now,
            pricing: Some(pricing),
        };
        for check in &self.limits {
            let findings = check.check(draft, &priced);
            log_findings(check.name(), draft, &findings);
            report.absorb(check.name(), findings);
        }

        report.order_value = Some(pricing.order_value);
        report.risk_score = Some(scoring::risk_score(
            &self.scoring,
            pricing.order_value,
            pricing.portfolio_value,
            instrument,
        ));
        report.cost_estimate = Some(scoring::estimate_costs(
            &self.costs,
            draft.order_type,
            pricing.order_value,
        ));
        report
    }
}

fn log_findings(check: &str, draft: &OrderDraft, findings: &[Finding]) {
    for finding in findings {
        match finding.level {
            Level::Error => warn!(
                "Order for {} {} rejected by check {}: {}",
                draft.portfolio_id, draft.instrument_id, check, finding.message
            ),
            Level::Warning => debug!(
                "Order for {} {} warned by check {}: {}",
                draft.portfolio_id, draft.instrument_id, check, finding.message
            ),
        }
    }
}
