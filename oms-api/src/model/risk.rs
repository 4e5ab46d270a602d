use super::compliance::Severity;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskBreachType {
    PositionLimit,
    Concentration,
    OrderValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreachResolution {
    Open,
    Acknowledged,
    Resolved,
}

/// A limit breach found while validating an order.
///
/// Informational on its own: only a BLOCKING compliance flag stops an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBreach {
    pub breach_type: RiskBreachType,
    pub severity: Severity,
    pub breach_value: Decimal,
    pub limit_value: Decimal,
    pub detected_at: DateTime<Utc>,
    pub resolution: BreachResolution,
}

impl RiskBreach {
    pub fn new(
        breach_type: RiskBreachType,
        severity: Severity,
        breach_value: Decimal,
        limit_value: Decimal,
    ) -> Self {
        Self {
            breach_type,
            severity,
            breach_value,
            limit_value,
            detected_at: Utc::now(),
            resolution: BreachResolution::Open,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiquidityTier {
    High,
    Medium,
    Low,
}
