//! Read-only snapshots of reference data consulted during validation.

use super::ids::{InstrumentId, PortfolioId, TenantId};
use super::risk::LiquidityTier;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub id: PortfolioId,
    pub tenant_id: TenantId,
    #[serde(default = "active")]
    pub is_active: bool,
    pub total_value: Decimal,
    /// Hard cap on the absolute position in any one instrument (quantity).
    #[serde(default)]
    pub max_position_size: Option<Decimal>,
    /// Soft cap on one position's value as a fraction of `total_value`.
    #[serde(default)]
    pub max_concentration: Option<Decimal>,
    #[serde(default = "usd")]
    pub base_currency: String,
    #[serde(default)]
    pub positions: HashMap<InstrumentId, Decimal>,
}

fn active() -> bool {
    true
}

fn usd() -> String {
    "USD".to_string()
}

impl PortfolioSnapshot {
    pub fn new(id: impl Into<String>, tenant_id: impl Into<String>, total_value: Decimal) -> Self {
        Self {
            id: PortfolioId::new(id),
            tenant_id: TenantId::new(tenant_id),
            is_active: true,
            total_value,
            max_position_size: None,
            max_concentration: None,
            base_currency: usd(),
            positions: HashMap::new(),
        }
    }

    pub fn with_limits(
        mut self,
        max_position_size: Option<Decimal>,
        max_concentration: Option<Decimal>,
    ) -> Self {
        self.max_position_size = max_position_size;
        self.max_concentration = max_concentration;
        self
    }

    pub fn with_position(mut self, instrument: impl Into<String>, quantity: Decimal) -> Self {
        self.positions.insert(InstrumentId::new(instrument), quantity);
        self
    }

    pub fn position(&self, instrument: &InstrumentId) -> Decimal {
        self.positions.get(instrument).copied().unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    pub id: InstrumentId,
    #[serde(default = "active")]
    pub is_active: bool,
    pub last_price: Decimal,
    pub liquidity_tier: LiquidityTier,
    /// Annualised volatility as a fraction, e.g. 0.35.
    pub volatility: f64,
    #[serde(default = "usd")]
    pub trading_currency: String,
}

impl InstrumentSnapshot {
    pub fn new(id: impl Into<String>, last_price: Decimal) -> Self {
        Self {
            id: InstrumentId::new(id),
            is_active: true,
            last_price,
            liquidity_tier: LiquidityTier::High,
            volatility: 0.0,
            trading_currency: usd(),
        }
    }

    pub fn with_liquidity(mut self, tier: LiquidityTier) -> Self {
        self.liquidity_tier = tier;
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
