use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "order-engine.toml";

/// Engine configuration.
///
/// Every field has a default, so an empty file (or no file at all) yields a
/// working engine. Environment variables override the file, e.g.
/// `OMS__COSTS__MIN_COMMISSION=2.5`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub log_level: String,
    pub client_order_id_prefix: String,
    /// Business days between trade date and settlement date.
    pub settlement_days: u32,
    /// Capacity of the lifecycle event broadcast channel.
    pub event_buffer: usize,
    pub risk: RiskScoring,
    pub costs: CostModel,
    pub concurrency: ConcurrencyConfig,
    pub best_execution: BestExecutionThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            client_order_id_prefix: "ORD".to_string(),
            settlement_days: 2,
            event_buffer: 1024,
            risk: RiskScoring::default(),
            costs: CostModel::default(),
            concurrency: ConcurrencyConfig::default(),
            best_execution: BestExecutionThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Layers defaults, the optional TOML file and `OMS__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("OMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

/// Weights of the 0-100 order risk score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskScoring {
    pub base_score: f64,
    /// Cap of the size component (one point per percent of portfolio value).
    pub size_weight_max: f64,
    pub low_liquidity_penalty: f64,
    pub medium_liquidity_penalty: f64,
    pub volatility_threshold: f64,
    pub volatility_penalty: f64,
    pub high_volatility_threshold: f64,
    pub high_volatility_penalty: f64,
    pub max_score: f64,
    /// Orders above this fraction of portfolio value get a size warning.
    pub large_order_fraction: f64,
}

impl Default for RiskScoring {
    fn default() -> Self {
        Self {
            base_score: 10.0,
            size_weight_max: 30.0,
            low_liquidity_penalty: 20.0,
            medium_liquidity_penalty: 10.0,
            volatility_threshold: 0.3,
            volatility_penalty: 15.0,
            high_volatility_threshold: 0.5,
            high_volatility_penalty: 10.0,
            max_score: 100.0,
            large_order_fraction: 0.10,
        }
    }
}

/// Pre-trade transaction cost model. Rates are in basis points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModel {
    pub commission_bps: Decimal,
    pub min_commission: Decimal,
    pub fee_bps: Decimal,
    pub market_impact_bps_market: Decimal,
    pub market_impact_bps_other: Decimal,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            commission_bps: Decimal::from(5),
            min_commission: Decimal::new(100, 2),
            fee_bps: Decimal::ONE,
            market_impact_bps_market: Decimal::from(20),
            market_impact_bps_other: Decimal::from(10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Attempts of a versioned read-modify-write before giving up.
    pub max_version_retries: u32,
    /// Idle per-order locks are pruned once the registry grows past this size.
    pub lock_prune_threshold: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_version_retries: 5,
            lock_prune_threshold: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BestExecutionThresholds {
    /// Market data is pulled from creation minus this window to the last fill plus it.
    pub window_minutes: i64,
    pub min_fill_rate: f64,
    pub max_shortfall_bps: f64,
    pub max_vwap_slippage_bps: f64,
    pub min_price_improvement_bps: f64,
}

impl Default for BestExecutionThresholds {
    fn default() -> Self {
        Self {
            window_minutes: 30,
            min_fill_rate: 0.95,
            max_shortfall_bps: 25.0,
            max_vwap_slippage_bps: 10.0,
            min_price_improvement_bps: 0.0,
        }
    }
}
