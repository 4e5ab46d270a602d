use crate::config::{CostModel, RiskScoring};
use oms::{InstrumentSnapshot, LiquidityTier, OrderType};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const BPS: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub commission: Decimal,
    pub fees: Decimal,
    pub market_impact: Decimal,
    pub total: Decimal,
}

/// 0-100 score: base + size + liquidity + volatility, capped.
pub fn risk_score(
    config: &RiskScoring,
    order_value: Decimal,
    portfolio_value: Decimal,
    instrument: &InstrumentSnapshot,
) -> f64 {
    let ratio = if portfolio_value > Decimal::ZERO {
        (order_value / portfolio_value).to_f64().unwrap_or(1.0)
    } else {
        1.0
    };
    let mut score = config.base_score + (ratio * 100.0).clamp(0.0, config.size_weight_max);

    score += match instrument.liquidity_tier {
        LiquidityTier::Low => config.low_liquidity_penalty,
        LiquidityTier::Medium => config.medium_liquidity_penalty,
        LiquidityTier::High => 0.0,
    };
    if instrument.volatility > config.volatility_threshold {
        score += config.volatility_penalty;
    }
    if instrument.volatility > config.high_volatility_threshold {
        score += config.high_volatility_penalty;
    }
    score.min(config.max_score)
}

pub fn estimate_costs(config: &CostModel, order_type: OrderType, order_value: Decimal) -> CostEstimate {
    let commission = (order_value * config.commission_bps / BPS).max(config.min_commission);
    let fees = order_value * config.fee_bps / BPS;
    let impact_bps = if order_type.is_market() {
        config.market_impact_bps_market
    } else {
        config.market_impact_bps_other
    };
    let market_impact = order_value * impact_bps / BPS;
    CostEstimate {
        commission,
        fees,
        market_impact,
        total: commission + fees + market_impact,
    }
}
