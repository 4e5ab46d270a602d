//! Post-trade execution quality analysis.

use crate::config::BestExecutionThresholds;
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use oms::model::execution::weighted_average_price;
use oms::{MarketBar, MarketDataProvider, Order, OrderExecution, OrderId, OrderSide};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl fmt::Display for ExecutionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_uppercase())
    }
}

/// Market benchmarks over the analysis window and the average fill price's
/// slippage against each, in basis points. Positive slippage is adverse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Benchmarks {
    pub vwap: Option<Decimal>,
    pub twap: Option<Decimal>,
    pub close: Option<Decimal>,
    pub vwap_slippage_bps: Option<f64>,
    pub twap_slippage_bps: Option<f64>,
    pub close_slippage_bps: Option<f64>,
    pub bars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueStats {
    pub fills: usize,
    pub quantity: Decimal,
    /// Share of the order's quantity filled on this venue.
    pub fill_rate: f64,
    pub average_price: Decimal,
    /// Improvement over the arrival price in basis points; positive is favourable.
    pub price_improvement_bps: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestExecutionReport {
    pub order_id: OrderId,
    pub fill_rate: f64,
    pub arrival_price: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub implementation_shortfall_bps: Option<f64>,
    /// Shortfall in settlement currency over the filled quantity.
    pub implementation_shortfall_amount: Option<Decimal>,
    pub benchmarks: Option<Benchmarks>,
    pub venues: BTreeMap<String, VenueStats>,
    pub quality: ExecutionQuality,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

pub struct BestExecutionAnalyzer {
    market_data: Arc<dyn MarketDataProvider>,
    thresholds: BestExecutionThresholds,
}

impl BestExecutionAnalyzer {
    pub fn new(market_data: Arc<dyn MarketDataProvider>, thresholds: BestExecutionThresholds) -> Self {
        Self {
            market_data,
            thresholds,
        }
    }

    /// Builds the execution quality report of an order from its recorded fills.
    ///
    /// # Arguments
    ///
    /// * `order` - The order, for quantity, side and arrival price.
    /// * `executions` - Every execution recorded against the order.
    ///
    /// # Returns
    ///
    /// * `BestExecutionReport` - Benchmarks are omitted when market data is
    ///   unavailable for the window.
    pub fn analyze(&self, order: &Order, executions: &[OrderExecution]) -> BestExecutionReport {
        let fill_rate = ratio(order.filled_quantity(), order.quantity());
        let arrival = order.arrival_price();
        let average = weighted_average_price(executions);
        let side = order.side().sign();

        let shortfall_bps = match (arrival, average) {
            (Some(a), Some(p)) => signed_bps(p, a, side),
            _ => None,
        };
        let shortfall_amount = match (arrival, average) {
            (Some(a), Some(p)) => Some((p - a) * side * order.filled_quantity()),
            _ => None,
        };

        let benchmarks = average.and_then(|avg| self.benchmarks(order, executions, avg, side));

        let mut venues: BTreeMap<String, VenueStats> = BTreeMap::new();
        for execution in executions {
            let stats = venues
                .entry(execution.venue().to_string())
                .or_insert_with(|| VenueStats {
                    fills: 0,
                    quantity: Decimal::ZERO,
                    fill_rate: 0.0,
                    average_price: Decimal::ZERO,
                    price_improvement_bps: None,
                });
            stats.fills += 1;
            stats.quantity += execution.quantity();
        }
        for (venue, stats) in venues.iter_mut() {
            stats.fill_rate = ratio(stats.quantity, order.quantity());
            stats.average_price =
                weighted_average_price(executions.iter().filter(|e| e.venue() == venue))
                    .unwrap_or(Decimal::ZERO);
            stats.price_improvement_bps = arrival
                .and_then(|a| signed_bps(stats.average_price, a, side))
                .map(|bps| -bps);
        }

        let quality = self.rate(fill_rate, shortfall_bps, executions.is_empty());
        let recommendations =
            self.recommend(fill_rate, shortfall_bps, benchmarks.as_ref(), &venues, order.side());

        debug!(
            "Best execution for {}: fill rate {:.4}, shortfall {:?} bps, quality {}",
            order.client_order_id(),
            fill_rate,
            shortfall_bps,
            quality
        );

        BestExecutionReport {
            order_id: order.id(),
            fill_rate,
            arrival_price: arrival,
            average_price: average,
            implementation_shortfall_bps: shortfall_bps,
            implementation_shortfall_amount: shortfall_amount,
            benchmarks,
            venues,
            quality,
            recommendations,
            generated_at: Utc::now(),
        }
    }

    fn benchmarks(
        &self,
        order: &Order,
        executions: &[OrderExecution],
        average: Decimal,
        side: Decimal,
    ) -> Option<Benchmarks> {
        let window = Duration::minutes(self.thresholds.window_minutes);
        let last_fill = executions
            .iter()
            .map(|e| e.executed_at())
            .max()
            .unwrap_or(order.created_at());
        let from = order.created_at() - window;
        let to = last_fill + window;

        let bars = match self.market_data.bars(order.instrument_id(), from, to) {
            Ok(bars) if !bars.is_empty() => bars,
            Ok(_) => {
                warn!(
                    "No market data for {} between {} and {}",
                    order.instrument_id(),
                    from,
                    to
                );
                return None;
            }
            Err(e) => {
                warn!(
                    "Market data unavailable for {}: {}",
                    order.instrument_id(),
                    e
                );
                return None;
            }
        };

        let vwap = vwap(&bars);
        let twap = twap(&bars);
        let close = bars.iter().max_by_key(|b| b.timestamp).map(|b| b.close);
        Some(Benchmarks {
            vwap,
            twap,
            close,
            vwap_slippage_bps: vwap.and_then(|b| signed_bps(average, b, side)),
            twap_slippage_bps: twap.and_then(|b| signed_bps(average, b, side)),
            close_slippage_bps: close.and_then(|b| signed_bps(average, b, side)),
            bars: bars.len(),
        })
    }

    fn rate(&self, fill_rate: f64, shortfall_bps: Option<f64>, no_fills: bool) -> ExecutionQuality {
        if no_fills {
            return ExecutionQuality::Poor;
        }
        let max = self.thresholds.max_shortfall_bps;
        let shortfall = shortfall_bps.unwrap_or(0.0).max(0.0);
        let filled_enough = fill_rate >= self.thresholds.min_fill_rate;
        if filled_enough && shortfall <= 0.2 * max {
            ExecutionQuality::Excellent
        } else if shortfall <= 0.6 * max {
            ExecutionQuality::Good
        } else if shortfall <= max {
            ExecutionQuality::Fair
        } else {
            ExecutionQuality::Poor
        }
    }

    fn recommend(
        &self,
        fill_rate: f64,
        shortfall_bps: Option<f64>,
        benchmarks: Option<&Benchmarks>,
        venues: &BTreeMap<String, VenueStats>,
        side: OrderSide,
    ) -> Vec<String> {
        let t = &self.thresholds;
        let mut out = Vec::new();

        if fill_rate < t.min_fill_rate {
            out.push(format!(
                "Fill rate {:.1}% is below the {:.1}% target; review order sizing and time in force",
                fill_rate * 100.0,
                t.min_fill_rate * 100.0
            ));
        }
        if let Some(bps) = shortfall_bps.filter(|bps| *bps > t.max_shortfall_bps) {
            out.push(format!(
                "Implementation shortfall of {:.1} bps exceeds {:.1} bps; consider working the {:?} order over a longer horizon",
                bps, t.max_shortfall_bps, side
            ));
        }
        if let Some(bps) = benchmarks
            .and_then(|b| b.vwap_slippage_bps)
            .filter(|bps| *bps > t.max_vwap_slippage_bps)
        {
            out.push(format!(
                "Average price is {:.1} bps worse than VWAP; consider a VWAP-tracking strategy",
                bps
            ));
        }
        let poor_venues: Vec<&str> = venues
            .iter()
            .filter(|(_, s)| {
                s.price_improvement_bps
                    .is_some_and(|bps| bps < t.min_price_improvement_bps)
            })
            .map(|(v, _)| v.as_str())
            .collect();
        if !poor_venues.is_empty() {
            out.push(format!(
                "No price improvement on {}; consider additional venues",
                poor_venues.join(", ")
            ));
        }
        if venues.len() == 1 && fill_rate < 1.0 {
            out.push("All fills came from a single venue; consider routing to more venues".to_string());
        }
        if out.is_empty() {
            out.push("Execution within configured thresholds".to_string());
        }
        out
    }
}

fn ratio(part: Decimal, whole: Decimal) -> f64 {
    if whole.is_zero() {
        return 0.0;
    }
    (part / whole).to_f64().unwrap_or(0.0)
}

/// `(price - benchmark) / benchmark` in bps, signed so that paying more on a
/// buy (or receiving less on a sell) is positive.
fn signed_bps(price: Decimal, benchmark: Decimal, side: Decimal) -> Option<f64> {
    if benchmark.is_zero() {
        return None;
    }
    ((price - benchmark) / benchmark * side * Decimal::from(10_000)).to_f64()
}

fn vwap(bars: &[MarketBar]) -> Option<Decimal> {
    let volume: Decimal = bars.iter().map(|b| b.volume).sum();
    if volume.is_zero() {
        return None;
    }
    Some(bars.iter().map(|b| b.typical_price() * b.volume).sum::<Decimal>() / volume)
}

fn twap(bars: &[MarketBar]) -> Option<Decimal> {
    if bars.is_empty() {
        return None;
    }
    Some(bars.iter().map(|b| b.close).sum::<Decimal>() / Decimal::from(bars.len()))
}
