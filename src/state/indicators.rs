use ta::{
    indicators::{RelativeStrengthIndex, SimpleMovingAverage},
    Next,
};

use crate::models::PricePoint;

/// Summary of a price series for the chart header.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeriesSummary {
    pub first: f64,
    pub last: f64,
    pub min: f64,
    pub max: f64,
    pub sma_20: Option<f64>,
    pub rsi_14: Option<f64>,
}

impl SeriesSummary {
    pub fn from_points(points: &[PricePoint]) -> Option<Self> {
        let prices: Vec<f64> = points.iter().map(|p| p.price).collect();
        let first = *prices.first()?;
        let last = *prices.last()?;

        let min = prices.iter().copied().fold(f64::INFINITY, f64::min);
        let max = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            first,
            last,
            min,
            max,
            sma_20: run_indicator(&prices, 20, SimpleMovingAverage::new(20).ok()),
            rsi_14: run_indicator(&prices, 14, RelativeStrengthIndex::new(14).ok()),
        })
    }

    pub fn change_pct(&self) -> f64 {
        if self.first == 0.0 {
            0.0
        } else {
            (self.last - self.first) / self.first * 100.0
        }
    }
}

fn run_indicator<I: Next<f64, Output = f64>>(
    prices: &[f64],
    period: usize,
    indicator: Option<I>,
) -> Option<f64> {
    if prices.len() < period {
        return None;
    }
    let mut indicator = indicator?;
    prices.iter().fold(None, |_, &p| Some(indicator.next(p)))
}
