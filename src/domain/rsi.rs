//! RSI (Relative Strength Index) on a reference price series.
//!
//! Average gain and average loss are simple means over the trailing `period`
//! price changes:
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//!
//! Warmup: until `period` changes have been observed the output is the
//! neutral value 50. When the window holds no losses the RSI saturates to 100,
//! unless it also holds no gains (a flat window), which reads as 50.

use std::collections::VecDeque;

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const NEUTRAL_RSI: f64 = 50.0;

/// Streaming RSI: each pushed price yields the value known at that sample.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev: Option<f64>,
    changes: VecDeque<f64>,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Rsi {
            period,
            prev: None,
            changes: VecDeque::with_capacity(period + 1),
        }
    }

    pub fn push(&mut self, price: f64) -> f64 {
        if let Some(prev) = self.prev {
            self.changes.push_back(price - prev);
            if self.changes.len() > self.period {
                self.changes.pop_front();
            }
        }
        self.prev = Some(price);
        self.value()
    }

    pub fn value(&self) -> f64 {
        if self.period == 0 || self.changes.len() < self.period {
            return NEUTRAL_RSI;
        }
        let n = self.period as f64;
        let avg_gain = self.changes.iter().filter(|c| **c > 0.0).sum::<f64>() / n;
        let avg_loss = -self.changes.iter().filter(|c| **c < 0.0).sum::<f64>() / n;

        if avg_loss == 0.0 {
            if avg_gain == 0.0 { NEUTRAL_RSI } else { 100.0 }
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        }
    }
}

/// RSI over a full close series. Missing closes repeat the last value.
pub fn calculate_rsi(closes: &[Option<f64>], period: usize) -> Vec<f64> {
    let mut rsi = Rsi::new(period);
    closes
        .iter()
        .map(|c| match c {
            Some(price) if price.is_finite() => rsi.push(*price),
            _ => rsi.value(),
        })
        .collect()
}
