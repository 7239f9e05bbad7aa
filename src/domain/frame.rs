//! Indicator rows and the time-indexed indicator frame.
//!
//! A frame merges macro series, market closes, and smoothed sentiment pillars
//! onto one timestamp grid. Any field may be absent; consumers fall back to
//! neutral values instead of failing.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::asset::Ticker;

/// Smoothed news-sentiment pillars, each in [-1, 1].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentimentPillars {
    pub labor_market: Option<f64>,
    pub manufacturing: Option<f64>,
    pub monetary_policy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub timestamp: NaiveDateTime,
    pub cpi: Option<f64>,
    pub cpi_last_year: Option<f64>,
    pub yield_spread: Option<f64>,
    pub vix: Option<f64>,
    pub m2: Option<f64>,
    pub m2_last_year: Option<f64>,
    pub sentiment: SentimentPillars,
    pub prices: BTreeMap<Ticker, f64>,
}

impl IndicatorRow {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        IndicatorRow {
            timestamp,
            cpi: None,
            cpi_last_year: None,
            yield_spread: None,
            vix: None,
            m2: None,
            m2_last_year: None,
            sentiment: SentimentPillars::default(),
            prices: BTreeMap::new(),
        }
    }

    pub fn price(&self, ticker: Ticker) -> Option<f64> {
        self.prices.get(&ticker).copied()
    }

    /// CPI year-over-year change in percent; 0 when either level is missing.
    pub fn inflation_yoy(&self) -> f64 {
        yoy_percent(self.cpi, self.cpi_last_year).unwrap_or(0.0)
    }

    /// M2 year-over-year change in percent, `None` without M2 data.
    pub fn m2_yoy(&self) -> Option<f64> {
        yoy_percent(self.m2, self.m2_last_year)
    }

    /// M2 growth in excess of inflation; 0 without M2 data.
    pub fn real_liquidity(&self) -> f64 {
        match self.m2_yoy() {
            Some(m2) => m2 - self.inflation_yoy(),
            None => 0.0,
        }
    }
}

fn yoy_percent(now: Option<f64>, year_ago: Option<f64>) -> Option<f64> {
    match (now, year_ago) {
        (Some(now), Some(prev)) if prev != 0.0 && now.is_finite() && prev.is_finite() => {
            Some((now / prev - 1.0) * 100.0)
        }
        _ => None,
    }
}

/// Ordered, deduplicated sequence of indicator rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorFrame {
    rows: Vec<IndicatorRow>,
}

impl IndicatorFrame {
    /// Sort by timestamp and collapse duplicate timestamps, keeping the last row seen.
    pub fn new(mut rows: Vec<IndicatorRow>) -> Self {
        let before = rows.len();
        // Stable sort keeps input order among equal timestamps, so the last one wins.
        rows.sort_by_key(|r| r.timestamp);
        let mut deduped: Vec<IndicatorRow> = Vec::with_capacity(rows.len());
        for row in rows {
            match deduped.last_mut() {
                Some(last) if last.timestamp == row.timestamp => *last = row,
                _ => deduped.push(row),
            }
        }
        if deduped.len() < before {
            tracing::debug!(
                dropped = before - deduped.len(),
                "collapsed duplicate timestamps"
            );
        }
        IndicatorFrame { rows: deduped }
    }

    /// Carry the last observed value of every field forward over gaps.
    pub fn forward_fill(&mut self) {
        let mut prev: Option<IndicatorRow> = None;
        for row in self.rows.iter_mut() {
            if let Some(p) = &prev {
                fill(&mut row.cpi, p.cpi);
                fill(&mut row.cpi_last_year, p.cpi_last_year);
                fill(&mut row.yield_spread, p.yield_spread);
                fill(&mut row.vix, p.vix);
                fill(&mut row.m2, p.m2);
                fill(&mut row.m2_last_year, p.m2_last_year);
                fill(&mut row.sentiment.labor_market, p.sentiment.labor_market);
                fill(&mut row.sentiment.manufacturing, p.sentiment.manufacturing);
                fill(
                    &mut row.sentiment.monetary_policy,
                    p.sentiment.monetary_policy,
                );
                for (&ticker, &price) in &p.prices {
                    row.prices.entry(ticker).or_insert(price);
                }
            }
            prev = Some(row.clone());
        }
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }

    /// Close series for one ticker, `None` where the price is absent.
    pub fn closes(&self, ticker: Ticker) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.price(ticker)).collect()
    }

    /// Tickers with at least one price in the frame.
    pub fn tickers(&self) -> Vec<Ticker> {
        Ticker::ALL
            .into_iter()
            .filter(|t| self.rows.iter().any(|r| r.prices.contains_key(t)))
            .collect()
    }

    /// Return from `index` to `index + 1`; `None` at the final row or when a price is missing.
    pub fn forward_return(&self, index: usize, ticker: Ticker) -> Option<f64> {
        let now = self.rows.get(index)?.price(ticker)?;
        let next = self.rows.get(index + 1)?.price(ticker)?;
        simple_return(now, next)
    }

    /// Return from `index - 1` to `index`; `None` at the first row or when a price is missing.
    pub fn trailing_return(&self, index: usize, ticker: Ticker) -> Option<f64> {
        if index == 0 {
            return None;
        }
        let prev = self.rows.get(index - 1)?.price(ticker)?;
        let now = self.rows.get(index)?.price(ticker)?;
        simple_return(prev, now)
    }
}

fn fill(slot: &mut Option<f64>, prev: Option<f64>) {
    if slot.is_none() {
        *slot = prev;
    }
}

fn simple_return(from: f64, to: f64) -> Option<f64> {
    if from > 0.0 && from.is_finite() && to.is_finite() {
        Some(to / from - 1.0)
    } else {
        None
    }
}
