#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use macrosentinel::domain::allocation::AllocationSnapshot;
use macrosentinel::domain::asset::Ticker;
use macrosentinel::domain::backtest::BacktestResult;
use macrosentinel::domain::error::SentinelError;
use macrosentinel::domain::frame::{IndicatorFrame, IndicatorRow};
use macrosentinel::domain::regime::Classification;
use macrosentinel::ports::data_port::DataPort;
use macrosentinel::ports::report_port::ReportPort;
use std::cell::RefCell;

pub struct MockDataPort {
    pub rows: Vec<IndicatorRow>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new(rows: Vec<IndicatorRow>) -> Self {
        Self { rows, error: None }
    }

    pub fn with_error(reason: &str) -> Self {
        Self {
            rows: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl DataPort for MockDataPort {
    fn load_frame(&self) -> Result<IndicatorFrame, SentinelError> {
        if let Some(reason) = &self.error {
            return Err(SentinelError::InputParse {
                line: 1,
                reason: reason.clone(),
            });
        }
        let mut frame = IndicatorFrame::new(self.rows.clone());
        frame.forward_fill();
        Ok(frame)
    }
}

#[derive(Default)]
pub struct MockReportPort {
    pub results: RefCell<Vec<(usize, String)>>,
    pub allocations: RefCell<Vec<(AllocationSnapshot, String)>>,
}

impl ReportPort for MockReportPort {
    fn write_results(
        &self,
        _frame: &IndicatorFrame,
        _classifications: &[Classification],
        result: &BacktestResult,
        output_path: &str,
    ) -> Result<(), SentinelError> {
        self.results
            .borrow_mut()
            .push((result.steps.len(), output_path.to_string()));
        Ok(())
    }

    fn write_allocation(
        &self,
        snapshot: &AllocationSnapshot,
        output_path: &str,
    ) -> Result<(), SentinelError> {
        self.allocations
            .borrow_mut()
            .push((snapshot.clone(), output_path.to_string()));
        Ok(())
    }
}

pub fn hour(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
        + chrono::Duration::hours(i as i64)
}

/// Macro backdrop shared by every generated row.
#[derive(Debug, Clone, Copy)]
pub struct Backdrop {
    pub labor: f64,
    pub manufacturing: f64,
    pub cpi: f64,
    pub cpi_last_year: f64,
    pub yield_spread: f64,
    pub vix: f64,
}

impl Backdrop {
    /// Strong growth pulse, calm inflation, positive curve.
    pub fn goldilocks() -> Self {
        Backdrop {
            labor: 0.5,
            manufacturing: 0.5,
            cpi: 310.0,
            cpi_last_year: 302.0,
            yield_spread: 0.4,
            vix: 14.0,
        }
    }

    /// Hot inflation with a contracting pulse.
    pub fn stagflation() -> Self {
        Backdrop {
            labor: -0.3,
            manufacturing: -0.2,
            cpi: 320.0,
            cpi_last_year: 300.0,
            yield_spread: 0.5,
            vix: 26.0,
        }
    }
}

pub fn make_row(i: usize, backdrop: Backdrop, prices: &[(Ticker, f64)]) -> IndicatorRow {
    let mut row = IndicatorRow::new(hour(i));
    row.cpi = Some(backdrop.cpi);
    row.cpi_last_year = Some(backdrop.cpi_last_year);
    row.yield_spread = Some(backdrop.yield_spread);
    row.vix = Some(backdrop.vix);
    row.sentiment.labor_market = Some(backdrop.labor);
    row.sentiment.manufacturing = Some(backdrop.manufacturing);
    row.sentiment.monetary_policy = Some(0.0);
    row.prices = prices.iter().copied().collect();
    row
}

/// `count` rows with a zig-zag drift, so RSI stays away from the extremes.
pub fn generate_rows(count: usize, backdrop: Backdrop) -> Vec<IndicatorRow> {
    (0..count)
        .map(|i| {
            let wiggle = if i % 2 == 0 { 1.0 } else { -1.0 };
            let drift = i as f64 * 0.05;
            make_row(
                i,
                backdrop,
                &[
                    (Ticker::Qqq, 400.0 + drift + 2.0 * wiggle),
                    (Ticker::Spy, 500.0 + drift + 1.5 * wiggle),
                    (Ticker::Gld, 190.0 - 0.5 * wiggle),
                    (Ticker::Shy, 82.0 + i as f64 * 0.001),
                ],
            )
        })
        .collect()
}

pub const INDICATOR_HEADER: &str = "Timestamp,QQQ,SPY,GLD,SHY,Inflation_CPI,Inflation_CPI_LastYear,\
Yield_Curve_10Y2Y,VIX_Index,M2_Money_Supply,M2_Money_Supply_LastYear,Labor_Market,Manufacturing,Monetary_Policy";

/// Render rows as an indicator CSV in the on-disk input format.
pub fn to_csv(rows: &[IndicatorRow]) -> String {
    let mut out = String::from(INDICATOR_HEADER);
    out.push('\n');
    let cell = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for row in rows {
        let fields = [
            row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            cell(row.price(Ticker::Qqq)),
            cell(row.price(Ticker::Spy)),
            cell(row.price(Ticker::Gld)),
            cell(row.price(Ticker::Shy)),
            cell(row.cpi),
            cell(row.cpi_last_year),
            cell(row.yield_spread),
            cell(row.vix),
            cell(row.m2),
            cell(row.m2_last_year),
            cell(row.sentiment.labor_market),
            cell(row.sentiment.manufacturing),
            cell(row.sentiment.monetary_policy),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}
