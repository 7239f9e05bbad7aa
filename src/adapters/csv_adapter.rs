//! CSV indicator file adapter.
//!
//! Columns are located by header name, so order is free and unknown columns
//! are ignored. Empty cells and `nan` read as missing.

use crate::domain::asset::Ticker;
use crate::domain::error::SentinelError;
use crate::domain::frame::{IndicatorFrame, IndicatorRow};
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::PathBuf;

pub const TIMESTAMP_HEADER: &str = "Timestamp";

/// A recognized numeric input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputColumn {
    Price(Ticker),
    Cpi,
    CpiLastYear,
    YieldSpread,
    Vix,
    M2,
    M2LastYear,
    LaborMarket,
    Manufacturing,
    MonetaryPolicy,
}

impl InputColumn {
    pub const MACRO: [InputColumn; 9] = [
        InputColumn::Cpi,
        InputColumn::CpiLastYear,
        InputColumn::YieldSpread,
        InputColumn::Vix,
        InputColumn::M2,
        InputColumn::M2LastYear,
        InputColumn::LaborMarket,
        InputColumn::Manufacturing,
        InputColumn::MonetaryPolicy,
    ];

    pub fn header(self) -> &'static str {
        match self {
            InputColumn::Price(t) => t.symbol(),
            InputColumn::Cpi => "Inflation_CPI",
            InputColumn::CpiLastYear => "Inflation_CPI_LastYear",
            InputColumn::YieldSpread => "Yield_Curve_10Y2Y",
            InputColumn::Vix => "VIX_Index",
            InputColumn::M2 => "M2_Money_Supply",
            InputColumn::M2LastYear => "M2_Money_Supply_LastYear",
            InputColumn::LaborMarket => "Labor_Market",
            InputColumn::Manufacturing => "Manufacturing",
            InputColumn::MonetaryPolicy => "Monetary_Policy",
        }
    }

    fn from_header(header: &str) -> Option<Self> {
        let header = header.trim();
        if let Ok(ticker) = header.parse::<Ticker>() {
            // Ticker parsing is case-insensitive; headers are not.
            if ticker.symbol() == header {
                return Some(InputColumn::Price(ticker));
            }
        }
        InputColumn::MACRO.into_iter().find(|c| c.header() == header)
    }

    pub fn get(self, row: &IndicatorRow) -> Option<f64> {
        match self {
            InputColumn::Price(t) => row.price(t),
            InputColumn::Cpi => row.cpi,
            InputColumn::CpiLastYear => row.cpi_last_year,
            InputColumn::YieldSpread => row.yield_spread,
            InputColumn::Vix => row.vix,
            InputColumn::M2 => row.m2,
            InputColumn::M2LastYear => row.m2_last_year,
            InputColumn::LaborMarket => row.sentiment.labor_market,
            InputColumn::Manufacturing => row.sentiment.manufacturing,
            InputColumn::MonetaryPolicy => row.sentiment.monetary_policy,
        }
    }

    fn set(self, row: &mut IndicatorRow, value: f64) {
        match self {
            InputColumn::Price(t) => {
                row.prices.insert(t, value);
            }
            InputColumn::Cpi => row.cpi = Some(value),
            InputColumn::CpiLastYear => row.cpi_last_year = Some(value),
            InputColumn::YieldSpread => row.yield_spread = Some(value),
            InputColumn::Vix => row.vix = Some(value),
            InputColumn::M2 => row.m2 = Some(value),
            InputColumn::M2LastYear => row.m2_last_year = Some(value),
            InputColumn::LaborMarket => row.sentiment.labor_market = Some(value),
            InputColumn::Manufacturing => row.sentiment.manufacturing = Some(value),
            InputColumn::MonetaryPolicy => row.sentiment.monetary_policy = Some(value),
        }
    }
}

/// Reads the merged macro, market and sentiment file.
pub struct CsvAdapter {
    path: PathBuf,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DataPort for CsvAdapter {
    fn load_frame(&self) -> Result<IndicatorFrame, SentinelError> {
        if !self.path.is_file() {
            return Err(SentinelError::InputMissing {
                path: self.path.display().to_string(),
            });
        }

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let headers = rdr.headers()?.clone();
        let timestamp_idx = headers
            .iter()
            .position(|h| h == TIMESTAMP_HEADER)
            .ok_or_else(|| SentinelError::InputParse {
                line: 1,
                reason: format!("missing {} column", TIMESTAMP_HEADER),
            })?;
        let columns: Vec<(usize, InputColumn)> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| InputColumn::from_header(h).map(|c| (i, c)))
            .collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let raw_ts = record.get(timestamp_idx).unwrap_or("");
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| SentinelError::InputParse {
                line,
                reason: format!("invalid timestamp '{}'", raw_ts),
            })?;

            let mut row = IndicatorRow::new(timestamp);
            for &(idx, column) in &columns {
                let cell = record.get(idx).unwrap_or("");
                if let Some(value) = parse_cell(cell).map_err(|reason| {
                    SentinelError::InputParse {
                        line,
                        reason: format!("{}: {}", column.header(), reason),
                    }
                })? {
                    column.set(&mut row, value);
                }
            }
            rows.push(row);
        }

        tracing::info!(
            path = %self.path.display(),
            rows = rows.len(),
            "loaded indicator file"
        );
        let mut frame = IndicatorFrame::new(rows);
        frame.forward_fill();
        Ok(frame)
    }
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, the `T`-separated form, a bare date, or
/// RFC 3339. Offsets are dropped and the wall-clock time kept.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_local())
}

/// `Ok(None)` for a missing value, `Err` for text that is not a number.
fn parse_cell(cell: &str) -> Result<Option<f64>, String> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value: f64 = cell
        .parse()
        .map_err(|_| format!("invalid number '{}'", cell))?;
    Ok(value.is_finite().then_some(value))
}
