//! CSV report adapter: per-step backtest results and the target allocation.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::adapters::csv_adapter::{InputColumn, TIMESTAMP_HEADER};
use crate::domain::allocation::AllocationSnapshot;
use crate::domain::backtest::BacktestResult;
use crate::domain::error::SentinelError;
use crate::domain::frame::IndicatorFrame;
use crate::domain::regime::Classification;
use crate::ports::report_port::ReportPort;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SIGNAL_HEADERS: [&str; 6] = [
    "RSI",
    "Inflation_YoY",
    "Growth_Pulse",
    "Real_Liquidity",
    "Regime",
    "Allocation",
];

const PERFORMANCE_HEADERS: [&str; 8] = [
    "Strategy_Return",
    "Strategy_Value",
    "High_Water_Mark",
    "Drawdown",
    "Benchmark_Value",
    "Alpha_Basis",
    "Circuit_Breaker",
    "Friction",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AllocationRecord<'a> {
    ticker: &'a str,
    weight: f64,
    regime: &'a str,
    strategy: &'a str,
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_results(
        &self,
        frame: &IndicatorFrame,
        classifications: &[Classification],
        result: &BacktestResult,
        output_path: &str,
    ) -> Result<(), SentinelError> {
        ensure_parent(output_path)?;
        let mut wtr = csv::Writer::from_path(output_path)?;

        let tickers = frame.tickers();
        let input_columns: Vec<InputColumn> = tickers
            .iter()
            .map(|&t| InputColumn::Price(t))
            .chain(InputColumn::MACRO)
            .collect();

        let mut header: Vec<String> = vec![TIMESTAMP_HEADER.to_string()];
        header.extend(input_columns.iter().map(|c| c.header().to_string()));
        header.extend(SIGNAL_HEADERS.iter().map(|h| h.to_string()));
        header.extend(tickers.iter().map(|t| format!("{}_Fwd_Ret", t)));
        header.extend(PERFORMANCE_HEADERS.iter().map(|h| h.to_string()));
        wtr.write_record(&header)?;

        for ((row, class), step) in frame.rows().iter().zip(classifications).zip(&result.steps) {
            let mut record: Vec<String> = Vec::with_capacity(header.len());
            record.push(row.timestamp.format(TIMESTAMP_FORMAT).to_string());
            record.extend(input_columns.iter().map(|c| optional(c.get(row))));

            let signals = &class.signals;
            record.push(signals.rsi.to_string());
            record.push(signals.inflation_yoy.to_string());
            record.push(signals.growth_pulse.to_string());
            record.push(signals.real_liquidity.to_string());
            record.push(step.regime.label().to_string());
            record.push(step.weights.to_string());

            record.extend(
                tickers
                    .iter()
                    .map(|t| optional(step.forward_returns.get(t).copied())),
            );

            record.push(step.realized_return.to_string());
            record.push(step.portfolio_value.to_string());
            record.push(step.high_water_mark.to_string());
            record.push(step.drawdown.to_string());
            record.push(step.benchmark_value.to_string());
            record.push(step.alpha.to_string());
            record.push(step.circuit_breaker_active.to_string());
            record.push(step.friction.to_string());
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        tracing::info!(path = output_path, rows = result.steps.len(), "wrote backtest results");
        Ok(())
    }

    fn write_allocation(
        &self,
        snapshot: &AllocationSnapshot,
        output_path: &str,
    ) -> Result<(), SentinelError> {
        ensure_parent(output_path)?;
        let mut wtr = csv::Writer::from_path(output_path)?;
        for row in &snapshot.rows {
            wtr.serialize(AllocationRecord {
                ticker: row.ticker.symbol(),
                weight: row.weight,
                regime: row.regime.label(),
                strategy: &row.strategy,
            })?;
        }
        wtr.flush()?;
        tracing::info!(path = output_path, regime = %snapshot.regime, "wrote target allocation");
        Ok(())
    }
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn ensure_parent(output_path: &str) -> Result<(), SentinelError> {
    if let Some(parent) = Path::new(output_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::AllocationTable;
    use crate::domain::asset::Ticker;
    use crate::domain::backtest::Simulator;
    use crate::domain::frame::IndicatorRow;
    use crate::domain::regime::{Regime, RegimeClassifier};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_frame() -> IndicatorFrame {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let rows = (0..3)
            .map(|i| {
                let mut row = IndicatorRow::new(start + chrono::Duration::hours(i));
                row.prices.insert(Ticker::Spy, 100.0 + i as f64);
                row.prices.insert(Ticker::Shy, 80.0);
                row.vix = Some(15.0);
                row
            })
            .collect();
        IndicatorFrame::new(rows)
    }

    #[test]
    fn results_have_one_row_per_step() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("results.csv");
        let path = path.to_str().unwrap();

        let frame = sample_frame();
        let classes = RegimeClassifier::default().classify_frame(&frame);
        let regimes: Vec<Regime> = classes.iter().map(|c| c.regime).collect();
        let result = Simulator::default().run(&frame, &regimes);

        CsvReportAdapter::new()
            .write_results(&frame, &classes, &result, path)
            .unwrap();

        let mut rdr = csv::Reader::from_path(path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[0], "Timestamp");
        assert_eq!(&headers[1], "SPY");
        assert!(headers.iter().any(|h| h == "SPY_Fwd_Ret"));
        assert!(headers.iter().any(|h| h == "Circuit_Breaker"));
        let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(&records[0][0], "2024-03-01 10:00:00");
        let regime_idx = headers.iter().position(|h| h == "Regime").unwrap();
        assert_eq!(&records[0][regime_idx], "Neutral / Transitioning");
        let cpi_idx = headers.iter().position(|h| h == "Inflation_CPI").unwrap();
        assert_eq!(&records[0][cpi_idx], "");
    }

    #[test]
    fn allocation_file_lists_non_zero_weights() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("allocation.csv");
        let path = path.to_str().unwrap();

        let snapshot =
            AllocationSnapshot::for_regime(Regime::OverboughtTrim, &AllocationTable::default());
        CsvReportAdapter::new()
            .write_allocation(&snapshot, path)
            .unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("Ticker,Weight,Regime,Strategy"));
        assert_eq!(
            lines.next(),
            Some("QQQ,0.2,Goldilocks (Overbought - Trim),Tactical De-risking")
        );
        assert_eq!(lines.count(), 2);
    }
}
