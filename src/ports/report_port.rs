//! Report output port trait.

use crate::domain::allocation::AllocationSnapshot;
use crate::domain::backtest::BacktestResult;
use crate::domain::error::SentinelError;
use crate::domain::frame::IndicatorFrame;
use crate::domain::regime::Classification;

/// Port for persisting backtest results and the current target allocation.
pub trait ReportPort {
    /// One row per simulated step, joined with its indicator row and signals.
    fn write_results(
        &self,
        frame: &IndicatorFrame,
        classifications: &[Classification],
        result: &BacktestResult,
        output_path: &str,
    ) -> Result<(), SentinelError>;

    fn write_allocation(
        &self,
        snapshot: &AllocationSnapshot,
        output_path: &str,
    ) -> Result<(), SentinelError>;
}
