//! Performance metrics for a completed backtest.

use std::collections::BTreeMap;

use super::backtest::BacktestResult;
use super::regime::Regime;

/// Hourly bars over a US equity session year.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0 * 7.0;

/// Shorter runs report the raw total return instead of compounding it out to a year.
pub const MIN_ANNUALIZATION_YEARS: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub benchmark_return: f64,
    /// Final strategy minus benchmark value, in percentage points.
    pub alpha: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of steps spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub regime_changes: usize,
    pub circuit_breaker_steps: usize,
    pub governor_steps: usize,
    /// Fraction of steps spent in each regime that occurred.
    pub regime_share: BTreeMap<Regime, f64>,
}

impl Metrics {
    pub fn compute(result: &BacktestResult, periods_per_year: f64, risk_free_rate: f64) -> Self {
        let steps = &result.steps;
        // The final step is a zero-return placeholder with no period behind it.
        let returns: Vec<f64> = match steps.split_last() {
            Some((_, realized)) => realized.iter().map(|s| s.realized_return).collect(),
            None => Vec::new(),
        };

        let total_return = result.final_state.portfolio_value - 1.0;
        let benchmark_return = result.final_state.benchmark_value - 1.0;

        let years = returns.len() as f64 / periods_per_year;
        let annualized_return = annualize(total_return, years);

        let mut curve = Vec::with_capacity(steps.len() + 1);
        curve.push(1.0);
        curve.extend(steps.iter().map(|s| s.portfolio_value));
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&curve);

        let period_rf = risk_free_rate / periods_per_year;
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(&returns, period_rf, periods_per_year);

        let regime_changes = steps
            .windows(2)
            .filter(|w| w[0].regime != w[1].regime)
            .count();

        let mut counts: BTreeMap<Regime, usize> = BTreeMap::new();
        for step in steps {
            *counts.entry(step.regime).or_insert(0) += 1;
        }
        let regime_share = counts
            .into_iter()
            .map(|(regime, n)| (regime, n as f64 / steps.len() as f64))
            .collect();

        Metrics {
            total_return,
            benchmark_return,
            alpha: result.final_alpha(),
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            regime_changes,
            circuit_breaker_steps: steps.iter().filter(|s| s.circuit_breaker_active).count(),
            governor_steps: steps.iter().filter(|s| s.governor_active).count(),
            regime_share,
        }
    }
}

fn annualize(total_return: f64, years: f64) -> f64 {
    if years < MIN_ANNUALIZATION_YEARS || total_return <= -1.0 {
        return total_return;
    }
    let annualized = (1.0 + total_return).powf(1.0 / years) - 1.0;
    if annualized.is_finite() {
        annualized
    } else {
        total_return
    }
}

fn compute_drawdown(curve: &[f64]) -> (f64, usize) {
    let Some(&first) = curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut current_duration = 0usize;

    for &value in curve {
        if value >= peak {
            peak = value;
            current_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        }
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(returns: &[f64], period_rf: f64, periods_per_year: f64) -> (f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess_return = mean - period_rf;
    let scale = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        excess_return / stddev * scale
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum();
    let downside_stddev = (downside / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        excess_return / downside_stddev * scale
    } else {
        0.0
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::{AllocationWeights, Ticker};
    use crate::domain::backtest::{SimulationState, StepResult};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn step(i: usize, regime: Regime, realized: f64, value: f64, breaker: bool) -> StepResult {
        StepResult {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap()
                + chrono::Duration::hours(i as i64),
            regime,
            weights: AllocationWeights::single(Ticker::Shy),
            forward_returns: BTreeMap::new(),
            realized_return: realized,
            friction: 0.0,
            governor_active: false,
            circuit_breaker_active: breaker,
            portfolio_value: value,
            high_water_mark: value,
            drawdown: 0.0,
            benchmark_value: 1.0,
            alpha: (value - 1.0) * 100.0,
        }
    }

    fn result(steps: Vec<StepResult>) -> BacktestResult {
        let last = steps.last().map(|s| s.portfolio_value).unwrap_or(1.0);
        BacktestResult {
            steps,
            final_state: SimulationState {
                portfolio_value: last,
                ..SimulationState::default()
            },
        }
    }

    #[test]
    fn empty_result() {
        let m = Metrics::compute(&result(Vec::new()), 252.0, 0.0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert!(m.regime_share.is_empty());
    }

    #[test]
    fn short_run_is_not_extrapolated() {
        let steps: Vec<StepResult> = (0..30)
            .map(|i| step(i, Regime::Growth, 0.02, 1.02_f64.powi(i as i32 + 1), false))
            .collect();
        let m = Metrics::compute(&result(steps), DEFAULT_PERIODS_PER_YEAR, 0.0);
        assert!(m.annualized_return.is_finite());
        assert_relative_eq!(m.annualized_return, m.total_return, epsilon = 1e-12);
    }

    #[test]
    fn multi_year_run_is_annualized() {
        // Four realized periods at two per year: 21% over two years is 10% a year.
        let steps = vec![
            step(0, Regime::Growth, 0.05, 1.05, false),
            step(1, Regime::Growth, 0.05, 1.1, false),
            step(2, Regime::Growth, 0.05, 1.15, false),
            step(3, Regime::Growth, 0.05, 1.2, false),
            step(4, Regime::Growth, 0.0, 1.21, false),
        ];
        let m = Metrics::compute(&result(steps), 2.0, 0.0);
        assert_relative_eq!(m.annualized_return, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn huge_exponent_falls_back_to_total_return() {
        assert_eq!(annualize(1e100, 0.25), 1e100);
        assert_eq!(annualize(-1.0, 2.0), -1.0);
        assert_relative_eq!(annualize(0.21, 2.0), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn drawdown_and_duration() {
        let (dd, duration) = compute_drawdown(&[1.0, 1.1, 0.99, 1.045, 1.2, 1.14]);
        assert_relative_eq!(dd, 0.1, epsilon = 1e-12);
        assert_eq!(duration, 2);
    }

    #[test]
    fn counts_regime_changes_and_breaker_steps() {
        let steps = vec![
            step(0, Regime::Growth, 0.01, 1.01, false),
            step(1, Regime::Growth, -0.02, 0.9898, false),
            step(2, Regime::Neutral, 0.0, 0.9898, true),
            step(3, Regime::Growth, 0.0, 0.9898, false),
        ];
        let m = Metrics::compute(&result(steps), 252.0, 0.0);
        assert_eq!(m.regime_changes, 2);
        assert_eq!(m.circuit_breaker_steps, 1);
        assert_relative_eq!(m.regime_share[&Regime::Growth], 0.75);
        assert_relative_eq!(m.regime_share[&Regime::Neutral], 0.25);
        assert_relative_eq!(m.total_return, -0.0102, epsilon = 1e-12);
    }

    #[test]
    fn sharpe_zero_for_flat_returns() {
        let (sharpe, sortino) = compute_risk_adjusted(&[0.0, 0.0, 0.0], 0.0, 252.0);
        assert_eq!(sharpe, 0.0);
        assert_eq!(sortino, 0.0);
    }

    #[test]
    fn sharpe_sign_follows_mean() {
        let (up, _) = compute_risk_adjusted(&[0.02, -0.01, 0.02, -0.01], 0.0, 252.0);
        let (down, sortino) = compute_risk_adjusted(&[-0.02, 0.01, -0.02, 0.01], 0.0, 252.0);
        assert!(up > 0.0);
        assert!(down < 0.0);
        assert!(sortino < 0.0);
    }
}
