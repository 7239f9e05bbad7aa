//! Sequential backtest simulator.
//!
//! Walks the indicator frame in timestamp order. Each step decides weights
//! from information available at `t` and is paid by the market move from `t`
//! to `t + 1`:
//!
//! 1. Drawdown from the high-water mark
//! 2. Circuit breaker (all cash) when drawdown reaches the limit
//! 3. Otherwise regime weights, from the table or the walk-forward optimizer
//! 4. Volatility governor cuts equity exposure when VIX runs hot
//! 5. Realized return = weights · forward returns, less friction on a regime change
//! 6. Portfolio value, high-water mark, and benchmark compound
//!
//! The state is an explicit value threaded through [`Simulator::step`], so a
//! single step can be replayed in isolation.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::allocation::AllocationTable;
use super::asset::{AllocationWeights, Ticker};
use super::frame::IndicatorFrame;
use super::optimizer::MinVarianceOptimizer;
use super::regime::Regime;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub max_drawdown_limit: f64,
    /// Drawdown below which an engaged breaker releases. `None` releases as
    /// soon as drawdown is back under `max_drawdown_limit`.
    pub circuit_breaker_resume: Option<f64>,
    pub vix_threshold: f64,
    /// Fraction of each equity weight kept while the governor is active.
    pub equity_keep: f64,
    pub friction_cost: f64,
    pub cash_asset: Ticker,
    pub benchmark: Ticker,
    pub use_optimizer: bool,
    pub growth_assets: Vec<Ticker>,
    pub burn_in: usize,
    pub optimizer_window: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            max_drawdown_limit: 0.05,
            circuit_breaker_resume: None,
            vix_threshold: 20.0,
            equity_keep: 0.5,
            friction_cost: 0.0002,
            cash_asset: Ticker::Shy,
            benchmark: Ticker::Spy,
            use_optimizer: false,
            growth_assets: vec![Ticker::Qqq, Ticker::Spy, Ticker::Xlf, Ticker::Xlu],
            burn_in: 30,
            optimizer_window: 30,
        }
    }
}

/// Path-dependent state carried from one step to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub portfolio_value: f64,
    pub high_water_mark: f64,
    pub benchmark_value: f64,
    pub last_regime: Option<Regime>,
    pub circuit_breaker_active: bool,
}

impl Default for SimulationState {
    fn default() -> Self {
        SimulationState {
            portfolio_value: 1.0,
            high_water_mark: 1.0,
            benchmark_value: 1.0,
            last_regime: None,
            circuit_breaker_active: false,
        }
    }
}

impl SimulationState {
    pub fn drawdown(&self) -> f64 {
        if self.high_water_mark > 0.0 {
            (self.high_water_mark - self.portfolio_value) / self.high_water_mark
        } else {
            0.0
        }
    }
}

/// Everything a single step needs besides the carried state.
#[derive(Debug, Clone)]
pub struct StepInput {
    pub timestamp: NaiveDateTime,
    pub regime: Regime,
    pub vix: f64,
    pub base_weights: AllocationWeights,
    /// Return from this step to the next, per ticker. Empty on the final step.
    pub forward_returns: BTreeMap<Ticker, f64>,
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub timestamp: NaiveDateTime,
    pub regime: Regime,
    /// Weights actually held, after the breaker and governor.
    pub weights: AllocationWeights,
    pub forward_returns: BTreeMap<Ticker, f64>,
    pub realized_return: f64,
    /// Transaction cost charged this step; non-zero only on a regime change.
    pub friction: f64,
    pub governor_active: bool,
    pub circuit_breaker_active: bool,
    pub portfolio_value: f64,
    pub high_water_mark: f64,
    /// Drawdown after this step's return.
    pub drawdown: f64,
    pub benchmark_value: f64,
    /// Strategy minus benchmark value, in percentage points.
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub steps: Vec<StepResult>,
    pub final_state: SimulationState,
}

impl BacktestResult {
    pub fn final_value(&self) -> f64 {
        self.final_state.portfolio_value
    }

    pub fn final_alpha(&self) -> f64 {
        self.steps.last().map(|s| s.alpha).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Simulator {
    config: BacktestConfig,
    table: AllocationTable,
    optimizer: MinVarianceOptimizer,
}

impl Simulator {
    pub fn new(
        config: BacktestConfig,
        table: AllocationTable,
        optimizer: MinVarianceOptimizer,
    ) -> Self {
        Simulator {
            config,
            table,
            optimizer,
        }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn table(&self) -> &AllocationTable {
        &self.table
    }

    /// Whether the breaker holds for a step starting from `state`.
    pub fn breaker_engaged(&self, state: &SimulationState) -> bool {
        let drawdown = state.drawdown();
        if drawdown >= self.config.max_drawdown_limit {
            return true;
        }
        match self.config.circuit_breaker_resume {
            Some(resume) if state.circuit_breaker_active => drawdown >= resume,
            _ => false,
        }
    }

    /// Advance one step. Pure: the same state and input always give the same result.
    pub fn step(&self, state: &SimulationState, input: &StepInput) -> (SimulationState, StepResult) {
        let c = &self.config;
        let breaker = self.breaker_engaged(state);

        let governor = !breaker && input.vix > c.vix_threshold;
        let weights = if breaker {
            AllocationWeights::single(c.cash_asset)
        } else if governor {
            input
                .base_weights
                .apply_volatility_governor(c.equity_keep, c.cash_asset)
        } else {
            input.base_weights.clone()
        };

        let regime_changed = state.last_regime.is_some_and(|prev| prev != input.regime);
        let (realized_return, friction, benchmark_return) = if input.is_final {
            (0.0, 0.0, 0.0)
        } else {
            let gross = weights.dot(&input.forward_returns);
            let friction = if regime_changed { c.friction_cost } else { 0.0 };
            let bench = input.forward_returns.get(&c.benchmark).copied().unwrap_or(0.0);
            (gross - friction, friction, bench)
        };

        let portfolio_value = state.portfolio_value * (1.0 + realized_return);
        let next = SimulationState {
            portfolio_value,
            high_water_mark: state.high_water_mark.max(portfolio_value),
            benchmark_value: state.benchmark_value * (1.0 + benchmark_return),
            last_regime: Some(input.regime),
            circuit_breaker_active: breaker,
        };

        if breaker != state.circuit_breaker_active {
            if breaker {
                tracing::info!(
                    timestamp = %input.timestamp,
                    drawdown = state.drawdown(),
                    "circuit breaker engaged"
                );
            } else {
                tracing::info!(timestamp = %input.timestamp, "circuit breaker released");
            }
        }

        let result = StepResult {
            timestamp: input.timestamp,
            regime: input.regime,
            weights,
            forward_returns: input.forward_returns.clone(),
            realized_return,
            friction,
            governor_active: governor,
            circuit_breaker_active: breaker,
            portfolio_value: next.portfolio_value,
            high_water_mark: next.high_water_mark,
            drawdown: next.drawdown(),
            benchmark_value: next.benchmark_value,
            alpha: (next.portfolio_value - next.benchmark_value) * 100.0,
        };
        (next, result)
    }

    /// Weights the regime asks for at `index`, before breaker and governor.
    ///
    /// Growth consults the optimizer (when enabled) over the trailing window of
    /// backward-looking returns ending at `index`; the first `burn_in` steps
    /// use the table's Growth weights.
    pub fn base_weights(
        &self,
        frame: &IndicatorFrame,
        index: usize,
        regime: Regime,
        growth_assets: &[Ticker],
    ) -> AllocationWeights {
        let c = &self.config;
        if regime != Regime::Growth || !c.use_optimizer || growth_assets.is_empty() {
            return self.table.weights(regime).clone();
        }
        if index < c.burn_in {
            return self.table.weights(Regime::Growth).clone();
        }
        let start = (index + 1).saturating_sub(c.optimizer_window).max(1);
        let window: Vec<Vec<Option<f64>>> = (start..=index)
            .map(|i| {
                growth_assets
                    .iter()
                    .map(|&t| frame.trailing_return(i, t))
                    .collect()
            })
            .collect();
        self.optimizer.optimize(&window, growth_assets).into_weights()
    }

    /// Walk the whole frame. `regimes` runs parallel to the frame's rows.
    pub fn run(&self, frame: &IndicatorFrame, regimes: &[Regime]) -> BacktestResult {
        let mut state = SimulationState::default();
        let n = frame.len().min(regimes.len());
        if n < 2 {
            return BacktestResult {
                steps: Vec::new(),
                final_state: state,
            };
        }

        let tickers = frame.tickers();
        let growth_assets: Vec<Ticker> = self
            .config
            .growth_assets
            .iter()
            .copied()
            .filter(|t| tickers.contains(t))
            .collect();

        let mut steps = Vec::with_capacity(n);
        for (index, (row, &regime)) in frame.rows().iter().zip(regimes).enumerate() {
            let is_final = index + 1 == n;
            let forward_returns: BTreeMap<Ticker, f64> = if is_final {
                BTreeMap::new()
            } else {
                tickers
                    .iter()
                    .filter_map(|&t| frame.forward_return(index, t).map(|r| (t, r)))
                    .collect()
            };
            let base_weights = if self.breaker_engaged(&state) {
                // Overridden by the breaker; skip the optimizer.
                AllocationWeights::single(self.config.cash_asset)
            } else {
                self.base_weights(frame, index, regime, &growth_assets)
            };
            let input = StepInput {
                timestamp: row.timestamp,
                regime,
                vix: row.vix.filter(|v| v.is_finite()).unwrap_or(0.0),
                base_weights,
                forward_returns,
                is_final,
            };
            let (next, result) = self.step(&state, &input);
            state = next;
            steps.push(result);
        }

        BacktestResult {
            steps,
            final_state: state,
        }
    }
}
