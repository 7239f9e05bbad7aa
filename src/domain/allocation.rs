//! Regime-to-allocation table and the current-allocation snapshot.

use super::asset::{AllocationWeights, Ticker};
use super::regime::Regime;

/// What a regime asks the portfolio to hold.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimePlaybook {
    pub strategy: String,
    pub primary: Ticker,
    pub weights: AllocationWeights,
}

impl RegimePlaybook {
    fn new(strategy: &str, primary: Ticker, pairs: &[(Ticker, f64)]) -> Self {
        RegimePlaybook {
            strategy: strategy.to_string(),
            primary,
            weights: AllocationWeights::from_trusted(pairs),
        }
    }
}

/// One fixed playbook per regime, stored in [`Regime::ALL`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationTable {
    playbooks: [RegimePlaybook; 8],
}

fn default_playbook(regime: Regime) -> RegimePlaybook {
    use Ticker::*;

    match regime {
        Regime::Growth => {
            RegimePlaybook::new("Aggressive Growth", Qqq, &[(Qqq, 0.6), (Spy, 0.4)])
        }
        Regime::OverboughtTrim => RegimePlaybook::new(
            "Tactical De-risking",
            Shy,
            &[(Qqq, 0.2), (Spy, 0.2), (Shy, 0.6)],
        ),
        Regime::OversoldOpportunity => {
            RegimePlaybook::new("Aggressive Re-entry", Qqq, &[(Qqq, 0.7), (Spy, 0.3)])
        }
        Regime::TighteningWarning => RegimePlaybook::new(
            "Tightening Defense",
            Shy,
            &[(Qqq, 0.3), (Spy, 0.3), (Shy, 0.4)],
        ),
        Regime::Neutral => RegimePlaybook::new("Capital Preservation", Shy, &[(Shy, 1.0)]),
        Regime::Stagflation => {
            RegimePlaybook::new("Inflation Hedge", Gld, &[(Gld, 0.4), (Shy, 0.6)])
        }
        Regime::DeflationaryRecession => {
            RegimePlaybook::new("Recession Shelter", Shy, &[(Shy, 1.0)])
        }
        Regime::LiquidityCrunch => RegimePlaybook::new("Nuclear Safety", Shy, &[(Shy, 1.0)]),
    }
}

impl Default for AllocationTable {
    fn default() -> Self {
        AllocationTable {
            playbooks: Regime::ALL.map(default_playbook),
        }
    }
}

impl AllocationTable {
    pub fn playbook(&self, regime: Regime) -> &RegimePlaybook {
        &self.playbooks[regime.index()]
    }

    pub fn weights(&self, regime: Regime) -> &AllocationWeights {
        &self.playbook(regime).weights
    }

    /// Replace the weights for one regime, keeping its strategy name.
    pub fn set_weights(&mut self, regime: Regime, weights: AllocationWeights) {
        let primary = weights
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(t, _)| t)
            .unwrap_or(Ticker::Shy);
        let playbook = &mut self.playbooks[regime.index()];
        playbook.primary = primary;
        playbook.weights = weights;
    }
}

/// One line of the persisted target allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRow {
    pub ticker: Ticker,
    pub weight: f64,
    pub regime: Regime,
    pub strategy: String,
}

/// Target allocation for the most recent regime only; not a time series.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationSnapshot {
    pub regime: Regime,
    pub strategy: String,
    pub primary: Ticker,
    pub rows: Vec<AllocationRow>,
}

impl AllocationSnapshot {
    /// Snapshot for the last regime in `regimes`; `None` when there is none.
    pub fn latest(regimes: &[Regime], table: &AllocationTable) -> Option<Self> {
        regimes.last().map(|&regime| Self::for_regime(regime, table))
    }

    pub fn for_regime(regime: Regime, table: &AllocationTable) -> Self {
        let playbook = table.playbook(regime);
        let rows = playbook
            .weights
            .iter()
            .filter(|&(_, w)| w > 0.0)
            .map(|(ticker, weight)| AllocationRow {
                ticker,
                weight,
                regime,
                strategy: playbook.strategy.clone(),
            })
            .collect();
        AllocationSnapshot {
            regime,
            strategy: playbook.strategy.clone(),
            primary: playbook.primary,
            rows,
        }
    }
}
