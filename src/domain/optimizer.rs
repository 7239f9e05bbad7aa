//! Long-only minimum-variance weights.
//!
//! Minimizes `wᵀ Σ w` subject to `w ≥ 0` and `Σ w = 1`, with Σ the sample
//! covariance of a short return window. Solved by projected gradient descent:
//! each step moves against the gradient `2 Σ w` and projects back onto the
//! probability simplex. Plain `f64` arithmetic; the asset set is small.

use std::collections::BTreeMap;

use super::asset::{AllocationWeights, Ticker};

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub min_samples: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub fallback: AllocationWeights,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            min_samples: 10,
            max_iterations: 10_000,
            tolerance: 1e-10,
            fallback: AllocationWeights::from_trusted(&[(Ticker::Qqq, 0.6), (Ticker::Spy, 0.4)]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    InsufficientHistory { samples: usize, minimum: usize },
    NonFiniteInput,
    NotConverged { iterations: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizationOutcome {
    Optimal(AllocationWeights),
    Fallback {
        weights: AllocationWeights,
        reason: FallbackReason,
    },
}

impl OptimizationOutcome {
    pub fn weights(&self) -> &AllocationWeights {
        match self {
            OptimizationOutcome::Optimal(w) => w,
            OptimizationOutcome::Fallback { weights, .. } => weights,
        }
    }

    pub fn into_weights(self) -> AllocationWeights {
        match self {
            OptimizationOutcome::Optimal(w) => w,
            OptimizationOutcome::Fallback { weights, .. } => weights,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, OptimizationOutcome::Fallback { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MinVarianceOptimizer {
    config: OptimizerConfig,
}

impl MinVarianceOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        MinVarianceOptimizer { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// `returns` rows are periods, columns follow `assets`. Rows with a missing
    /// return (or of the wrong width) are dropped before estimating.
    pub fn optimize(&self, returns: &[Vec<Option<f64>>], assets: &[Ticker]) -> OptimizationOutcome {
        let samples: Vec<Vec<f64>> = returns
            .iter()
            .filter(|row| row.len() == assets.len())
            .filter_map(|row| row.iter().copied().collect::<Option<Vec<f64>>>())
            .collect();

        if assets.is_empty() || samples.len() < self.config.min_samples {
            return self.fallback(FallbackReason::InsufficientHistory {
                samples: samples.len(),
                minimum: self.config.min_samples,
            });
        }
        if samples.iter().flatten().any(|v| !v.is_finite()) {
            return self.fallback(FallbackReason::NonFiniteInput);
        }

        let cov = covariance(&samples, assets.len());
        match solve_simplex_qp(&cov, self.config.max_iterations, self.config.tolerance) {
            Some(w) => {
                let map: BTreeMap<Ticker, f64> = assets.iter().copied().zip(w).collect();
                match AllocationWeights::new(map) {
                    Ok(weights) => OptimizationOutcome::Optimal(weights),
                    Err(_) => self.fallback(FallbackReason::NonFiniteInput),
                }
            }
            None => self.fallback(FallbackReason::NotConverged {
                iterations: self.config.max_iterations,
            }),
        }
    }

    fn fallback(&self, reason: FallbackReason) -> OptimizationOutcome {
        tracing::debug!(?reason, "optimizer using fallback weights");
        OptimizationOutcome::Fallback {
            weights: self.config.fallback.clone(),
            reason,
        }
    }
}

/// Sample covariance (n - 1 denominator), row-major `n_assets x n_assets`.
pub fn covariance(samples: &[Vec<f64>], n_assets: usize) -> Vec<Vec<f64>> {
    let n = samples.len();
    let mut cov = vec![vec![0.0; n_assets]; n_assets];
    if n < 2 {
        return cov;
    }
    let means: Vec<f64> = (0..n_assets)
        .map(|j| samples.iter().map(|row| row[j]).sum::<f64>() / n as f64)
        .collect();
    for i in 0..n_assets {
        for j in i..n_assets {
            let s: f64 = samples
                .iter()
                .map(|row| (row[i] - means[i]) * (row[j] - means[j]))
                .sum();
            let v = s / (n - 1) as f64;
            cov[i][j] = v;
            cov[j][i] = v;
        }
    }
    cov
}

/// Minimize `wᵀ Σ w` over the probability simplex. `None` if not converged.
fn solve_simplex_qp(cov: &[Vec<f64>], max_iterations: usize, tolerance: f64) -> Option<Vec<f64>> {
    let n = cov.len();
    let mut w = vec![1.0 / n as f64; n];

    // Gradient 2Σw is Lipschitz with constant 2·λmax(Σ) ≤ 2·max row abs sum.
    let bound = cov
        .iter()
        .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0_f64, f64::max);
    if bound == 0.0 {
        return Some(w);
    }
    let step = 1.0 / (2.0 * bound);

    for _ in 0..max_iterations {
        let grad: Vec<f64> = cov
            .iter()
            .map(|row| 2.0 * row.iter().zip(&w).map(|(c, x)| c * x).sum::<f64>())
            .collect();
        let candidate: Vec<f64> = w.iter().zip(&grad).map(|(x, g)| x - step * g).collect();
        let next = project_to_simplex(&candidate);
        let delta = next
            .iter()
            .zip(&w)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f64, f64::max);
        w = next;
        if delta < tolerance {
            return Some(w);
        }
    }
    None
}

/// Euclidean projection onto `{w : w ≥ 0, Σw = 1}` (sort-based).
pub fn project_to_simplex(v: &[f64]) -> Vec<f64> {
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (i, &u) in sorted.iter().enumerate() {
        cumulative += u;
        let t = (cumulative - 1.0) / (i + 1) as f64;
        if u - t > 0.0 {
            theta = t;
        }
    }

    let mut w: Vec<f64> = v.iter().map(|x| (x - theta).max(0.0)).collect();
    // Renormalize away rounding so the weight invariant holds exactly enough.
    let total: f64 = w.iter().sum();
    if total > 0.0 {
        w.iter_mut().for_each(|x| *x /= total);
    }
    w
}
