//! Fixed tradable universe and checked allocation weights.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::SentinelError;

/// Tolerance used when checking that weights sum to one.
pub const WEIGHT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ticker {
    Qqq,
    Spy,
    Xlf,
    Xlu,
    Gld,
    Shy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    Equity,
    Commodity,
    Cash,
}

impl Ticker {
    pub const ALL: [Ticker; 6] = [
        Ticker::Qqq,
        Ticker::Spy,
        Ticker::Xlf,
        Ticker::Xlu,
        Ticker::Gld,
        Ticker::Shy,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Ticker::Qqq => "QQQ",
            Ticker::Spy => "SPY",
            Ticker::Xlf => "XLF",
            Ticker::Xlu => "XLU",
            Ticker::Gld => "GLD",
            Ticker::Shy => "SHY",
        }
    }

    pub fn asset_class(self) -> AssetClass {
        match self {
            Ticker::Qqq | Ticker::Spy | Ticker::Xlf | Ticker::Xlu => AssetClass::Equity,
            Ticker::Gld => AssetClass::Commodity,
            Ticker::Shy => AssetClass::Cash,
        }
    }

    pub fn is_equity(self) -> bool {
        self.asset_class() == AssetClass::Equity
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Ticker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Ticker::ALL
            .into_iter()
            .find(|t| t.symbol() == upper)
            .ok_or_else(|| format!("unknown ticker '{}'", s.trim()))
    }
}

/// Non-negative weights over [`Ticker`]s that sum to one.
///
/// The invariant is checked when the value is built; every transformation
/// (`apply_volatility_governor`) preserves it.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationWeights {
    weights: BTreeMap<Ticker, f64>,
}

impl AllocationWeights {
    pub fn new(weights: BTreeMap<Ticker, f64>) -> Result<Self, SentinelError> {
        for (ticker, &w) in &weights {
            if !w.is_finite() || w < 0.0 {
                return Err(SentinelError::InvalidWeights {
                    reason: format!("{} has weight {}", ticker, w),
                });
            }
        }
        let total: f64 = weights.values().sum();
        if (total - 1.0).abs() > WEIGHT_EPSILON {
            return Err(SentinelError::InvalidWeights {
                reason: format!("weights sum to {:.8}, expected 1.0", total),
            });
        }
        let weights = weights.into_iter().filter(|&(_, w)| w > 0.0).collect();
        Ok(Self { weights })
    }

    pub fn from_pairs(pairs: &[(Ticker, f64)]) -> Result<Self, SentinelError> {
        let mut map = BTreeMap::new();
        for &(ticker, w) in pairs {
            *map.entry(ticker).or_insert(0.0) += w;
        }
        Self::new(map)
    }

    /// Built-in tables whose sums are known at compile time.
    pub(crate) fn from_trusted(pairs: &[(Ticker, f64)]) -> Self {
        let weights: BTreeMap<Ticker, f64> = pairs.iter().copied().collect();
        debug_assert!((weights.values().sum::<f64>() - 1.0).abs() <= WEIGHT_EPSILON);
        Self { weights }
    }

    /// Parse `QQQ:0.6, SPY:0.4`.
    pub fn parse(list: &str) -> Result<Self, SentinelError> {
        let mut pairs = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (symbol, weight) = part.split_once(':').ok_or_else(|| {
                SentinelError::InvalidWeights {
                    reason: format!("expected TICKER:WEIGHT, got '{}'", part),
                }
            })?;
            let ticker = symbol
                .parse::<Ticker>()
                .map_err(|reason| SentinelError::InvalidWeights { reason })?;
            let weight = weight
                .trim()
                .parse::<f64>()
                .map_err(|e| SentinelError::InvalidWeights {
                    reason: format!("{}: {}", symbol.trim(), e),
                })?;
            pairs.push((ticker, weight));
        }
        Self::from_pairs(&pairs)
    }

    /// 100% in a single asset.
    pub fn single(ticker: Ticker) -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(ticker, 1.0);
        Self { weights }
    }

    pub fn get(&self, ticker: Ticker) -> f64 {
        self.weights.get(&ticker).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ticker, f64)> + '_ {
        self.weights.iter().map(|(&t, &w)| (t, w))
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn is_single(&self, ticker: Ticker) -> bool {
        self.weights.len() == 1 && (self.get(ticker) - 1.0).abs() <= WEIGHT_EPSILON
    }

    /// Scale every equity weight by `keep` and move the freed fraction into `cash`.
    pub fn apply_volatility_governor(&self, keep: f64, cash: Ticker) -> Self {
        let keep = keep.clamp(0.0, 1.0);
        let mut weights = self.weights.clone();
        let mut freed = 0.0;
        for (ticker, w) in weights.iter_mut() {
            if ticker.is_equity() {
                let reduced = *w * keep;
                freed += *w - reduced;
                *w = reduced;
            }
        }
        if freed > 0.0 {
            *weights.entry(cash).or_insert(0.0) += freed;
        }
        weights.retain(|_, w| *w > 0.0);
        Self { weights }
    }

    /// Weighted sum of per-ticker returns; tickers without a return contribute zero.
    pub fn dot(&self, returns: &BTreeMap<Ticker, f64>) -> f64 {
        self.weights
            .iter()
            .filter_map(|(t, w)| returns.get(t).map(|r| w * r))
            .sum()
    }
}

impl fmt::Display for AllocationWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .weights
            .iter()
            .map(|(t, w)| format!("{}:{:.2}%", t, w * 100.0))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}
