//! Macro regime classification.
//!
//! Each row of the indicator frame is reduced to a handful of [`MacroSignals`]
//! and mapped to exactly one [`Regime`] by a fixed precedence order:
//!
//! 1. Liquidity veto (real liquidity below the crunch level)
//! 2. Recession (inverted curve and a contracting growth pulse)
//! 3. Stagflation (hot inflation and a negative growth pulse)
//! 4. Growth family, split by the RSI overlay
//! 5. Neutral
//!
//! With hysteresis enabled the growth family is left only once the pulse falls
//! below a lower exit threshold, and a hawkish, fearful tape demotes an
//! established Growth regime to Tightening-Warning.

use std::fmt;
use std::str::FromStr;

use super::asset::Ticker;
use super::frame::{IndicatorFrame, IndicatorRow};
use super::rsi::{calculate_rsi, NEUTRAL_RSI};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Regime {
    Growth,
    OverboughtTrim,
    OversoldOpportunity,
    TighteningWarning,
    Neutral,
    Stagflation,
    DeflationaryRecession,
    LiquidityCrunch,
}

impl Regime {
    pub const ALL: [Regime; 8] = [
        Regime::Growth,
        Regime::OverboughtTrim,
        Regime::OversoldOpportunity,
        Regime::TighteningWarning,
        Regime::Neutral,
        Regime::Stagflation,
        Regime::DeflationaryRecession,
        Regime::LiquidityCrunch,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Regime::Growth => "Goldilocks (Growth)",
            Regime::OverboughtTrim => "Goldilocks (Overbought - Trim)",
            Regime::OversoldOpportunity => "Goldilocks (Oversold - Opportunity)",
            Regime::TighteningWarning => "Goldilocks (Tightening Warning)",
            Regime::Neutral => "Neutral / Transitioning",
            Regime::Stagflation => "Stagflation (Crisis)",
            Regime::DeflationaryRecession => "Recession/Deflation (Safe Haven)",
            Regime::LiquidityCrunch => "Liquidity Crunch (Defensive)",
        }
    }

    /// Position of this regime in [`Regime::ALL`].
    pub fn index(self) -> usize {
        match self {
            Regime::Growth => 0,
            Regime::OverboughtTrim => 1,
            Regime::OversoldOpportunity => 2,
            Regime::TighteningWarning => 3,
            Regime::Neutral => 4,
            Regime::Stagflation => 5,
            Regime::DeflationaryRecession => 6,
            Regime::LiquidityCrunch => 7,
        }
    }

    /// Lower-case key used in configuration files.
    pub fn short_name(self) -> &'static str {
        match self {
            Regime::Growth => "growth",
            Regime::OverboughtTrim => "overbought-trim",
            Regime::OversoldOpportunity => "oversold-opportunity",
            Regime::TighteningWarning => "tightening-warning",
            Regime::Neutral => "neutral",
            Regime::Stagflation => "stagflation",
            Regime::DeflationaryRecession => "deflationary-recession",
            Regime::LiquidityCrunch => "liquidity-crunch",
        }
    }

    /// Regimes entered through the growth-pulse gate.
    pub fn is_growth_family(self) -> bool {
        matches!(
            self,
            Regime::Growth
                | Regime::OverboughtTrim
                | Regime::OversoldOpportunity
                | Regime::TighteningWarning
        )
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Regime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Regime::ALL
            .into_iter()
            .find(|r| r.label() == trimmed || r.short_name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown regime '{}'", trimmed))
    }
}

/// Thresholds and weights for the classifier. Defaults match the production
/// calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub labor_weight: f64,
    pub manufacturing_weight: f64,
    pub liquidity_crunch: f64,
    pub recession_growth: f64,
    pub stagflation_inflation: f64,
    pub growth_entry: f64,
    pub growth_exit: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub rsi_period: usize,
    pub rsi_reference: Ticker,
    pub hawkish_policy: f64,
    pub vix_fear: f64,
    pub hysteresis: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            labor_weight: 0.6,
            manufacturing_weight: 0.4,
            liquidity_crunch: -1.0,
            recession_growth: -0.1,
            stagflation_inflation: 3.5,
            growth_entry: 0.15,
            growth_exit: 0.05,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            rsi_period: 14,
            rsi_reference: Ticker::Spy,
            hawkish_policy: -0.2,
            vix_fear: 20.0,
            hysteresis: false,
        }
    }
}

/// The derived inputs the decision rules look at.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroSignals {
    pub growth_pulse: f64,
    pub inflation_yoy: f64,
    pub real_liquidity: f64,
    pub yield_spread: f64,
    pub vix: f64,
    pub monetary_policy: f64,
    pub rsi: f64,
}

impl Default for MacroSignals {
    fn default() -> Self {
        MacroSignals {
            growth_pulse: 0.0,
            inflation_yoy: 0.0,
            real_liquidity: 0.0,
            yield_spread: 0.0,
            vix: 0.0,
            monetary_policy: 0.0,
            rsi: NEUTRAL_RSI,
        }
    }
}

impl MacroSignals {
    /// Reduce a row to signals; absent fields read as neutral.
    pub fn from_row(row: &IndicatorRow, rsi: f64, config: &ClassifierConfig) -> Self {
        let labor = neutral(row.sentiment.labor_market);
        let manufacturing = neutral(row.sentiment.manufacturing);
        MacroSignals {
            growth_pulse: config.labor_weight * labor
                + config.manufacturing_weight * manufacturing,
            inflation_yoy: row.inflation_yoy(),
            real_liquidity: row.real_liquidity(),
            yield_spread: neutral(row.yield_spread),
            vix: neutral(row.vix),
            monetary_policy: neutral(row.sentiment.monetary_policy),
            rsi: if rsi.is_finite() { rsi } else { NEUTRAL_RSI },
        }
    }
}

fn neutral(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// A regime decision alongside the signals that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub regime: Regime,
    pub signals: MacroSignals,
}

#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: ClassifierConfig,
}

impl RegimeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        RegimeClassifier { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one set of signals. `previous` is only consulted when
    /// hysteresis is enabled.
    pub fn classify(&self, signals: &MacroSignals, previous: Option<Regime>) -> Regime {
        let c = &self.config;
        // NaN compares false everywhere, which lands on Neutral.
        if signals.real_liquidity < c.liquidity_crunch {
            return Regime::LiquidityCrunch;
        }
        if signals.yield_spread < 0.0 && signals.growth_pulse < c.recession_growth {
            return Regime::DeflationaryRecession;
        }
        if signals.inflation_yoy > c.stagflation_inflation && signals.growth_pulse < 0.0 {
            return Regime::Stagflation;
        }

        let previous = if c.hysteresis { previous } else { None };
        let in_growth = previous.is_some_and(Regime::is_growth_family);
        let threshold = if in_growth { c.growth_exit } else { c.growth_entry };

        if signals.growth_pulse > threshold {
            let was_growth = matches!(
                previous,
                Some(Regime::Growth) | Some(Regime::TighteningWarning)
            );
            if was_growth
                && signals.monetary_policy < c.hawkish_policy
                && signals.vix > c.vix_fear
            {
                return Regime::TighteningWarning;
            }
            if signals.rsi > c.rsi_overbought {
                Regime::OverboughtTrim
            } else if signals.rsi < c.rsi_oversold {
                Regime::OversoldOpportunity
            } else {
                Regime::Growth
            }
        } else {
            Regime::Neutral
        }
    }

    /// Classify every row of a frame in order, threading the previous regime.
    pub fn classify_frame(&self, frame: &IndicatorFrame) -> Vec<Classification> {
        let closes = frame.closes(self.config.rsi_reference);
        let rsi = calculate_rsi(&closes, self.config.rsi_period);

        let mut previous = None;
        frame
            .rows()
            .iter()
            .zip(rsi)
            .map(|(row, rsi)| {
                let signals = MacroSignals::from_row(row, rsi, &self.config);
                let regime = self.classify(&signals, previous);
                previous = Some(regime);
                Classification { regime, signals }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn signals(growth_pulse: f64) -> MacroSignals {
        MacroSignals {
            growth_pulse,
            ..MacroSignals::default()
        }
    }

    #[test]
    fn index_matches_position_in_all() {
        for (i, regime) in Regime::ALL.into_iter().enumerate() {
            assert_eq!(regime.index(), i);
        }
    }

    fn hysteresis() -> RegimeClassifier {
        RegimeClassifier::new(ClassifierConfig {
            hysteresis: true,
            ..ClassifierConfig::default()
        })
    }

    #[test]
    fn stagflation_beats_neutral() {
        let s = MacroSignals {
            inflation_yoy: 4.0,
            growth_pulse: -0.2,
            yield_spread: 0.5,
            ..MacroSignals::default()
        };
        assert_eq!(RegimeClassifier::default().classify(&s, None), Regime::Stagflation);
    }

    #[test]
    fn liquidity_veto_beats_growth() {
        let s = MacroSignals {
            real_liquidity: -1.5,
            growth_pulse: 0.5,
            ..MacroSignals::default()
        };
        assert_eq!(
            RegimeClassifier::default().classify(&s, None),
            Regime::LiquidityCrunch
        );
    }

    #[test]
    fn recession_needs_inverted_curve_and_weak_growth() {
        let classifier = RegimeClassifier::default();
        let s = MacroSignals {
            yield_spread: -0.3,
            growth_pulse: -0.2,
            inflation_yoy: 5.0,
            ..MacroSignals::default()
        };
        // Recession precedes stagflation.
        assert_eq!(classifier.classify(&s, None), Regime::DeflationaryRecession);

        let flat = MacroSignals {
            yield_spread: 0.1,
            ..s.clone()
        };
        assert_eq!(classifier.classify(&flat, None), Regime::Stagflation);
    }

    #[test]
    fn growth_family_uses_rsi_overlay() {
        let classifier = RegimeClassifier::default();
        let mut s = signals(0.3);
        assert_eq!(classifier.classify(&s, None), Regime::Growth);
        s.rsi = 75.0;
        assert_eq!(classifier.classify(&s, None), Regime::OverboughtTrim);
        s.rsi = 25.0;
        assert_eq!(classifier.classify(&s, None), Regime::OversoldOpportunity);
    }

    #[test]
    fn weak_pulse_is_neutral() {
        assert_eq!(
            RegimeClassifier::default().classify(&signals(0.15), None),
            Regime::Neutral
        );
    }

    #[test]
    fn all_default_signals_are_neutral() {
        assert_eq!(
            RegimeClassifier::default().classify(&MacroSignals::default(), None),
            Regime::Neutral
        );
    }

    #[test]
    fn nan_signals_fall_to_neutral() {
        let s = MacroSignals {
            growth_pulse: f64::NAN,
            real_liquidity: f64::NAN,
            inflation_yoy: f64::NAN,
            ..MacroSignals::default()
        };
        assert_eq!(RegimeClassifier::default().classify(&s, None), Regime::Neutral);
    }

    #[test]
    fn without_hysteresis_previous_is_ignored() {
        let classifier = RegimeClassifier::default();
        assert_eq!(
            classifier.classify(&signals(0.1), Some(Regime::Growth)),
            Regime::Neutral
        );
    }

    #[test]
    fn hysteresis_holds_growth_between_thresholds() {
        let classifier = hysteresis();
        assert_eq!(classifier.classify(&signals(0.1), None), Regime::Neutral);
        assert_eq!(
            classifier.classify(&signals(0.1), Some(Regime::Growth)),
            Regime::Growth
        );
        assert_eq!(
            classifier.classify(&signals(0.04), Some(Regime::Growth)),
            Regime::Neutral
        );
    }

    #[test]
    fn hysteresis_demotes_to_tightening_warning() {
        let classifier = hysteresis();
        let s = MacroSignals {
            growth_pulse: 0.4,
            monetary_policy: -0.5,
            vix: 25.0,
            ..MacroSignals::default()
        };
        assert_eq!(
            classifier.classify(&s, Some(Regime::Growth)),
            Regime::TighteningWarning
        );
        assert_eq!(
            classifier.classify(&s, Some(Regime::TighteningWarning)),
            Regime::TighteningWarning
        );
        assert_eq!(classifier.classify(&s, None), Regime::Growth);

        let calm = MacroSignals { vix: 15.0, ..s };
        assert_eq!(classifier.classify(&calm, Some(Regime::Growth)), Regime::Growth);
    }

    #[test]
    fn regime_labels_parse_back() {
        for r in Regime::ALL {
            assert_eq!(r.label().parse::<Regime>().unwrap(), r);
        }
        assert_eq!("stagflation".parse::<Regime>().unwrap(), Regime::Stagflation);
        assert!("boom".parse::<Regime>().is_err());
    }

    #[test]
    fn from_row_applies_pulse_weights() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut row = IndicatorRow::new(ts);
        row.sentiment.labor_market = Some(0.5);
        row.sentiment.manufacturing = Some(-0.25);
        let s = MacroSignals::from_row(&row, f64::NAN, &ClassifierConfig::default());
        assert!((s.growth_pulse - 0.2).abs() < 1e-12);
        assert_eq!(s.rsi, NEUTRAL_RSI);
        assert_eq!(s.vix, 0.0);
    }

    #[test]
    fn classify_frame_threads_previous_regime() {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let rows: Vec<IndicatorRow> = [0.3, 0.1, 0.02]
            .iter()
            .enumerate()
            .map(|(i, &labor)| {
                let mut row = IndicatorRow::new(base + chrono::Duration::hours(i as i64));
                row.sentiment.labor_market = Some(labor / 0.6);
                row
            })
            .collect();
        let frame = IndicatorFrame::new(rows);
        let regimes: Vec<Regime> = hysteresis()
            .classify_frame(&frame)
            .into_iter()
            .map(|c| c.regime)
            .collect();
        assert_eq!(
            regimes,
            vec![Regime::Growth, Regime::Growth, Regime::Neutral]
        );
    }
}
