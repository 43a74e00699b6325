//! Buzzer control derived from a classified reading.

use std::ops::RangeInclusive;

use crate::reading::{Reading, Verdict};

#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum BuzzerStrategy {
    /// The buzzer sounds whenever the classifier says the batch is ready.
    FollowVerdict,

    /// Ignores the classifier and checks the raw reading against fixed ranges.
    /// Disabled unless explicitly selected.
    RangeThresholds,
}

impl BuzzerStrategy {
    pub fn is_buzzer_on(self, reading: &Reading, verdict: Verdict) -> bool {
        match self {
            Self::FollowVerdict => verdict.is_feasible(),
            Self::RangeThresholds => FeasibleRanges::DEFAULT.contains(reading),
        }
    }
}

/// Harvest-ready ranges, all bounds inclusive.
pub struct FeasibleRanges {
    pub temperature: RangeInclusive<f64>,
    pub humidity: RangeInclusive<f64>,
    pub ph: RangeInclusive<f64>,
}

impl FeasibleRanges {
    pub const DEFAULT: Self = Self {
        temperature: 40.0..=70.0,
        humidity: f64::NEG_INFINITY..=25.0,
        ph: 6.5..=8.5,
    };

    pub fn contains(&self, reading: &Reading) -> bool {
        self.temperature.contains(&reading.temperature)
            && self.humidity.contains(&reading.humidity)
            && self.ph.contains(&reading.ph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_verdict_ok() {
        let reading = Reading::new(0.0, 99.0, 1.0);
        assert!(BuzzerStrategy::FollowVerdict.is_buzzer_on(&reading, Verdict::Feasible));
        assert!(!BuzzerStrategy::FollowVerdict.is_buzzer_on(&reading, Verdict::NotFeasible));
    }

    #[test]
    fn range_thresholds_ok() {
        let strategy = BuzzerStrategy::RangeThresholds;
        assert!(strategy.is_buzzer_on(&Reading::new(55.0, 20.0, 7.2), Verdict::NotFeasible));
        assert!(strategy.is_buzzer_on(&Reading::new(40.0, 25.0, 8.5), Verdict::NotFeasible));
        assert!(!strategy.is_buzzer_on(&Reading::new(39.9, 20.0, 7.2), Verdict::Feasible));
        assert!(!strategy.is_buzzer_on(&Reading::new(55.0, 25.1, 7.2), Verdict::Feasible));
        assert!(!strategy.is_buzzer_on(&Reading::new(55.0, 20.0, 6.4), Verdict::Feasible));
    }
}
