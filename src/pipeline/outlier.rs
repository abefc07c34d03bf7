use crate::datamodel::unit::Unit;
use crate::parsing::{Reading, Scale};
use tracing::warn;

pub const DEFAULT_SOC_OUTLIER_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SocVerdict {
    Accepted(f64),
    /// The raw value was implausible, `held` is the unchanged baseline.
    Rejected { raw: f64, held: f64 },
}

/// Suppresses isolated state-of-charge jumps larger than `threshold` percentage points.
///
/// The baseline only moves when a sample is accepted. Without `rebaseline_after`
/// a genuine step change is suppressed for as long as it lasts.
#[derive(Debug, Clone)]
pub struct SocOutlierFilter {
    threshold: f64,
    rebaseline_after: Option<u32>,
    last_good: Option<f64>,
    /// Consecutive rejected samples agreeing with each other, and their latest value.
    candidate: Option<(f64, u32)>,
}

impl Default for SocOutlierFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SOC_OUTLIER_THRESHOLD, None)
    }
}

impl SocOutlierFilter {
    pub fn new(threshold: f64, rebaseline_after: Option<u32>) -> Self {
        Self {
            threshold,
            rebaseline_after: rebaseline_after.filter(|n| *n > 0),
            last_good: None,
            candidate: None,
        }
    }

    pub fn last_good(&self) -> Option<f64> {
        self.last_good
    }

    /// Drops the baseline, the next sample is accepted unconditionally.
    pub fn reset(&mut self) {
        self.last_good = None;
        self.candidate = None;
    }

    pub fn filter(&mut self, value: f64) -> SocVerdict {
        let Some(last_good) = self.last_good else {
            return self.accept(value);
        };

        if (value - last_good).abs() <= self.threshold {
            return self.accept(value);
        }

        if let Some(limit) = self.rebaseline_after {
            let run = match self.candidate {
                Some((previous, run)) if (value - previous).abs() <= self.threshold => run + 1,
                _ => 1,
            };
            if run >= limit {
                warn!(
                    "SOC re-baselined after {} consistent samples: prev={:.2}% new={:.2}%",
                    run, last_good, value
                );
                return self.accept(value);
            }
            self.candidate = Some((value, run));
        }

        warn!(
            "SOC outlier detected: prev={:.2}% new={:.2}% (delta={:.2}%). Keeping previous SOC.",
            last_good,
            value,
            (value - last_good).abs()
        );
        SocVerdict::Rejected {
            raw: value,
            held: last_good,
        }
    }

    /// Runs a decoded `soc` reading through the filter.
    ///
    /// A rejection yields `soc_raw` with the implausible value followed by `soc`
    /// holding the baseline.
    pub fn apply(&mut self, reading: &Reading) -> Vec<Reading> {
        match self.filter(reading.value()) {
            SocVerdict::Accepted(value) => vec![percent("soc", value)],
            SocVerdict::Rejected { raw, held } => {
                vec![percent("soc_raw", raw), percent("soc", held)]
            }
        }
    }

    fn accept(&mut self, value: f64) -> SocVerdict {
        self.last_good = Some(value);
        self.candidate = None;
        SocVerdict::Accepted(value)
    }
}

fn percent(metric_name: &str, value: f64) -> Reading {
    Reading::new(metric_name, value, Unit::Percent, Scale::IDENTITY)
}
