//! Activity Validator
//!
//! Plausibility policy for client-reported activity. Samples faster than
//! a running pace or with more steps than a person can take in the
//! window are rejected before they reach the ledger. GPS accuracy only
//! grades confidence and raises the suspicion level.

use serde::{Deserialize, Serialize};

use crate::constants::{
    GPS_EXCELLENT_METERS, GPS_GOOD_METERS, MAX_SPEED_KMH, MAX_STEPS_PER_DAY, MAX_STEPS_PER_HOUR,
};

const SECONDS_PER_HOUR: u64 = 3_600;

/// One client activity report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivitySample {
    pub steps: u64,
    pub window_seconds: u64,
    pub speed_kmh: f64,
    pub gps_accuracy_meters: Option<f64>,
}

/// Displayed GPS confidence grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpsGrade {
    Excellent,
    Good,
    Poor,
    Unavailable,
}

impl GpsGrade {
    pub fn from_accuracy(accuracy_meters: Option<f64>) -> Self {
        match accuracy_meters {
            None => Self::Unavailable,
            Some(m) if !m.is_finite() || m < 0.0 => Self::Unavailable,
            Some(m) if m <= GPS_EXCELLENT_METERS => Self::Excellent,
            Some(m) if m <= GPS_GOOD_METERS => Self::Good,
            Some(_) => Self::Poor,
        }
    }
}

/// Why a sample was rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// Moving faster than walking/running pace
    SpeedExceeded { speed_kmh: f64, limit_kmh: f64 },
    /// More steps than the hourly ceiling allows for the window
    HourlyStepsExceeded { steps: u64, limit: u64 },
    /// Day total would exceed the daily ceiling
    DailyStepsExceeded { day_total: u64, limit: u64 },
    /// Structurally invalid sample
    Malformed { detail: String },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpeedExceeded { speed_kmh, limit_kmh } => {
                write!(f, "speed {:.1} km/h exceeds {:.1} km/h", speed_kmh, limit_kmh)
            }
            Self::HourlyStepsExceeded { steps, limit } => {
                write!(f, "{} steps exceeds hourly allowance {}", steps, limit)
            }
            Self::DailyStepsExceeded { day_total, limit } => {
                write!(f, "day total {} exceeds daily ceiling {}", day_total, limit)
            }
            Self::Malformed { detail } => write!(f, "malformed sample: {}", detail),
        }
    }
}

/// Fraud signal strength attached to a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suspicion {
    None,
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected(RejectionReason),
}

/// Validator output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub verdict: Verdict,
    pub gps_grade: GpsGrade,
    pub suspicion: Suspicion,
}

impl ValidationReport {
    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Accepted)
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match &self.verdict {
            Verdict::Rejected(reason) => Some(reason),
            Verdict::Accepted => None,
        }
    }
}

/// Plausibility limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatorLimits {
    pub max_speed_kmh: f64,
    pub max_steps_per_hour: u64,
    pub max_steps_per_day: u64,
}

impl Default for ValidatorLimits {
    fn default() -> Self {
        Self {
            max_speed_kmh: MAX_SPEED_KMH,
            max_steps_per_hour: MAX_STEPS_PER_HOUR,
            max_steps_per_day: MAX_STEPS_PER_DAY,
        }
    }
}

/// Stateless sample validator
#[derive(Debug, Clone, Default)]
pub struct ActivityValidator {
    limits: ValidatorLimits,
}

impl ActivityValidator {
    pub fn new(limits: ValidatorLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidatorLimits {
        &self.limits
    }

    /// Steps allowed in a window. Windows shorter than an hour get the
    /// full hourly allowance; longer windows scale linearly.
    pub fn window_allowance(&self, window_seconds: u64) -> u64 {
        let hours_scaled = window_seconds.max(SECONDS_PER_HOUR);
        self.limits
            .max_steps_per_hour
            .saturating_mul(hours_scaled)
            / SECONDS_PER_HOUR
    }

    /// Validate one sample given the steps already accrued today
    pub fn validate(&self, sample: &ActivitySample, steps_today: u64) -> ValidationReport {
        let gps_grade = GpsGrade::from_accuracy(sample.gps_accuracy_meters);
        let reject = |reason: RejectionReason| ValidationReport {
            verdict: Verdict::Rejected(reason),
            gps_grade,
            suspicion: Suspicion::High,
        };

        if sample.window_seconds == 0 {
            return reject(RejectionReason::Malformed {
                detail: "window must be positive".to_string(),
            });
        }
        if !sample.speed_kmh.is_finite() || sample.speed_kmh < 0.0 {
            return reject(RejectionReason::Malformed {
                detail: "speed must be a non-negative number".to_string(),
            });
        }

        if sample.speed_kmh > self.limits.max_speed_kmh {
            return reject(RejectionReason::SpeedExceeded {
                speed_kmh: sample.speed_kmh,
                limit_kmh: self.limits.max_speed_kmh,
            });
        }

        let allowance = self.window_allowance(sample.window_seconds);
        if sample.steps > allowance {
            return reject(RejectionReason::HourlyStepsExceeded {
                steps: sample.steps,
                limit: allowance,
            });
        }

        let day_total = steps_today.saturating_add(sample.steps);
        if day_total > self.limits.max_steps_per_day {
            return reject(RejectionReason::DailyStepsExceeded {
                day_total,
                limit: self.limits.max_steps_per_day,
            });
        }

        // Accepted, but near-ceiling bursts with poor location are worth flagging
        let near_ceiling = sample.steps.saturating_mul(10) >= allowance.saturating_mul(9);
        let suspicion = match (gps_grade, near_ceiling) {
            (GpsGrade::Poor, true) => Suspicion::High,
            (GpsGrade::Poor, false) | (_, true) => Suspicion::Low,
            _ => Suspicion::None,
        };

        ValidationReport {
            verdict: Verdict::Accepted,
            gps_grade,
            suspicion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(steps: u64, window: u64, speed: f64, gps: Option<f64>) -> ActivitySample {
        ActivitySample {
            steps,
            window_seconds: window,
            speed_kmh: speed,
            gps_accuracy_meters: gps,
        }
    }

    #[test]
    fn test_accepts_normal_walk() {
        let v = ActivityValidator::default();
        let report = v.validate(&sample(3_000, 1_800, 5.0, Some(8.0)), 0);
        assert!(report.is_accepted());
        assert_eq!(report.gps_grade, GpsGrade::Excellent);
        assert_eq!(report.suspicion, Suspicion::None);
    }

    #[test]
    fn test_rejects_vehicle_speed_regardless_of_steps() {
        let v = ActivityValidator::default();
        for gps in [Some(3.0), Some(100.0), None] {
            let report = v.validate(&sample(10, 3_600, 12.1, gps), 0);
            assert!(matches!(
                report.rejection(),
                Some(RejectionReason::SpeedExceeded { .. })
            ));
        }
        // Exactly at the ceiling is still a run
        assert!(v.validate(&sample(10, 3_600, 12.0, None), 0).is_accepted());
    }

    #[test]
    fn test_rejects_hourly_ceiling() {
        let v = ActivityValidator::default();
        assert!(v.validate(&sample(8_000, 3_600, 4.0, None), 0).is_accepted());
        let report = v.validate(&sample(8_001, 600, 4.0, None), 0);
        assert_eq!(
            report.rejection(),
            Some(&RejectionReason::HourlyStepsExceeded { steps: 8_001, limit: 8_000 })
        );
        // Two-hour window scales the allowance
        assert!(v.validate(&sample(16_000, 7_200, 4.0, None), 0).is_accepted());
    }

    #[test]
    fn test_rejects_daily_ceiling() {
        let v = ActivityValidator::default();
        let report = v.validate(&sample(2_000, 3_600, 4.0, None), 49_000);
        assert!(matches!(
            report.rejection(),
            Some(RejectionReason::DailyStepsExceeded { day_total: 51_000, .. })
        ));
    }

    #[test]
    fn test_gps_grades() {
        assert_eq!(GpsGrade::from_accuracy(Some(10.0)), GpsGrade::Excellent);
        assert_eq!(GpsGrade::from_accuracy(Some(50.0)), GpsGrade::Good);
        assert_eq!(GpsGrade::from_accuracy(Some(50.1)), GpsGrade::Poor);
        assert_eq!(GpsGrade::from_accuracy(None), GpsGrade::Unavailable);
    }

    #[test]
    fn test_poor_gps_does_not_block() {
        let v = ActivityValidator::default();
        let report = v.validate(&sample(7_500, 3_600, 6.0, Some(120.0)), 0);
        assert!(report.is_accepted());
        assert_eq!(report.suspicion, Suspicion::High);
    }

    #[test]
    fn test_malformed_window() {
        let v = ActivityValidator::default();
        let report = v.validate(&sample(10, 0, 1.0, None), 0);
        assert!(matches!(report.rejection(), Some(RejectionReason::Malformed { .. })));
    }
}
