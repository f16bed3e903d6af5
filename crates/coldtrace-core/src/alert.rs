//! Debounced temperature alerting.
//!
//! Each sensor is in one of two states: in range (no entry) or out of range
//! since some instant. Only new samples move a sensor between states; there
//! is no background timer. A sensor that stays out of range for longer than
//! the debounce window fires once, then re-arms: the next out-of-range
//! sample opens a fresh window.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::{AlertsConfig, MAX_DEBOUNCE_SECS};
use crate::types::DecodedReading;

/// Thresholds and debounce window for the temperature alarm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    /// Lowest acceptable temperature (inclusive).
    pub min_celsius: f64,
    /// Highest acceptable temperature (inclusive).
    pub max_celsius: f64,
    /// How long a sensor must stay out of range before an alert fires.
    pub debounce: Duration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            min_celsius: 25.0,
            max_celsius: 35.0,
            debounce: Duration::minutes(1),
        }
    }
}

impl From<&AlertsConfig> for AlertPolicy {
    fn from(config: &AlertsConfig) -> Self {
        Self {
            min_celsius: config.min_celsius,
            max_celsius: config.max_celsius,
            debounce: Duration::seconds(
                i64::try_from(config.debounce_secs.min(MAX_DEBOUNCE_SECS)).unwrap_or_default(),
            ),
        }
    }
}

impl AlertPolicy {
    /// Whether `celsius` lies within the acceptable range.
    #[must_use]
    pub fn in_range(&self, celsius: f64) -> bool {
        (self.min_celsius..=self.max_celsius).contains(&celsius)
    }
}

/// Outcome of feeding one sample to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertDecision {
    /// Nothing to do: tracking started or the window is still open.
    NoAction,
    /// The sample was in range; any tracking for the sensor was dropped.
    ClearedTracking,
    /// The sensor stayed out of range past the debounce window.
    FireAlert {
        /// When the sensor first left the range in this window.
        out_of_range_since: DateTime<Utc>,
    },
}

impl AlertDecision {
    /// Whether this decision asks for a notification.
    #[must_use]
    pub const fn fires(&self) -> bool {
        matches!(self, Self::FireAlert { .. })
    }
}

/// A fired alert together with the reading that triggered it.
#[derive(Debug, Clone)]
pub struct TemperatureAlert {
    /// The reading that crossed the debounce window.
    pub reading: Arc<DecodedReading>,
    /// Start of the out-of-range window.
    pub out_of_range_since: DateTime<Utc>,
    /// Policy in effect when the alert fired.
    pub policy: AlertPolicy,
}

/// Per-sensor alert state, shared across ingestion tasks.
///
/// All access goes through [`AlertTracker::evaluate`], which holds the lock
/// for the whole read-modify-write so concurrent samples for one sensor are
/// applied one at a time.
#[derive(Debug, Default)]
pub struct AlertTracker {
    policy: AlertPolicy,
    out_of_range_since: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl AlertTracker {
    /// Create a tracker with the given policy.
    #[must_use]
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            out_of_range_since: Mutex::new(HashMap::new()),
        }
    }

    /// Policy used by this tracker.
    #[must_use]
    pub const fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Feed one temperature sample for `sensor_mac` observed at `now`.
    pub fn evaluate(&self, sensor_mac: &str, temperature_c: f64, now: DateTime<Utc>) -> AlertDecision {
        let mut tracked = self.out_of_range_since.lock();

        if self.policy.in_range(temperature_c) {
            if tracked.remove(sensor_mac).is_some() {
                tracing::debug!(sensor_mac, temperature_c, "Temperature back in range");
            }
            return AlertDecision::ClearedTracking;
        }

        match tracked.get(sensor_mac).copied() {
            None => {
                tracked.insert(sensor_mac.to_string(), now);
                tracing::info!(sensor_mac, temperature_c, "Temperature out of range, tracking started");
                AlertDecision::NoAction
            }
            Some(since) if now - since > self.policy.debounce => {
                tracked.remove(sensor_mac);
                tracing::warn!(
                    sensor_mac,
                    temperature_c,
                    since = %since,
                    "Temperature out of range past debounce window"
                );
                AlertDecision::FireAlert {
                    out_of_range_since: since,
                }
            }
            Some(_) => AlertDecision::NoAction,
        }
    }

    /// Start of the current out-of-range window for a sensor, if any.
    #[must_use]
    pub fn tracking_since(&self, sensor_mac: &str) -> Option<DateTime<Utc>> {
        self.out_of_range_since.lock().get(sensor_mac).copied()
    }

    /// Number of sensors currently out of range.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.out_of_range_since.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const MAC: &str = "AC233FA1B2C3";

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 3, 30, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_in_range_is_inclusive() {
        let policy = AlertPolicy::default();
        assert!(policy.in_range(25.0));
        assert!(policy.in_range(35.0));
        assert!(!policy.in_range(24.99));
        assert!(!policy.in_range(35.01));
    }

    #[test]
    fn test_in_range_without_tracking_is_noop_clear() {
        let tracker = AlertTracker::default();
        assert_eq!(tracker.evaluate(MAC, 30.0, t(0)), AlertDecision::ClearedTracking);
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn test_first_out_of_range_starts_tracking() {
        let tracker = AlertTracker::default();
        assert_eq!(tracker.evaluate(MAC, 40.0, t(0)), AlertDecision::NoAction);
        assert_eq!(tracker.tracking_since(MAC), Some(t(0)));
    }

    #[test]
    fn test_debounce_sequence() {
        let tracker = AlertTracker::default();

        assert_eq!(tracker.evaluate(MAC, 40.0, t(0)), AlertDecision::NoAction);
        assert_eq!(tracker.evaluate(MAC, 40.0, t(30)), AlertDecision::NoAction);
        assert_eq!(
            tracker.evaluate(MAC, 40.0, t(61)),
            AlertDecision::FireAlert {
                out_of_range_since: t(0)
            }
        );
        assert_eq!(tracker.tracking_since(MAC), None);
        assert_eq!(tracker.evaluate(MAC, 30.0, t(62)), AlertDecision::ClearedTracking);
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn test_exactly_one_window_does_not_fire() {
        let tracker = AlertTracker::default();
        tracker.evaluate(MAC, 10.0, t(0));
        assert_eq!(tracker.evaluate(MAC, 10.0, t(60)), AlertDecision::NoAction);
    }

    #[test]
    fn test_rearms_after_firing() {
        let tracker = AlertTracker::default();

        tracker.evaluate(MAC, 40.0, t(0));
        assert!(tracker.evaluate(MAC, 40.0, t(61)).fires());
        // Immediately after firing, a new window opens instead of repeating.
        assert_eq!(tracker.evaluate(MAC, 40.0, t(61)), AlertDecision::NoAction);
        assert_eq!(tracker.tracking_since(MAC), Some(t(61)));
        assert_eq!(tracker.evaluate(MAC, 40.0, t(100)), AlertDecision::NoAction);
        assert!(tracker.evaluate(MAC, 40.0, t(122)).fires());
    }

    #[test]
    fn test_in_range_sample_resets_window() {
        let tracker = AlertTracker::default();

        tracker.evaluate(MAC, 40.0, t(0));
        tracker.evaluate(MAC, 30.0, t(50));
        assert_eq!(tracker.evaluate(MAC, 40.0, t(70)), AlertDecision::NoAction);
        assert_eq!(tracker.tracking_since(MAC), Some(t(70)));
    }

    #[test]
    fn test_low_temperature_also_alerts() {
        let tracker = AlertTracker::default();
        tracker.evaluate(MAC, 5.0, t(0));
        assert!(tracker.evaluate(MAC, 5.0, t(90)).fires());
    }

    #[test]
    fn test_sensors_are_tracked_independently() {
        let tracker = AlertTracker::default();

        tracker.evaluate("AAAAAAAAAAAA", 40.0, t(0));
        tracker.evaluate("BBBBBBBBBBBB", 40.0, t(45));
        assert_eq!(tracker.tracked_count(), 2);

        assert!(tracker.evaluate("AAAAAAAAAAAA", 40.0, t(70)).fires());
        assert_eq!(tracker.evaluate("BBBBBBBBBBBB", 40.0, t(70)), AlertDecision::NoAction);
        assert_eq!(tracker.tracked_count(), 1);
    }

    #[test]
    fn test_policy_from_config() {
        let config = AlertsConfig {
            min_celsius: 2.0,
            max_celsius: 8.0,
            debounce_secs: 300,
        };
        let policy = AlertPolicy::from(&config);
        assert!(policy.in_range(5.0));
        assert!(!policy.in_range(9.0));
        assert_eq!(policy.debounce, Duration::minutes(5));
    }

    #[test]
    fn test_concurrent_evaluation_fires_once() {
        let tracker = Arc::new(AlertTracker::default());
        tracker.evaluate(MAC, 40.0, t(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || tracker.evaluate(MAC, 40.0, t(61)).fires())
            })
            .collect();

        let fired = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|fired| *fired)
            .count();
        assert_eq!(fired, 1);
    }
}
