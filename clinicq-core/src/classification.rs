//! Arrival-based priority classes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Priority class derived from how far a patient is from their expected
/// arrival time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalStatus {
    WalkIn,
    Early,
    OnTime,
    SlightlyLate,
    Late,
    Expired,
}

/// Queue order across classes, highest priority first.
pub const PRIORITY_ORDER: [ArrivalStatus; 6] = [
    ArrivalStatus::SlightlyLate,
    ArrivalStatus::OnTime,
    ArrivalStatus::Early,
    ArrivalStatus::Late,
    ArrivalStatus::Expired,
    ArrivalStatus::WalkIn,
];

const ON_TIME_WINDOW_MINUTES: i64 = 5;
const SLIGHTLY_LATE_LIMIT_MINUTES: i64 = 30;
const LATE_LIMIT_MINUTES: i64 = 60;

impl ArrivalStatus {
    /// Rank in [`PRIORITY_ORDER`]; lower ranks are served first.
    pub fn rank(self) -> usize {
        match self {
            ArrivalStatus::SlightlyLate => 0,
            ArrivalStatus::OnTime => 1,
            ArrivalStatus::Early => 2,
            ArrivalStatus::Late => 3,
            ArrivalStatus::Expired => 4,
            ArrivalStatus::WalkIn => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArrivalStatus::WalkIn => "walk_in",
            ArrivalStatus::Early => "early",
            ArrivalStatus::OnTime => "on_time",
            ArrivalStatus::SlightlyLate => "slightly_late",
            ArrivalStatus::Late => "late",
            ArrivalStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for ArrivalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a check-in by the deviation `now - expected_arrival`.
///
/// Boundaries are inclusive on the lower-priority side: exactly 5 minutes
/// late is still on time, exactly 30 is still slightly late, exactly 60 is
/// still late.
pub fn classify(
    now: DateTime<Utc>,
    expected_arrival: Option<DateTime<Utc>>,
) -> ArrivalStatus {
    let Some(expected) = expected_arrival else {
        return ArrivalStatus::WalkIn;
    };

    let deviation = now - expected;
    let window = Duration::minutes(ON_TIME_WINDOW_MINUTES);

    if deviation < -window {
        ArrivalStatus::Early
    } else if deviation <= window {
        ArrivalStatus::OnTime
    } else if deviation <= Duration::minutes(SLIGHTLY_LATE_LIMIT_MINUTES) {
        ArrivalStatus::SlightlyLate
    } else if deviation <= Duration::minutes(LATE_LIMIT_MINUTES) {
        ArrivalStatus::Late
    } else {
        ArrivalStatus::Expired
    }
}
