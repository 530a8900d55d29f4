use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Knobs for the reconciliation loop and queue builder.
///
/// Every field carries a default so a deployment only needs to supply the
/// values it wants to change.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Sleep between polling ticks (milliseconds).
    pub poll_interval_ms: u64,
    /// Maximum time between unconditional reconciliation passes
    /// (milliseconds).
    pub full_pass_interval_ms: u64,
    /// Pause after a loop iteration fails before polling again
    /// (milliseconds).
    pub error_backoff_ms: u64,
    /// Consultation length used when a check-in has no usable ETA hint.
    pub default_eta_minutes: u32,
    /// Upper bound on store calls in flight at once.
    pub max_inflight_store_calls: usize,
    /// Offset from UTC of the clinics' local day, used for the "created
    /// today" window.
    pub utc_offset_minutes: i32,
    /// Where check-ins without a chosen doctor go in per-doctor clinics.
    pub unassigned_doctor_policy: UnassignedDoctorPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 30_000,
            full_pass_interval_ms: 15 * 60 * 1_000,
            error_backoff_ms: 10_000,
            default_eta_minutes: 30,
            max_inflight_store_calls: 4,
            utc_offset_minutes: 0,
            unassigned_doctor_policy: UnassignedDoctorPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn full_pass_interval(&self) -> Duration {
        Duration::from_millis(self.full_pass_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn builder_options(&self) -> crate::queue::BuilderOptions {
        crate::queue::BuilderOptions {
            default_eta_minutes: self.default_eta_minutes,
            unassigned_doctor_policy: self.unassigned_doctor_policy,
        }
    }
}

/// Placement of check-ins that have no assigned doctor when the clinic uses
/// per-doctor queues.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnassignedDoctorPolicy {
    /// Everything lands on the first doctor in the clinic's listing.
    #[default]
    FirstDoctor,
    /// Each check-in goes to the doctor with the fewest projected queue
    /// minutes at the time it is placed.
    LeastLoaded,
}
