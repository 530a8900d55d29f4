use chrono::{DateTime, Utc};

use crate::ids::{CheckInID, ClinicID, DoctorID};

/// Marker stored with every row written by the live-queue scheduler.
pub const ASSIGNMENT_KIND: &str = "live_queue";

/// Queue position for one active check-in. Exactly one row per check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueAssignment {
    pub check_in_id: CheckInID,
    pub clinic_id: ClinicID,
    /// 1-based position within the assignment scope.
    pub position: u32,
    pub estimated_start: DateTime<Utc>,
    /// Only recorded when the clinic runs per-doctor queues.
    pub doctor_id: Option<DoctorID>,
    pub updated_at: DateTime<Utc>,
}
