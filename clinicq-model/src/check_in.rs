use chrono::{DateTime, Utc};

use crate::ids::{CheckInID, ClinicID, DoctorID};

/// Raw status value that removes a check-in from the live queue.
pub const COMPLETED_STATUS: &str = "completed";

/// A patient's visit record for today.
///
/// Owned by the booking flow; the scheduler only reads it. `status` is the
/// externally owned lifecycle value and is never rewritten here.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CheckIn {
    pub id: CheckInID,
    pub clinic_id: ClinicID,
    pub doctor_id: Option<DoctorID>,
    pub expected_arrival: Option<DateTime<Utc>>,
    pub status: String,
    pub task_marker: Option<String>,
    pub case_marker: Option<String>,
    /// Free-text consultation length estimate, e.g. `"20"` or `"45 min"`.
    pub eta_hint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub patient_name: Option<String>,
    pub notes: Option<String>,
}

impl CheckIn {
    /// Minimal walk-in check-in, used by fixtures and demos.
    pub fn new(clinic_id: ClinicID, created_at: DateTime<Utc>) -> Self {
        Self {
            id: CheckInID::new(),
            clinic_id,
            doctor_id: None,
            expected_arrival: None,
            status: "waiting".to_string(),
            task_marker: None,
            case_marker: None,
            eta_hint: None,
            created_at,
            patient_name: None,
            notes: None,
        }
    }

    pub fn with_doctor(mut self, doctor_id: DoctorID) -> Self {
        self.doctor_id = Some(doctor_id);
        self
    }

    pub fn with_expected_arrival(mut self, at: DateTime<Utc>) -> Self {
        self.expected_arrival = Some(at);
        self
    }

    pub fn with_eta_hint(mut self, hint: impl Into<String>) -> Self {
        self.eta_hint = Some(hint.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(COMPLETED_STATUS)
    }

    /// Projection of the fields whose changes should trigger a
    /// reconciliation. Everything else (name, notes) is ignored.
    pub fn tracked_fields(&self) -> TrackedFields<'_> {
        TrackedFields {
            doctor_id: self.doctor_id,
            expected_arrival: self.expected_arrival,
            status: &self.status,
            task_marker: self.task_marker.as_deref(),
            case_marker: self.case_marker.as_deref(),
            created_at: self.created_at,
            eta_hint: self.eta_hint.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackedFields<'a> {
    pub doctor_id: Option<DoctorID>,
    pub expected_arrival: Option<DateTime<Utc>>,
    pub status: &'a str,
    pub task_marker: Option<&'a str>,
    pub case_marker: Option<&'a str>,
    pub created_at: DateTime<Utc>,
    pub eta_hint: Option<&'a str>,
}
