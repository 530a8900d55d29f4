use crate::ids::{ClinicID, DoctorID};

/// A clinic as seen by the scheduler. Read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Clinic {
    pub id: ClinicID,
    pub name: String,
    /// When set, patients pick a doctor and each doctor keeps a separate
    /// queue. Otherwise doctors are pooled as anonymous parallel slots.
    pub doctor_selection_enabled: bool,
}

impl Clinic {
    pub fn new(name: impl Into<String>, doctor_selection_enabled: bool) -> Self {
        Self {
            id: ClinicID::new(),
            name: name.into(),
            doctor_selection_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Doctor {
    pub id: DoctorID,
    pub clinic_id: ClinicID,
    pub name: String,
}

impl Doctor {
    pub fn new(clinic_id: ClinicID, name: impl Into<String>) -> Self {
        Self {
            id: DoctorID::new(),
            clinic_id,
            name: name.into(),
        }
    }
}
