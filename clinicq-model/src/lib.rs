//! Core data model definitions shared across clinicq crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod assignment;
pub mod check_in;
pub mod clinic;
pub mod error;
pub mod ids;

pub use assignment::{ASSIGNMENT_KIND, QueueAssignment};
pub use check_in::{COMPLETED_STATUS, CheckIn, TrackedFields};
pub use clinic::{Clinic, Doctor};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{CheckInID, ClinicID, DoctorID};
