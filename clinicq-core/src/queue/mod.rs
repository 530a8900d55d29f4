//! Per-clinic queue construction.
//!
//! Per-doctor clinics get one queue per doctor; pooled clinics share a single
//! clinic-wide queue served by `n` interchangeable doctors.

mod builder;
mod eta;

pub use builder::{
    BuilderOptions, ComputedAssignment, DoctorCapacity, QueuePlan, build_queue,
};
pub use eta::{eta_minutes, parse_eta_hint};
