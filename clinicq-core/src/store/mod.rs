//! Data-store boundary of the scheduler.
//!
//! The scheduler reads clinics, doctors and today's check-ins, and writes one
//! queue assignment row per check-in. [`QueueStore`] is the port; the
//! Postgres adapter is used in production and the in-memory adapter in tests.

mod bounded;
mod memory;
mod postgres;

pub use bounded::BoundedQueueStore;
pub use memory::InMemoryQueueStore;
pub use postgres::PostgresQueueStore;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use clinicq_model::{
    CheckIn, CheckInID, Clinic, ClinicID, Doctor, QueueAssignment,
};

use crate::error::{QueueError, Result};

/// Half-open `[start, end)` interval that defines "today" for check-ins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ActiveWindow {
    /// The local calendar day containing `now`, for a clinic-local offset of
    /// `utc_offset_minutes`.
    pub fn for_day(now: DateTime<Utc>, utc_offset_minutes: i32) -> Result<Self> {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                QueueError::Config(format!(
                    "utc offset out of range: {utc_offset_minutes} minutes"
                ))
            })?;

        let local_midnight = now
            .with_timezone(&offset)
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| QueueError::Internal("invalid midnight".into()))?;
        let start = offset
            .from_local_datetime(&local_midnight)
            .single()
            .ok_or_else(|| {
                QueueError::Internal("ambiguous local midnight".into())
            })?
            .with_timezone(&Utc);

        Ok(Self {
            start,
            end: start + Duration::days(1),
        })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// All clinics, in storage listing order.
    async fn list_clinics(&self) -> Result<Vec<Clinic>>;

    /// Doctors of one clinic, in listing order.
    async fn list_doctors(&self, clinic_id: ClinicID) -> Result<Vec<Doctor>>;

    /// Non-completed check-ins created inside `window`, across all clinics.
    async fn active_check_ins(
        &self,
        window: ActiveWindow,
    ) -> Result<Vec<CheckIn>>;

    /// Non-completed check-ins of one clinic created inside `window`.
    async fn clinic_check_ins(
        &self,
        clinic_id: ClinicID,
        window: ActiveWindow,
    ) -> Result<Vec<CheckIn>>;

    /// Which of `check_in_ids` already have a queue assignment row.
    async fn existing_assignments(
        &self,
        clinic_id: ClinicID,
        check_in_ids: &[CheckInID],
    ) -> Result<HashSet<CheckInID>>;

    /// Insert or overwrite assignment rows keyed by check-in id.
    async fn upsert_assignments(
        &self,
        assignments: &[QueueAssignment],
    ) -> Result<()>;
}

#[async_trait]
impl<S: QueueStore + ?Sized> QueueStore for Arc<S> {
    async fn list_clinics(&self) -> Result<Vec<Clinic>> {
        (**self).list_clinics().await
    }

    async fn list_doctors(&self, clinic_id: ClinicID) -> Result<Vec<Doctor>> {
        (**self).list_doctors(clinic_id).await
    }

    async fn active_check_ins(
        &self,
        window: ActiveWindow,
    ) -> Result<Vec<CheckIn>> {
        (**self).active_check_ins(window).await
    }

    async fn clinic_check_ins(
        &self,
        clinic_id: ClinicID,
        window: ActiveWindow,
    ) -> Result<Vec<CheckIn>> {
        (**self).clinic_check_ins(clinic_id, window).await
    }

    async fn existing_assignments(
        &self,
        clinic_id: ClinicID,
        check_in_ids: &[CheckInID],
    ) -> Result<HashSet<CheckInID>> {
        (**self).existing_assignments(clinic_id, check_in_ids).await
    }

    async fn upsert_assignments(
        &self,
        assignments: &[QueueAssignment],
    ) -> Result<()> {
        (**self).upsert_assignments(assignments).await
    }
}
