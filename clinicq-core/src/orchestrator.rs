//! One reconciliation pass across every clinic.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use clinicq_model::{Clinic, ClinicID};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{QueueError, Result};
use crate::persister::{PersistReport, persist_clinic};
use crate::queue::{DoctorCapacity, build_queue};
use crate::store::{ActiveWindow, QueueStore};

/// Which half of a clinic's pass failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Reading doctors or check-ins failed; nothing was written.
    Fetch,
    /// Writing assignment rows failed; earlier rows stay in place.
    Write,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::Fetch => "fetch",
            FailureKind::Write => "write",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClinicFailure {
    pub clinic_id: ClinicID,
    pub kind: FailureKind,
    pub message: String,
}

/// Summary of one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    pub clinics_processed: usize,
    pub failures: Vec<ClinicFailure>,
    pub assignments_written: usize,
    pub fallback_rows_written: usize,
    pub duration: Duration,
}

impl PassReport {
    pub fn clinics_failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs the builder and persister for each clinic in listing order.
///
/// Clinic-level failures are recorded in the [`PassReport`] and never abort
/// the pass. Only a failure to list clinics is returned as an error.
pub struct Orchestrator<S: ?Sized> {
    store: Arc<S>,
    config: SchedulerConfig,
}

impl<S: ?Sized> fmt::Debug for Orchestrator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("store", &std::any::type_name::<S>())
            .field("config", &self.config)
            .finish()
    }
}

impl<S> Orchestrator<S>
where
    S: QueueStore + ?Sized,
{
    pub fn new(store: Arc<S>, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<PassReport> {
        let started = Instant::now();
        let window = ActiveWindow::for_day(now, self.config.utc_offset_minutes)?;
        let clinics = self.store.list_clinics().await?;

        let mut report = PassReport::default();
        for clinic in &clinics {
            match self.reconcile_clinic(clinic, window, now).await {
                Ok(persisted) => {
                    report.clinics_processed += 1;
                    report.assignments_written += persisted.upserted;
                    report.fallback_rows_written += persisted.backfilled;
                }
                Err(failure) => {
                    warn!(
                        target: "queue::clinic",
                        clinic_id = %failure.clinic_id,
                        kind = %failure.kind,
                        error = %failure.message,
                        "clinic skipped this pass"
                    );
                    report.failures.push(failure);
                }
            }
        }

        report.duration = started.elapsed();
        info!(
            target: "queue::pass",
            clinics = clinics.len(),
            processed = report.clinics_processed,
            failed = report.clinics_failed(),
            assignments = report.assignments_written,
            fallback = report.fallback_rows_written,
            elapsed_ms = report.duration.as_millis() as u64,
            "reconciliation pass complete"
        );
        Ok(report)
    }

    async fn reconcile_clinic(
        &self,
        clinic: &Clinic,
        window: ActiveWindow,
        now: DateTime<Utc>,
    ) -> std::result::Result<PersistReport, ClinicFailure> {
        let fail = |kind: FailureKind| {
            move |err: QueueError| ClinicFailure {
                clinic_id: clinic.id,
                kind,
                message: err.to_string(),
            }
        };

        let doctors = self
            .store
            .list_doctors(clinic.id)
            .await
            .map_err(fail(FailureKind::Fetch))?;
        let check_ins = self
            .store
            .clinic_check_ins(clinic.id, window)
            .await
            .map_err(fail(FailureKind::Fetch))?;

        let capacity = if clinic.doctor_selection_enabled {
            DoctorCapacity::Roster(doctors.iter().map(|d| d.id).collect())
        } else {
            DoctorCapacity::Pooled(doctors.len())
        };
        let plan =
            build_queue(now, &check_ins, &capacity, &self.config.builder_options());

        debug!(
            target: "queue::clinic",
            clinic_id = %clinic.id,
            doctors = doctors.len(),
            check_ins = check_ins.len(),
            placed = plan.assignments.len(),
            unplaced = plan.unplaced.len(),
            "queue built"
        );

        persist_clinic(self.store.as_ref(), clinic.id, &check_ins, &plan, now)
            .await
            .map_err(fail(FailureKind::Write))
    }
}
