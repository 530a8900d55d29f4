use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use clinicq_model::{
    CheckIn, CheckInID, Clinic, ClinicID, Doctor, QueueAssignment,
};
use tokio::sync::RwLock;

use super::{ActiveWindow, QueueStore};
use crate::error::{QueueError, Result};

/// In-process store with the same read/write semantics as the Postgres
/// adapter. Supports injecting per-clinic fetch and write failures.
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    clinics: Vec<Clinic>,
    doctors: Vec<Doctor>,
    check_ins: Vec<CheckIn>,
    assignments: HashMap<CheckInID, QueueAssignment>,
    upsert_batches: usize,
    failing_fetch: HashSet<ClinicID>,
    failing_write: HashSet<ClinicID>,
    failing_listings: usize,
}

impl MemoryState {
    fn active_sorted(
        &self,
        window: ActiveWindow,
        clinic_id: Option<ClinicID>,
    ) -> Vec<CheckIn> {
        let mut rows: Vec<CheckIn> = self
            .check_ins
            .iter()
            .filter(|c| clinic_id.is_none_or(|id| c.clinic_id == id))
            .filter(|c| !c.is_completed() && window.contains(c.created_at))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
        });
        rows
    }
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_clinic(&self, clinic: Clinic) {
        self.state.write().await.clinics.push(clinic);
    }

    pub async fn insert_doctor(&self, doctor: Doctor) {
        self.state.write().await.doctors.push(doctor);
    }

    /// Insert a check-in, replacing any existing row with the same id.
    pub async fn put_check_in(&self, check_in: CheckIn) {
        let mut state = self.state.write().await;
        match state.check_ins.iter_mut().find(|c| c.id == check_in.id) {
            Some(existing) => *existing = check_in,
            None => state.check_ins.push(check_in),
        }
    }

    /// Apply `mutate` to a stored check-in. Returns false when the id is
    /// unknown.
    pub async fn update_check_in<F>(&self, id: CheckInID, mutate: F) -> bool
    where
        F: FnOnce(&mut CheckIn),
    {
        let mut state = self.state.write().await;
        match state.check_ins.iter_mut().find(|c| c.id == id) {
            Some(check_in) => {
                mutate(check_in);
                true
            }
            None => false,
        }
    }

    pub async fn assignment(&self, id: CheckInID) -> Option<QueueAssignment> {
        self.state.read().await.assignments.get(&id).cloned()
    }

    pub async fn assignments(&self) -> Vec<QueueAssignment> {
        let state = self.state.read().await;
        let mut rows: Vec<_> = state.assignments.values().cloned().collect();
        rows.sort_by_key(|a| (a.clinic_id, a.doctor_id, a.position, a.check_in_id));
        rows
    }

    pub async fn assignments_for(&self, clinic_id: ClinicID) -> Vec<QueueAssignment> {
        self.assignments()
            .await
            .into_iter()
            .filter(|a| a.clinic_id == clinic_id)
            .collect()
    }

    /// Number of successful `upsert_assignments` calls so far.
    pub async fn upsert_batches(&self) -> usize {
        self.state.read().await.upsert_batches
    }

    pub async fn fail_fetch_for(&self, clinic_id: ClinicID) {
        self.state.write().await.failing_fetch.insert(clinic_id);
    }

    pub async fn fail_writes_for(&self, clinic_id: ClinicID) {
        self.state.write().await.failing_write.insert(clinic_id);
    }

    /// Fail the next `times` calls to `list_clinics`.
    pub async fn fail_clinic_listing(&self, times: usize) {
        self.state.write().await.failing_listings = times;
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.write().await;
        state.failing_fetch.clear();
        state.failing_write.clear();
        state.failing_listings = 0;
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn list_clinics(&self) -> Result<Vec<Clinic>> {
        let mut state = self.state.write().await;
        if state.failing_listings > 0 {
            state.failing_listings -= 1;
            return Err(QueueError::Store(
                "injected clinic listing failure".into(),
            ));
        }
        Ok(state.clinics.clone())
    }

    async fn list_doctors(&self, clinic_id: ClinicID) -> Result<Vec<Doctor>> {
        let state = self.state.read().await;
        if state.failing_fetch.contains(&clinic_id) {
            return Err(QueueError::Store(format!(
                "injected fetch failure for clinic {clinic_id}"
            )));
        }
        Ok(state
            .doctors
            .iter()
            .filter(|d| d.clinic_id == clinic_id)
            .cloned()
            .collect())
    }

    async fn active_check_ins(
        &self,
        window: ActiveWindow,
    ) -> Result<Vec<CheckIn>> {
        Ok(self.state.read().await.active_sorted(window, None))
    }

    async fn clinic_check_ins(
        &self,
        clinic_id: ClinicID,
        window: ActiveWindow,
    ) -> Result<Vec<CheckIn>> {
        let state = self.state.read().await;
        if state.failing_fetch.contains(&clinic_id) {
            return Err(QueueError::Store(format!(
                "injected fetch failure for clinic {clinic_id}"
            )));
        }
        Ok(state.active_sorted(window, Some(clinic_id)))
    }

    async fn existing_assignments(
        &self,
        _clinic_id: ClinicID,
        check_in_ids: &[CheckInID],
    ) -> Result<HashSet<CheckInID>> {
        let state = self.state.read().await;
        Ok(check_in_ids
            .iter()
            .filter(|id| state.assignments.contains_key(id))
            .copied()
            .collect())
    }

    async fn upsert_assignments(
        &self,
        assignments: &[QueueAssignment],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(failing) = assignments
            .iter()
            .find(|a| state.failing_write.contains(&a.clinic_id))
        {
            return Err(QueueError::Store(format!(
                "injected write failure for clinic {}",
                failing.clinic_id
            )));
        }
        for assignment in assignments {
            state
                .assignments
                .insert(assignment.check_in_id, assignment.clone());
        }
        state.upsert_batches += 1;
        Ok(())
    }
}
