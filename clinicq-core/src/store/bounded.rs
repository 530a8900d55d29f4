use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use clinicq_model::{
    CheckIn, CheckInID, Clinic, ClinicID, Doctor, QueueAssignment,
};
use tokio::sync::{Semaphore, SemaphorePermit};

use super::{ActiveWindow, QueueStore};
use crate::error::{QueueError, Result};

/// Caps the number of concurrent calls into an inner store.
pub struct BoundedQueueStore<S> {
    inner: S,
    permits: Arc<Semaphore>,
    limit: usize,
}

impl<S> fmt::Debug for BoundedQueueStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueueStore")
            .field("limit", &self.limit)
            .field("permits_available", &self.permits.available_permits())
            .finish()
    }
}

impl<S: QueueStore> BoundedQueueStore<S> {
    /// `limit` is clamped to at least one permit.
    pub fn new(inner: S, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            inner,
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| QueueError::Internal("store permit pool closed".into()))
    }
}

#[async_trait]
impl<S: QueueStore> QueueStore for BoundedQueueStore<S> {
    async fn list_clinics(&self) -> Result<Vec<Clinic>> {
        let _permit = self.permit().await?;
        self.inner.list_clinics().await
    }

    async fn list_doctors(&self, clinic_id: ClinicID) -> Result<Vec<Doctor>> {
        let _permit = self.permit().await?;
        self.inner.list_doctors(clinic_id).await
    }

    async fn active_check_ins(
        &self,
        window: ActiveWindow,
    ) -> Result<Vec<CheckIn>> {
        let _permit = self.permit().await?;
        self.inner.active_check_ins(window).await
    }

    async fn clinic_check_ins(
        &self,
        clinic_id: ClinicID,
        window: ActiveWindow,
    ) -> Result<Vec<CheckIn>> {
        let _permit = self.permit().await?;
        self.inner.clinic_check_ins(clinic_id, window).await
    }

    async fn existing_assignments(
        &self,
        clinic_id: ClinicID,
        check_in_ids: &[CheckInID],
    ) -> Result<HashSet<CheckInID>> {
        let _permit = self.permit().await?;
        self.inner.existing_assignments(clinic_id, check_in_ids).await
    }

    async fn upsert_assignments(
        &self,
        assignments: &[QueueAssignment],
    ) -> Result<()> {
        let _permit = self.permit().await?;
        self.inner.upsert_assignments(assignments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryQueueStore;

    #[tokio::test]
    async fn zero_limit_still_allows_progress() {
        let store = BoundedQueueStore::new(InMemoryQueueStore::new(), 0);
        assert_eq!(store.limit(), 1);

        store
            .inner()
            .insert_clinic(Clinic::new("North", false))
            .await;
        let clinics = store.list_clinics().await.expect("list clinics");
        assert_eq!(clinics.len(), 1);
        assert_eq!(store.available_permits(), 1);
    }

    #[tokio::test]
    async fn closed_pool_surfaces_internal_error() {
        let store = BoundedQueueStore::new(InMemoryQueueStore::new(), 2);
        store.permits.close();
        let err = store.list_clinics().await.expect_err("pool closed");
        assert!(matches!(err, QueueError::Internal(_)));
    }
}
