//! Writes a clinic's computed queue to the store.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use clinicq_model::{CheckIn, CheckInID, ClinicID, QueueAssignment};
use tracing::debug;

use crate::error::Result;
use crate::queue::QueuePlan;
use crate::store::QueueStore;

/// Rows written for one clinic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub upserted: usize,
    pub backfilled: usize,
}

/// Upsert one assignment per computed entry of `plan`, then backfill any
/// active check-in that had no row before this call and still has none.
///
/// Backfilled rows are ranked among themselves by creation time (ties by id),
/// take positions `1..k` and start at `now` with no doctor.
pub async fn persist_clinic<S>(
    store: &S,
    clinic_id: ClinicID,
    active: &[CheckIn],
    plan: &QueuePlan,
    now: DateTime<Utc>,
) -> Result<PersistReport>
where
    S: QueueStore + ?Sized,
{
    let active_ids: Vec<CheckInID> = active.iter().map(|c| c.id).collect();
    let prior = store.existing_assignments(clinic_id, &active_ids).await?;

    let rows: Vec<QueueAssignment> = plan
        .assignments
        .iter()
        .map(|computed| QueueAssignment {
            check_in_id: computed.check_in_id,
            clinic_id,
            position: computed.position,
            estimated_start: computed.estimated_start,
            doctor_id: computed.doctor_id,
            updated_at: now,
        })
        .collect();
    store.upsert_assignments(&rows).await?;

    let written: HashSet<CheckInID> =
        rows.iter().map(|row| row.check_in_id).collect();
    let mut missing: Vec<&CheckIn> = active
        .iter()
        .filter(|c| !written.contains(&c.id) && !prior.contains(&c.id))
        .collect();
    missing.sort_by(|a, b| {
        a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
    });

    let fallback: Vec<QueueAssignment> = missing
        .iter()
        .zip(1u32..)
        .map(|(check_in, position)| QueueAssignment {
            check_in_id: check_in.id,
            clinic_id,
            position,
            estimated_start: now,
            doctor_id: None,
            updated_at: now,
        })
        .collect();

    if !fallback.is_empty() {
        debug!(
            target: "queue::clinic",
            clinic_id = %clinic_id,
            rows = fallback.len(),
            "backfilling check-ins without a queue row"
        );
        store.upsert_assignments(&fallback).await?;
    }

    Ok(PersistReport {
        upserted: rows.len(),
        backfilled: fallback.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::ArrivalStatus;
    use crate::queue::ComputedAssignment;
    use crate::store::InMemoryQueueStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn computed(check_in: &CheckIn, position: u32) -> ComputedAssignment {
        ComputedAssignment {
            check_in_id: check_in.id,
            position,
            estimated_start: now(),
            doctor_id: None,
            status: ArrivalStatus::WalkIn,
        }
    }

    #[tokio::test]
    async fn writes_one_row_per_computed_entry() {
        let store = InMemoryQueueStore::new();
        let clinic = ClinicID::new();
        let a = CheckIn::new(clinic, now());
        let b = CheckIn::new(clinic, now());
        let plan = QueuePlan {
            assignments: vec![computed(&a, 1), computed(&b, 2)],
            unplaced: vec![],
        };

        let report =
            persist_clinic(&store, clinic, &[a.clone(), b.clone()], &plan, now())
                .await
                .expect("persist");
        assert_eq!(report, PersistReport { upserted: 2, backfilled: 0 });

        // Second run overwrites rather than duplicates.
        persist_clinic(&store, clinic, &[a.clone(), b.clone()], &plan, now())
            .await
            .expect("persist again");
        assert_eq!(store.assignments().await.len(), 2);
        assert_eq!(store.assignment(b.id).await.expect("row").position, 2);
    }

    #[tokio::test]
    async fn unplaced_check_ins_are_ranked_by_creation() {
        let store = InMemoryQueueStore::new();
        let clinic = ClinicID::new();
        let later = CheckIn::new(clinic, now() - Duration::minutes(5));
        let earlier = CheckIn::new(clinic, now() - Duration::minutes(20));
        let plan = QueuePlan {
            assignments: vec![],
            unplaced: vec![later.id, earlier.id],
        };

        let report = persist_clinic(
            &store,
            clinic,
            &[later.clone(), earlier.clone()],
            &plan,
            now(),
        )
        .await
        .expect("persist");
        assert_eq!(report.backfilled, 2);

        let first = store.assignment(earlier.id).await.expect("earlier row");
        let second = store.assignment(later.id).await.expect("later row");
        assert_eq!((first.position, second.position), (1, 2));
        assert_eq!(first.estimated_start, now());
        assert!(first.doctor_id.is_none());
    }

    #[tokio::test]
    async fn rows_that_existed_before_are_not_backfilled() {
        let store = InMemoryQueueStore::new();
        let clinic = ClinicID::new();
        let check_in = CheckIn::new(clinic, now());

        let seeded = QueuePlan {
            assignments: vec![computed(&check_in, 3)],
            unplaced: vec![],
        };
        persist_clinic(&store, clinic, &[check_in.clone()], &seeded, now())
            .await
            .expect("seed");

        let empty = QueuePlan::default();
        let report =
            persist_clinic(&store, clinic, &[check_in.clone()], &empty, now())
                .await
                .expect("persist");
        assert_eq!(report.backfilled, 0);
        assert_eq!(store.assignment(check_in.id).await.expect("row").position, 3);
    }
}
