use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinicq_model::{
    ASSIGNMENT_KIND, CheckIn, CheckInID, Clinic, ClinicID, Doctor, DoctorID,
    QueueAssignment,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ActiveWindow, QueueStore};
use crate::error::{QueueError, Result};

const CHECK_IN_COLUMNS: &str = r#"
    id, clinic_id, doctor_id, expected_arrival, status, task_marker,
    case_marker, eta_hint, patient_name, notes, created_at
"#;

/// Queue store backed by the shared Postgres database.
#[derive(Clone)]
pub struct PostgresQueueStore {
    pool: PgPool,
}

impl fmt::Debug for PostgresQueueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresQueueStore")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresQueueStore {
    /// Wrap an existing pool and verify the database answers.
    pub async fn new(pool: PgPool) -> Result<Self> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| {
                QueueError::Database(format!(
                    "queue store failed Postgres health check: {e}"
                ))
            })?;
        info!("Queue store connected to Postgres");

        Ok(Self { pool })
    }

    /// Wrap a pool without the health check.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        crate::MIGRATOR.run(&self.pool).await.map_err(|e| {
            QueueError::Database(format!("migration failed: {e}"))
        })
    }
}

fn clinic_from_row(row: &PgRow) -> std::result::Result<Clinic, sqlx::Error> {
    Ok(Clinic {
        id: ClinicID(row.try_get("id")?),
        name: row.try_get("name")?,
        doctor_selection_enabled: row.try_get("doctor_selection_enabled")?,
    })
}

fn doctor_from_row(row: &PgRow) -> std::result::Result<Doctor, sqlx::Error> {
    Ok(Doctor {
        id: DoctorID(row.try_get("id")?),
        clinic_id: ClinicID(row.try_get("clinic_id")?),
        name: row.try_get("name")?,
    })
}

fn check_in_from_row(row: &PgRow) -> std::result::Result<CheckIn, sqlx::Error> {
    let doctor_id: Option<Uuid> = row.try_get("doctor_id")?;
    Ok(CheckIn {
        id: CheckInID(row.try_get("id")?),
        clinic_id: ClinicID(row.try_get("clinic_id")?),
        doctor_id: doctor_id.map(DoctorID),
        expected_arrival: row.try_get("expected_arrival")?,
        status: row.try_get("status")?,
        task_marker: row.try_get("task_marker")?,
        case_marker: row.try_get("case_marker")?,
        eta_hint: row.try_get("eta_hint")?,
        created_at: row.try_get("created_at")?,
        patient_name: row.try_get("patient_name")?,
        notes: row.try_get("notes")?,
    })
}

fn collect<T>(
    rows: Vec<PgRow>,
    map: fn(&PgRow) -> std::result::Result<T, sqlx::Error>,
    what: &str,
) -> Result<Vec<T>> {
    rows.iter()
        .map(map)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| QueueError::Database(format!("failed to decode {what}: {e}")))
}

#[async_trait]
impl QueueStore for PostgresQueueStore {
    async fn list_clinics(&self) -> Result<Vec<Clinic>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, doctor_selection_enabled
            FROM clinics
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QueueError::Database(format!("failed to list clinics: {e}")))?;

        collect(rows, clinic_from_row, "clinic")
    }

    async fn list_doctors(&self, clinic_id: ClinicID) -> Result<Vec<Doctor>> {
        let rows = sqlx::query(
            r#"
            SELECT id, clinic_id, name
            FROM doctors
            WHERE clinic_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(clinic_id.to_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            QueueError::Database(format!(
                "failed to list doctors for clinic {clinic_id}: {e}"
            ))
        })?;

        collect(rows, doctor_from_row, "doctor")
    }

    async fn active_check_ins(
        &self,
        window: ActiveWindow,
    ) -> Result<Vec<CheckIn>> {
        let sql = format!(
            r#"
            SELECT {CHECK_IN_COLUMNS}
            FROM check_ins
            WHERE created_at >= $1
              AND created_at < $2
              AND lower(btrim(status)) <> 'completed'
            ORDER BY created_at, id
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                QueueError::Database(format!(
                    "failed to list active check-ins: {e}"
                ))
            })?;

        collect(rows, check_in_from_row, "check-in")
    }

    async fn clinic_check_ins(
        &self,
        clinic_id: ClinicID,
        window: ActiveWindow,
    ) -> Result<Vec<CheckIn>> {
        let sql = format!(
            r#"
            SELECT {CHECK_IN_COLUMNS}
            FROM check_ins
            WHERE clinic_id = $1
              AND created_at >= $2
              AND created_at < $3
              AND lower(btrim(status)) <> 'completed'
            ORDER BY created_at, id
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(clinic_id.to_uuid())
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                QueueError::Database(format!(
                    "failed to list check-ins for clinic {clinic_id}: {e}"
                ))
            })?;

        collect(rows, check_in_from_row, "check-in")
    }

    async fn existing_assignments(
        &self,
        clinic_id: ClinicID,
        check_in_ids: &[CheckInID],
    ) -> Result<HashSet<CheckInID>> {
        if check_in_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<Uuid> = check_in_ids.iter().map(|id| id.to_uuid()).collect();

        let existing: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT check_in_id
            FROM queue_assignments
            WHERE check_in_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            QueueError::Database(format!(
                "failed to read assignments for clinic {clinic_id}: {e}"
            ))
        })?;

        Ok(existing.into_iter().map(CheckInID).collect())
    }

    async fn upsert_assignments(
        &self,
        assignments: &[QueueAssignment],
    ) -> Result<()> {
        if assignments.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            QueueError::Database(format!("failed to open transaction: {e}"))
        })?;

        for assignment in assignments {
            let position = i32::try_from(assignment.position).map_err(|_| {
                QueueError::InvalidData(format!(
                    "queue position {} does not fit the store",
                    assignment.position
                ))
            })?;
            let updated_at: DateTime<Utc> = assignment.updated_at;

            sqlx::query(
                r#"
                INSERT INTO queue_assignments (
                    check_in_id, clinic_id, doctor_id, position,
                    estimated_start, assignment_kind, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (check_in_id) DO UPDATE SET
                    clinic_id = EXCLUDED.clinic_id,
                    doctor_id = EXCLUDED.doctor_id,
                    position = EXCLUDED.position,
                    estimated_start = EXCLUDED.estimated_start,
                    assignment_kind = EXCLUDED.assignment_kind,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(assignment.check_in_id.to_uuid())
            .bind(assignment.clinic_id.to_uuid())
            .bind(assignment.doctor_id.map(|id| id.to_uuid()))
            .bind(position)
            .bind(assignment.estimated_start)
            .bind(ASSIGNMENT_KIND)
            .bind(updated_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                QueueError::Database(format!(
                    "failed to upsert assignment for check-in {}: {e}",
                    assignment.check_in_id
                ))
            })?;
        }

        tx.commit().await.map_err(|e| {
            QueueError::Database(format!("failed to commit assignments: {e}"))
        })?;

        debug!(rows = assignments.len(), "queue assignments upserted");
        Ok(())
    }
}

#[cfg(all(test, feature = "postgres-tests"))]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seed_clinic(pool: &PgPool, selection: bool) -> ClinicID {
        let id = ClinicID::new();
        sqlx::query(
            "INSERT INTO clinics (id, name, doctor_selection_enabled) VALUES ($1, $2, $3)",
        )
        .bind(id.to_uuid())
        .bind(format!("Clinic {id}"))
        .bind(selection)
        .execute(pool)
        .await
        .expect("seed clinic");
        id
    }

    async fn seed_check_in(
        pool: &PgPool,
        clinic_id: ClinicID,
        status: &str,
        created_at: DateTime<Utc>,
    ) -> CheckInID {
        let id = CheckInID::new();
        sqlx::query(
            "INSERT INTO check_ins (id, clinic_id, status, eta_hint, created_at) VALUES ($1, $2, $3, '20', $4)",
        )
        .bind(id.to_uuid())
        .bind(clinic_id.to_uuid())
        .bind(status)
        .bind(created_at)
        .execute(pool)
        .await
        .expect("seed check-in");
        id
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn filters_completed_and_other_days(pool: PgPool) {
        let store = PostgresQueueStore::new(pool.clone()).await.expect("store");
        let clinic = seed_clinic(&pool, false).await;
        let now = Utc::now();
        let window = ActiveWindow::for_day(now, 0).expect("window");

        let active = seed_check_in(&pool, clinic, "waiting", window.start).await;
        seed_check_in(&pool, clinic, " Completed ", window.start).await;
        seed_check_in(&pool, clinic, "waiting", window.start - Duration::hours(1))
            .await;

        let rows = store.clinic_check_ins(clinic, window).await.expect("rows");
        assert_eq!(rows.iter().map(|c| c.id).collect::<Vec<_>>(), vec![active]);
        assert_eq!(rows[0].eta_hint.as_deref(), Some("20"));
    }

    #[sqlx::test(migrator = "crate::MIGRATOR")]
    async fn upsert_is_idempotent_by_check_in(pool: PgPool) {
        let store = PostgresQueueStore::new(pool.clone()).await.expect("store");
        let clinic = seed_clinic(&pool, false).await;
        let now = Utc::now();
        let check_in = seed_check_in(&pool, clinic, "waiting", now).await;

        let mut row = QueueAssignment {
            check_in_id: check_in,
            clinic_id: clinic,
            position: 2,
            estimated_start: now,
            doctor_id: None,
            updated_at: now,
        };
        store.upsert_assignments(&[row.clone()]).await.expect("first");
        row.position = 1;
        store.upsert_assignments(&[row]).await.expect("second");

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)::bigint FROM queue_assignments WHERE check_in_id = $1",
        )
        .bind(check_in.to_uuid())
        .fetch_one(&pool)
        .await
        .expect("count");
        assert_eq!(count, 1);

        let (position, kind): (i32, String) = sqlx::query_as(
            "SELECT position, assignment_kind FROM queue_assignments WHERE check_in_id = $1",
        )
        .bind(check_in.to_uuid())
        .fetch_one(&pool)
        .await
        .expect("row");
        assert_eq!(position, 1);
        assert_eq!(kind, ASSIGNMENT_KIND);

        let existing = store
            .existing_assignments(clinic, &[check_in, CheckInID::new()])
            .await
            .expect("existing");
        assert_eq!(existing, HashSet::from([check_in]));
    }
}
