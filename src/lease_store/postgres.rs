//! # PostgreSQL Lease Store
//!
//! Claims with a single statement: a `FOR UPDATE SKIP LOCKED` candidate
//! selection feeding an `UPDATE ... RETURNING`. Rows locked by a concurrent
//! claimer are skipped rather than waited on, so two instances never receive
//! the same shipment. All deadlines use the database's `now()`.

use super::{ClaimRequest, LeaseStore};
use crate::error::{Result, ShiptrackError};
use crate::models::{Shipment, ShipmentId, ShipmentRow};
use crate::state_machine::ShipmentStatus;
use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const CLAIM_BATCH_SQL: &str = r#"
    WITH candidates AS (
        SELECT id
        FROM shipments
        WHERE status IN ('PENDING', 'IN_TRANSIT')
          AND (leased_until IS NULL OR leased_until < now())
        ORDER BY last_update_at ASC, id ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    )
    UPDATE shipments s
    SET leased_until = now() + make_interval(secs => $2::DOUBLE PRECISION),
        leased_by = $3::VARCHAR
    FROM candidates c
    WHERE s.id = c.id
    RETURNING s.id, s.user_id, s.code, s.carrier, s.status,
              s.last_update_at, s.created_at, s.leased_until, s.leased_by
"#;

const COMMIT_STATUS_SQL: &str = r#"
    UPDATE shipments
    SET status = $2::VARCHAR,
        last_update_at = now(),
        leased_until = NULL,
        leased_by = NULL
    WHERE id = $1::BIGINT
"#;

#[derive(Clone)]
pub struct PgLeaseStore {
    pool: PgPool,
}

impl std::fmt::Debug for PgLeaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgLeaseStore")
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl PgLeaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        info!("Shipment schema migrations applied");
        Ok(())
    }
}

#[async_trait]
impl LeaseStore for PgLeaseStore {
    #[instrument(skip(self, request), fields(holder_id = %request.holder_id(), limit = request.limit()))]
    async fn claim_batch(&self, request: &ClaimRequest) -> Result<Vec<Shipment>> {
        let limit = i64::try_from(request.limit()).unwrap_or(i64::MAX);

        let rows = sqlx::query_as::<_, ShipmentRow>(CLAIM_BATCH_SQL)
            .bind(limit)
            .bind(request.lease_duration().as_secs_f64())
            .bind(request.holder_id())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to claim shipments: {}", e);
                ShiptrackError::store_unavailable(format!("Shipment claiming failed: {e}"))
            })?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in rows {
            match Shipment::try_from(row) {
                Ok(shipment) => claimed.push(shipment),
                // Lease stays in place and expires; nothing else to do here.
                Err(e) => warn!(error = %e, "Skipping unreadable shipment row"),
            }
        }
        // RETURNING does not preserve the candidate ordering.
        claimed.sort_by_key(|s| (s.last_update_at, s.id));

        debug!(claimed = claimed.len(), "Claimed shipments");
        Ok(claimed)
    }

    #[instrument(skip(self))]
    async fn commit_status(&self, id: ShipmentId, status: ShipmentStatus) -> Result<()> {
        let result = sqlx::query(COMMIT_STATUS_SQL)
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to commit status for shipment {}: {}", id, e);
                ShiptrackError::store_unavailable(format!("Status commit failed: {e}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(ShiptrackError::NotFound { shipment_id: id });
        }

        Ok(())
    }
}
