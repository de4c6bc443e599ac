//! Durable work queue driving the screening pipeline.
//!
//! Per-item state machine: `pending → processing → {done | pending |
//! failed}`. Claims are a single UPDATE so two workers can never own the
//! same item. A claim carries a lease; a `processing` item whose lease
//! has expired (crashed worker) becomes claimable again.


use chrono::{Duration, Utc};
use screening_core::{QueueItem, ScreeningError, ScreeningResult};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

/// Failures beyond this count make an item terminally `failed`.
pub const MAX_RETRIES: i64 = 3;

const DEFAULT_LEASE_SECS: i64 = 300;

pub struct QueueCoordinator {
    pool: SqlitePool,
    lease: Duration,
}

impl QueueCoordinator {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            lease: Duration::seconds(DEFAULT_LEASE_SECS),
        }
    }

    /// Override the processing lease (visibility timeout).
    pub fn with_lease_secs(mut self, secs: i64) -> Self {
        self.lease = Duration::seconds(secs);
        self
    }

    /// Insert a `pending` item for the transaction.
    pub async fn enqueue(&self, txn_id: &str) -> ScreeningResult<QueueItem> {
        let mut conn = self.pool.acquire().await?;
        Self::enqueue_on(&mut conn, txn_id).await
    }

    /// Same as [`enqueue`](Self::enqueue) but on a caller-supplied
    /// connection, so the item can be created inside a larger transaction.
    pub async fn enqueue_on(
        conn: &mut SqliteConnection,
        txn_id: &str,
    ) -> ScreeningResult<QueueItem> {
        let now = Utc::now();
        let item = QueueItem {
            id: Uuid::new_v4().to_string(),
            txn_id: txn_id.to_string(),
            status: QueueItem::STATUS_PENDING.to_string(),
            retries: 0,
            lease_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        sqlx::query(
            "INSERT INTO txn_queue (id, txn_id, status, retries, lease_expires_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(&item.txn_id)
        .bind(&item.status)
        .bind(item.retries)
        .bind(item.lease_expires_at)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(conn)
        .await?;
        Ok(item)
    }

    /// Claim the oldest claimable item, or `None` when the queue is idle.
    ///
    /// Claimable: `pending`, or `processing` with an expired lease. The
    /// selection and the transition to `processing` happen in one UPDATE,
    /// which is what guarantees mutual exclusion between workers.
    pub async fn claim(&self) -> ScreeningResult<Option<QueueItem>> {
        let now = Utc::now();
        let lease_expires = now + self.lease;
        let item = sqlx::query_as::<_, QueueItem>(
            "UPDATE txn_queue
             SET status = 'processing', lease_expires_at = ?1, updated_at = ?2
             WHERE id = (
                 SELECT id FROM txn_queue
                 WHERE status = 'pending'
                    OR (status = 'processing' AND lease_expires_at <= ?2)
                 ORDER BY created_at ASC
                 LIMIT 1
             )
             RETURNING *",
        )
        .bind(lease_expires)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(item) = &item {
            tracing::debug!(item = %item.id, txn = %item.txn_id, "claimed queue item");
        }
        Ok(item)
    }

    /// Successful processing: `processing → done`.
    pub async fn complete(&self, item_id: &str) -> ScreeningResult<()> {
        let result = sqlx::query(
            "UPDATE txn_queue
             SET status = 'done', lease_expires_at = NULL, updated_at = ?
             WHERE id = ? AND status = 'processing'",
        )
        .bind(Utc::now())
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ScreeningError::not_found("QueueItem", item_id));
        }
        Ok(())
    }

    /// Processing error: bump the retry count, requeue or mark terminally
    /// failed once the count exceeds [`MAX_RETRIES`].
    pub async fn fail(&self, item_id: &str) -> ScreeningResult<QueueItem> {
        let item = sqlx::query_as::<_, QueueItem>(
            "UPDATE txn_queue
             SET retries = retries + 1,
                 status = CASE WHEN retries + 1 > ?1 THEN 'failed' ELSE 'pending' END,
                 lease_expires_at = NULL,
                 updated_at = ?2
             WHERE id = ?3
             RETURNING *",
        )
        .bind(MAX_RETRIES)
        .bind(Utc::now())
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ScreeningError::not_found("QueueItem", item_id))?;

        if item.status == QueueItem::STATUS_FAILED {
            tracing::warn!(
                item = %item.id,
                txn = %item.txn_id,
                retries = item.retries,
                "queue item terminally failed, manual intervention required"
            );
        } else {
            tracing::info!(
                item = %item.id,
                retries = item.retries,
                "queue item requeued after processing error"
            );
        }
        Ok(item)
    }

    pub async fn get(&self, item_id: &str) -> ScreeningResult<QueueItem> {
        sqlx::query_as::<_, QueueItem>("SELECT * FROM txn_queue WHERE id = ?")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ScreeningError::not_found("QueueItem", item_id))
    }

    pub async fn pending_count(&self) -> ScreeningResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM txn_queue WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}
