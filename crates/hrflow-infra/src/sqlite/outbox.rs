//! Durable notification outbox.
//!
//! Every event the engine dispatches is appended to `notification_outbox`.
//! A delivery worker (or an operator via the CLI) reads undelivered rows and
//! marks them delivered once sent.

use hrflow_core::notify::Notifier;
use hrflow_types::error::{NotifyError, RepositoryError};
use hrflow_types::event::{NotificationEvent, NotificationKind};
use hrflow_types::instance::InstanceId;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// A stored outbox row.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub event: NotificationEvent,
    pub delivered: bool,
}

/// Filter criteria for reading the outbox.
#[derive(Debug, Clone, Default)]
pub struct OutboxFilter {
    /// Only rows addressed to this identity.
    pub recipient_id: Option<String>,
    pub include_delivered: bool,
    pub limit: Option<i64>,
}

/// Notifier that persists events to the outbox table.
#[derive(Clone)]
pub struct SqliteOutboxNotifier {
    pool: DatabasePool,
}

impl SqliteOutboxNotifier {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Outbox rows, oldest first.
    pub async fn list(&self, filter: &OutboxFilter) -> Result<Vec<OutboxEntry>, RepositoryError> {
        let mut sql = String::from(
            "SELECT id, kind, instance_id, recipient_ids, payload, created_at, delivered_at \
             FROM notification_outbox o WHERE 1=1",
        );
        if !filter.include_delivered {
            sql.push_str(" AND delivered_at IS NULL");
        }
        if filter.recipient_id.is_some() {
            sql.push_str(" AND EXISTS (SELECT 1 FROM json_each(o.recipient_ids) WHERE value = ?)");
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");
        if filter.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(recipient) = &filter.recipient_id {
            query = query.bind(recipient);
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit);
        }

        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;
        rows.iter().map(entry_from_row).collect()
    }

    /// Mark rows delivered. Returns how many were still pending.
    pub async fn mark_delivered(&self, ids: &[Uuid]) -> Result<u64, RepositoryError> {
        let now = format_datetime(&chrono::Utc::now());
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;
        let mut marked = 0;
        for id in ids {
            let result = sqlx::query(
                "UPDATE notification_outbox SET delivered_at = ? WHERE id = ? AND delivered_at IS NULL",
            )
            .bind(&now)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
            marked += result.rows_affected();
        }
        tx.commit().await.map_err(query_error)?;
        Ok(marked)
    }

    async fn append(&self, event: &NotificationEvent) -> Result<(), RepositoryError> {
        let recipients = serde_json::to_string(&event.recipient_ids)
            .map_err(|e| RepositoryError::Query(format!("serialize recipients: {e}")))?;
        sqlx::query(
            r#"INSERT INTO notification_outbox
               (id, kind, instance_id, recipient_ids, payload, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(event.id.to_string())
        .bind(event.kind.to_string())
        .bind(event.instance_id.to_string())
        .bind(recipients)
        .bind(event.payload.to_string())
        .bind(format_datetime(&event.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(())
    }
}

impl Notifier for SqliteOutboxNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        self.append(event)
            .await
            .map_err(|e| NotifyError::Delivery(format!("outbox write failed: {e}")))
    }
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<OutboxEntry, RepositoryError> {
    let get = |col: &str| -> Result<String, RepositoryError> {
        row.try_get::<String, _>(col).map_err(query_error)
    };
    let delivered_at: Option<String> = row.try_get("delivered_at").map_err(query_error)?;

    let id = get("id")?
        .parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))?;
    let instance_id = get("instance_id")?
        .parse::<InstanceId>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))?;
    let kind: NotificationKind = get("kind")?.parse().map_err(RepositoryError::Query)?;
    let recipient_ids: Vec<String> = serde_json::from_str(&get("recipient_ids")?)
        .map_err(|e| RepositoryError::Query(format!("invalid recipients JSON: {e}")))?;
    let payload: serde_json::Value = serde_json::from_str(&get("payload")?)
        .map_err(|e| RepositoryError::Query(format!("invalid payload JSON: {e}")))?;

    Ok(OutboxEntry {
        event: NotificationEvent {
            id,
            kind,
            instance_id,
            recipient_ids,
            payload,
            created_at: parse_datetime(&get("created_at")?)?,
        },
        delivered: delivered_at.is_some(),
    })
}
