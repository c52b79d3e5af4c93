//! SQLite instance repository implementation.
//!
//! Each instance is a JSON document in `workflow_instances.document`, with
//! `status`, `requester_id`, `current_step_index` and `version` mirrored into
//! columns. `instance_approvers` indexes every resolved approver for
//! query-by-approver. Approval records live in `approval_records`, unique on
//! `(instance_id, step_id, approver_id)`.
//!
//! `commit` runs one transaction: a version-guarded `UPDATE` of the instance
//! followed by the record upsert. If the guard matches no row the transaction
//! is rolled back and the caller gets `Conflict` (or `NotFound`).

use hrflow_core::repository::SortOrder;
use hrflow_core::repository::instance::{InstanceCommit, InstanceFilter, InstanceRepository};
use hrflow_types::approval::{ApprovalRecord, Decision};
use hrflow_types::error::RepositoryError;
use hrflow_types::instance::{InstanceId, WorkflowInstance};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `InstanceRepository`.
#[derive(Clone)]
pub struct SqliteInstanceRepository {
    pool: DatabasePool,
}

impl SqliteInstanceRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct InstanceRow {
    version: i64,
    document: String,
}

impl InstanceRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            version: row.try_get("version")?,
            document: row.try_get("document")?,
        })
    }

    fn into_instance(self) -> Result<WorkflowInstance, RepositoryError> {
        let mut instance: WorkflowInstance = serde_json::from_str(&self.document)
            .map_err(|e| RepositoryError::Query(format!("invalid instance JSON: {e}")))?;
        // The column is authoritative for the optimistic check.
        instance.version = self.version;
        Ok(instance)
    }
}

struct RecordRow {
    id: String,
    instance_id: String,
    step_id: String,
    approver_id: String,
    decision: String,
    comment: Option<String>,
    decided_at: String,
}

impl RecordRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            instance_id: row.try_get("instance_id")?,
            step_id: row.try_get("step_id")?,
            approver_id: row.try_get("approver_id")?,
            decision: row.try_get("decision")?,
            comment: row.try_get("comment")?,
            decided_at: row.try_get("decided_at")?,
        })
    }

    fn into_record(self) -> Result<ApprovalRecord, RepositoryError> {
        let id = parse_uuid(&self.id)?;
        let instance_id = InstanceId::from_uuid(parse_uuid(&self.instance_id)?);
        let decision: Decision = self
            .decision
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ApprovalRecord {
            id,
            instance_id,
            step_id: self.step_id,
            approver_id: self.approver_id,
            decision,
            comment: self.comment,
            decided_at: parse_datetime(&self.decided_at)?,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn encode(instance: &WorkflowInstance) -> Result<String, RepositoryError> {
    serde_json::to_string(instance)
        .map_err(|e| RepositoryError::Query(format!("serialize instance: {e}")))
}

/// Distinct approver identities across all steps.
fn all_approvers(instance: &WorkflowInstance) -> Vec<&str> {
    let mut approvers: Vec<&str> = Vec::new();
    for step in &instance.steps {
        for approver in &step.approvers {
            if !approvers.contains(&approver.as_str()) {
                approvers.push(approver.as_str());
            }
        }
    }
    approvers
}

// ---------------------------------------------------------------------------
// InstanceRepository impl
// ---------------------------------------------------------------------------

impl InstanceRepository for SqliteInstanceRepository {
    async fn create(&self, instance: &WorkflowInstance) -> Result<WorkflowInstance, RepositoryError> {
        let document = encode(instance)?;
        let id = instance.id.to_string();

        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        sqlx::query(
            r#"INSERT INTO workflow_instances
               (id, template_id, requester_id, status, current_step_index, version, document, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(instance.template_id.to_string())
        .bind(&instance.requester_id)
        .bind(instance.status.to_string())
        .bind(instance.current_step_index as i64)
        .bind(instance.version)
        .bind(&document)
        .bind(format_datetime(&instance.created_at))
        .bind(format_datetime(&instance.updated_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!("instance {id} already exists"));
                }
            }
            query_error(e)
        })?;

        for approver in all_approvers(instance) {
            sqlx::query("INSERT INTO instance_approvers (instance_id, approver_id) VALUES (?, ?)")
                .bind(&id)
                .bind(approver)
                .execute(&mut *tx)
                .await
                .map_err(query_error)?;
        }

        tx.commit().await.map_err(query_error)?;
        Ok(instance.clone())
    }

    async fn get_by_id(&self, id: &InstanceId) -> Result<Option<WorkflowInstance>, RepositoryError> {
        let row = sqlx::query("SELECT version, document FROM workflow_instances WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let r = InstanceRow::from_row(&row).map_err(query_error)?;
                Ok(Some(r.into_instance()?))
            }
            None => Ok(None),
        }
    }

    async fn list_records(&self, id: &InstanceId) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT id, instance_id, step_id, approver_id, decision, comment, decided_at
               FROM approval_records WHERE instance_id = ? ORDER BY id ASC"#,
        )
        .bind(id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = RecordRow::from_row(row).map_err(query_error)?;
            records.push(r.into_record()?);
        }
        Ok(records)
    }

    async fn commit(&self, commit: &InstanceCommit) -> Result<WorkflowInstance, RepositoryError> {
        let expected_version = commit.instance.version;
        let mut updated = commit.instance.clone();
        updated.version = expected_version + 1;
        let document = encode(&updated)?;
        let id = updated.id.to_string();

        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let result = sqlx::query(
            r#"UPDATE workflow_instances
               SET status = ?, current_step_index = ?, version = version + 1,
                   document = ?, updated_at = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(updated.status.to_string())
        .bind(updated.current_step_index as i64)
        .bind(&document)
        .bind(format_datetime(&updated.updated_at))
        .bind(&id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            let current: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM workflow_instances WHERE id = ?")
                    .bind(&id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(query_error)?;
            return Err(match current {
                None => RepositoryError::NotFound,
                Some((version,)) => RepositoryError::Conflict(format!(
                    "instance {id} is at version {version}, expected {expected_version}"
                )),
            });
        }

        if let Some(record) = &commit.record {
            sqlx::query(
                r#"INSERT INTO approval_records
                   (id, instance_id, step_id, approver_id, decision, comment, decided_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(instance_id, step_id, approver_id) DO UPDATE SET
                     decision = excluded.decision,
                     comment = excluded.comment,
                     decided_at = excluded.decided_at"#,
            )
            .bind(record.id.to_string())
            .bind(record.instance_id.to_string())
            .bind(&record.step_id)
            .bind(&record.approver_id)
            .bind(record.decision.to_string())
            .bind(&record.comment)
            .bind(format_datetime(&record.decided_at))
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }

        tx.commit().await.map_err(query_error)?;
        tracing::debug!(instance_id = %id, version = updated.version, "instance row updated");
        Ok(updated)
    }

    async fn list(&self, filter: &InstanceFilter) -> Result<Vec<WorkflowInstance>, RepositoryError> {
        let mut sql = String::from("SELECT i.version, i.document FROM workflow_instances i WHERE 1=1");
        if filter.requester_id.is_some() {
            sql.push_str(" AND i.requester_id = ?");
        }
        if filter.approver_id.is_some() {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM instance_approvers a WHERE a.instance_id = i.id AND a.approver_id = ?)",
            );
        }
        if filter.status.is_some() {
            sql.push_str(" AND i.status = ?");
        }
        let direction = match filter.sort_order.unwrap_or_default() {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        sql.push_str(&format!(" ORDER BY i.created_at {direction}, i.id {direction}"));
        if filter.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query(&sql);
        if let Some(requester) = &filter.requester_id {
            query = query.bind(requester);
        }
        if let Some(approver) = &filter.approver_id {
            query = query.bind(approver);
        }
        if let Some(status) = &filter.status {
            query = query.bind(status.to_string());
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit);
        }

        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut instances = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = InstanceRow::from_row(row).map_err(query_error)?;
            instances.push(r.into_instance()?);
        }
        Ok(instances)
    }
}
