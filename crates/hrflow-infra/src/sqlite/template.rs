//! SQLite template repository implementation.
//!
//! Templates are stored as JSON documents in `workflow_templates.definition`.
//! `name`, `domain` and `active` are duplicated into columns for filtering.

use hrflow_core::repository::template::{TemplateFilter, TemplateRepository};
use hrflow_types::error::RepositoryError;
use hrflow_types::template::{TemplateId, WorkflowTemplate};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, query_error};

/// SQLite-backed implementation of `TemplateRepository`.
#[derive(Clone)]
pub struct SqliteTemplateRepository {
    pool: DatabasePool,
}

impl SqliteTemplateRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct TemplateRow {
    definition: String,
}

impl TemplateRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            definition: row.try_get("definition")?,
        })
    }

    fn into_template(self) -> Result<WorkflowTemplate, RepositoryError> {
        serde_json::from_str(&self.definition)
            .map_err(|e| RepositoryError::Query(format!("invalid template JSON: {e}")))
    }
}

fn encode(template: &WorkflowTemplate) -> Result<String, RepositoryError> {
    serde_json::to_string(template)
        .map_err(|e| RepositoryError::Query(format!("serialize template: {e}")))
}

impl TemplateRepository for SqliteTemplateRepository {
    async fn create(&self, template: &WorkflowTemplate) -> Result<WorkflowTemplate, RepositoryError> {
        let definition = encode(template)?;

        let result = sqlx::query(
            r#"INSERT INTO workflow_templates
               (id, name, domain, active, revision, definition, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(template.id.to_string())
        .bind(&template.name)
        .bind(template.domain.to_string())
        .bind(template.active)
        .bind(template.revision)
        .bind(&definition)
        .bind(format_datetime(&template.created_at))
        .bind(format_datetime(&template.updated_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(template.clone()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("template {} already exists", template.id)),
            ),
            Err(e) => Err(query_error(e)),
        }
    }

    async fn get_by_id(&self, id: &TemplateId) -> Result<Option<WorkflowTemplate>, RepositoryError> {
        let row = sqlx::query("SELECT definition FROM workflow_templates WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let r = TemplateRow::from_row(&row).map_err(query_error)?;
                Ok(Some(r.into_template()?))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, template: &WorkflowTemplate) -> Result<WorkflowTemplate, RepositoryError> {
        let definition = encode(template)?;

        let result = sqlx::query(
            r#"UPDATE workflow_templates
               SET name = ?, domain = ?, active = ?, revision = ?, definition = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&template.name)
        .bind(template.domain.to_string())
        .bind(template.active)
        .bind(template.revision)
        .bind(&definition)
        .bind(format_datetime(&template.updated_at))
        .bind(template.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(template.clone())
    }

    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<WorkflowTemplate>, RepositoryError> {
        let mut sql = String::from("SELECT definition FROM workflow_templates WHERE 1=1");
        if filter.active_only {
            sql.push_str(" AND active = 1");
        }
        if filter.domain.is_some() {
            sql.push_str(" AND domain = ?");
        }
        sql.push_str(" ORDER BY name ASC, created_at ASC");

        let mut query = sqlx::query(&sql);
        if let Some(domain) = &filter.domain {
            query = query.bind(domain.to_string());
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut templates = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = TemplateRow::from_row(row).map_err(query_error)?;
            templates.push(r.into_template()?);
        }
        Ok(templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_support::test_pool;
    use chrono::Utc;
    use hrflow_types::template::{AggregationRule, ApproverRef, DomainType, StepDefinition};

    fn make_template(name: &str, domain: DomainType) -> WorkflowTemplate {
        let now = Utc::now();
        WorkflowTemplate {
            id: TemplateId::new(),
            name: name.to_string(),
            description: Some("test template".to_string()),
            domain,
            steps: vec![StepDefinition {
                id: "manager".to_string(),
                name: "Manager".to_string(),
                order: 1,
                approvers: vec![ApproverRef::role("managers")],
                rule: AggregationRule::Quorum { n: 1 },
            }],
            active: true,
            allow_drafts: true,
            revision: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_template() {
        let repo = SqliteTemplateRepository::new(test_pool().await);
        let template = make_template("LeaveRequest", DomainType::Leave);
        repo.create(&template).await.unwrap();

        let fetched = repo.get_by_id(&template.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "LeaveRequest");
        assert_eq!(fetched.steps, template.steps);
        assert_eq!(fetched.domain, DomainType::Leave);
    }

    #[tokio::test]
    async fn test_get_missing_template_returns_none() {
        let repo = SqliteTemplateRepository::new(test_pool().await);
        assert!(repo.get_by_id(&TemplateId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let repo = SqliteTemplateRepository::new(test_pool().await);
        let template = make_template("LeaveRequest", DomainType::Leave);
        repo.create(&template).await.unwrap();
        let err = repo.create(&template).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_and_missing_update() {
        let repo = SqliteTemplateRepository::new(test_pool().await);
        let mut template = make_template("LeaveRequest", DomainType::Leave);
        repo.create(&template).await.unwrap();

        template.active = false;
        template.revision = 2;
        repo.update(&template).await.unwrap();
        let fetched = repo.get_by_id(&template.id).await.unwrap().unwrap();
        assert!(!fetched.active);
        assert_eq!(fetched.revision, 2);

        let ghost = make_template("Ghost", DomainType::Leave);
        assert!(matches!(
            repo.update(&ghost).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_filters_active_and_domain() {
        let repo = SqliteTemplateRepository::new(test_pool().await);
        let leave = make_template("LeaveRequest", DomainType::Leave);
        let expense = make_template("ExpenseApproval", DomainType::Expense);
        let mut retired = make_template("OldExpense", DomainType::Expense);
        retired.active = false;
        for t in [&leave, &expense, &retired] {
            repo.create(t).await.unwrap();
        }

        let all = repo.list(&TemplateFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name, "ExpenseApproval");

        let active_expense = repo
            .list(&TemplateFilter {
                active_only: true,
                domain: Some(DomainType::Expense),
            })
            .await
            .unwrap();
        assert_eq!(active_expense.len(), 1);
        assert_eq!(active_expense[0].id, expense.id);
    }
}
