//! Template registry: administration, validation, and YAML authoring.
//!
//! Templates are validated before anything is persisted, and their steps are
//! stored sorted by `order`. Editing bumps the revision; instances keep the
//! snapshot they were created with.

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use hrflow_types::actor::Actor;
use hrflow_types::error::{RepositoryError, WorkflowError};
use hrflow_types::template::{
    AggregationRule, ApproverRef, CreateTemplateRequest, StepDefinition, TemplateId,
    UpdateTemplateRequest, WorkflowTemplate,
};
use tracing::info;

use crate::repository::template::{TemplateFilter, TemplateRepository};

/// Service managing workflow templates.
pub struct TemplateRegistry<T: TemplateRepository> {
    repo: T,
}

impl<T: TemplateRepository> TemplateRegistry<T> {
    pub fn new(repo: T) -> Self {
        Self { repo }
    }

    /// Register a new template. Admin only.
    pub async fn create_template(
        &self,
        actor: &Actor,
        request: CreateTemplateRequest,
    ) -> Result<WorkflowTemplate, WorkflowError> {
        require_admin(actor, "create templates")?;

        let name = request.name.trim().to_string();
        let steps = validate_template(&name, request.steps)?;
        let now = Utc::now();
        let template = WorkflowTemplate {
            id: TemplateId::new(),
            name,
            description: request.description,
            domain: request.domain,
            steps,
            active: true,
            allow_drafts: request.allow_drafts.unwrap_or(true),
            revision: 1,
            created_at: now,
            updated_at: now,
        };

        let template = self.repo.create(&template).await?;
        info!(
            template_id = %template.id,
            name = %template.name,
            steps = template.steps.len(),
            actor = %actor.id,
            "template created"
        );
        Ok(template)
    }

    /// Apply a partial update and bump the revision. Admin only.
    pub async fn update_template(
        &self,
        actor: &Actor,
        id: &TemplateId,
        patch: UpdateTemplateRequest,
    ) -> Result<WorkflowTemplate, WorkflowError> {
        require_admin(actor, "update templates")?;

        let mut template = self.load(id).await?;
        if let Some(name) = patch.name {
            template.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            template.description = Some(description);
        }
        if let Some(domain) = patch.domain {
            template.domain = domain;
        }
        if let Some(allow_drafts) = patch.allow_drafts {
            template.allow_drafts = allow_drafts;
        }
        let steps = patch.steps.unwrap_or_else(|| template.steps.clone());
        template.steps = validate_template(&template.name, steps)?;
        template.revision += 1;
        template.updated_at = Utc::now();

        let template = self.repo.update(&template).await.map_err(|e| match e {
            RepositoryError::NotFound => WorkflowError::TemplateNotFound(id.clone()),
            other => other.into(),
        })?;
        info!(template_id = %id, revision = template.revision, "template updated");
        Ok(template)
    }

    /// Soft-delete a template. Idempotent; existing instances are untouched.
    pub async fn deactivate_template(
        &self,
        actor: &Actor,
        id: &TemplateId,
    ) -> Result<WorkflowTemplate, WorkflowError> {
        require_admin(actor, "deactivate templates")?;

        let mut template = self.load(id).await?;
        if !template.active {
            return Ok(template);
        }
        template.active = false;
        template.updated_at = Utc::now();
        let template = self.repo.update(&template).await?;
        info!(template_id = %id, "template deactivated");
        Ok(template)
    }

    pub async fn get_template(&self, id: &TemplateId) -> Result<WorkflowTemplate, WorkflowError> {
        self.load(id).await
    }

    pub async fn list_templates(
        &self,
        filter: &TemplateFilter,
    ) -> Result<Vec<WorkflowTemplate>, WorkflowError> {
        Ok(self.repo.list(filter).await?)
    }

    async fn load(&self, id: &TemplateId) -> Result<WorkflowTemplate, WorkflowError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| WorkflowError::TemplateNotFound(id.clone()))
    }
}

fn require_admin(actor: &Actor, what: &str) -> Result<(), WorkflowError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(WorkflowError::NotPermitted(format!(
            "only administrators may {what}"
        )))
    }
}

/// Validate a template definition and return its steps sorted by order.
///
/// Checks:
/// - Name is non-empty
/// - At least one step exists
/// - Step IDs are non-empty and unique
/// - Each step has at least one approver reference, none blank
/// - Orders, once sorted, form the contiguous sequence 1..=n
/// - QUORUM(n) has n >= 1, and n does not exceed the number of distinct
///   users when every reference is an individual user
pub fn validate_template(
    name: &str,
    mut steps: Vec<StepDefinition>,
) -> Result<Vec<StepDefinition>, WorkflowError> {
    if name.trim().is_empty() {
        return Err(WorkflowError::Validation(
            "template name must not be empty".to_string(),
        ));
    }
    if steps.is_empty() {
        return Err(WorkflowError::Validation(
            "template must have at least one step".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();
    for step in &steps {
        if step.id.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "step ID must not be empty".to_string(),
            ));
        }
        if !seen_ids.insert(step.id.as_str()) {
            return Err(WorkflowError::Validation(format!(
                "duplicate step ID: '{}'",
                step.id
            )));
        }
        validate_approvers(step)?;
    }

    steps.sort_by_key(|s| s.order);
    for (i, step) in steps.iter().enumerate() {
        let expected = i as u32 + 1;
        if step.order != expected {
            return Err(WorkflowError::Validation(format!(
                "step orders must be contiguous from 1: expected order {expected}, found {} on step '{}'",
                step.order, step.id
            )));
        }
    }

    Ok(steps)
}

fn validate_approvers(step: &StepDefinition) -> Result<(), WorkflowError> {
    if step.approvers.is_empty() {
        return Err(WorkflowError::Validation(format!(
            "step '{}' must have at least one approver",
            step.id
        )));
    }

    let mut users = HashSet::new();
    let mut all_users = true;
    for approver in &step.approvers {
        match approver {
            ApproverRef::User { id } if id.trim().is_empty() => {
                return Err(WorkflowError::Validation(format!(
                    "step '{}' has a blank user reference",
                    step.id
                )));
            }
            ApproverRef::Role { role } if role.trim().is_empty() => {
                return Err(WorkflowError::Validation(format!(
                    "step '{}' has a blank role reference",
                    step.id
                )));
            }
            ApproverRef::User { id } => {
                users.insert(id.as_str());
            }
            ApproverRef::Role { .. } => all_users = false,
        }
    }

    if let AggregationRule::Quorum { n } = step.rule {
        if n < 1 {
            return Err(WorkflowError::Validation(format!(
                "step '{}': quorum must be >= 1",
                step.id
            )));
        }
        if all_users && n as usize > users.len() {
            return Err(WorkflowError::Validation(format!(
                "step '{}': quorum of {n} exceeds its {} approvers",
                step.id,
                users.len()
            )));
        }
    }

    Ok(())
}

/// Parse a YAML template definition and validate it.
pub fn parse_template_yaml(yaml: &str) -> Result<CreateTemplateRequest, WorkflowError> {
    let mut request: CreateTemplateRequest = serde_yaml_ng::from_str(yaml)
        .map_err(|e| WorkflowError::Validation(format!("invalid template YAML: {e}")))?;
    request.steps = validate_template(&request.name, request.steps)?;
    Ok(request)
}

/// Load and validate a YAML template definition from disk.
pub fn load_template_file(path: &Path) -> Result<CreateTemplateRequest, WorkflowError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        WorkflowError::Validation(format!("failed to read {}: {e}", path.display()))
    })?;
    parse_template_yaml(&content)
}
