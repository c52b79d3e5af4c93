//! Workflow template types.
//!
//! A template is a reusable, ordered list of approval steps. Each step names
//! its approvers (individual users or roles) and the rule that turns their
//! decisions into a step outcome. Instances copy the step list at creation
//! time, so editing or deactivating a template never affects running requests.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a workflow template, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub Uuid);

impl TemplateId {
    /// Create a new TemplateId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TemplateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TemplateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Business domain a template routes requests for.
///
/// Serialized as a plain string: `"leave"`, `"expense"`, `"purchase"`, or any
/// other value for a custom domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DomainType {
    Leave,
    Expense,
    Purchase,
    Custom(String),
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainType::Leave => write!(f, "leave"),
            DomainType::Expense => write!(f, "expense"),
            DomainType::Purchase => write!(f, "purchase"),
            DomainType::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl From<String> for DomainType {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "leave" => DomainType::Leave,
            "expense" => DomainType::Expense,
            "purchase" => DomainType::Purchase,
            _ => DomainType::Custom(s),
        }
    }
}

impl From<DomainType> for String {
    fn from(d: DomainType) -> Self {
        d.to_string()
    }
}

impl FromStr for DomainType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DomainType::from(s.to_string()))
    }
}

impl Default for DomainType {
    fn default() -> Self {
        DomainType::Custom("general".to_string())
    }
}

/// Reference to the approvers of a step.
///
/// Internally tagged by `type`:
/// ```yaml
/// approvers:
///   - type: user
///     id: bob
///   - type: role
///     role: finance
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApproverRef {
    /// A single named identity.
    User { id: String },
    /// Every member of a role, expanded by the approver resolver.
    Role { role: String },
}

impl ApproverRef {
    pub fn user(id: impl Into<String>) -> Self {
        ApproverRef::User { id: id.into() }
    }

    pub fn role(role: impl Into<String>) -> Self {
        ApproverRef::Role { role: role.into() }
    }
}

impl fmt::Display for ApproverRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApproverRef::User { id } => write!(f, "user:{id}"),
            ApproverRef::Role { role } => write!(f, "role:{role}"),
        }
    }
}

/// How per-approver decisions combine into a step outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregationRule {
    /// Every approver must approve; any rejection rejects the step.
    All,
    /// One approval suffices; the step is rejected only if everyone rejects.
    Any,
    /// `n` approvals approve the step; any rejection rejects it.
    Quorum { n: u32 },
}

impl Default for AggregationRule {
    fn default() -> Self {
        AggregationRule::All
    }
}

impl fmt::Display for AggregationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationRule::All => write!(f, "all"),
            AggregationRule::Any => write!(f, "any"),
            AggregationRule::Quorum { n } => write!(f, "quorum({n})"),
        }
    }
}

/// A single approval stage of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Author-defined step ID (e.g. "manager"). Unique within a template.
    pub id: String,
    /// Human-readable step name.
    pub name: String,
    /// Position within the template, 1-based and contiguous.
    pub order: u32,
    /// Who may decide on this step.
    pub approvers: Vec<ApproverRef>,
    /// Aggregation rule (defaults to ALL).
    #[serde(default)]
    pub rule: AggregationRule,
}

/// A reusable approval process definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: TemplateId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub domain: DomainType,
    /// Steps sorted by `order`.
    pub steps: Vec<StepDefinition>,
    /// Inactive templates cannot start new instances.
    pub active: bool,
    /// When false, new instances skip Draft and start Pending.
    pub allow_drafts: bool,
    /// Incremented on every update; instances record the revision they copied.
    pub revision: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to register a new template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub domain: DomainType,
    pub steps: Vec<StepDefinition>,
    #[serde(default)]
    pub allow_drafts: Option<bool>,
}

/// Partial update for an existing template. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub domain: Option<DomainType>,
    pub steps: Option<Vec<StepDefinition>>,
    pub allow_drafts: Option<bool>,
}
