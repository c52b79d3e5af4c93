//! Workflow instance types.
//!
//! An instance is one concrete request (a leave application, an expense claim)
//! routed through the snapshotted steps of a template.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::template::{AggregationRule, ApproverRef, StepDefinition, TemplateId};

/// Unique identifier for a workflow instance (UUID v7).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Instance lifecycle states.
///
/// - Draft: created, editable, not yet routed
/// - Pending: routed, waiting on the active step
/// - Approved / Rejected / Cancelled: terminal, immutable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceStatus::Approved | InstanceStatus::Rejected | InstanceStatus::Cancelled
        )
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Draft => write!(f, "draft"),
            InstanceStatus::Pending => write!(f, "pending"),
            InstanceStatus::Approved => write!(f, "approved"),
            InstanceStatus::Rejected => write!(f, "rejected"),
            InstanceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(InstanceStatus::Draft),
            "pending" => Ok(InstanceStatus::Pending),
            "approved" => Ok(InstanceStatus::Approved),
            "rejected" => Ok(InstanceStatus::Rejected),
            "cancelled" | "canceled" => Ok(InstanceStatus::Cancelled),
            other => Err(format!("invalid instance status: '{other}'")),
        }
    }
}

/// A step as copied into an instance, with its approvers already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub id: String,
    pub name: String,
    pub order: u32,
    pub rule: AggregationRule,
    /// The references as written in the template at snapshot time.
    pub approver_refs: Vec<ApproverRef>,
    /// Concrete identities authorized to decide on this step.
    pub approvers: Vec<String>,
}

impl StepSnapshot {
    /// Build a snapshot from a template step and its resolved identities.
    pub fn from_definition(def: &StepDefinition, approvers: Vec<String>) -> Self {
        Self {
            id: def.id.clone(),
            name: def.name.clone(),
            order: def.order,
            rule: def.rule,
            approver_refs: def.approvers.clone(),
            approvers,
        }
    }

    pub fn is_authorized(&self, approver_id: &str) -> bool {
        self.approvers.iter().any(|a| a == approver_id)
    }
}

/// A request routed through an approval workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: InstanceId,
    pub template_id: TemplateId,
    /// Template name at creation (denormalized for display).
    pub template_name: String,
    /// Template revision the steps were copied from.
    pub template_revision: u32,
    pub requester_id: String,
    /// Domain payload (leave dates, expense lines, ...). Opaque to the engine.
    pub payload: serde_json::Value,
    pub status: InstanceStatus,
    /// Index into `steps` of the active step; equals `steps.len()` once approved.
    pub current_step_index: usize,
    /// Step list copied from the template at creation.
    pub steps: Vec<StepSnapshot>,
    /// Optimistic-concurrency version, incremented on every commit.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl WorkflowInstance {
    /// The active step, if the instance has one.
    pub fn current_step(&self) -> Option<&StepSnapshot> {
        self.steps.get(self.current_step_index)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    /// Whether `approver_id` is authorized on any step of this instance.
    pub fn involves_approver(&self, approver_id: &str) -> bool {
        self.steps.iter().any(|s| s.is_authorized(approver_id))
    }
}

/// Request to start a new instance from a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    pub template_id: TemplateId,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// File on behalf of another identity (admin/system actors only).
    #[serde(default)]
    pub requester_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!InstanceStatus::Draft.is_terminal());
        assert!(!InstanceStatus::Pending.is_terminal());
        assert!(InstanceStatus::Approved.is_terminal());
        assert!(InstanceStatus::Rejected.is_terminal());
        assert!(InstanceStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_parse_accepts_us_spelling() {
        assert_eq!(
            "canceled".parse::<InstanceStatus>().unwrap(),
            InstanceStatus::Cancelled
        );
        assert!("approving".parse::<InstanceStatus>().is_err());
    }

    #[test]
    fn test_snapshot_copies_definition() {
        let def = StepDefinition {
            id: "finance".to_string(),
            name: "Finance".to_string(),
            order: 2,
            approvers: vec![ApproverRef::role("finance")],
            rule: AggregationRule::Quorum { n: 2 },
        };
        let snap = StepSnapshot::from_definition(&def, vec!["fay".into(), "finn".into()]);
        assert_eq!(snap.rule, AggregationRule::Quorum { n: 2 });
        assert!(snap.is_authorized("finn"));
        assert!(!snap.is_authorized("bob"));
        assert_eq!(snap.approver_refs, def.approvers);
    }

    #[test]
    fn test_current_step_past_end_is_none() {
        let now = Utc::now();
        let instance = WorkflowInstance {
            id: InstanceId::new(),
            template_id: TemplateId::new(),
            template_name: "LeaveRequest".to_string(),
            template_revision: 1,
            requester_id: "alice".to_string(),
            payload: serde_json::json!({"days": 3}),
            status: InstanceStatus::Approved,
            current_step_index: 1,
            steps: vec![StepSnapshot {
                id: "manager".to_string(),
                name: "Manager".to_string(),
                order: 1,
                rule: AggregationRule::All,
                approver_refs: vec![ApproverRef::user("bob")],
                approvers: vec!["bob".to_string()],
            }],
            version: 3,
            created_at: now,
            updated_at: now,
            submitted_at: Some(now),
            completed_at: Some(now),
            cancelled_by: None,
            cancel_reason: None,
        };
        assert!(instance.current_step().is_none());
        assert!(instance.involves_approver("bob"));
        assert_eq!(instance.step_index("manager"), Some(0));
    }
}
