//! Per-approver decision records and derived step status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::instance::{InstanceId, WorkflowInstance};

/// A single approver's decision on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Pending => write!(f, "pending"),
            Decision::Approved => write!(f, "approved"),
            Decision::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Decision::Pending),
            "approved" | "approve" => Ok(Decision::Approved),
            "rejected" | "reject" => Ok(Decision::Rejected),
            other => Err(format!("invalid decision: '{other}'")),
        }
    }
}

/// Aggregated status of one step, derived from its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Approved => write!(f, "approved"),
            StepStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Instance-level outcome of aggregating the active step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    /// Active step still undecided.
    None,
    /// Active step approved; `to` is the newly active step index.
    Advanced { from: usize, to: usize },
    /// Last step approved; instance is now Approved.
    Approved,
    /// Active step rejected; instance is now Rejected.
    Rejected,
}

impl Transition {
    pub fn is_none(&self) -> bool {
        matches!(self, Transition::None)
    }
}

/// One approver's decision on one step of one instance.
///
/// Unique per `(instance_id, step_id, approver_id)`; later decisions overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: Uuid,
    pub instance_id: InstanceId,
    pub step_id: String,
    pub approver_id: String,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl ApprovalRecord {
    pub fn new(
        instance_id: InstanceId,
        step_id: impl Into<String>,
        approver_id: impl Into<String>,
        decision: Decision,
        comment: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            instance_id,
            step_id: step_id.into(),
            approver_id: approver_id.into(),
            decision,
            comment,
            decided_at: Utc::now(),
        }
    }
}

/// Body of a decision command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDecisionRequest {
    pub step_id: String,
    /// Defaults to the acting identity.
    #[serde(default)]
    pub approver_id: Option<String>,
    pub decision: Decision,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Display view of one step together with its decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepView {
    pub step_id: String,
    pub name: String,
    pub order: u32,
    pub status: StepStatus,
    pub approvers: Vec<String>,
    pub records: Vec<ApprovalRecord>,
}

/// An instance with all of its decisions and the per-step status view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDetail {
    pub instance: WorkflowInstance,
    pub records: Vec<ApprovalRecord>,
    pub steps: Vec<StepView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_parse_verbs_and_adjectives() {
        assert_eq!("approve".parse::<Decision>().unwrap(), Decision::Approved);
        assert_eq!("Rejected".parse::<Decision>().unwrap(), Decision::Rejected);
        assert!("maybe".parse::<Decision>().is_err());
    }

    #[test]
    fn test_transition_serde_tag() {
        let json = serde_json::to_string(&Transition::Advanced { from: 0, to: 1 }).unwrap();
        assert_eq!(json, r#"{"type":"advanced","from":0,"to":1}"#);
        assert!(Transition::None.is_none());
    }

    #[test]
    fn test_decision_request_defaults() {
        let req: RecordDecisionRequest =
            serde_json::from_str(r#"{"step_id":"manager","decision":"approved"}"#).unwrap();
        assert!(req.approver_id.is_none());
        assert!(req.comment.is_none());
        assert_eq!(req.decision, Decision::Approved);
    }
}
