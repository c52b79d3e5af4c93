//! Notification events emitted after committed transitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::instance::InstanceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A step became active; recipients are its approvers.
    ApprovalNeeded,
    /// The instance finished Approved; recipient is the requester.
    InstanceApproved,
    /// The instance finished Rejected; recipient is the requester.
    InstanceRejected,
    /// The instance was cancelled.
    InstanceCancelled,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::ApprovalNeeded => write!(f, "approval_needed"),
            NotificationKind::InstanceApproved => write!(f, "instance_approved"),
            NotificationKind::InstanceRejected => write!(f, "instance_rejected"),
            NotificationKind::InstanceCancelled => write!(f, "instance_cancelled"),
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approval_needed" => Ok(NotificationKind::ApprovalNeeded),
            "instance_approved" => Ok(NotificationKind::InstanceApproved),
            "instance_rejected" => Ok(NotificationKind::InstanceRejected),
            "instance_cancelled" => Ok(NotificationKind::InstanceCancelled),
            other => Err(format!("invalid notification kind: '{other}'")),
        }
    }
}

/// A best-effort message handed to the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub instance_id: InstanceId,
    pub recipient_ids: Vec<String>,
    /// Context for the message body (template name, step, comment, ...).
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(
        kind: NotificationKind,
        instance_id: InstanceId,
        recipient_ids: Vec<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            instance_id,
            recipient_ids,
            payload,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display_parse_agree() {
        for kind in [
            NotificationKind::ApprovalNeeded,
            NotificationKind::InstanceApproved,
            NotificationKind::InstanceRejected,
            NotificationKind::InstanceCancelled,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json.as_str().unwrap(), kind.to_string());
            assert_eq!(kind.to_string().parse::<NotificationKind>().unwrap(), kind);
        }
    }
}
