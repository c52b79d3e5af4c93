//! Query parameter extractors for list endpoints.

use serde::Deserialize;

/// Query parameters for `GET /templates`.
#[derive(Debug, Deserialize, Default)]
pub struct TemplateListQuery {
    /// Only active templates.
    #[serde(default)]
    pub active: bool,
    /// Filter by domain (leave, expense, purchase, or a custom name).
    pub domain: Option<String>,
}

/// Query parameters for `GET /instances`.
///
/// Exactly one of `requester` or `approver` selects the listing; `status`
/// applies to approver listings.
#[derive(Debug, Deserialize, Default)]
pub struct InstanceListQuery {
    pub requester: Option<String>,
    pub approver: Option<String>,
    pub status: Option<String>,
}

/// Query parameters for `GET /notifications`.
#[derive(Debug, Deserialize, Default)]
pub struct NotificationListQuery {
    /// Recipient to read for; defaults to the calling actor.
    pub recipient: Option<String>,
    #[serde(default)]
    pub include_delivered: bool,
    pub limit: Option<i64>,
}

/// Query parameters for `GET /notifications/stream`.
#[derive(Debug, Deserialize, Default)]
pub struct NotificationStreamQuery {
    /// Recipient to follow; defaults to the calling actor. Admin and system
    /// actors may pass `*` to follow every event.
    pub recipient: Option<String>,
}
