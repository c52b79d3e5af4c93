//! Approver resolution.
//!
//! Templates reference approvers by user id or by role. The engine expands
//! every reference into concrete identities once, when an instance is created,
//! and stores the result in the instance snapshot.

use std::collections::HashMap;

use hrflow_types::error::RepositoryError;
use hrflow_types::template::ApproverRef;

/// Expands an approver reference into concrete identities.
pub trait ApproverResolver: Send + Sync {
    /// Resolve `approver` to identities. An unknown role resolves to an empty list.
    fn resolve(
        &self,
        approver: &ApproverRef,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;
}

/// Resolver backed by an in-memory role directory (role name to members).
///
/// User references resolve to themselves.
#[derive(Debug, Clone, Default)]
pub struct RoleDirectoryResolver {
    roles: HashMap<String, Vec<String>>,
}

impl RoleDirectoryResolver {
    pub fn new(roles: HashMap<String, Vec<String>>) -> Self {
        Self { roles }
    }

    /// Add or replace the members of a role.
    pub fn with_role(mut self, role: impl Into<String>, members: &[&str]) -> Self {
        self.roles.insert(
            role.into(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    pub fn roles(&self) -> &HashMap<String, Vec<String>> {
        &self.roles
    }
}

impl ApproverResolver for RoleDirectoryResolver {
    async fn resolve(&self, approver: &ApproverRef) -> Result<Vec<String>, RepositoryError> {
        Ok(match approver {
            ApproverRef::User { id } => vec![id.clone()],
            ApproverRef::Role { role } => self.roles.get(role).cloned().unwrap_or_default(),
        })
    }
}

/// Resolve every reference and merge the identities, keeping first-seen order
/// and dropping duplicates.
pub async fn resolve_all<R: ApproverResolver>(
    resolver: &R,
    approvers: &[ApproverRef],
) -> Result<Vec<String>, RepositoryError> {
    let mut resolved: Vec<String> = Vec::new();
    for approver in approvers {
        for identity in resolver.resolve(approver).await? {
            let identity = identity.trim().to_string();
            if !identity.is_empty() && !resolved.contains(&identity) {
                resolved.push(identity);
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn user_reference_resolves_to_itself() {
        let resolver = RoleDirectoryResolver::default();
        let ids = resolver.resolve(&ApproverRef::user("bob")).await.unwrap();
        assert_eq!(ids, vec!["bob"]);
    }

    #[tokio::test]
    async fn unknown_role_resolves_to_nobody() {
        let resolver = RoleDirectoryResolver::default();
        let ids = resolver.resolve(&ApproverRef::role("legal")).await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn resolve_all_dedupes_across_references() {
        let resolver = RoleDirectoryResolver::default().with_role("finance", &["fay", "bob"]);
        let ids = resolve_all(
            &resolver,
            &[ApproverRef::user("bob"), ApproverRef::role("finance")],
        )
        .await
        .unwrap();
        assert_eq!(ids, vec!["bob", "fay"]);
    }
}
