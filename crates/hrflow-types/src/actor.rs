//! The identity on whose behalf an engine operation runs.
//!
//! Every engine operation takes an explicit [`Actor`]. There is no ambient
//! "current user": the HTTP layer builds one from request headers, the CLI
//! from `--actor`/`--role`, and schedulers use a `system` actor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Privilege level of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    /// Regular employee: may file requests and decide on steps assigned to them.
    Employee,
    /// Administrator: manages templates and may act on any request.
    Admin,
    /// Automated caller (e.g. an external auto-approval timer).
    System,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Employee => write!(f, "employee"),
            ActorRole::Admin => write!(f, "admin"),
            ActorRole::System => write!(f, "system"),
        }
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "employee" => Ok(ActorRole::Employee),
            "admin" => Ok(ActorRole::Admin),
            "system" => Ok(ActorRole::System),
            other => Err(format!("invalid actor role: '{other}'")),
        }
    }
}

impl Default for ActorRole {
    fn default() -> Self {
        ActorRole::Employee
    }
}

/// An authenticated identity invoking the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default)]
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn employee(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::Employee)
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::Admin)
    }

    pub fn system(id: impl Into<String>) -> Self {
        Self::new(id, ActorRole::System)
    }

    /// Admins and system callers may act on behalf of other identities.
    pub fn is_privileged(&self) -> bool {
        matches!(self.role, ActorRole::Admin | ActorRole::System)
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// Whether this actor may perform an action attributed to `identity`.
    pub fn may_act_for(&self, identity: &str) -> bool {
        self.id == identity || self.is_privileged()
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_employee_acts_only_for_self() {
        let alice = Actor::employee("alice");
        assert!(alice.may_act_for("alice"));
        assert!(!alice.may_act_for("bob"));
        assert!(!alice.is_privileged());
    }

    #[test]
    fn test_admin_and_system_are_privileged() {
        assert!(Actor::admin("root").may_act_for("bob"));
        assert!(Actor::system("auto-approver").may_act_for("bob"));
        assert!(!Actor::system("auto-approver").is_admin());
    }

    #[test]
    fn test_actor_role_parse() {
        assert_eq!("ADMIN".parse::<ActorRole>().unwrap(), ActorRole::Admin);
        assert!("manager".parse::<ActorRole>().is_err());
    }

    #[test]
    fn test_actor_role_defaults_to_employee_in_json() {
        let actor: Actor = serde_json::from_str(r#"{"id":"carol"}"#).unwrap();
        assert_eq!(actor.role, ActorRole::Employee);
    }
}
