//! API key authentication and caller identity extractors.
//!
//! API keys are read from:
//! - `Authorization: Bearer <key>` header
//! - `X-API-Key: <key>` header
//!
//! Keys are SHA-256 hashed and compared against the `api_keys` table. The key
//! authenticates the calling system; the actor the engine sees comes from
//! `X-Actor-Id` and `X-Actor-Role` (default `employee`).
//!
//! The actor id is trusted as sent: whoever holds a key vouches for the
//! identities it forwards. The role is bounded by the key row, so a key
//! issued for employee-facing frontends cannot claim `admin` or `system`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::Row;

use hrflow_infra::sqlite::pool::DatabasePool;
use hrflow_types::actor::{Actor, ActorRole};
use hrflow_types::error::WorkflowError;

use crate::http::error::AppError;
use crate::state::AppState;

const KEY_PREFIX: &str = "hrf_";

/// Roles granted to the key printed by `hrflow serve` on first start.
pub const ALL_ROLES: [ActorRole; 3] = [ActorRole::Employee, ActorRole::Admin, ActorRole::System];

/// A validated API key and the actor roles it may claim.
#[derive(Debug)]
pub struct Authenticated {
    pub key_name: String,
    pub roles: Vec<ActorRole>,
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = extract_api_key(parts)?;
        let key_hash = hash_api_key(&api_key);

        let result = sqlx::query("SELECT id, name, roles FROM api_keys WHERE key_hash = ?")
            .bind(&key_hash)
            .fetch_optional(&state.db_pool.reader)
            .await
            .map_err(|e| AppError::Internal(format!("Database error: {e}")))?;

        match result {
            Some(row) => {
                // Best effort, never fails the request.
                let id: String = row.get("id");
                let now = chrono::Utc::now().to_rfc3339();
                let _ = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
                    .bind(&now)
                    .bind(&id)
                    .execute(&state.db_pool.writer)
                    .await;
                let roles: String = row.get("roles");
                Ok(Authenticated {
                    key_name: row.get("name"),
                    roles: parse_roles(&roles)?,
                })
            }
            None => Err(AppError::Unauthorized(
                "Invalid API key. Provide a valid key via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
            )),
        }
    }
}

/// The authenticated caller identity for an engine operation.
pub struct RequestActor(pub Actor);

impl FromRequestParts<AppState> for RequestActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = Authenticated::from_request_parts(parts, state).await?;
        let actor = extract_actor(parts)?;
        if !key.roles.contains(&actor.role) {
            return Err(WorkflowError::NotPermitted(format!(
                "API key '{}' may not act as {}",
                key.key_name, actor.role
            ))
            .into());
        }
        Ok(RequestActor(actor))
    }
}

fn parse_roles(raw: &str) -> Result<Vec<ActorRole>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| {
            r.parse::<ActorRole>()
                .map_err(|e| AppError::Internal(format!("corrupt api key roles: {e}")))
        })
        .collect()
}

fn format_roles(roles: &[ActorRole]) -> String {
    roles
        .iter()
        .map(ActorRole::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Read the actor headers.
fn extract_actor(parts: &Parts) -> Result<Actor, AppError> {
    let id = match parts.headers.get("x-actor-id") {
        Some(value) => value
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid X-Actor-Id header encoding".to_string()))?
            .trim()
            .to_string(),
        None => String::new(),
    };
    if id.is_empty() {
        return Err(AppError::Unauthorized(
            "Missing caller identity. Provide it via the 'X-Actor-Id' header.".to_string(),
        ));
    }

    let role = match parts.headers.get("x-actor-role") {
        Some(value) => value
            .to_str()
            .map_err(|_| AppError::Validation("Invalid X-Actor-Role header encoding".to_string()))?
            .parse::<ActorRole>()
            .map_err(AppError::Validation)?,
        None => ActorRole::Employee,
    };

    Ok(Actor::new(id, role))
}

fn extract_api_key(parts: &Parts) -> Result<String, AppError> {
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    if let Some(key) = parts.headers.get("x-api-key") {
        let key_str = key.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-API-Key header encoding".to_string())
        })?;
        return Ok(key_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
    ))
}

/// Compute SHA-256 hash of an API key (lowercase hex).
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)
}

/// Generate a new key, store its hash, and return the plaintext (shown once).
///
/// Callers presenting the key may only claim the given actor roles.
pub async fn create_api_key(
    pool: &DatabasePool,
    name: &str,
    roles: &[ActorRole],
) -> anyhow::Result<String> {
    anyhow::ensure!(!roles.is_empty(), "an API key needs at least one role");
    let mut key_bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut key_bytes);
    let plaintext_key = format!(
        "{KEY_PREFIX}{}",
        key_bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
    );

    sqlx::query(
        "INSERT INTO api_keys (id, name, key_hash, roles, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::now_v7().to_string())
    .bind(name)
    .bind(hash_api_key(&plaintext_key))
    .bind(format_roles(roles))
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&pool.writer)
    .await?;

    tracing::info!(name, roles = %format_roles(roles), "api key created");
    Ok(plaintext_key)
}

/// Create the first API key if none exists. Returns it only when newly created.
pub async fn ensure_api_key(pool: &DatabasePool) -> anyhow::Result<Option<String>> {
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM api_keys LIMIT 1")
        .fetch_optional(&pool.reader)
        .await?;
    if existing.is_some() {
        return Ok(None);
    }
    create_api_key(pool, "default", &ALL_ROLES).await.map(Some)
}
