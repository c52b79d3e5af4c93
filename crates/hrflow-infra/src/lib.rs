//! Infrastructure layer for hrflow.
//!
//! Contains implementations of the ports defined in `hrflow-core`: SQLite
//! repositories and notification outbox, the `config.toml` loader and role
//! directory, the tracing notifier, and data-directory resolution.

pub mod config;
pub mod data_dir;
pub mod notifier;
pub mod sqlite;
