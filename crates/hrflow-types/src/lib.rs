//! Shared domain types for hrflow.
//!
//! This crate contains the core domain types used across the approval engine:
//! workflow templates, request instances, approval records, notification
//! events, the acting identity, configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod actor;
pub mod approval;
pub mod config;
pub mod error;
pub mod event;
pub mod instance;
pub mod template;
