//! Approval engine and repository trait definitions for hrflow.
//!
//! This crate defines the "ports" (repository, resolver and notifier traits)
//! that the infrastructure layer implements, plus the pure aggregation rules,
//! the template registry and the instance lifecycle engine. It depends only on
//! `hrflow-types` -- never on `hrflow-infra` or any database/IO crate.

pub mod aggregation;
pub mod engine;
pub mod event;
pub mod notify;
pub mod registry;
pub mod repository;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;
