//! Request extractors: authentication, caller identity and list queries.

pub mod auth;
pub mod query;
