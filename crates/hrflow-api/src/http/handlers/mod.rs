//! HTTP request handlers for the REST API.

pub mod instance;
pub mod notification;
pub mod template;

use std::str::FromStr;

use crate::http::error::AppError;

/// Parse a path or query value, mapping failures to a 400.
pub(crate) fn parse_param<T>(value: &str, what: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| AppError::Validation(format!("invalid {what} '{value}': {e}")))
}
