//! Persistence gateway
//!
//! Row-level queries, one module per table family. Every function takes the
//! pool explicitly; ownership scoping happens in the WHERE clause.

pub mod audit;
pub mod fragments;
pub mod links;
pub mod users;
pub mod verification;

use llhe_common::{Error, Result};
use uuid::Uuid;

fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Invalid UUID '{}': {}", value, e)))
}

fn parse_optional_uuid(value: Option<String>) -> Result<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}
