//! SurrealDB repository implementations.

mod catalog;
mod change_log;
mod comment;
mod experiment;
mod notification;
mod project;
mod user;
mod variant;

pub use catalog::SurrealCatalogRepository;
pub use change_log::SurrealChangeLogRepository;
pub use comment::SurrealCommentRepository;
pub use experiment::SurrealExperimentRepository;
pub use notification::SurrealNotificationRepository;
pub use project::SurrealProjectRepository;
pub use user::SurrealUserRepository;
pub use variant::SurrealVariantRepository;

use std::str::FromStr;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(entity: &'static str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::decode(entity, format!("invalid UUID: {e}")))
}

fn parse_opt_uuid(entity: &'static str, value: Option<String>) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(entity, &v)).transpose()
}

fn parse_choice<T>(entity: &'static str, value: &str) -> Result<T, DbError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| DbError::decode(entity, e))
}

fn parse_opt_choice<T>(entity: &'static str, value: Option<String>) -> Result<Option<T>, DbError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.map(|v| parse_choice(entity, &v)).transpose()
}
