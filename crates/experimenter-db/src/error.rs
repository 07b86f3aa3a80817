//! Database-specific error types and conversions.

use experimenter_core::error::ExperimenterError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Could not decode {entity} row: {reason}")]
    Decode { entity: &'static str, reason: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate {entity}: {reason}")]
    Duplicate { entity: &'static str, reason: String },
}

impl DbError {
    pub(crate) fn decode(entity: &'static str, reason: impl ToString) -> Self {
        Self::Decode {
            entity,
            reason: reason.to_string(),
        }
    }

    /// Classify a failed statement. Unique index violations become
    /// [`DbError::Duplicate`], everything else [`DbError::Query`].
    pub(crate) fn query(entity: &'static str, err: surrealdb::Error) -> Self {
        let reason = err.to_string();
        if reason.contains("already contains") {
            Self::Duplicate { entity, reason }
        } else {
            Self::Query(reason)
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

impl From<DbError> for ExperimenterError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ExperimenterError::NotFound { entity, id },
            DbError::Duplicate { entity, .. } => ExperimenterError::AlreadyExists {
                entity: entity.into(),
            },
            other => ExperimenterError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_become_already_exists() {
        let err = DbError::Duplicate {
            entity: "experiment",
            reason: "Database index `idx_experiment_name` already contains 'x'".into(),
        };
        assert!(err.is_duplicate());
        assert!(matches!(
            ExperimenterError::from(err),
            ExperimenterError::AlreadyExists { entity } if entity == "experiment"
        ));
    }

    #[test]
    fn other_query_failures_are_database_errors() {
        let err = DbError::Query("parse error".into());
        assert!(!err.is_duplicate());
        assert!(matches!(ExperimenterError::from(err), ExperimenterError::Database(_)));
    }
}
