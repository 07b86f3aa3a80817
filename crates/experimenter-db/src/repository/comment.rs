//! SurrealDB implementation of [`CommentRepository`].

use chrono::{DateTime, Utc};
use experimenter_core::error::ExperimenterResult;
use experimenter_core::models::comment::{CreateComment, ExperimentComment};
use experimenter_core::repository::CommentRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{parse_choice, parse_uuid};
use crate::error::DbError;

const ENTITY: &str = "experiment_comment";

#[derive(Debug, SurrealValue)]
struct CommentRowWithId {
    record_id: String,
    experiment_id: String,
    created_by: String,
    section: String,
    text: String,
    created_on: DateTime<Utc>,
}

impl CommentRowWithId {
    fn try_into_comment(self) -> Result<ExperimentComment, DbError> {
        Ok(ExperimentComment {
            id: parse_uuid(ENTITY, &self.record_id)?,
            experiment_id: parse_uuid(ENTITY, &self.experiment_id)?,
            created_by: parse_uuid(ENTITY, &self.created_by)?,
            created_on: self.created_on,
            section: parse_choice(ENTITY, &self.section)?,
            text: self.text,
        })
    }
}

/// SurrealDB implementation of the Comment repository.
#[derive(Clone)]
pub struct SurrealCommentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCommentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> CommentRepository for SurrealCommentRepository<C> {
    async fn create(&self, input: CreateComment) -> ExperimenterResult<ExperimentComment> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('experiment_comment', $id) SET \
                 experiment_id = $experiment_id, created_by = $created_by, \
                 section = $section, text = $text;",
            )
            .query(
                "SELECT meta::id(id) AS record_id, * FROM \
                 type::record('experiment_comment', $id)",
            )
            .bind(("id", id_str.clone()))
            .bind(("experiment_id", input.experiment_id.to_string()))
            .bind(("created_by", input.created_by.to_string()))
            .bind(("section", input.section.as_str().to_string()))
            .bind(("text", input.text))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<CommentRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.try_into_comment()?)
    }

    async fn list_for_experiment(
        &self,
        experiment_id: Uuid,
    ) -> ExperimenterResult<Vec<ExperimentComment>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM experiment_comment \
                 WHERE experiment_id = $experiment_id ORDER BY created_on ASC",
            )
            .bind(("experiment_id", experiment_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CommentRowWithId> = result.take(0).map_err(DbError::from)?;
        let comments = rows
            .into_iter()
            .map(|row| row.try_into_comment())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(comments)
    }
}
