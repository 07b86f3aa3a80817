//! SurrealDB implementation of [`ChangeLogRepository`].

use chrono::{DateTime, Utc};
use experimenter_core::error::ExperimenterResult;
use experimenter_core::models::change_log::{CreateChangeLog, ExperimentChangeLog};
use experimenter_core::repository::ChangeLogRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{parse_choice, parse_opt_choice, parse_uuid};
use crate::error::DbError;

const ENTITY: &str = "experiment_change_log";

#[derive(Debug, SurrealValue)]
struct ChangeLogRowWithId {
    record_id: String,
    experiment_id: String,
    changed_on: DateTime<Utc>,
    changed_by: String,
    old_status: Option<String>,
    new_status: String,
    message: Option<String>,
}

impl ChangeLogRowWithId {
    fn try_into_change_log(self) -> Result<ExperimentChangeLog, DbError> {
        Ok(ExperimentChangeLog {
            id: parse_uuid(ENTITY, &self.record_id)?,
            experiment_id: parse_uuid(ENTITY, &self.experiment_id)?,
            changed_on: self.changed_on,
            changed_by: parse_uuid(ENTITY, &self.changed_by)?,
            old_status: parse_opt_choice(ENTITY, self.old_status)?,
            new_status: parse_choice(ENTITY, &self.new_status)?,
            message: self.message,
        })
    }
}

/// SurrealDB implementation of the ChangeLog repository.
#[derive(Clone)]
pub struct SurrealChangeLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealChangeLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn select(
        &self,
        experiment_id: Uuid,
        order_and_limit: &str,
    ) -> Result<Vec<ExperimentChangeLog>, DbError> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM experiment_change_log \
             WHERE experiment_id = $experiment_id {order_and_limit}"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("experiment_id", experiment_id.to_string()))
            .await?;

        let rows: Vec<ChangeLogRowWithId> = result.take(0)?;
        rows.into_iter()
            .map(|row| row.try_into_change_log())
            .collect()
    }
}

impl<C: Connection> ChangeLogRepository for SurrealChangeLogRepository<C> {
    async fn append(&self, input: CreateChangeLog) -> ExperimenterResult<ExperimentChangeLog> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('experiment_change_log', $id) SET \
                 experiment_id = $experiment_id, changed_on = $changed_on, \
                 changed_by = $changed_by, old_status = $old_status, \
                 new_status = $new_status, message = $message;",
            )
            .query(
                "SELECT meta::id(id) AS record_id, * FROM \
                 type::record('experiment_change_log', $id)",
            )
            .bind(("id", id_str.clone()))
            .bind(("experiment_id", input.experiment_id.to_string()))
            .bind(("changed_on", input.changed_on.unwrap_or_else(Utc::now)))
            .bind(("changed_by", input.changed_by.to_string()))
            .bind(("old_status", input.old_status.map(|s| s.as_str().to_string())))
            .bind(("new_status", input.new_status.as_str().to_string()))
            .bind(("message", input.message))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ChangeLogRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.try_into_change_log()?)
    }

    async fn latest(&self, experiment_id: Uuid) -> ExperimenterResult<Option<ExperimentChangeLog>> {
        let changes = self
            .select(experiment_id, "ORDER BY changed_on DESC LIMIT 1")
            .await?;
        Ok(changes.into_iter().next())
    }

    async fn list_for_experiment(
        &self,
        experiment_id: Uuid,
    ) -> ExperimenterResult<Vec<ExperimentChangeLog>> {
        Ok(self
            .select(experiment_id, "ORDER BY changed_on ASC")
            .await?)
    }
}
