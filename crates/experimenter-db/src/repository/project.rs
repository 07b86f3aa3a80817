//! SurrealDB implementation of [`ProjectRepository`].

use chrono::{DateTime, Utc};
use experimenter_core::error::ExperimenterResult;
use experimenter_core::models::project::{CreateProject, Project};
use experimenter_core::repository::ProjectRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

const ENTITY: &str = "project";

#[derive(Debug, SurrealValue)]
struct ProjectRowWithId {
    record_id: String,
    name: String,
    slug: String,
    created_at: DateTime<Utc>,
}

impl ProjectRowWithId {
    fn try_into_project(self) -> Result<Project, DbError> {
        Ok(Project {
            id: parse_uuid(ENTITY, &self.record_id)?,
            name: self.name,
            slug: self.slug,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Project repository.
#[derive(Clone)]
pub struct SurrealProjectRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealProjectRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ProjectRepository for SurrealProjectRepository<C> {
    async fn create(&self, input: CreateProject) -> ExperimenterResult<Project> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query("CREATE type::record('project', $id) SET name = $name, slug = $slug;")
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('project', $id)")
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<ProjectRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.try_into_project()?)
    }

    async fn get_by_id(&self, id: Uuid) -> ExperimenterResult<Project> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('project', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ProjectRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.try_into_project()?)
    }

    async fn list(&self) -> ExperimenterResult<Vec<Project>> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM project ORDER BY name ASC")
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ProjectRowWithId> = result.take(0).map_err(DbError::from)?;
        let projects = rows
            .into_iter()
            .map(|row| row.try_into_project())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(projects)
    }
}
