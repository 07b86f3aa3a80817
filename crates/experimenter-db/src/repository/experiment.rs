//! SurrealDB implementation of [`ExperimentRepository`].
//!
//! Partial updates are written from [`UpdateExperiment::assignments`]:
//! each changed field becomes one `SET` clause, and a cleared field is
//! written as `NONE`.

use chrono::{DateTime, NaiveDate, Utc};
use experimenter_core::error::ExperimenterResult;
use experimenter_core::models::experiment::{
    ANALYSIS_DEFAULT, CLIENT_MATCHING_DEFAULT, CreateExperiment, Experiment, ExperimentStatus,
    OBJECTIVES_DEFAULT, Platform, UpdateExperiment,
};
use experimenter_core::models::user::User;
use experimenter_core::repository::{ExperimentQuery, ExperimentRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::user::UserRowWithId;
use super::{parse_choice, parse_opt_choice, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

const ENTITY: &str = "experiment";

const SELECT_BY_ID: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('experiment', $id)";

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct ExperimentRowWithId {
    record_id: String,
    experiment_type: String,
    owner_id: Option<String>,
    project_id: Option<String>,
    status: String,
    archived: bool,
    name: String,
    slug: String,
    short_description: String,
    related_work: String,
    proposed_start_date: Option<String>,
    proposed_duration: Option<u32>,
    proposed_enrollment: Option<u32>,
    addon_experiment_id: Option<String>,
    addon_release_url: Option<String>,
    pref_key: Option<String>,
    pref_type: Option<String>,
    pref_branch: Option<String>,
    public_name: Option<String>,
    public_description: Option<String>,
    population_percent: f64,
    firefox_version: Option<String>,
    firefox_channel: Option<String>,
    client_matching: String,
    locales: Vec<String>,
    countries: Vec<String>,
    platform: String,
    objectives: String,
    analysis: String,
    analysis_owner: Option<String>,
    engineering_owner: Option<String>,
    bugzilla_id: Option<String>,
    normandy_slug: Option<String>,
    normandy_id: Option<u64>,
    data_science_bugzilla_url: Option<String>,
    feature_bugzilla_url: Option<String>,
    risk_flags: serde_json::Value,
    risk_technical_description: Option<String>,
    risks: Option<String>,
    testing: Option<String>,
    test_builds: Option<String>,
    qa_status: Option<String>,
    reviews: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_date(value: Option<String>) -> Result<Option<NaiveDate>, DbError> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .map_err(|e| DbError::decode(ENTITY, format!("invalid date {v:?}: {e}")))
        })
        .transpose()
}

impl ExperimentRowWithId {
    fn try_into_experiment(self) -> Result<Experiment, DbError> {
        Ok(Experiment {
            id: parse_uuid(ENTITY, &self.record_id)?,
            experiment_type: parse_choice(ENTITY, &self.experiment_type)?,
            owner_id: parse_opt_uuid(ENTITY, self.owner_id)?,
            project_id: parse_opt_uuid(ENTITY, self.project_id)?,
            status: parse_choice(ENTITY, &self.status)?,
            archived: self.archived,
            name: self.name,
            slug: self.slug,
            short_description: self.short_description,
            related_work: self.related_work,
            proposed_start_date: parse_date(self.proposed_start_date)?,
            proposed_duration: self.proposed_duration,
            proposed_enrollment: self.proposed_enrollment,
            addon_experiment_id: self.addon_experiment_id,
            addon_release_url: self.addon_release_url,
            pref_key: self.pref_key,
            pref_type: parse_opt_choice(ENTITY, self.pref_type)?,
            pref_branch: parse_opt_choice(ENTITY, self.pref_branch)?,
            public_name: self.public_name,
            public_description: self.public_description,
            population_percent: self.population_percent,
            firefox_version: self.firefox_version,
            firefox_channel: parse_opt_choice(ENTITY, self.firefox_channel)?,
            client_matching: self.client_matching,
            locales: self.locales,
            countries: self.countries,
            platform: parse_choice(ENTITY, &self.platform)?,
            objectives: self.objectives,
            analysis: self.analysis,
            analysis_owner: self.analysis_owner,
            engineering_owner: self.engineering_owner,
            bugzilla_id: self.bugzilla_id,
            normandy_slug: self.normandy_slug,
            normandy_id: self.normandy_id,
            data_science_bugzilla_url: self.data_science_bugzilla_url,
            feature_bugzilla_url: self.feature_bugzilla_url,
            risk_flags: serde_json::from_value(self.risk_flags)
                .map_err(|e| DbError::decode(ENTITY, format!("risk_flags: {e}")))?,
            risk_technical_description: self.risk_technical_description,
            risks: self.risks,
            testing: self.testing,
            test_builds: self.test_builds,
            qa_status: self.qa_status,
            reviews: serde_json::from_value(self.reviews)
                .map_err(|e| DbError::decode(ENTITY, format!("reviews: {e}")))?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn first_experiment(
    rows: Vec<ExperimentRowWithId>,
    id: impl Into<String>,
) -> Result<Experiment, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id.into(),
        })?
        .try_into_experiment()
}

/// SurrealDB implementation of the Experiment repository.
#[derive(Clone)]
pub struct SurrealExperimentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealExperimentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<ExperimentRowWithId>, DbError> {
        let query =
            format!("SELECT meta::id(id) AS record_id, * FROM experiment WHERE {field} = $value");
        let mut result = self
            .db
            .query(query)
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;
        Ok(result.take(0)?)
    }
}

impl<C: Connection> ExperimentRepository for SurrealExperimentRepository<C> {
    async fn create(&self, input: CreateExperiment) -> ExperimenterResult<Experiment> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('experiment', $id) SET \
                 experiment_type = $experiment_type, \
                 owner_id = $owner_id, project_id = $project_id, \
                 status = $status, archived = false, \
                 name = $name, slug = $slug, \
                 short_description = $short_description, \
                 related_work = $related_work, \
                 engineering_owner = $engineering_owner, \
                 public_name = $public_name, \
                 public_description = $public_description, \
                 data_science_bugzilla_url = $data_science_bugzilla_url, \
                 feature_bugzilla_url = $feature_bugzilla_url, \
                 proposed_start_date = $proposed_start_date, \
                 proposed_duration = $proposed_duration, \
                 proposed_enrollment = $proposed_enrollment, \
                 client_matching = $client_matching, \
                 platform = $platform, \
                 objectives = $objectives, analysis = $analysis;",
            )
            .query(SELECT_BY_ID)
            .bind(("id", id_str.clone()))
            .bind(("experiment_type", input.experiment_type.as_str().to_string()))
            .bind(("owner_id", input.owner_id.map(|u| u.to_string())))
            .bind(("project_id", input.project_id.map(|u| u.to_string())))
            .bind(("status", ExperimentStatus::Draft.as_str().to_string()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .bind(("short_description", input.short_description))
            .bind(("related_work", input.related_work))
            .bind(("engineering_owner", input.engineering_owner))
            .bind(("public_name", input.public_name))
            .bind(("public_description", input.public_description))
            .bind(("data_science_bugzilla_url", input.data_science_bugzilla_url))
            .bind(("feature_bugzilla_url", input.feature_bugzilla_url))
            .bind((
                "proposed_start_date",
                input.proposed_start_date.map(|d| d.to_string()),
            ))
            .bind(("proposed_duration", input.proposed_duration))
            .bind(("proposed_enrollment", input.proposed_enrollment))
            .bind(("client_matching", CLIENT_MATCHING_DEFAULT.to_string()))
            .bind(("platform", Platform::default().as_str().to_string()))
            .bind(("objectives", OBJECTIVES_DEFAULT.to_string()))
            .bind(("analysis", ANALYSIS_DEFAULT.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<ExperimentRowWithId> = result.take(1).map_err(DbError::from)?;
        Ok(first_experiment(rows, id_str)?)
    }

    async fn get_by_id(&self, id: Uuid) -> ExperimenterResult<Experiment> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(SELECT_BY_ID)
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ExperimentRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(first_experiment(rows, id_str)?)
    }

    async fn get_by_slug(&self, slug: &str) -> ExperimenterResult<Experiment> {
        let rows = self.find_by("slug", slug).await?;
        Ok(first_experiment(rows, format!("slug={slug}"))?)
    }

    async fn find_by_name(&self, name: &str) -> ExperimenterResult<Option<Experiment>> {
        let rows = self.find_by("name", name).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(ExperimentRowWithId::try_into_experiment)
            .transpose()?)
    }

    async fn find_by_addon_experiment_id(
        &self,
        addon_experiment_id: &str,
    ) -> ExperimenterResult<Option<Experiment>> {
        let rows = self
            .find_by("addon_experiment_id", addon_experiment_id)
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .map(ExperimentRowWithId::try_into_experiment)
            .transpose()?)
    }

    async fn update(&self, id: Uuid, input: UpdateExperiment) -> ExperimenterResult<Experiment> {
        let id_str = id.to_string();
        let assignments = input.assignments()?;

        let mut sets: Vec<String> = assignments
            .iter()
            .map(|(field, value)| {
                if value.is_null() {
                    format!("{field} = NONE")
                } else {
                    format!("{field} = ${field}")
                }
            })
            .collect();
        sets.push("updated_at = time::now()".into());

        let query = format!(
            "UPDATE type::record('experiment', $id) SET {};",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(query)
            .query(SELECT_BY_ID)
            .bind(("id", id_str.clone()));
        for (field, value) in assignments {
            if !value.is_null() {
                builder = builder.bind((field, value));
            }
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<ExperimentRowWithId> = result.take(1).map_err(DbError::from)?;
        Ok(first_experiment(rows, id_str)?)
    }

    async fn list(&self, query: ExperimentQuery) -> ExperimenterResult<Vec<Experiment>> {
        let mut conditions: Vec<&str> = Vec::new();
        if !query.include_archived {
            conditions.push("archived = false");
        }
        if query.experiment_type.is_some() {
            conditions.push("experiment_type = $experiment_type");
        }
        if query.status.is_some() {
            conditions.push("status = $status");
        }
        if query.firefox_channel.is_some() {
            conditions.push("firefox_channel = $firefox_channel");
        }
        if query.firefox_version.is_some() {
            conditions.push("firefox_version = $firefox_version");
        }
        if query.project_id.is_some() {
            conditions.push("project_id = $project_id");
        }
        if query.owner_id.is_some() {
            conditions.push("owner_id = $owner_id");
        }
        if query.in_qa {
            conditions.push("reviews.qa_requested = true AND reviews.qa = false");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT meta::id(id) AS record_id, * FROM experiment{where_clause} \
             ORDER BY created_at ASC"
        );

        let mut builder = self.db.query(sql);
        if let Some(t) = query.experiment_type {
            builder = builder.bind(("experiment_type", t.as_str().to_string()));
        }
        if let Some(s) = query.status {
            builder = builder.bind(("status", s.as_str().to_string()));
        }
        if let Some(c) = query.firefox_channel {
            builder = builder.bind(("firefox_channel", c.as_str().to_string()));
        }
        if let Some(v) = query.firefox_version {
            builder = builder.bind(("firefox_version", v));
        }
        if let Some(p) = query.project_id {
            builder = builder.bind(("project_id", p.to_string()));
        }
        if let Some(o) = query.owner_id {
            builder = builder.bind(("owner_id", o.to_string()));
        }

        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<ExperimentRowWithId> = result.take(0).map_err(DbError::from)?;

        let experiments = rows
            .into_iter()
            .map(|row| row.try_into_experiment())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(experiments)
    }

    async fn add_subscriber(&self, experiment_id: Uuid, user_id: Uuid) -> ExperimenterResult<()> {
        if self.is_subscribed(experiment_id, user_id).await? {
            return Ok(());
        }

        let query = format!(
            "RELATE user:`{user_id}` -> subscribed_to -> experiment:`{experiment_id}`;"
        );
        self.db
            .query(query)
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn remove_subscriber(
        &self,
        experiment_id: Uuid,
        user_id: Uuid,
    ) -> ExperimenterResult<()> {
        self.db
            .query(
                "DELETE subscribed_to WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('experiment', $experiment_id)",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("experiment_id", experiment_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn is_subscribed(&self, experiment_id: Uuid, user_id: Uuid) -> ExperimenterResult<bool> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM subscribed_to WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('experiment', $experiment_id) GROUP ALL",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("experiment_id", experiment_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<super::CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn list_subscribers(&self, experiment_id: Uuid) -> ExperimenterResult<Vec<User>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE id IN (\
                     SELECT VALUE in FROM subscribed_to \
                     WHERE out = type::record('experiment', $experiment_id)\
                 ) \
                 ORDER BY email ASC",
            )
            .bind(("experiment_id", experiment_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let users = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(users)
    }
}
