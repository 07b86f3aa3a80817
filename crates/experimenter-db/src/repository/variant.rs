//! SurrealDB implementation of [`VariantRepository`].

use chrono::{DateTime, Utc};
use experimenter_core::error::ExperimenterResult;
use experimenter_core::models::variant::{
    CreateVariant, ExperimentVariant, UpdateVariant, VariantChanges,
};
use experimenter_core::repository::VariantRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

const ENTITY: &str = "experiment_variant";

const SELECT_BY_ID: &str =
    "SELECT meta::id(id) AS record_id, * FROM type::record('experiment_variant', $id)";

#[derive(Debug, SurrealValue)]
struct VariantRowWithId {
    record_id: String,
    experiment_id: String,
    name: String,
    slug: String,
    is_control: bool,
    description: String,
    ratio: u32,
    value: Option<String>,
    created_at: DateTime<Utc>,
}

impl VariantRowWithId {
    fn try_into_variant(self) -> Result<ExperimentVariant, DbError> {
        Ok(ExperimentVariant {
            id: parse_uuid(ENTITY, &self.record_id)?,
            experiment_id: parse_uuid(ENTITY, &self.experiment_id)?,
            name: self.name,
            slug: self.slug,
            is_control: self.is_control,
            description: self.description,
            ratio: self.ratio,
            value: self.value,
            created_at: self.created_at,
        })
    }
}

fn first_variant(rows: Vec<VariantRowWithId>, id: String) -> Result<ExperimentVariant, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id,
        })?
        .try_into_variant()
}

/// SurrealDB implementation of the Variant repository.
#[derive(Clone)]
pub struct SurrealVariantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealVariantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> VariantRepository for SurrealVariantRepository<C> {
    async fn create(&self, input: CreateVariant) -> ExperimenterResult<ExperimentVariant> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('experiment_variant', $id) SET \
                 experiment_id = $experiment_id, name = $name, slug = $slug, \
                 is_control = $is_control, description = $description, \
                 ratio = $ratio, value = $value;",
            )
            .query(SELECT_BY_ID)
            .bind(("id", id_str.clone()))
            .bind(("experiment_id", input.experiment_id.to_string()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .bind(("is_control", input.is_control))
            .bind(("description", input.description))
            .bind(("ratio", input.ratio))
            .bind(("value", input.value))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<VariantRowWithId> = result.take(1).map_err(DbError::from)?;
        Ok(first_variant(rows, id_str)?)
    }

    async fn update(&self, id: Uuid, input: UpdateVariant) -> ExperimenterResult<ExperimentVariant> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.slug.is_some() {
            sets.push("slug = $slug");
        }
        if input.is_control.is_some() {
            sets.push("is_control = $is_control");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.ratio.is_some() {
            sets.push("ratio = $ratio");
        }
        match input.value {
            Some(Some(_)) => sets.push("value = $value"),
            Some(None) => sets.push("value = NONE"),
            None => {}
        }

        if sets.is_empty() {
            let mut result = self
                .db
                .query(SELECT_BY_ID)
                .bind(("id", id_str.clone()))
                .await
                .map_err(DbError::from)?;
            let rows: Vec<VariantRowWithId> = result.take(0).map_err(DbError::from)?;
            return Ok(first_variant(rows, id_str)?);
        }

        let query = format!(
            "UPDATE type::record('experiment_variant', $id) SET {};",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(query)
            .query(SELECT_BY_ID)
            .bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(slug) = input.slug {
            builder = builder.bind(("slug", slug));
        }
        if let Some(is_control) = input.is_control {
            builder = builder.bind(("is_control", is_control));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(ratio) = input.ratio {
            builder = builder.bind(("ratio", ratio));
        }
        if let Some(Some(value)) = input.value {
            builder = builder.bind(("value", value));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::query(ENTITY, e))?;

        let rows: Vec<VariantRowWithId> = result.take(1).map_err(DbError::from)?;
        Ok(first_variant(rows, id_str)?)
    }

    async fn delete(&self, id: Uuid) -> ExperimenterResult<()> {
        self.db
            .query("DELETE type::record('experiment_variant', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn apply_changes(
        &self,
        experiment_id: Uuid,
        changes: VariantChanges,
    ) -> ExperimenterResult<Vec<ExperimentVariant>> {
        if changes.is_empty() {
            return self.list_for_experiment(experiment_id).await;
        }

        // Overwritten rows first park on their own id as slug, so two
        // branches can swap slugs without tripping the unique index.
        let mut sql = String::from("BEGIN TRANSACTION;\n");
        for i in 0..changes.deleted.len() {
            sql.push_str(&format!(
                "DELETE type::record('experiment_variant', $del_{i}) \
                 WHERE experiment_id = $experiment_id;\n"
            ));
        }
        for i in 0..changes.updated.len() {
            sql.push_str(&format!(
                "UPDATE type::record('experiment_variant', $upd_{i}) SET slug = $upd_{i} \
                 WHERE experiment_id = $experiment_id;\n"
            ));
        }
        for i in 0..changes.updated.len() {
            sql.push_str(&format!(
                "UPDATE type::record('experiment_variant', $upd_{i}) SET \
                 name = $upd_{i}_name, slug = $upd_{i}_slug, is_control = $upd_{i}_is_control, \
                 description = $upd_{i}_description, ratio = $upd_{i}_ratio, value = $upd_{i}_value \
                 WHERE experiment_id = $experiment_id;\n"
            ));
        }
        for i in 0..changes.created.len() {
            sql.push_str(&format!(
                "CREATE type::record('experiment_variant', $new_{i}) SET \
                 experiment_id = $experiment_id, name = $new_{i}_name, slug = $new_{i}_slug, \
                 is_control = $new_{i}_is_control, description = $new_{i}_description, \
                 ratio = $new_{i}_ratio, value = $new_{i}_value;\n"
            ));
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut builder = self
            .db
            .query(sql)
            .bind(("experiment_id", experiment_id.to_string()));

        for (i, id) in changes.deleted.into_iter().enumerate() {
            builder = builder.bind((format!("del_{i}"), id.to_string()));
        }
        for (i, (id, variant)) in changes.updated.into_iter().enumerate() {
            builder = builder
                .bind((format!("upd_{i}"), id.to_string()))
                .bind((format!("upd_{i}_name"), variant.name))
                .bind((format!("upd_{i}_slug"), variant.slug))
                .bind((format!("upd_{i}_is_control"), variant.is_control))
                .bind((format!("upd_{i}_description"), variant.description))
                .bind((format!("upd_{i}_ratio"), variant.ratio))
                .bind((format!("upd_{i}_value"), variant.value));
        }
        for (i, variant) in changes.created.into_iter().enumerate() {
            builder = builder
                .bind((format!("new_{i}"), Uuid::new_v4().to_string()))
                .bind((format!("new_{i}_name"), variant.name))
                .bind((format!("new_{i}_slug"), variant.slug))
                .bind((format!("new_{i}_is_control"), variant.is_control))
                .bind((format!("new_{i}_description"), variant.description))
                .bind((format!("new_{i}_ratio"), variant.ratio))
                .bind((format!("new_{i}_value"), variant.value));
        }

        let result = builder.await.map_err(DbError::from)?;
        result.check().map_err(|e| DbError::query(ENTITY, e))?;

        self.list_for_experiment(experiment_id).await
    }

    async fn list_for_experiment(
        &self,
        experiment_id: Uuid,
    ) -> ExperimenterResult<Vec<ExperimentVariant>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM experiment_variant \
                 WHERE experiment_id = $experiment_id \
                 ORDER BY is_control DESC, created_at ASC",
            )
            .bind(("experiment_id", experiment_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VariantRowWithId> = result.take(0).map_err(DbError::from)?;
        let variants = rows
            .into_iter()
            .map(|row| row.try_into_variant())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(variants)
    }
}
