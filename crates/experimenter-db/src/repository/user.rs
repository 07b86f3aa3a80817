//! SurrealDB implementation of [`UserRepository`].
//!
//! Users are keyed by email. There are no credentials to store: the
//! authenticating proxy has already vouched for the address.

use chrono::{DateTime, Utc};
use experimenter_core::error::ExperimenterResult;
use experimenter_core::models::user::{User, UserPermission};
use experimenter_core::repository::{PaginatedResult, Pagination, UserRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::{CountRow, parse_choice, parse_uuid};
use crate::error::DbError;

const ENTITY: &str = "user";

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
pub(super) struct UserRowWithId {
    record_id: String,
    email: String,
    permissions: Vec<String>,
    created_at: DateTime<Utc>,
}

impl UserRowWithId {
    pub(super) fn try_into_user(self) -> Result<User, DbError> {
        let permissions = self
            .permissions
            .iter()
            .map(|p| parse_choice::<UserPermission>(ENTITY, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(User {
            id: parse_uuid(ENTITY, &self.record_id)?,
            email: self.email,
            permissions,
            created_at: self.created_at,
        })
    }
}

fn first_user(rows: Vec<UserRowWithId>, id: impl Into<String>) -> Result<User, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id.into(),
        })?
        .try_into_user()
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn get_or_create_by_email(&self, email: &str) -> ExperimenterResult<User> {
        match self.get_by_email(email).await {
            Ok(user) => return Ok(user),
            Err(experimenter_core::error::ExperimenterError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let id_str = Uuid::new_v4().to_string();
        let result = self
            .db
            .query("CREATE type::record('user', $id) SET email = $email, permissions = [];")
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        // A concurrent request may have created the same user first.
        let mut result = match result.check().map_err(|e| DbError::query(ENTITY, e)) {
            Ok(result) => result,
            Err(e) if e.is_duplicate() => return self.get_by_email(email).await,
            Err(e) => return Err(e.into()),
        };

        let rows: Vec<UserRowWithId> = result.take(1).map_err(DbError::from)?;
        let user = first_user(rows, id_str)?;
        info!(user_id = %user.id, email = %user.email, "Created user on first sign-in");
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> ExperimenterResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(first_user(rows, id_str)?)
    }

    async fn get_by_email(&self, email: &str) -> ExperimenterResult<User> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM user WHERE email = $email")
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(first_user(rows, format!("email={email}"))?)
    }

    async fn set_permissions(
        &self,
        id: Uuid,
        permissions: Vec<UserPermission>,
    ) -> ExperimenterResult<User> {
        let id_str = id.to_string();
        let mut values: Vec<String> = permissions.iter().map(|p| p.as_str().to_string()).collect();
        values.sort();
        values.dedup();

        let result = self
            .db
            .query("UPDATE type::record('user', $id) SET permissions = $permissions;")
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .bind(("permissions", values))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<UserRowWithId> = result.take(1).map_err(DbError::from)?;
        Ok(first_user(rows, id_str)?)
    }

    async fn list(&self, pagination: Pagination) -> ExperimenterResult<PaginatedResult<User>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 ORDER BY email ASC LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
