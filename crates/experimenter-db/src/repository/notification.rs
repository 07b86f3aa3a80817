//! SurrealDB implementation of [`NotificationRepository`].

use chrono::{DateTime, Utc};
use experimenter_core::error::ExperimenterResult;
use experimenter_core::models::notification::{CreateNotification, Notification};
use experimenter_core::repository::NotificationRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

const ENTITY: &str = "notification";

#[derive(Debug, SurrealValue)]
struct NotificationRowWithId {
    record_id: String,
    user_id: String,
    message: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl NotificationRowWithId {
    fn try_into_notification(self) -> Result<Notification, DbError> {
        Ok(Notification {
            id: parse_uuid(ENTITY, &self.record_id)?,
            user_id: parse_uuid(ENTITY, &self.user_id)?,
            message: self.message,
            read: self.read,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Notification repository.
#[derive(Clone)]
pub struct SurrealNotificationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealNotificationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> NotificationRepository for SurrealNotificationRepository<C> {
    async fn create(&self, input: CreateNotification) -> ExperimenterResult<Notification> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('notification', $id) SET \
                 user_id = $user_id, message = $message, read = false;",
            )
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('notification', $id)")
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("message", input.message))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<NotificationRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: ENTITY.into(),
            id: id_str,
        })?;

        Ok(row.try_into_notification()?)
    }

    async fn list_for_user(&self, user_id: Uuid) -> ExperimenterResult<Vec<Notification>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM notification \
                 WHERE user_id = $user_id ORDER BY created_at DESC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<NotificationRowWithId> = result.take(0).map_err(DbError::from)?;
        let notifications = rows
            .into_iter()
            .map(|row| row.try_into_notification())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(notifications)
    }
}
