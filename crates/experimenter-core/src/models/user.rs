//! User domain model.
//!
//! Users are identified by the email address the authenticating proxy
//! forwards; there are no passwords.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::experiment::choice_enum;

choice_enum! {
    /// Extra rights beyond editing experiments.
    UserPermission, "user permission" {
        QaSignOff => "can_check_QA_signoff", "Can check QA sign-off";
        RelmanSignOff => "can_check_relman_signoff", "Can check Release Management sign-off";
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub permissions: Vec<UserPermission>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_permission(&self, permission: UserPermission) -> bool {
        self.permissions.contains(&permission)
    }
}
