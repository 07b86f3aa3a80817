//! Change log domain model.
//!
//! Every saved form appends one entry recording the status before and
//! after the save. Entries are never updated or deleted.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::experiment::ExperimentStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentChangeLog {
    pub id: Uuid,
    pub experiment_id: Uuid,
    pub changed_on: DateTime<Utc>,
    pub changed_by: Uuid,
    pub old_status: Option<ExperimentStatus>,
    pub new_status: ExperimentStatus,
    pub message: Option<String>,
}

/// Label for a status transition, or `""` for pairs without one.
pub fn pretty_status(old: Option<ExperimentStatus>, new: ExperimentStatus) -> &'static str {
    use ExperimentStatus::*;
    match (old, new) {
        (None, Draft) => "Created Experiment",
        (Some(Draft), Draft) => "Edited Experiment",
        (Some(Draft), Review) => "Ready for Sign-Off",
        (Some(Review), Draft) => "Return to Draft",
        (Some(Review), Review) => "Edited Experiment",
        (Some(Review), Ship) => "Marked as Ready to Ship",
        (Some(Review), Rejected) => "Experiment Rejected",
        (Some(Ship), Review) => "Canceled Ready to Ship",
        (Some(Ship), Accepted) => "Accepted by Normandy",
        (Some(Accepted), Live) => "Launched Experiment",
        (Some(Live), Complete) => "Completed Experiment",
        _ => "",
    }
}

impl ExperimentChangeLog {
    pub fn pretty_status(&self) -> &'static str {
        pretty_status(self.old_status, self.new_status)
    }
}

impl fmt::Display for ExperimentChangeLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message.as_deref() {
            Some(message) if !message.is_empty() => f.write_str(message),
            _ => f.write_str(self.pretty_status()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChangeLog {
    pub experiment_id: Uuid,
    pub changed_by: Uuid,
    pub old_status: Option<ExperimentStatus>,
    pub new_status: ExperimentStatus,
    pub message: Option<String>,
    /// Defaults to the current time when `None`.
    pub changed_on: Option<DateTime<Utc>>,
}

/// Changes made by one user on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserChanges {
    pub user_id: Uuid,
    /// Distinct change descriptions, sorted.
    pub changes: Vec<String>,
}

/// Changes made on one day, grouped by user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyChanges {
    pub date: NaiveDate,
    pub users: Vec<UserChanges>,
}

/// Group changes by day (newest first) and then by user.
pub fn group_changes(changes: &[ExperimentChangeLog]) -> Vec<DailyChanges> {
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<Uuid, Vec<String>>> = BTreeMap::new();

    for change in changes {
        let entries = by_date
            .entry(change.changed_on.date_naive())
            .or_default()
            .entry(change.changed_by)
            .or_default();
        let text = change.to_string();
        if !entries.contains(&text) {
            entries.push(text);
        }
    }

    by_date
        .into_iter()
        .rev()
        .map(|(date, users)| DailyChanges {
            date,
            users: users
                .into_iter()
                .map(|(user_id, mut changes)| {
                    changes.sort();
                    UserChanges { user_id, changes }
                })
                .collect(),
        })
        .collect()
}
