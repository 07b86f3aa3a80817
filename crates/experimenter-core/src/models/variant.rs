//! Experiment variant (branch) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One treatment arm of an experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentVariant {
    pub id: Uuid,
    pub experiment_id: Uuid,
    pub name: String,
    /// Unique within the owning experiment.
    pub slug: String,
    pub is_control: bool,
    pub description: String,
    /// Relative branch size; branches of one experiment sum to 100.
    pub ratio: u32,
    /// JSON-serialized pref value (pref experiments only).
    pub value: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariantKind {
    Control,
    Treatment,
}

impl ExperimentVariant {
    pub fn kind(&self) -> VariantKind {
        if self.is_control {
            VariantKind::Control
        } else {
            VariantKind::Treatment
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVariant {
    pub experiment_id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_control: bool,
    pub description: String,
    pub ratio: u32,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateVariant {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub is_control: Option<bool>,
    pub description: Option<String>,
    pub ratio: Option<u32>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub value: Option<Option<String>>,
}

/// A whole-formset rewrite of one experiment's branches, applied at once.
#[derive(Debug, Clone, Default)]
pub struct VariantChanges {
    pub deleted: Vec<Uuid>,
    /// Existing branches, overwritten field by field.
    pub updated: Vec<(Uuid, CreateVariant)>,
    pub created: Vec<CreateVariant>,
}

impl VariantChanges {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.updated.is_empty() && self.created.is_empty()
    }
}
