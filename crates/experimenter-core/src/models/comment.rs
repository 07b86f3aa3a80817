//! Comment domain model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::experiment::choice_enum;

choice_enum! {
    /// Section of the experiment detail page a comment belongs to.
    CommentSection, "comment section" {
        Overview => "overview", "Overview";
        Population => "population", "Population";
        Design => "design", "Design";
        Addon => "addon", "Add-On";
        Objectives => "objectives", "Objectives";
        Analysis => "analysis", "Analysis";
        Risks => "risks", "Risks";
        Testing => "testing", "Testing";
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentComment {
    pub id: Uuid,
    pub experiment_id: Uuid,
    pub created_by: Uuid,
    pub created_on: DateTime<Utc>,
    pub section: CommentSection,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComment {
    pub experiment_id: Uuid,
    pub created_by: Uuid,
    pub section: CommentSection,
    pub text: String,
}

/// Comments keyed by section, each list in creation order.
pub fn comments_by_section(
    comments: Vec<ExperimentComment>,
) -> BTreeMap<CommentSection, Vec<ExperimentComment>> {
    let mut sections: BTreeMap<CommentSection, Vec<ExperimentComment>> = BTreeMap::new();
    for comment in comments {
        sections.entry(comment.section).or_default().push(comment);
    }
    for list in sections.values_mut() {
        list.sort_by_key(|c| c.created_on);
    }
    sections
}

impl PartialOrd for CommentSection {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CommentSection {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}
