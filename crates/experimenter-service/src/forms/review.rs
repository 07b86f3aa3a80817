//! Sign-off checklist.
//!
//! Unchecked boxes are submitted as absent, so a missing field means
//! `false`. QA and Release Management sign-offs can only be changed by
//! users holding the matching permission; other changes are dropped with
//! a warning rather than failing the whole form.

use experimenter_core::models::review::{Review, ReviewSignOffs};
use experimenter_core::models::user::{User, UserPermission};
use serde::Deserialize;

pub const QA_PERMISSION_WARNING: &str = "You don't have permission to edit QA signoff fields";
pub const RELMAN_PERMISSION_WARNING: &str =
    "You don't have permission to edit Release Management signoff fields";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReviewForm {
    pub review_science: bool,
    pub review_advisory: bool,
    pub review_engineering: bool,
    pub review_qa_requested: bool,
    pub review_intent_to_ship: bool,
    pub review_bugzilla: bool,
    pub review_qa: bool,
    pub review_relman: bool,
    pub review_legal: bool,
    pub review_ux: bool,
    pub review_security: bool,
    pub review_vp: bool,
    pub review_data_steward: bool,
    pub review_comms: bool,
    pub review_impacted_teams: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewChanges {
    pub reviews: ReviewSignOffs,
    pub added: Vec<Review>,
    pub removed: Vec<Review>,
    pub warnings: Vec<String>,
}

impl ReviewForm {
    pub fn get(&self, review: Review) -> bool {
        match review {
            Review::Science => self.review_science,
            Review::Advisory => self.review_advisory,
            Review::Engineering => self.review_engineering,
            Review::QaRequested => self.review_qa_requested,
            Review::IntentToShip => self.review_intent_to_ship,
            Review::Bugzilla => self.review_bugzilla,
            Review::Qa => self.review_qa,
            Review::Relman => self.review_relman,
            Review::Legal => self.review_legal,
            Review::Ux => self.review_ux,
            Review::Security => self.review_security,
            Review::Vp => self.review_vp,
            Review::DataSteward => self.review_data_steward,
            Review::Comms => self.review_comms,
            Review::ImpactedTeams => self.review_impacted_teams,
        }
    }

    /// Diff the submission against `current`, honouring `user`'s permissions.
    pub fn clean(&self, current: &ReviewSignOffs, user: &User) -> ReviewChanges {
        let guarded = [
            (Review::Qa, UserPermission::QaSignOff, QA_PERMISSION_WARNING),
            (
                Review::Relman,
                UserPermission::RelmanSignOff,
                RELMAN_PERMISSION_WARNING,
            ),
        ];

        let mut changes = ReviewChanges {
            reviews: current.clone(),
            ..ReviewChanges::default()
        };

        for review in Review::ALL.iter().copied() {
            let checked = self.get(review);
            if checked == current.is_checked(review) {
                continue;
            }

            let denied = guarded
                .iter()
                .find(|(r, permission, _)| *r == review && !user.has_permission(*permission));
            if let Some((_, _, warning)) = denied {
                changes.warnings.push((*warning).to_string());
                continue;
            }

            changes.reviews.set(review, Some(checked));
            if checked {
                changes.added.push(review);
            } else {
                changes.removed.push(review);
            }
        }

        changes
    }
}

impl ReviewChanges {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// `Added sign-offs: A, B Removed sign-offs: C `.
    pub fn message(&self) -> String {
        let labels = |reviews: &[Review]| {
            reviews
                .iter()
                .map(|r| r.label())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut message = String::new();
        if !self.added.is_empty() {
            message.push_str(&format!("Added sign-offs: {} ", labels(&self.added)));
        }
        if !self.removed.is_empty() {
            message.push_str(&format!("Removed sign-offs: {} ", labels(&self.removed)));
        }
        message
    }
}
