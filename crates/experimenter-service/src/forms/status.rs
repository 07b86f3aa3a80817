use experimenter_core::error::{ExperimenterError, ExperimenterResult};
use experimenter_core::models::experiment::ExperimentStatus;
use serde::Deserialize;

use super::fields;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusForm {
    pub status: Option<String>,
    /// Free-text note flagging the review request for attention.
    pub attention: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub old: ExperimentStatus,
    pub new: ExperimentStatus,
    pub needs_attention: bool,
}

impl StatusChange {
    pub fn is(&self, old: ExperimentStatus, new: ExperimentStatus) -> bool {
        self.old == old && self.new == new
    }
}

/// Reject `old -> new` unless it is an edit or a listed transition.
pub fn check_transition(old: ExperimentStatus, new: ExperimentStatus) -> ExperimenterResult<()> {
    if old.can_transition_to(new) {
        Ok(())
    } else {
        Err(ExperimenterError::InvalidTransition {
            from: old.to_string(),
            to: new.to_string(),
        })
    }
}

impl StatusForm {
    pub fn clean(self, current: ExperimentStatus) -> ExperimenterResult<StatusChange> {
        let mut errors = experimenter_core::error::FormErrors::new();
        let new = fields::choice::<ExperimentStatus>(&mut errors, "status", self.status, true);
        let Some(new) = new else {
            return Err(ExperimenterError::InvalidForm(errors));
        };
        check_transition(current, new)?;

        Ok(StatusChange {
            old: current,
            new,
            needs_attention: self.attention.is_some_and(|a| !a.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExperimentStatus::*;

    fn form(status: &str) -> StatusForm {
        StatusForm {
            status: Some(status.into()),
            attention: None,
        }
    }

    #[test]
    fn legal_transition() {
        let change = form("Review").clean(Draft).unwrap();
        assert!(change.is(Draft, Review));
        assert!(!change.needs_attention);
    }

    #[test]
    fn illegal_transition_message() {
        let err = form("Live").clean(Draft).unwrap_err();
        assert_eq!(
            err.to_string(),
            "You can not change an Experiment's status from Draft to Live"
        );
    }

    #[test]
    fn attention_flag() {
        let change = StatusForm {
            status: Some("Review".into()),
            attention: Some("Please hurry".into()),
        }
        .clean(Draft)
        .unwrap();
        assert!(change.needs_attention);
    }

    #[test]
    fn unknown_status() {
        assert!(matches!(
            form("Paused").clean(Draft),
            Err(ExperimenterError::InvalidForm(_))
        ));
    }
}
