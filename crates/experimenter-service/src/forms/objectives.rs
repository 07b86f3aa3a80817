use experimenter_core::error::{ExperimenterResult, FormErrors};
use experimenter_core::models::experiment::UpdateExperiment;
use serde::Deserialize;

use super::fields;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectivesForm {
    pub objectives: Option<String>,
    pub analysis_owner: Option<String>,
    pub analysis: Option<String>,
}

impl ObjectivesForm {
    pub fn clean(self) -> ExperimenterResult<UpdateExperiment> {
        let mut errors = FormErrors::new();
        let objectives = fields::required_text(&mut errors, "objectives", self.objectives);
        let analysis_owner =
            fields::required_text(&mut errors, "analysis_owner", self.analysis_owner);
        let analysis = fields::required_text(&mut errors, "analysis", self.analysis);

        errors.finish(UpdateExperiment {
            objectives,
            analysis_owner: Some(analysis_owner),
            analysis,
            ..UpdateExperiment::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use experimenter_core::error::ExperimenterError;

    #[test]
    fn all_fields_required() {
        let form = ObjectivesForm {
            objectives: Some("Learn".into()),
            analysis_owner: Some("   ".into()),
            analysis: None,
        };
        match form.clean() {
            Err(ExperimenterError::InvalidForm(errors)) => {
                assert!(!errors.has("objectives"));
                assert!(errors.has("analysis_owner"));
                assert!(errors.has("analysis"));
            }
            other => panic!("expected form errors, got {other:?}"),
        }
    }

    #[test]
    fn clean_sets_fields() {
        let update = ObjectivesForm {
            objectives: Some("Learn".into()),
            analysis_owner: Some("Data Scientist".into()),
            analysis: Some("Compare retention".into()),
        }
        .clean()
        .unwrap();
        assert_eq!(update.objectives.as_deref(), Some("Learn"));
        assert_eq!(update.analysis_owner, Some(Some("Data Scientist".into())));
    }
}
