//! Overview step: naming, ownership and the proposed timeline.

use chrono::NaiveDate;
use experimenter_core::error::{ExperimenterResult, FormErrors};
use experimenter_core::models::experiment::{
    CreateExperiment, ExperimentType, MAX_DURATION, UpdateExperiment,
};
use experimenter_core::slug::slugify;
use serde::Deserialize;
use uuid::Uuid;

use super::fields;

pub const NAME_IN_USE: &str = "This name is already in use.";
pub const NAME_NEEDS_CHARACTERS: &str = "This name must include non-punctuation characters.";
pub const START_DATE_IN_PAST: &str =
    "The experiment start date must be no earlier than the current date.";
pub const ENROLLMENT_TOO_LONG: &str =
    "The enrollment duration must be less than or equal to the experiment duration.";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OverviewForm {
    #[serde(rename = "type")]
    pub experiment_type: Option<String>,
    pub owner: Option<Uuid>,
    pub project: Option<Uuid>,
    pub engineering_owner: Option<String>,
    pub name: Option<String>,
    pub short_description: Option<String>,
    pub public_name: Option<String>,
    pub public_description: Option<String>,
    pub data_science_bugzilla_url: Option<String>,
    pub feature_bugzilla_url: Option<String>,
    pub related_work: Option<String>,
    pub proposed_start_date: Option<String>,
    pub proposed_duration: Option<i64>,
    pub proposed_enrollment: Option<i64>,
}

/// Facts about the submission that live in storage.
#[derive(Debug, Clone, Copy)]
pub struct OverviewChecks {
    pub today: NaiveDate,
    /// Another experiment already owns the derived slug.
    pub name_taken: bool,
    pub owner_exists: bool,
    pub project_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanOverview {
    pub experiment_type: ExperimentType,
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub engineering_owner: Option<String>,
    pub name: String,
    pub slug: String,
    pub short_description: String,
    pub public_name: Option<String>,
    pub public_description: Option<String>,
    pub data_science_bugzilla_url: String,
    pub feature_bugzilla_url: Option<String>,
    pub related_work: String,
    pub proposed_start_date: Option<NaiveDate>,
    pub proposed_duration: Option<u32>,
    pub proposed_enrollment: Option<u32>,
}

impl OverviewForm {
    /// Slug the submitted name would produce, if any.
    pub fn slug(&self) -> Option<String> {
        fields::text(self.name.clone())
            .map(|n| slugify(&n))
            .filter(|s| !s.is_empty())
    }

    pub fn clean(self, checks: OverviewChecks) -> ExperimenterResult<CleanOverview> {
        let mut errors = FormErrors::new();

        let experiment_type =
            fields::choice::<ExperimentType>(&mut errors, "type", self.experiment_type, true);

        let owner_id = match self.owner {
            None => {
                errors.add("owner", fields::REQUIRED);
                None
            }
            Some(id) if !checks.owner_exists => {
                errors.add("owner", fields::invalid_choice(&id.to_string()));
                None
            }
            Some(id) => Some(id),
        };

        let project_id = match self.project {
            Some(id) if !checks.project_exists => {
                errors.add("project", fields::invalid_choice(&id.to_string()));
                None
            }
            other => other,
        };

        let name = fields::required_text(&mut errors, "name", self.name);
        let slug = name.as_deref().map(slugify).unwrap_or_default();
        if name.is_some() {
            if slug.is_empty() {
                errors.add("name", NAME_NEEDS_CHARACTERS);
            } else if checks.name_taken {
                errors.add("name", NAME_IN_USE);
            }
        }

        let short_description =
            fields::required_text(&mut errors, "short_description", self.short_description);

        let data_science_bugzilla_url = fields::bugzilla_url(
            &mut errors,
            "data_science_bugzilla_url",
            self.data_science_bugzilla_url,
            true,
        );
        let feature_bugzilla_url = fields::bugzilla_url(
            &mut errors,
            "feature_bugzilla_url",
            self.feature_bugzilla_url,
            false,
        );

        let proposed_start_date =
            fields::date(&mut errors, "proposed_start_date", self.proposed_start_date);
        if proposed_start_date.is_some_and(|d| d < checks.today) {
            errors.add("proposed_start_date", START_DATE_IN_PAST);
        }

        let max = i64::from(MAX_DURATION);
        let proposed_duration =
            fields::integer(&mut errors, "proposed_duration", self.proposed_duration, 1, max);
        let proposed_enrollment = fields::integer(
            &mut errors,
            "proposed_enrollment",
            self.proposed_enrollment,
            1,
            max,
        );
        if let (Some(enrollment), Some(duration)) = (proposed_enrollment, proposed_duration)
            && enrollment > duration
        {
            errors.set("proposed_enrollment", ENROLLMENT_TOO_LONG);
        }

        match (experiment_type, owner_id, name, short_description, data_science_bugzilla_url) {
            (Some(experiment_type), Some(owner_id), Some(name), Some(short_description), Some(ds))
                if errors.is_empty() =>
            {
                Ok(CleanOverview {
                    experiment_type,
                    owner_id,
                    project_id,
                    engineering_owner: fields::text(self.engineering_owner),
                    name,
                    slug,
                    short_description,
                    public_name: fields::text(self.public_name),
                    public_description: fields::text(self.public_description),
                    data_science_bugzilla_url: ds,
                    feature_bugzilla_url,
                    related_work: fields::text(self.related_work).unwrap_or_default(),
                    proposed_start_date,
                    proposed_duration,
                    proposed_enrollment,
                })
            }
            _ => Err(experimenter_core::error::ExperimenterError::InvalidForm(errors)),
        }
    }
}

impl CleanOverview {
    pub fn into_create(self) -> CreateExperiment {
        CreateExperiment {
            experiment_type: self.experiment_type,
            owner_id: Some(self.owner_id),
            project_id: self.project_id,
            name: self.name,
            slug: self.slug,
            short_description: self.short_description,
            related_work: self.related_work,
            engineering_owner: self.engineering_owner,
            public_name: self.public_name,
            public_description: self.public_description,
            data_science_bugzilla_url: Some(self.data_science_bugzilla_url),
            feature_bugzilla_url: self.feature_bugzilla_url,
            proposed_start_date: self.proposed_start_date,
            proposed_duration: self.proposed_duration,
            proposed_enrollment: self.proposed_enrollment,
        }
    }

    pub fn into_update(self) -> UpdateExperiment {
        UpdateExperiment {
            experiment_type: Some(self.experiment_type),
            owner_id: Some(Some(self.owner_id)),
            project_id: Some(self.project_id),
            name: Some(self.name),
            slug: Some(self.slug),
            short_description: Some(self.short_description),
            related_work: Some(self.related_work),
            engineering_owner: Some(self.engineering_owner),
            public_name: Some(self.public_name),
            public_description: Some(self.public_description),
            data_science_bugzilla_url: Some(Some(self.data_science_bugzilla_url)),
            feature_bugzilla_url: Some(self.feature_bugzilla_url),
            proposed_start_date: Some(self.proposed_start_date),
            proposed_duration: Some(self.proposed_duration),
            proposed_enrollment: Some(self.proposed_enrollment),
            ..UpdateExperiment::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use experimenter_core::error::ExperimenterError;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 4, 1).unwrap()
    }

    fn checks() -> OverviewChecks {
        OverviewChecks {
            today: today(),
            name_taken: false,
            owner_exists: true,
            project_exists: true,
        }
    }

    fn form() -> OverviewForm {
        OverviewForm {
            experiment_type: Some("pref".into()),
            owner: Some(Uuid::new_v4()),
            name: Some("A new experiment!".into()),
            short_description: Some("Let us learn new things".into()),
            data_science_bugzilla_url: Some(
                "https://bugzilla.mozilla.org/show_bug.cgi?id=123".into(),
            ),
            proposed_start_date: Some("2019-04-02".into()),
            proposed_duration: Some(30),
            proposed_enrollment: Some(10),
            ..OverviewForm::default()
        }
    }

    fn errors(result: ExperimenterResult<CleanOverview>) -> FormErrors {
        match result {
            Err(ExperimenterError::InvalidForm(errors)) => errors,
            other => panic!("expected form errors, got {other:?}"),
        }
    }

    #[test]
    fn valid_overview_derives_slug() {
        let clean = form().clean(checks()).unwrap();
        assert_eq!(clean.slug, "a-new-experiment");
        assert_eq!(clean.experiment_type, ExperimentType::Pref);
        assert_eq!(clean.related_work, "");
    }

    #[test]
    fn missing_required_fields() {
        let errors = errors(OverviewForm::default().clean(checks()));
        for field in ["type", "owner", "name", "short_description", "data_science_bugzilla_url"] {
            assert_eq!(errors.get(field).unwrap(), [fields::REQUIRED], "{field}");
        }
    }

    #[test]
    fn start_date_in_the_past() {
        let mut f = form();
        f.proposed_start_date = Some("2019-03-31".into());
        let errors = errors(f.clean(checks()));
        assert_eq!(errors.get("proposed_start_date").unwrap(), [START_DATE_IN_PAST]);
    }

    #[test]
    fn enrollment_longer_than_duration() {
        let mut f = form();
        f.proposed_enrollment = Some(31);
        let errors = errors(f.clean(checks()));
        assert_eq!(errors.get("proposed_enrollment").unwrap(), [ENROLLMENT_TOO_LONG]);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let mut f = form();
        f.proposed_duration = Some(0);
        f.proposed_enrollment = None;
        let errors = errors(f.clean(checks()));
        assert!(errors.has("proposed_duration"));
    }

    #[test]
    fn name_uniqueness_and_punctuation() {
        let taken = OverviewChecks {
            name_taken: true,
            ..checks()
        };
        let errors1 = errors(form().clean(taken));
        assert_eq!(errors1.get("name").unwrap(), [NAME_IN_USE]);

        let mut f = form();
        f.name = Some("!!!".into());
        assert!(f.slug().is_none());
        let errors2 = errors(f.clean(checks()));
        assert_eq!(errors2.get("name").unwrap(), [NAME_NEEDS_CHARACTERS]);
    }

    #[test]
    fn non_bugzilla_url_is_rejected() {
        let mut f = form();
        f.feature_bugzilla_url = Some("https://github.com/mozilla/experimenter".into());
        let errors = errors(f.clean(checks()));
        assert_eq!(
            errors.get("feature_bugzilla_url").unwrap(),
            [fields::INVALID_BUGZILLA_URL]
        );
    }
}
