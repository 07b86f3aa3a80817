//! Experiment domain model.
//!
//! An experiment is a proposed (and eventually launched) staged rollout
//! or A/B test. It moves through a fixed set of statuses; see
//! [`ExperimentStatus::transitions`] for the legal moves.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ExperimenterError, ExperimenterResult};
use crate::models::review::{ReviewSignOffs, RiskAssessment};

/// Upper bound, in days, for proposed duration and enrollment.
pub const MAX_DURATION: u32 = 1000;

/// Maximum length of a slug handed to the delivery service.
pub const NORMANDY_SLUG_MAX_LEN: usize = 80;

pub const OBJECTIVES_DEFAULT: &str = "What is the objective of this study?  Explain in detail.";

pub const ANALYSIS_DEFAULT: &str = "\
What is the main effect you are looking for and what data will
you use to make these decisions? What metrics are you using to measure
success

Do you plan on surveying users at the end of the study? Yes/No.
Strategy and Insights can help create surveys if you need them.";

pub const CLIENT_MATCHING_DEFAULT: &str = "\
Prefs:

Experiments:

Any additional filters:";

/// Firefox versions offered by the population form.
pub fn firefox_versions() -> Vec<String> {
    (55..=80).map(|major| format!("{major}.0")).collect()
}

/// Error returned when a stored or submitted choice is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChoice {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownChoice {}

macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $value:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize,
        )]
        pub enum $name {
            $(
                #[serde(rename = $value)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stored representation.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            /// Human-readable label.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::models::experiment::UnknownChoice;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => Err($crate::models::experiment::UnknownChoice {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use choice_enum;

choice_enum! {
    ExperimentType, "experiment type" {
        Pref => "pref", "Pref-Flip";
        Addon => "addon", "Add-On";
    }
}

choice_enum! {
    /// Lifecycle status of an experiment.
    ExperimentStatus, "experiment status" {
        Draft => "Draft", "Draft";
        Review => "Review", "Ready for Sign-Off";
        Ship => "Ship", "Ready to Ship";
        Accepted => "Accepted", "Accepted by Normandy";
        Live => "Live", "Live";
        Complete => "Complete", "Complete";
        Rejected => "Rejected", "Rejected";
    }
}

impl ExperimentStatus {
    /// Statuses reachable from `self` in one step.
    ///
    /// Staying in the same status is an edit and is always allowed; it is
    /// not listed here.
    pub fn transitions(self) -> &'static [ExperimentStatus] {
        use ExperimentStatus::*;
        match self {
            Draft => &[Review],
            Review => &[Draft, Ship, Rejected],
            Ship => &[Review, Accepted, Rejected],
            Accepted => &[Live, Rejected],
            Live => &[Complete],
            Complete => &[],
            Rejected => &[],
        }
    }

    pub fn can_transition_to(self, next: ExperimentStatus) -> bool {
        self == next || self.transitions().contains(&next)
    }
}

choice_enum! {
    FirefoxChannel, "firefox channel" {
        Nightly => "Nightly", "Nightly";
        Beta => "Beta", "Beta";
        Release => "Release", "Release";
    }
}

impl FirefoxChannel {
    /// Position used when ordering experiments by channel. Experiments
    /// without a channel sort first with order `0`.
    pub fn sort_order(channel: Option<FirefoxChannel>) -> u8 {
        match channel {
            None => 0,
            Some(FirefoxChannel::Nightly) => 1,
            Some(FirefoxChannel::Beta) => 2,
            Some(FirefoxChannel::Release) => 3,
        }
    }
}

choice_enum! {
    PrefType, "pref type" {
        Boolean => "boolean", "boolean";
        Integer => "integer", "integer";
        String => "string", "string";
        JsonString => "json string", "json string";
    }
}

choice_enum! {
    PrefBranch, "pref branch" {
        Default => "default", "default";
        User => "user", "user";
    }
}

choice_enum! {
    Platform, "platform" {
        All => "All Platforms", "All Platforms";
        Windows => "All Windows", "All Windows";
        Mac => "All Mac", "All Mac";
        Linux => "All Linux", "All Linux";
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::All
    }
}

/// An experiment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: Uuid,
    pub experiment_type: ExperimentType,
    pub owner_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status: ExperimentStatus,
    pub archived: bool,
    pub name: String,
    pub slug: String,
    pub short_description: String,
    pub related_work: String,

    pub proposed_start_date: Option<NaiveDate>,
    pub proposed_duration: Option<u32>,
    pub proposed_enrollment: Option<u32>,

    pub addon_experiment_id: Option<String>,
    pub addon_release_url: Option<String>,

    pub pref_key: Option<String>,
    pub pref_type: Option<PrefType>,
    pub pref_branch: Option<PrefBranch>,

    pub public_name: Option<String>,
    pub public_description: Option<String>,

    pub population_percent: f64,
    pub firefox_version: Option<String>,
    pub firefox_channel: Option<FirefoxChannel>,
    pub client_matching: String,
    /// Locale codes; empty means all locales.
    pub locales: Vec<String>,
    /// Country codes; empty means all countries.
    pub countries: Vec<String>,
    pub platform: Platform,

    pub objectives: String,
    pub analysis: String,
    pub analysis_owner: Option<String>,
    pub engineering_owner: Option<String>,

    pub bugzilla_id: Option<String>,
    pub normandy_slug: Option<String>,
    pub normandy_id: Option<u64>,

    pub data_science_bugzilla_url: Option<String>,
    pub feature_bugzilla_url: Option<String>,

    pub risk_flags: RiskAssessment,
    pub risk_technical_description: Option<String>,
    pub risks: Option<String>,

    pub testing: Option<String>,
    pub test_builds: Option<String>,
    pub qa_status: Option<String>,

    pub reviews: ReviewSignOffs,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Completion state of each editable section, used by the detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionProgress {
    pub overview: bool,
    pub timeline: bool,
    pub population: bool,
    pub addon: bool,
    pub variants: bool,
    pub objectives: bool,
    pub risks: bool,
    pub testing: bool,
    pub required_reviews: bool,
    pub all_sections: bool,
    pub ready_to_launch: bool,
}

impl Experiment {
    pub fn full_name(&self) -> String {
        format!("{}: {}", self.experiment_type.label(), self.name)
    }

    pub fn is_addon_experiment(&self) -> bool {
        self.experiment_type == ExperimentType::Addon
    }

    pub fn is_pref_experiment(&self) -> bool {
        self.experiment_type == ExperimentType::Pref
    }

    pub fn is_editable(&self) -> bool {
        matches!(
            self.status,
            ExperimentStatus::Draft | ExperimentStatus::Review
        )
    }

    pub fn is_begun(&self) -> bool {
        matches!(
            self.status,
            ExperimentStatus::Live | ExperimentStatus::Complete
        )
    }

    pub fn is_high_risk(&self) -> bool {
        self.risk_flags.any_true()
    }

    /// QA has been requested but not yet signed off.
    pub fn is_in_qa(&self) -> bool {
        self.reviews.qa_requested == Some(true) && self.reviews.qa == Some(false)
    }

    pub fn has_normandy_info(&self) -> bool {
        self.normandy_slug.is_some() || self.normandy_id.is_some()
    }

    /// Summary like `10% of Nightly Firefox 57.0`.
    pub fn population(&self) -> String {
        format!(
            "{}% of {} Firefox {}",
            format_percent(self.population_percent),
            self.firefox_channel.map(|c| c.as_str()).unwrap_or(""),
            self.firefox_version.as_deref().unwrap_or(""),
        )
    }

    pub fn completed_timeline(&self) -> bool {
        self.proposed_start_date.is_some() && self.proposed_duration.is_some_and(|d| d > 0)
    }

    pub fn completed_population(&self) -> bool {
        self.population_percent > 0.0
            && self.firefox_version.as_deref().is_some_and(|v| !v.is_empty())
            && self.firefox_channel.is_some()
    }

    pub fn completed_addon(&self) -> bool {
        self.addon_experiment_id.as_deref().is_some_and(|v| !v.is_empty())
            && self.addon_release_url.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn completed_objectives(&self) -> bool {
        self.objectives != OBJECTIVES_DEFAULT && self.analysis != ANALYSIS_DEFAULT
    }

    pub fn completed_risks(&self) -> bool {
        self.risk_flags.all_answered()
    }

    pub fn completed_testing(&self) -> bool {
        self.qa_status.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn completed_required_reviews(&self) -> bool {
        self.reviews.completed_required(&self.risk_flags)
    }

    pub fn progress(&self, variant_count: usize) -> SectionProgress {
        let variants = variant_count > 0;
        let mut all_sections = self.completed_timeline()
            && self.completed_population()
            && variants
            && self.completed_objectives()
            && self.completed_risks();
        if self.is_addon_experiment() {
            all_sections = all_sections && self.completed_addon();
        }
        let required_reviews = self.completed_required_reviews();

        SectionProgress {
            overview: true,
            timeline: self.completed_timeline(),
            population: self.completed_population(),
            addon: self.completed_addon(),
            variants,
            objectives: self.completed_objectives(),
            risks: self.completed_risks(),
            testing: self.completed_testing(),
            required_reviews,
            all_sections,
            ready_to_launch: all_sections && required_reviews,
        }
    }

    /// Build the slug the delivery service knows this experiment by.
    ///
    /// Add-on experiments reuse their active experiment name. Pref
    /// experiments combine type, slug, channel, version and bug number,
    /// truncating the slug so the result fits [`NORMANDY_SLUG_MAX_LEN`].
    pub fn generate_normandy_slug(&self) -> ExperimenterResult<String> {
        if self.is_addon_experiment() {
            return match self.addon_experiment_id.as_deref() {
                Some(id) if !id.is_empty() => Ok(id.to_string()),
                _ => Err(ExperimenterError::Validation {
                    message: "An Add-on experiment requires an Active Experiment Name \
                              before it can be sent to Normandy"
                        .into(),
                }),
            };
        }

        let missing = |field: &str| ExperimenterError::Validation {
            message: format!("The {field} must be set before a Normandy slug can be generated"),
        };

        let version = self
            .firefox_version
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("Firefox version"))?;
        let channel = self
            .firefox_channel
            .ok_or_else(|| missing("Firefox channel"))?;
        let bugzilla_id = self
            .bugzilla_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("Bugzilla ID"))?;

        let prefix = format!("{}-", self.experiment_type.as_str());
        let postfix = format!("-{channel}-{version}-bug-{bugzilla_id}");
        let remaining = NORMANDY_SLUG_MAX_LEN.saturating_sub(prefix.len() + postfix.len());
        let truncated: String = self.slug.chars().take(remaining).collect();

        Ok(format!("{prefix}{truncated}{postfix}").to_lowercase())
    }
}

/// Render a percentage without trailing zeros (`10`, `12.5`).
pub fn format_percent(value: f64) -> String {
    let formatted = format!("{value:.4}");
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Fields accepted when creating an experiment from the overview step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExperiment {
    pub experiment_type: ExperimentType,
    pub owner_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub short_description: String,
    pub related_work: String,
    pub engineering_owner: Option<String>,
    pub public_name: Option<String>,
    pub public_description: Option<String>,
    pub data_science_bugzilla_url: Option<String>,
    pub feature_bugzilla_url: Option<String>,
    pub proposed_start_date: Option<NaiveDate>,
    pub proposed_duration: Option<u32>,
    pub proposed_enrollment: Option<u32>,
}

/// Partial update of an experiment.
///
/// `None` leaves a field untouched. For nullable fields,
/// `Some(Some(val))` sets and `Some(None)` clears. Serializes to only the
/// fields that change, which is what the storage layer writes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateExperiment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_type: Option<ExperimentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ExperimentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_work: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_start_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_duration: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_enrollment: Option<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addon_experiment_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addon_release_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pref_key: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pref_type: Option<Option<PrefType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pref_branch: Option<Option<PrefBranch>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firefox_version: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firefox_channel: Option<Option<FirefoxChannel>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_matching: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locales: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objectives: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_owner: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engineering_owner: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bugzilla_id: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normandy_slug: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normandy_id: Option<Option<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_science_bugzilla_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_bugzilla_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_flags: Option<RiskAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_technical_description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risks: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testing: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_builds: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qa_status: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<ReviewSignOffs>,
}

impl UpdateExperiment {
    /// Field/value pairs to write. JSON `null` means clear the field.
    pub fn assignments(&self) -> ExperimenterResult<Vec<(String, serde_json::Value)>> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => Ok(map.into_iter().collect()),
            Ok(_) => Err(ExperimenterError::Internal(
                "experiment update did not serialize to an object".into(),
            )),
            Err(e) => Err(ExperimenterError::Internal(e.to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.assignments().map(|a| a.is_empty()).unwrap_or(true)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn experiment() -> Experiment {
        let now = Utc::now();
        Experiment {
            id: Uuid::new_v4(),
            experiment_type: ExperimentType::Pref,
            owner_id: None,
            project_id: None,
            status: ExperimentStatus::Draft,
            archived: false,
            name: "Experiment Name".into(),
            slug: "experiment-slug".into(),
            short_description: String::new(),
            related_work: String::new(),
            proposed_start_date: None,
            proposed_duration: None,
            proposed_enrollment: None,
            addon_experiment_id: None,
            addon_release_url: None,
            pref_key: None,
            pref_type: None,
            pref_branch: None,
            public_name: None,
            public_description: None,
            population_percent: 0.0,
            firefox_version: None,
            firefox_channel: None,
            client_matching: CLIENT_MATCHING_DEFAULT.into(),
            locales: Vec::new(),
            countries: Vec::new(),
            platform: Platform::All,
            objectives: OBJECTIVES_DEFAULT.into(),
            analysis: ANALYSIS_DEFAULT.into(),
            analysis_owner: None,
            engineering_owner: None,
            bugzilla_id: None,
            normandy_slug: None,
            normandy_id: None,
            data_science_bugzilla_url: None,
            feature_bugzilla_url: None,
            risk_flags: RiskAssessment::default(),
            risk_technical_description: None,
            risks: None,
            testing: None,
            test_builds: None,
            qa_status: None,
            reviews: ReviewSignOffs::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use ExperimentStatus::*;
        assert!(Draft.can_transition_to(Review));
        assert!(Draft.can_transition_to(Draft));
        assert!(!Draft.can_transition_to(Live));
        assert!(Review.can_transition_to(Rejected));
        assert!(Ship.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(Live));
        assert!(Live.can_transition_to(Complete));
        assert!(Complete.transitions().is_empty());
        assert!(Rejected.transitions().is_empty());
    }

    #[test]
    fn choices_round_trip_through_strings() {
        for status in ExperimentStatus::ALL {
            assert_eq!(status.as_str().parse::<ExperimentStatus>().unwrap(), *status);
        }
        assert_eq!("json string".parse::<PrefType>().unwrap(), PrefType::JsonString);
        assert!("Aurora".parse::<FirefoxChannel>().is_err());
    }

    #[test]
    fn normandy_slug_for_pref_experiment() {
        let mut exp = experiment();
        exp.firefox_version = Some("57.0".into());
        exp.firefox_channel = Some(FirefoxChannel::Nightly);
        exp.bugzilla_id = Some("12345".into());

        assert_eq!(
            exp.generate_normandy_slug().unwrap(),
            "pref-experiment-slug-nightly-57.0-bug-12345"
        );
    }

    #[test]
    fn normandy_slug_is_truncated() {
        let mut exp = experiment();
        exp.slug = "a".repeat(200);
        exp.firefox_version = Some("57.0".into());
        exp.firefox_channel = Some(FirefoxChannel::Release);
        exp.bugzilla_id = Some("12345".into());

        let slug = exp.generate_normandy_slug().unwrap();
        assert_eq!(slug.len(), NORMANDY_SLUG_MAX_LEN);
        assert!(slug.ends_with("-release-57.0-bug-12345"));
    }

    #[test]
    fn normandy_slug_requires_bugzilla_id() {
        let mut exp = experiment();
        exp.firefox_version = Some("57.0".into());
        exp.firefox_channel = Some(FirefoxChannel::Beta);

        let err = exp.generate_normandy_slug().unwrap_err();
        assert!(err.to_string().contains("Bugzilla ID"));
    }

    #[test]
    fn normandy_slug_for_addon_uses_active_name() {
        let mut exp = experiment();
        exp.experiment_type = ExperimentType::Addon;
        assert!(exp.generate_normandy_slug().is_err());

        exp.addon_experiment_id = Some("addon-study".into());
        assert_eq!(exp.generate_normandy_slug().unwrap(), "addon-study");
    }

    #[test]
    fn population_summary() {
        let mut exp = experiment();
        exp.population_percent = 12.5;
        exp.firefox_channel = Some(FirefoxChannel::Beta);
        exp.firefox_version = Some("60.0".into());
        assert_eq!(exp.population(), "12.5% of Beta Firefox 60.0");

        exp.population_percent = 10.0;
        assert_eq!(exp.population(), "10% of Beta Firefox 60.0");
    }

    #[test]
    fn channel_sort_puts_unset_first() {
        assert!(FirefoxChannel::sort_order(None) < FirefoxChannel::sort_order(Some(FirefoxChannel::Nightly)));
        assert!(
            FirefoxChannel::sort_order(Some(FirefoxChannel::Beta))
                < FirefoxChannel::sort_order(Some(FirefoxChannel::Release))
        );
    }

    #[test]
    fn update_assignments_distinguish_clear_from_untouched() {
        let update = UpdateExperiment {
            bugzilla_id: Some(None),
            name: Some("Renamed".into()),
            ..Default::default()
        };
        let assignments = update.assignments().unwrap();
        assert_eq!(assignments.len(), 2);
        assert!(assignments
            .iter()
            .any(|(k, v)| k == "bugzilla_id" && v.is_null()));
        assert!(UpdateExperiment::default().is_empty());
    }

    #[test]
    fn progress_requires_variants() {
        let mut exp = experiment();
        exp.proposed_start_date = NaiveDate::from_ymd_opt(2030, 1, 1);
        exp.proposed_duration = Some(30);
        exp.population_percent = 10.0;
        exp.firefox_version = Some("60.0".into());
        exp.firefox_channel = Some(FirefoxChannel::Beta);
        exp.objectives = "Learn".into();
        exp.analysis = "Measure".into();
        exp.risk_flags = RiskAssessment::all(false);

        assert!(!exp.progress(0).all_sections);
        assert!(exp.progress(2).all_sections);
        assert!(!exp.progress(2).ready_to_launch);
    }
}
