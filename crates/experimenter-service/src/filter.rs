//! Experiment list filtering, search and ordering.
//!
//! Storage narrows the list by the exact-match filters in
//! [`ExperimentQuery`]. Free-text search, the date-range filter and the
//! ordering all depend on derived values (owner email, latest change,
//! timeline dates) and are applied here on [`ExperimentSummary`] rows.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use experimenter_core::error::FormErrors;
use experimenter_core::models::experiment::{
    Experiment, ExperimentStatus, ExperimentType, FirefoxChannel, firefox_versions,
};
use experimenter_core::models::timeline::{ExperimentDateField, Timeline};
use experimenter_core::repository::ExperimentQuery;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::forms::fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExperimentOrdering {
    #[default]
    #[serde(rename = "-latest_change")]
    LatestChangeDesc,
    #[serde(rename = "latest_change")]
    LatestChangeAsc,
    #[serde(rename = "firefox_version")]
    FirefoxVersionAsc,
    #[serde(rename = "-firefox_version")]
    FirefoxVersionDesc,
    #[serde(rename = "firefox_channel_sort")]
    FirefoxChannelAsc,
    #[serde(rename = "-firefox_channel_sort")]
    FirefoxChannelDesc,
}

impl ExperimentOrdering {
    pub const ALL: &'static [ExperimentOrdering] = &[
        ExperimentOrdering::LatestChangeDesc,
        ExperimentOrdering::LatestChangeAsc,
        ExperimentOrdering::FirefoxVersionAsc,
        ExperimentOrdering::FirefoxVersionDesc,
        ExperimentOrdering::FirefoxChannelAsc,
        ExperimentOrdering::FirefoxChannelDesc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LatestChangeDesc => "-latest_change",
            Self::LatestChangeAsc => "latest_change",
            Self::FirefoxVersionAsc => "firefox_version",
            Self::FirefoxVersionDesc => "-firefox_version",
            Self::FirefoxChannelAsc => "firefox_channel_sort",
            Self::FirefoxChannelDesc => "-firefox_channel_sort",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::LatestChangeDesc => "Most Recently Updated",
            Self::LatestChangeAsc => "Least Recently Updated",
            Self::FirefoxVersionAsc => "Firefox Version Ascending",
            Self::FirefoxVersionDesc => "Firefox Version Descending",
            Self::FirefoxChannelAsc => "Firefox Channel Ascending",
            Self::FirefoxChannelDesc => "Firefox Channel Descending",
        }
    }

    /// Unknown or missing values fall back to the default ordering.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }

    fn compare(self, a: &ExperimentSummary, b: &ExperimentSummary) -> Ordering {
        match self {
            Self::LatestChangeDesc => b.updated_on().cmp(&a.updated_on()),
            Self::LatestChangeAsc => a.updated_on().cmp(&b.updated_on()),
            Self::FirefoxVersionAsc => compare_versions(a, b),
            Self::FirefoxVersionDesc => compare_versions(b, a),
            Self::FirefoxChannelAsc => channel_order(a).cmp(&channel_order(b)),
            Self::FirefoxChannelDesc => channel_order(b).cmp(&channel_order(a)),
        }
    }
}

impl FromStr for ExperimentOrdering {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter().copied().find(|o| o.as_str() == s).ok_or(())
    }
}

impl fmt::Display for ExperimentOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn version_key(summary: &ExperimentSummary) -> Option<(u32, u32)> {
    let version = summary.experiment.firefox_version.as_deref()?;
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some((major, minor))
}

/// Ascending with unset versions first, like an empty version string.
fn compare_versions(a: &ExperimentSummary, b: &ExperimentSummary) -> Ordering {
    version_key(a).cmp(&version_key(b))
}

fn channel_order(summary: &ExperimentSummary) -> u8 {
    FirefoxChannel::sort_order(summary.experiment.firefox_channel)
}

/// One row of the experiment list with the values it is filtered on.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentSummary {
    pub experiment: Experiment,
    pub owner_email: Option<String>,
    pub latest_change: Option<DateTime<Utc>>,
    pub timeline: Timeline,
}

impl ExperimentSummary {
    fn updated_on(&self) -> DateTime<Utc> {
        self.latest_change.unwrap_or(self.experiment.created_at)
    }

    fn searchable(&self) -> [Option<&str>; 15] {
        let e = &self.experiment;
        [
            Some(e.name.as_str()),
            Some(e.short_description.as_str()),
            self.owner_email.as_deref(),
            Some(e.slug.as_str()),
            Some(e.related_work.as_str()),
            e.addon_experiment_id.as_deref(),
            e.pref_key.as_deref(),
            e.public_name.as_deref(),
            e.public_description.as_deref(),
            Some(e.objectives.as_str()),
            Some(e.analysis.as_str()),
            e.analysis_owner.as_deref(),
            e.engineering_owner.as_deref(),
            e.bugzilla_id.as_deref(),
            e.normandy_slug.as_deref(),
        ]
    }

    /// Number of field/term hits, or `None` when some term matches nothing.
    pub fn search_rank(&self, terms: &[String]) -> Option<usize> {
        let fields: Vec<String> = self
            .searchable()
            .into_iter()
            .flatten()
            .map(str::to_lowercase)
            .collect();

        let mut rank = 0;
        for term in terms {
            let hits = fields.iter().filter(|f| f.contains(term.as_str())).count();
            if hits == 0 {
                return None;
            }
            rank += hits;
        }
        Some(rank)
    }
}

/// Raw list query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExperimentFilter {
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub experiment_type: Option<String>,
    pub status: Option<String>,
    pub firefox_channel: Option<String>,
    pub firefox_version: Option<String>,
    pub project: Option<String>,
    pub owner: Option<String>,
    /// Include archived experiments.
    pub archived: bool,
    pub in_qa: bool,
    pub experiment_date_field: Option<String>,
    pub date_range_after: Option<String>,
    pub date_range_before: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<usize>,
}

/// A validated filter.
#[derive(Debug, Clone, Default)]
pub struct CleanFilter {
    pub query: ExperimentQuery,
    pub search_terms: Vec<String>,
    pub date_field: Option<ExperimentDateField>,
    pub date_after: Option<NaiveDate>,
    pub date_before: Option<NaiveDate>,
}

fn uuid_choice(errors: &mut FormErrors, field: &str, value: Option<String>) -> Option<Uuid> {
    let value = fields::text(value)?;
    match Uuid::parse_str(&value) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, fields::invalid_choice(&value));
            None
        }
    }
}

impl ExperimentFilter {
    pub fn ordering(&self) -> ExperimentOrdering {
        ExperimentOrdering::parse_or_default(self.ordering.as_deref())
    }

    pub fn clean(&self) -> Result<CleanFilter, FormErrors> {
        let mut errors = FormErrors::new();
        let e = &mut errors;

        let firefox_version = fields::text(self.firefox_version.clone());
        if let Some(version) = &firefox_version
            && !firefox_versions().contains(version)
        {
            e.add("firefox_version", fields::invalid_choice(version));
        }

        let query = ExperimentQuery {
            experiment_type: fields::choice::<ExperimentType>(
                e,
                "type",
                self.experiment_type.clone(),
                false,
            ),
            status: fields::choice::<ExperimentStatus>(e, "status", self.status.clone(), false),
            firefox_channel: fields::choice::<FirefoxChannel>(
                e,
                "firefox_channel",
                self.firefox_channel.clone(),
                false,
            ),
            firefox_version,
            project_id: uuid_choice(e, "project", self.project.clone()),
            owner_id: uuid_choice(e, "owner", self.owner.clone()),
            include_archived: self.archived,
            in_qa: self.in_qa,
        };

        let date_field = fields::choice::<ExperimentDateField>(
            e,
            "experiment_date_field",
            self.experiment_date_field.clone(),
            false,
        );
        let date_after = fields::date(e, "date_range_after", self.date_range_after.clone());
        let date_before = fields::date(e, "date_range_before", self.date_range_before.clone());

        let search_terms = fields::text(self.search.clone())
            .map(|s| s.split_whitespace().map(str::to_lowercase).collect())
            .unwrap_or_default();

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(CleanFilter {
            query,
            search_terms,
            date_field,
            date_after,
            date_before,
        })
    }

    /// Label of the selected experiment type.
    pub fn type_display(&self) -> Option<&'static str> {
        self.experiment_type
            .as_deref()
            .and_then(|t| t.parse::<ExperimentType>().ok())
            .map(ExperimentType::label)
    }

    /// `"Start Date between 2019-04-01 and 2019-05-01"` and friends.
    pub fn date_range_display(&self) -> String {
        let field = self
            .experiment_date_field
            .as_deref()
            .map(|f| {
                f.parse::<ExperimentDateField>()
                    .map(|d| d.label().to_string())
                    .unwrap_or_else(|_| f.to_string())
            })
            .unwrap_or_default();
        let after = fields::text(self.date_range_after.clone());
        let before = fields::text(self.date_range_before.clone());

        match (after, before) {
            (Some(a), Some(b)) => format!("{field} between {a} and {b}"),
            (Some(a), None) => format!("{field} after {a}"),
            (None, Some(b)) => format!("{field} before {b}"),
            (None, None) => String::new(),
        }
    }
}

impl CleanFilter {
    fn in_date_range(&self, summary: &ExperimentSummary) -> bool {
        let Some(field) = self.date_field else {
            return true;
        };
        if self.date_after.is_none() && self.date_before.is_none() {
            return true;
        }
        let Some(date) = summary.timeline.date(field) else {
            return false;
        };
        self.date_after.is_none_or(|after| date >= after)
            && self.date_before.is_none_or(|before| date <= before)
    }

    /// Apply search and date filters, then order. A search ranks results
    /// by relevance, overriding `ordering`.
    pub fn apply(
        &self,
        rows: Vec<ExperimentSummary>,
        ordering: ExperimentOrdering,
    ) -> Vec<ExperimentSummary> {
        let rows = rows.into_iter().filter(|r| self.in_date_range(r));

        if self.search_terms.is_empty() {
            let mut rows: Vec<_> = rows.collect();
            rows.sort_by(|a, b| ordering.compare(a, b));
            return rows;
        }

        let mut ranked: Vec<(usize, ExperimentSummary)> = rows
            .filter_map(|r| r.search_rank(&self.search_terms).map(|rank| (rank, r)))
            .collect();
        ranked.sort_by(|(ra, a), (rb, b)| rb.cmp(ra).then_with(|| ordering.compare(a, b)));
        ranked.into_iter().map(|(_, r)| r).collect()
    }
}

/// One page of a list.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub number: usize,
    pub num_pages: usize,
    pub total: usize,
}

/// Slice out page `number` (1-based). `None` when the page does not
/// exist; an empty list still has a first page.
pub fn paginate<T>(items: Vec<T>, number: usize, per_page: usize) -> Option<Page<T>> {
    let per_page = per_page.max(1);
    let total = items.len();
    let num_pages = total.div_ceil(per_page).max(1);
    if number == 0 || number > num_pages {
        return None;
    }

    let items = items
        .into_iter()
        .skip((number - 1) * per_page)
        .take(per_page)
        .collect();
    Some(Page {
        items,
        number,
        num_pages,
        total,
    })
}
