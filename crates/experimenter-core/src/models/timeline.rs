//! Experiment timeline derived from proposed dates and recorded changes.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::change_log::ExperimentChangeLog;
use crate::models::experiment::{Experiment, ExperimentStatus, MAX_DURATION, choice_enum};

choice_enum! {
    /// Date an experiment list can be filtered on.
    ExperimentDateField, "date field" {
        Starts => "proposed_start_date", "Start Date";
        Pauses => "enrollment_end_date", "Enrollment End Date";
        Ends => "end_date", "End Date";
    }
}

/// Dates of an experiment, actual where recorded and proposed otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timeline {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub enrollment_end_date: Option<NaiveDate>,
    /// Days between start and end.
    pub duration: Option<u32>,
    /// Days of observation after enrollment closes.
    pub observation_duration: u32,
}

/// Day of the earliest recorded `old -> new` transition.
fn change_date(
    changes: &[ExperimentChangeLog],
    old: ExperimentStatus,
    new: ExperimentStatus,
) -> Option<NaiveDate> {
    changes
        .iter()
        .filter(|c| c.old_status == Some(old) && c.new_status == new)
        .map(|c| c.changed_on.date_naive())
        .min()
}

fn add_days(date: NaiveDate, days: u32) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::days(i64::from(days)))
}

impl Timeline {
    pub fn new(experiment: &Experiment, changes: &[ExperimentChangeLog]) -> Self {
        let start_date = change_date(changes, ExperimentStatus::Accepted, ExperimentStatus::Live)
            .or(experiment.proposed_start_date);

        let proposed_duration = experiment
            .proposed_duration
            .filter(|d| *d <= MAX_DURATION);
        let end_date = change_date(changes, ExperimentStatus::Live, ExperimentStatus::Complete)
            .or_else(|| start_date.zip(proposed_duration).and_then(|(s, d)| add_days(s, d)));

        let duration = start_date
            .zip(end_date)
            .map(|(s, e)| (e - s).num_days())
            .and_then(|days| u32::try_from(days).ok())
            .filter(|d| *d <= MAX_DURATION);

        let enrollment = experiment.proposed_enrollment.filter(|e| *e > 0);
        let enrollment_end_date = start_date
            .zip(enrollment)
            .and_then(|(s, e)| add_days(s, e));

        let observation_duration = match (experiment.proposed_duration, enrollment) {
            (Some(duration), Some(enrollment)) => duration.saturating_sub(enrollment),
            _ => 0,
        };

        Self {
            start_date,
            end_date,
            enrollment_end_date,
            duration,
            observation_duration,
        }
    }

    pub fn date(&self, field: ExperimentDateField) -> Option<NaiveDate> {
        match field {
            ExperimentDateField::Starts => self.start_date,
            ExperimentDateField::Pauses => self.enrollment_end_date,
            ExperimentDateField::Ends => self.end_date,
        }
    }

    /// `Apr 01, 2019 - Apr 30, 2019 (29 days)`.
    pub fn dates(&self) -> String {
        format_range(self.start_date, self.end_date, self.duration)
    }

    /// Enrollment window. Missing ends render as `Unknown`.
    pub fn enrollment_dates(&self) -> String {
        span(self.start_date, self.enrollment_end_date)
    }

    /// Observation window following enrollment.
    pub fn observation_dates(&self) -> String {
        span(self.enrollment_end_date, self.end_date)
    }
}

fn span(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    let days = start
        .zip(end)
        .and_then(|(s, e)| u32::try_from((e - s).num_days()).ok());
    format_range(start, end, days)
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%b %d, %Y").to_string(),
        None => "Unknown".to_string(),
    }
}

pub fn format_range(start: Option<NaiveDate>, end: Option<NaiveDate>, days: Option<u32>) -> String {
    let days = match days {
        Some(1) => "1 day".to_string(),
        Some(n) => format!("{n} days"),
        None => "Unknown days".to_string(),
    };
    format!("{} - {} ({days})", format_date(start), format_date(end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::experiment::tests::experiment;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn proposed_timeline() {
        let mut exp = experiment();
        exp.proposed_start_date = Some(date(2019, 4, 1));
        exp.proposed_duration = Some(30);
        exp.proposed_enrollment = Some(10);

        let timeline = Timeline::new(&exp, &[]);
        assert_eq!(timeline.end_date, Some(date(2019, 5, 1)));
        assert_eq!(timeline.enrollment_end_date, Some(date(2019, 4, 11)));
        assert_eq!(timeline.observation_duration, 20);
        assert_eq!(timeline.dates(), "Apr 01, 2019 - May 01, 2019 (30 days)");
        assert_eq!(
            timeline.enrollment_dates(),
            "Apr 01, 2019 - Apr 11, 2019 (10 days)"
        );
        assert_eq!(
            timeline.observation_dates(),
            "Apr 11, 2019 - May 01, 2019 (20 days)"
        );
    }

    #[test]
    fn recorded_launch_overrides_proposed_start() {
        let mut exp = experiment();
        exp.proposed_start_date = Some(date(2019, 4, 1));
        exp.proposed_duration = Some(1);

        let launch = |day| ExperimentChangeLog {
            id: Uuid::new_v4(),
            experiment_id: exp.id,
            changed_on: Utc.with_ymd_and_hms(2019, 4, day, 12, 0, 0).unwrap(),
            changed_by: Uuid::new_v4(),
            old_status: Some(ExperimentStatus::Accepted),
            new_status: ExperimentStatus::Live,
            message: None,
        };

        // The first launch wins over a later repeat.
        let timeline = Timeline::new(&exp, &[launch(9), launch(5)]);
        assert_eq!(timeline.start_date, Some(date(2019, 4, 5)));
        assert_eq!(timeline.dates(), "Apr 05, 2019 - Apr 06, 2019 (1 day)");
        assert_eq!(timeline.enrollment_dates(), "Apr 05, 2019 - Unknown (Unknown days)");
        assert_eq!(timeline.observation_dates(), "Unknown - Apr 06, 2019 (Unknown days)");
    }

    #[test]
    fn unknown_dates() {
        let exp = experiment();
        let timeline = Timeline::new(&exp, &[]);
        assert_eq!(timeline.dates(), "Unknown - Unknown (Unknown days)");
        assert_eq!(timeline.enrollment_dates(), "Unknown - Unknown (Unknown days)");
        assert_eq!(timeline.observation_dates(), "Unknown - Unknown (Unknown days)");
        assert_eq!(timeline.date(ExperimentDateField::Ends), None);
    }

    #[test]
    fn out_of_range_duration_is_ignored() {
        let mut exp = experiment();
        exp.proposed_start_date = Some(date(2019, 4, 1));
        exp.proposed_duration = Some(MAX_DURATION + 1);
        assert_eq!(Timeline::new(&exp, &[]).end_date, None);
    }
}
