//! Bugzilla integration.
//!
//! Ticket creation never fails the caller: request errors, unreadable
//! bodies and responses without an `id` are logged and reported as
//! `None`. Nothing is retried.

use experimenter_core::models::experiment::Experiment;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::links;

#[derive(Debug, Error)]
pub enum BugzillaError {
    #[error("Error creating Bugzilla ticket: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Error parsing JSON Bugzilla response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bugzilla response has no id")]
    MissingId,
}

/// Anything that can file and comment on experiment bugs.
pub trait BugTracker: Send + Sync {
    /// File the tracking bug for an experiment entering review.
    fn create_experiment_bug(
        &self,
        experiment: &Experiment,
        owner_email: &str,
    ) -> impl Future<Output = Option<i64>> + Send;

    /// Announce on the experiment's bug that it is ready to ship.
    fn add_experiment_comment(
        &self,
        experiment: &Experiment,
    ) -> impl Future<Output = Option<i64>> + Send;
}

#[derive(Debug, Serialize)]
struct BugData<'a> {
    product: &'static str,
    component: &'static str,
    version: &'static str,
    summary: String,
    description: String,
    assigned_to: &'a str,
    cc: &'a [String],
}

#[derive(Debug, Serialize)]
struct CommentData {
    comment: String,
}

/// Bugzilla REST client.
#[derive(Debug, Clone)]
pub struct BugzillaClient {
    http: reqwest::Client,
    config: ServiceConfig,
}

impl BugzillaClient {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn host(&self) -> &str {
        self.config.bugzilla_host.trim_end_matches('/')
    }

    fn create_url(&self) -> String {
        format!("{}/rest/bug", self.host())
    }

    fn comment_url(&self, bugzilla_id: &str) -> String {
        format!("{}/rest/bug/{bugzilla_id}/comment", self.host())
    }

    fn description(&self, experiment: &Experiment) -> String {
        format!(
            "{short_description}\n\n\
             Experiment Type: {kind}\n\
             Experiment Page: {url}\n\
             Proposed Start Date: {start}\n\
             Proposed Duration: {duration}\n\
             Population: {population}\n\n\
             Objectives:\n{objectives}",
            short_description = experiment.short_description,
            kind = experiment.experiment_type.label(),
            url = links::experiment_url(&self.config, &experiment.slug),
            start = experiment
                .proposed_start_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "Unknown".into()),
            duration = experiment
                .proposed_duration
                .map(|d| format!("{d} days"))
                .unwrap_or_else(|| "Unknown".into()),
            population = experiment.population(),
            objectives = experiment.objectives,
        )
    }

    async fn post<T: Serialize>(&self, url: String, body: &T) -> Result<i64, BugzillaError> {
        let response = self
            .http
            .post(url)
            .query(&[("api_key", self.config.bugzilla_api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let data: Value = serde_json::from_slice(&bytes)?;

        if !status.is_success() {
            warn!(%status, response = %data, "Bugzilla returned an error status");
        }

        data.get("id").and_then(Value::as_i64).ok_or(BugzillaError::MissingId)
    }
}

impl BugTracker for BugzillaClient {
    async fn create_experiment_bug(
        &self,
        experiment: &Experiment,
        owner_email: &str,
    ) -> Option<i64> {
        let data = BugData {
            product: "Shield",
            component: "Shield Study",
            version: "unspecified",
            summary: format!("[Shield] Pref Flip Study: {}", experiment.name),
            description: self.description(experiment),
            assigned_to: owner_email,
            cc: &self.config.bugzilla_cc_list,
        };

        match self.post(self.create_url(), &data).await {
            Ok(id) => {
                info!(slug = %experiment.slug, bugzilla_id = id, "Created Bugzilla ticket");
                Some(id)
            }
            Err(BugzillaError::MissingId) => {
                warn!(slug = %experiment.slug, "Bugzilla response did not include a bug id");
                None
            }
            Err(e) => {
                error!(slug = %experiment.slug, error = %e, "Error creating Bugzilla ticket");
                None
            }
        }
    }

    async fn add_experiment_comment(&self, experiment: &Experiment) -> Option<i64> {
        let bugzilla_id = experiment.bugzilla_id.as_deref().filter(|id| !id.is_empty())?;

        let data = CommentData {
            comment: format!(
                "The experiment {name} is ready to ship.\n\n\
                 Normandy slug: {normandy_slug}\n\
                 Experiment page: {url}",
                name = experiment.name,
                normandy_slug = experiment.normandy_slug.as_deref().unwrap_or(""),
                url = links::experiment_url(&self.config, &experiment.slug),
            ),
        };

        match self.post(self.comment_url(bugzilla_id), &data).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(
                    slug = %experiment.slug,
                    bugzilla_id,
                    error = %e,
                    "Error adding Bugzilla comment"
                );
                None
            }
        }
    }
}
