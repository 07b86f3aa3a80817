//! Absolute URLs shown alongside an experiment.

use experimenter_core::models::experiment::Experiment;
use serde::Serialize;

use crate::config::ServiceConfig;

/// Path of the experiment detail page.
pub fn detail_path(slug: &str) -> String {
    format!("/experiments/{slug}/")
}

pub fn experiment_url(config: &ServiceConfig, slug: &str) -> String {
    format!("https://{}{}", config.hostname, detail_path(slug))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperimentLinks {
    pub experiment_url: String,
    pub accept_url: String,
    pub reject_url: String,
    pub bugzilla_url: Option<String>,
    pub monitoring_dashboard_url: Option<String>,
    pub normandy_api_recipe_url: Option<String>,
    pub delivery_console_recipe_url: Option<String>,
    pub data_science_bugzilla_url: Option<String>,
    pub feature_bugzilla_url: Option<String>,
}

impl ExperimentLinks {
    pub fn new(config: &ServiceConfig, experiment: &Experiment) -> Self {
        let host = format!("https://{}", config.hostname);
        let slug = &experiment.slug;
        let recipe = |template: &str| {
            experiment
                .normandy_id
                .map(|id| template.replace("{id}", &id.to_string()))
        };

        Self {
            experiment_url: experiment_url(config, slug),
            accept_url: format!("{host}/api/v1/experiments/{slug}/accept"),
            reject_url: format!("{host}/api/v1/experiments/{slug}/reject"),
            bugzilla_url: experiment
                .bugzilla_id
                .as_deref()
                .filter(|id| !id.is_empty())
                .map(|id| config.bugzilla_detail_url(id)),
            monitoring_dashboard_url: experiment
                .normandy_slug
                .as_deref()
                .filter(|_| experiment.is_begun())
                .map(|s| config.monitoring_url.replace("{slug}", s)),
            normandy_api_recipe_url: recipe(&config.normandy_api_recipe_url),
            delivery_console_recipe_url: recipe(&config.delivery_console_recipe_url),
            data_science_bugzilla_url: experiment.data_science_bugzilla_url.clone(),
            feature_bugzilla_url: experiment.feature_bugzilla_url.clone(),
        }
    }

    pub fn has_external_urls(&self) -> bool {
        self.bugzilla_url.is_some()
            || self.monitoring_dashboard_url.is_some()
            || self.data_science_bugzilla_url.is_some()
            || self.feature_bugzilla_url.is_some()
    }
}
