//! Service configuration.

/// Configuration for the experiment workflow and its integrations.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Public hostname used to build absolute experiment URLs.
    pub hostname: String,
    /// Bugzilla base URL (default: `https://bugzilla.mozilla.org`).
    pub bugzilla_host: String,
    /// API key sent with every Bugzilla request.
    pub bugzilla_api_key: String,
    /// Addresses CC'd on every experiment bug.
    pub bugzilla_cc_list: Vec<String>,
    /// Recipe URL on the Normandy API. `{id}` is replaced.
    pub normandy_api_recipe_url: String,
    /// Recipe URL in the delivery console. `{id}` is replaced.
    pub delivery_console_recipe_url: String,
    /// Monitoring dashboard URL. `{slug}` is replaced with the Normandy slug.
    pub monitoring_url: String,
    /// Experiments per list page (default: 10).
    pub paginate_by: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".into(),
            bugzilla_host: "https://bugzilla.mozilla.org".into(),
            bugzilla_api_key: String::new(),
            bugzilla_cc_list: Vec::new(),
            normandy_api_recipe_url: "https://normandy.cdn.mozilla.net/api/v1/recipe/{id}/".into(),
            delivery_console_recipe_url:
                "https://delivery-console.prod.mozaws.net/recipe/{id}/".into(),
            monitoring_url:
                "https://grafana.telemetry.mozilla.org/d/XspgvdxZz/experiment-enrollment?orgId=1&var-experiment_id={slug}"
                    .into(),
            paginate_by: 10,
        }
    }
}

impl ServiceConfig {
    /// `https://{bugzilla_host}/show_bug.cgi?id={id}`.
    pub fn bugzilla_detail_url(&self, id: &str) -> String {
        format!("{}/show_bug.cgi?id={id}", self.bugzilla_host.trim_end_matches('/'))
    }
}
