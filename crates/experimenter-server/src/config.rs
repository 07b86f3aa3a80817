//! Command line and environment configuration.

use std::net::SocketAddr;

use clap::Parser;
use experimenter_db::DbConfig;
use experimenter_service::ServiceConfig;

/// Server settings. Every flag can also be supplied through the
/// environment variable named next to it.
#[derive(Debug, Clone, Parser)]
#[command(name = "experimenter", version, about = "Experimenter HTTP server")]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[arg(long, env = "EXPERIMENTER_LISTEN", default_value = "0.0.0.0:7001")]
    pub listen: SocketAddr,

    /// SurrealDB endpoint.
    #[arg(long, env = "EXPERIMENTER_DB_URL", default_value = "127.0.0.1:8000")]
    pub db_url: String,

    #[arg(long, env = "EXPERIMENTER_DB_NAMESPACE", default_value = "experimenter")]
    pub db_namespace: String,

    #[arg(long, env = "EXPERIMENTER_DB_DATABASE", default_value = "experiments")]
    pub db_database: String,

    #[arg(long, env = "EXPERIMENTER_DB_USERNAME", default_value = "root")]
    pub db_username: String,

    #[arg(long, env = "EXPERIMENTER_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    pub db_password: String,

    /// Header set by the authenticating proxy with the user's email.
    #[arg(long, env = "EXPERIMENTER_EMAIL_HEADER", default_value = "X-Forwarded-User")]
    pub email_header: String,

    /// Public hostname used when building absolute links.
    #[arg(long, env = "EXPERIMENTER_HOSTNAME", default_value = "localhost")]
    pub hostname: String,

    #[arg(long, env = "EXPERIMENTER_BUGZILLA_HOST", default_value = "https://bugzilla.mozilla.org")]
    pub bugzilla_host: String,

    #[arg(long, env = "EXPERIMENTER_BUGZILLA_API_KEY", default_value = "", hide_env_values = true)]
    pub bugzilla_api_key: String,

    /// Comma separated addresses copied on every filed bug.
    #[arg(long, env = "EXPERIMENTER_BUGZILLA_CC_LIST", value_delimiter = ',')]
    pub bugzilla_cc_list: Vec<String>,

    #[arg(long, env = "EXPERIMENTER_PAGINATE_BY", default_value_t = 10)]
    pub paginate_by: usize,
}

impl ServerConfig {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            hostname: self.hostname.clone(),
            bugzilla_host: self.bugzilla_host.clone(),
            bugzilla_api_key: self.bugzilla_api_key.clone(),
            bugzilla_cc_list: self
                .bugzilla_cc_list
                .iter()
                .map(|email| email.trim().to_string())
                .filter(|email| !email.is_empty())
                .collect(),
            paginate_by: self.paginate_by,
            ..ServiceConfig::default()
        }
    }
}
