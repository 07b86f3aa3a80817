//! Experimenter Server: HTTP surface over the experiment workflow.
//!
//! Form pages accept JSON bodies and answer with `303 See Other`
//! redirects the way the browser flow expects. The delivery callbacks
//! under `/api/v1` answer with the updated experiment.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use experimenter_core::repository::Store;
use experimenter_service::{BugTracker, ExperimentService};
use http::HeaderName;

pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::build_router;

/// Shared handler state.
pub struct AppState<S: Store, B: BugTracker> {
    pub service: Arc<ExperimentService<S, B>>,
    /// Header carrying the authenticated user's email.
    pub email_header: HeaderName,
}

impl<S: Store, B: BugTracker> AppState<S, B> {
    pub fn new(service: ExperimentService<S, B>, email_header: HeaderName) -> Self {
        Self {
            service: Arc::new(service),
            email_header,
        }
    }
}

impl<S: Store, B: BugTracker> Clone for AppState<S, B> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            email_header: self.email_header.clone(),
        }
    }
}
