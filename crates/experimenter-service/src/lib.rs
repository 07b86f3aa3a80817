//! Experimenter Service: form validation, list filtering, the Bugzilla
//! integration and the workflow that ties them to storage.

pub mod bugzilla;
pub mod config;
pub mod filter;
pub mod forms;
pub mod links;
pub mod service;

pub use bugzilla::{BugTracker, BugzillaClient, BugzillaError};
pub use config::ServiceConfig;
pub use filter::{ExperimentFilter, ExperimentOrdering};
pub use links::ExperimentLinks;
pub use service::{ExperimentDetail, ExperimentPage, ExperimentService, ReviewOutcome};
