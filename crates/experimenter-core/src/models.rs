//! Domain models for Experimenter.
//!
//! These are the core types shared across all crates.

pub mod catalog;
pub mod change_log;
pub mod comment;
pub mod experiment;
pub mod notification;
pub mod project;
pub mod review;
pub mod timeline;
pub mod user;
pub mod variant;
