//! Experimenter Core: domain models, status transitions, derived
//! experiment state and repository traits.
//!
//! Nothing in this crate performs I/O. Storage lives in
//! `experimenter-db`, workflow and validation in `experimenter-service`.

pub mod error;
pub mod models;
pub mod repository;
pub mod slug;
