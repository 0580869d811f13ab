//! masterygate-core — evidenced-mastery scoring and progression gating.
//!
//! This crate holds the data model, the reasoning analyzer, per-concept
//! aggregation, mastery scoring, spaced-repetition scheduling and the
//! progression gate, plus the engine that ties them to a persistence backend.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod mastery;
pub mod model;
pub mod progress;
pub mod reasoning;
pub mod replay;
pub mod report;
pub mod scheduler;
pub mod statistics;
pub mod store;
