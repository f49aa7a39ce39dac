//! Liked-track reconciliation library - shared modules for all binaries.

pub mod config;
pub mod error;
pub mod featured;
pub mod ledger;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod providers;
pub mod query;
pub mod safety;
pub mod scoring;
pub mod search;
pub mod selector;
pub mod snapshot;
pub mod translate;
