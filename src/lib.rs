//! Metrics-aggregation backend for an Azure DevOps dashboard.
//!
//! Sits between the dashboard frontend and the upstream REST API: fetches
//! projects, repositories, pipelines, releases, deployments and commits,
//! aggregates them into summary statistics over time windows, and caches
//! results in two tiers to keep repeated upstream calls down.

pub mod cache;
pub mod config;
pub mod devops;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod summary;
