//! LeadConnect dashboard core
//!
//! Lead storage, filtering, pagination and display projection for the
//! LeadConnect sales dashboard, plus the CSV import pipeline that scores new
//! leads against an ML service with a local rule-based fallback.
//!
//! # Modules
//!
//! - `circuit_breaker`: Circuit breaker guarding the scoring service.
//! - `config`: Configuration management.
//! - `csv_import`: CSV parsing, column mapping and candidate construction.
//! - `dashboard`: Application state and update functions.
//! - `errors`: Error handling types.
//! - `filter`: Lead filter engine.
//! - `handlers`: HTTP request handlers for the local dashboard host.
//! - `import`: Batched scoring orchestrator and text synthesis.
//! - `integrity`: Checksummed envelopes for persisted values.
//! - `models`: Core data models.
//! - `pagination`: Page slicing.
//! - `render`: Display tree projection.
//! - `scoring`: Scoring collaborators and feedback client.
//! - `storage`: Key-value persistence backends.
//! - `store`: The lead store.
//! - `view`: View controller and analytics aggregates.

pub mod circuit_breaker;
pub mod config;
pub mod csv_import;
pub mod dashboard;
pub mod errors;
pub mod filter;
pub mod handlers;
pub mod import;
pub mod integrity;
pub mod models;
pub mod pagination;
pub mod render;
pub mod scoring;
pub mod storage;
pub mod store;
pub mod view;
