//! Semi Atlas - Semiconductor Industry Catalog
//!
//! A Rust library for browsing and maintaining reference data about
//! semiconductor companies, their process-node roadmaps and analyst insights.
//!
//! # Features
//!
//! - Typed catalog entities backed by SQLite or a hosted REST backend
//! - Filter objects rendered into SQL predicates or REST parameters
//! - Client-side sort and pagination
//! - CSV and JSON export, CSV import of companies
//! - Atomic read counting, cascade deletes and `updated_at` maintenance
//! - Dashboard statistics and display formatting

/// Explicit UI state with persisted preferences
pub mod app_state;
/// Configuration management
pub mod config;
/// SQLite storage and connection pooling
pub mod db;
/// Error type shared by every layer
pub mod error;
/// CSV and JSON export and import
pub mod export;
/// Display formatting helpers
pub mod format;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Filter objects and the predicate builder
pub mod query;
/// Repository pattern for data access
pub mod repository;
/// Hosted REST backend and auth pass-through
pub mod rest;
/// Schema definitions for both backends
pub mod schema;
/// Application service
pub mod service;
/// Dashboard statistics
pub mod stats;
/// Sorting and pagination
pub mod table;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use db::Database;
pub use error::{AtlasError, Result};
pub use models::OutputFormat;
pub use repository::{Repository, SqliteRepository};
pub use rest::RestRepository;
pub use service::CatalogService;
