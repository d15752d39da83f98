// Blog feed service - feeds, follow graph and post authoring over a relational store

// Core primitives - pagination and form validation
pub mod core;

// Infrastructure - entity store, fragment cache, media, viewer resolution
pub mod infrastructure;

// Domain records
pub mod models;

// Feed assembly, social graph, authorization and authoring
pub mod services;

// HTTP surface
pub mod blog_interface;
pub mod app_state;
pub mod config;

// Common utilities
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
