//! # taskdeck
//!
//! Server-rendered task manager with a pluggable document store.
//!
//! This library provides:
//! - HTTP handlers for the tasks resource (list, create, edit, delete)
//! - A `TaskStore` trait with in-memory and SQLite backends
//! - Session-scoped flash messages and a single-tenant login gate
//!
//! ## Request Flow
//! 1. Session layer attaches the cookie-backed session
//! 2. `require_login` gates the mutating routes
//! 3. The handler performs one store operation and either renders a view or
//!    sets a flash message and redirects
//!
//! ## Modules
//! - `config`: environment-driven configuration
//! - `store`: task document model and storage backends
//! - `web`: router, handlers, auth, flash, view rendering

pub mod config;
pub mod store;
pub mod web;

pub use config::Config;
pub use store::{Task, TaskDraft, TaskStore};
