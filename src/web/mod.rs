//! HTTP surface of taskdeck.
//!
//! ## Endpoints
//!
//! - `GET /tasks` - list all tasks (public)
//! - `GET /tasks/create` - show the create form
//! - `POST /tasks/create` - create a task
//! - `GET /tasks/edit/:id` - show the edit form
//! - `POST /tasks/edit/:id` - update a task
//! - `POST /tasks/delete/:id` - delete a task
//! - `GET /auth/login` / `POST /auth/login` - login form and submission
//! - `POST /auth/logout` - drop the session
//! - `GET /health` - health check
//!
//! Everything under `/tasks` except the list requires a logged-in session;
//! `auth::require_login` fronts those routes.

pub mod auth;
pub mod flash;
pub mod render;
mod routes;
pub mod tasks;

pub use routes::{app, serve, AppState};
