//! Handlers for the tasks resource (list, create, edit, delete).
//!
//! Every write goes through [`TaskDraft::from_form`], which is where the
//! checkbox value `"on"` becomes a real boolean. Store failures never reach
//! the client as errors: they are logged, turned into an error flash, and
//! the request ends in a redirect (the list page renders a dedicated error
//! view instead, since there is nowhere sensible to redirect to).

use axum::{
    extract::{Form, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_sessions::Session;
use uuid::Uuid;

use super::flash;
use super::routes::{render_page, AppState};
use crate::store::TaskDraft;

/// `GET /tasks` - list all tasks, most recent first.
pub async fn list_tasks(State(state): State<Arc<AppState>>, session: Session) -> Response {
    let messages = flash::take(&session).await;
    match state.tasks.list().await {
        Ok(tasks) => render_page(
            &state,
            "tasks/list",
            &json!({
                "title": "My Tasks",
                "flash": messages,
                "tasks": tasks,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to list tasks: {}", e);
            render_page(
                &state,
                "error",
                &json!({
                    "title": "Error",
                    "flash": messages,
                    "message": "Failed to load tasks",
                }),
            )
        }
    }
}

/// `GET /tasks/create` - show the create form.
pub async fn create_form(State(state): State<Arc<AppState>>, session: Session) -> Response {
    let messages = flash::take(&session).await;
    render_page(
        &state,
        "tasks/form",
        &json!({
            "title": "Create Task",
            "flash": messages,
            "form_action": "/tasks/create",
            "submit_label": "Create",
            "task": {"fields": {}, "completed": false},
        }),
    )
}

/// `POST /tasks/create` - persist a new task from the submitted form.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(form): Form<BTreeMap<String, String>>,
) -> Response {
    let draft = TaskDraft::from_form(form);
    match state.tasks.create(draft).await {
        Ok(task) => {
            tracing::debug!("Created task {}", task.id);
            flash::set_success(&session, "Task created successfully!").await;
            Redirect::to("/tasks").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to create task: {}", e);
            flash::set_error(&session, "Failed to create task").await;
            Redirect::to("/tasks/create").into_response()
        }
    }
}

/// `GET /tasks/edit/:id` - show the edit form, pre-populated.
pub async fn edit_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Response {
    // A non-UUID segment can never match a store-assigned id.
    let Ok(id) = Uuid::parse_str(&id) else {
        flash::set_error(&session, "Task not found").await;
        return Redirect::to("/tasks").into_response();
    };

    match state.tasks.get(id).await {
        Ok(Some(task)) => {
            let messages = flash::take(&session).await;
            render_page(
                &state,
                "tasks/form",
                &json!({
                    "title": "Edit Task",
                    "flash": messages,
                    "form_action": format!("/tasks/edit/{}", task.id),
                    "submit_label": "Update",
                    "task": task,
                }),
            )
        }
        Ok(None) => {
            flash::set_error(&session, "Task not found").await;
            Redirect::to("/tasks").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to load task {}: {}", id, e);
            flash::set_error(&session, "Error loading task").await;
            Redirect::to("/tasks").into_response()
        }
    }
}

/// `POST /tasks/edit/:id` - full replace of the task's submitted fields.
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<BTreeMap<String, String>>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        flash::set_error(&session, "Task not found").await;
        return Redirect::to("/tasks").into_response();
    };

    let draft = TaskDraft::from_form(form);
    match state.tasks.update(id, draft).await {
        Ok(true) => {
            flash::set_success(&session, "Task updated successfully").await;
            Redirect::to("/tasks").into_response()
        }
        Ok(false) => {
            flash::set_error(&session, "Task not found").await;
            Redirect::to("/tasks").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to update task {}: {}", id, e);
            flash::set_error(&session, "Failed to update task").await;
            Redirect::to("/tasks").into_response()
        }
    }
}

/// `POST /tasks/delete/:id` - delete a task.
///
/// Deleting an id that no longer exists (or never did) still reports
/// success; delete is idempotent from the user's point of view.
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&id) else {
        flash::set_success(&session, "Task deleted").await;
        return Redirect::to("/tasks").into_response();
    };

    match state.tasks.delete(id).await {
        Ok(()) => {
            flash::set_success(&session, "Task deleted").await;
            Redirect::to("/tasks").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to delete task {}: {}", id, e);
            flash::set_error(&session, "Failed to delete task").await;
            Redirect::to("/tasks").into_response()
        }
    }
}
