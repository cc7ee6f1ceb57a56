//! Router construction and shared application state.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};

use super::auth;
use super::render::Renderer;
use super::tasks;
use crate::config::Config;
use crate::store::{self, TaskStore};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Task persistence backend
    pub tasks: Arc<dyn TaskStore>,
    /// View renderer
    pub renderer: Renderer,
}

/// Render a page template to a response.
///
/// A template failure is not the controller's concern beyond catching it:
/// log and answer with a plain 500.
pub(crate) fn render_page<T: Serialize>(state: &AppState, name: &str, context: &T) -> Response {
    match state.renderer.render(name, context) {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            tracing::error!("Template {} failed to render: {}", name, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn root() -> Redirect {
    Redirect::to("/tasks")
}

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/tasks", get(tasks::list_tasks))
        .route("/auth/login", get(auth::login_form).post(auth::login))
        .route("/auth/logout", post(auth::logout));

    let protected_routes = Router::new()
        .route("/tasks/create", get(tasks::create_form).post(tasks::create_task))
        .route("/tasks/edit/:id", get(tasks::edit_form).post(tasks::update_task))
        .route("/tasks/delete/:id", post(tasks::delete_task))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_login,
        ));

    // Sessions carry only the flash queue and the login token, so the
    // in-memory session store is enough; losing sessions on restart logs
    // users out and nothing more.
    let session_layer = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let tasks = store::create_task_store(config.store_kind, config.data_dir.clone()).await?;
    tracing::info!(
        "Task store ready (backend: {:?}, persistent: {})",
        config.store_kind,
        tasks.is_persistent()
    );

    let renderer = Renderer::new()?;

    let state = Arc::new(AppState {
        config: config.clone(),
        tasks,
        renderer,
    });

    let app = app(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryTaskStore, StoreError, Task, TaskDraft};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::util::ServiceExt;
    use uuid::Uuid;

    const PASSWORD: &str = "hunter2";

    /// Store double that fails every operation and counts how often it was
    /// reached at all.
    struct FailingStore {
        calls: AtomicUsize,
    }

    impl FailingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn fail<T>(&self) -> Result<T, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::new("simulated backend outage"))
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskStore for FailingStore {
        fn is_persistent(&self) -> bool {
            false
        }
        async fn list(&self) -> Result<Vec<Task>, StoreError> {
            self.fail()
        }
        async fn get(&self, _id: Uuid) -> Result<Option<Task>, StoreError> {
            self.fail()
        }
        async fn create(&self, _draft: TaskDraft) -> Result<Task, StoreError> {
            self.fail()
        }
        async fn update(&self, _id: Uuid, _draft: TaskDraft) -> Result<bool, StoreError> {
            self.fail()
        }
        async fn delete(&self, _id: Uuid) -> Result<(), StoreError> {
            self.fail()
        }
    }

    fn test_app(store: Arc<dyn TaskStore>) -> Router {
        let state = Arc::new(AppState {
            config: Config::for_testing(PASSWORD, "test-secret"),
            tasks: store,
            renderer: Renderer::new().expect("renderer"),
        });
        app(state)
    }

    fn get_request(path: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        builder.body(Body::empty()).expect("request")
    }

    fn post_form(path: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(c) = cookie {
            builder = builder.header(header::COOKIE, c);
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    fn session_cookie(response: &axum::response::Response) -> Option<String> {
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).to_string())
    }

    fn location(response: &axum::response::Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("utf-8 body")
    }

    /// Log in and return the session cookie to attach to later requests.
    async fn login(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(post_form(
                "/auth/login",
                &format!("password={}", PASSWORD),
                None,
            ))
            .await
            .expect("login request");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/tasks");
        session_cookie(&response).expect("login must set a session cookie")
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = test_app(Arc::new(MemoryTaskStore::new()));
        let response = app.oneshot(get_request("/health", None)).await.expect("request");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn root_redirects_to_the_list() {
        let app = test_app(Arc::new(MemoryTaskStore::new()));
        let response = app.oneshot(get_request("/", None)).await.expect("request");
        assert_eq!(location(&response), "/tasks");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let app = test_app(Arc::new(MemoryTaskStore::new()));
        let response = app
            .clone()
            .oneshot(post_form("/auth/login", "password=wrong", None))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login");

        // The rejection leaves an error flash for the login page.
        let cookie = session_cookie(&response).expect("cookie");
        let page = app
            .oneshot(get_request("/auth/login", Some(&cookie)))
            .await
            .expect("request");
        let body = body_string(page).await;
        assert!(body.contains("Invalid password"));
    }

    #[tokio::test]
    async fn unauthenticated_guarded_request_never_reaches_the_store() {
        let store = FailingStore::new();
        let app = test_app(store.clone());

        for request in [
            get_request("/tasks/create", None),
            post_form("/tasks/create", "title=x", None),
            get_request(&format!("/tasks/edit/{}", Uuid::new_v4()), None),
            post_form(&format!("/tasks/edit/{}", Uuid::new_v4()), "title=x", None),
            post_form(&format!("/tasks/delete/{}", Uuid::new_v4()), "", None),
        ] {
            let response = app.clone().oneshot(request).await.expect("request");
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), "/auth/login");
        }

        assert_eq!(store.call_count(), 0, "guard must short-circuit before the store");
    }

    #[tokio::test]
    async fn guard_redirect_carries_a_flash_message() {
        let app = test_app(Arc::new(MemoryTaskStore::new()));
        let response = app
            .clone()
            .oneshot(get_request("/tasks/create", None))
            .await
            .expect("request");
        let cookie = session_cookie(&response).expect("cookie");

        let page = app
            .oneshot(get_request("/auth/login", Some(&cookie)))
            .await
            .expect("request");
        let body = body_string(page).await;
        assert!(body.contains("Please log in to manage tasks"));
    }

    #[tokio::test]
    async fn create_then_list_shows_the_task_once() {
        let app = test_app(Arc::new(MemoryTaskStore::new()));
        let cookie = login(&app).await;

        let response = app
            .clone()
            .oneshot(post_form(
                "/tasks/create",
                "title=Water+the+plants&description=balcony&completed=on",
                Some(&cookie),
            ))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/tasks");

        let page = app
            .oneshot(get_request("/tasks", Some(&cookie)))
            .await
            .expect("request");
        assert_eq!(page.status(), StatusCode::OK);
        let body = body_string(page).await;
        assert_eq!(body.matches("Water the plants").count(), 1);
        assert!(body.contains("Task created successfully!"));
    }

    #[tokio::test]
    async fn delete_then_list_no_longer_shows_the_task() {
        let store = Arc::new(MemoryTaskStore::new());
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("title".to_string(), "Old chore".to_string());
        let task = store
            .create(TaskDraft {
                fields,
                completed: false,
            })
            .await
            .expect("seed task");

        let app = test_app(store);
        let cookie = login(&app).await;

        let response = app
            .clone()
            .oneshot(post_form(
                &format!("/tasks/delete/{}", task.id),
                "",
                Some(&cookie),
            ))
            .await
            .expect("request");
        assert_eq!(location(&response), "/tasks");

        let body = body_string(
            app.oneshot(get_request("/tasks", Some(&cookie)))
                .await
                .expect("request"),
        )
        .await;
        assert!(!body.contains("Old chore"));
        assert!(body.contains("Task deleted"));
    }

    #[tokio::test]
    async fn edit_form_for_unknown_id_redirects_with_flash() {
        let app = test_app(Arc::new(MemoryTaskStore::new()));
        let cookie = login(&app).await;

        let response = app
            .clone()
            .oneshot(get_request(
                &format!("/tasks/edit/{}", Uuid::new_v4()),
                Some(&cookie),
            ))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/tasks");

        let body = body_string(
            app.oneshot(get_request("/tasks", Some(&cookie)))
                .await
                .expect("request"),
        )
        .await;
        assert!(body.contains("Task not found"));
    }

    #[tokio::test]
    async fn malformed_edit_id_is_treated_as_not_found() {
        let app = test_app(Arc::new(MemoryTaskStore::new()));
        let cookie = login(&app).await;

        let response = app
            .oneshot(get_request("/tasks/edit/not-a-uuid", Some(&cookie)))
            .await
            .expect("request");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/tasks");
    }

    #[tokio::test]
    async fn update_of_unknown_id_surfaces_not_found() {
        let app = test_app(Arc::new(MemoryTaskStore::new()));
        let cookie = login(&app).await;

        let response = app
            .clone()
            .oneshot(post_form(
                &format!("/tasks/edit/{}", Uuid::new_v4()),
                "title=ghost",
                Some(&cookie),
            ))
            .await
            .expect("request");
        assert_eq!(location(&response), "/tasks");

        let body = body_string(
            app.oneshot(get_request("/tasks", Some(&cookie)))
                .await
                .expect("request"),
        )
        .await;
        assert!(body.contains("Task not found"));
    }

    #[tokio::test]
    async fn edit_form_prepopulates_the_stored_task() {
        let store = Arc::new(MemoryTaskStore::new());
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("title".to_string(), "Fix the gate".to_string());
        let task = store
            .create(TaskDraft {
                fields,
                completed: true,
            })
            .await
            .expect("seed task");

        let app = test_app(store);
        let cookie = login(&app).await;

        let page = app
            .oneshot(get_request(
                &format!("/tasks/edit/{}", task.id),
                Some(&cookie),
            ))
            .await
            .expect("request");
        assert_eq!(page.status(), StatusCode::OK);
        let body = body_string(page).await;
        assert!(body.contains("value=\"Fix the gate\""));
        assert!(body.contains("checked"));
        assert!(body.contains(&format!("/tasks/edit/{}", task.id)));
        assert!(body.contains("Update</button>"));
    }

    #[tokio::test]
    async fn list_failure_renders_the_error_view() {
        let app = test_app(FailingStore::new());
        let response = app.oneshot(get_request("/tasks", None)).await.expect("request");
        // Not a server error and not a redirect: a rendered page with a
        // fixed message.
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("Failed to load tasks"));
    }

    #[tokio::test]
    async fn write_failures_flash_and_redirect() {
        let app = test_app(FailingStore::new());
        let cookie = login(&app).await;
        let id = Uuid::new_v4();

        let cases: Vec<(Request<Body>, &str, &str)> = vec![
            (
                post_form("/tasks/create", "title=x", Some(&cookie)),
                "/tasks/create",
                "Failed to create task",
            ),
            (
                get_request(&format!("/tasks/edit/{}", id), Some(&cookie)),
                "/tasks",
                "Error loading task",
            ),
            (
                post_form(&format!("/tasks/edit/{}", id), "title=x", Some(&cookie)),
                "/tasks",
                "Failed to update task",
            ),
            (
                post_form(&format!("/tasks/delete/{}", id), "", Some(&cookie)),
                "/tasks",
                "Failed to delete task",
            ),
        ];

        for (request, target, message) in cases {
            let response = app.clone().oneshot(request).await.expect("request");
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), target);

            // The flash is visible on the next rendered page (the login page
            // is the one view this store double cannot break).
            let page = app
                .clone()
                .oneshot(get_request("/auth/login", Some(&cookie)))
                .await
                .expect("request");
            let body = body_string(page).await;
            assert!(body.contains(message), "missing flash {:?}", message);
        }
    }
}
