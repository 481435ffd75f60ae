//! JSON HTTP service in front of the catalog, evaluator and dispatcher.

pub mod handlers;
pub mod session;
pub mod wire;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::assignment::Dispatcher;
use crate::config::ServiceConfig;
use crate::error::{LabError, Result};
use crate::lab::{Catalog, Seed};
use wire::{ErrorBody, ErrorDetail};

/// Shared state. Handlers that take both locks take the catalog first.
#[derive(Clone)]
pub struct ApiState {
    pub catalog: Arc<RwLock<Catalog>>,
    pub dispatcher: Arc<RwLock<Dispatcher>>,
}

impl ApiState {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
            dispatcher: Arc::new(RwLock::new(Dispatcher::new())),
        }
    }

    pub fn from_seed(seed: Seed) -> Result<Self> {
        Ok(Self::new(Catalog::from_seed(seed)?))
    }
}

impl LabError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LabError::InvalidInput(_)
            | LabError::MalformedPayload(_)
            | LabError::DeviceCountMismatch { .. } => StatusCode::BAD_REQUEST,
            LabError::MissingSession => StatusCode::UNAUTHORIZED,
            LabError::Forbidden(_) => StatusCode::FORBIDDEN,
            LabError::TaskNotFound(_)
            | LabError::UserNotFound(_)
            | LabError::DeviceNotFound(_)
            | LabError::AssignmentNotFound(_) => StatusCode::NOT_FOUND,
            LabError::TaskNotAssignable { .. }
            | LabError::InvalidTransition { .. }
            | LabError::ReservationConflict { .. }
            | LabError::StaleSnapshot { .. } => StatusCode::CONFLICT,
            LabError::Seed(_)
            | LabError::InvalidSeed(_)
            | LabError::IdsExhausted(_)
            | LabError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LabError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "Request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: ApiState, permissive_cors: bool) -> Router {
    let app = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/v1/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route("/api/v1/tasks/{id}", get(handlers::get_task))
        .route("/api/v1/tasks/{id}/evaluate", post(handlers::evaluate_task))
        .route(
            "/api/v1/tasks/{id}/candidates",
            post(handlers::evaluate_candidates),
        )
        .route("/api/v1/tasks/{id}/assign", post(handlers::assign_task))
        .route("/api/v1/tasks/{id}/assignment", get(handlers::get_assignment))
        .route("/api/v1/tasks/{id}/status", put(handlers::update_task_status))
        .route("/api/v1/my-tasks", get(handlers::my_tasks))
        .route(
            "/api/v1/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/api/v1/devices",
            get(handlers::list_devices).post(handlers::create_device),
        )
        .route(
            "/api/v1/devices/{id}/status",
            put(handlers::update_device_status),
        )
        .route("/api/v1/assignments", get(handlers::list_assignments))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if permissive_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app.layer(cors)
    } else {
        app
    }
}

/// Serve the API until `shutdown` is cancelled.
pub async fn run_server(
    config: &ServiceConfig,
    state: ApiState,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router(state, config.permissive_cors);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "Starting assignment service");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Assignment service stopped");
    Ok(())
}
