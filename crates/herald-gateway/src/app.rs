use axum::{
    routing::{get, post},
    Router,
};
use herald_core::config::HeraldConfig;
use herald_scheduler::SchedulerService;
use std::sync::Arc;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: HeraldConfig,
    pub scheduler: Arc<SchedulerService>,
}

impl AppState {
    pub fn new(config: HeraldConfig, scheduler: Arc<SchedulerService>) -> Self {
        Self { config, scheduler }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/schedule-message",
            post(crate::http::schedule::schedule_message),
        )
        .route(
            "/jobs/{id}",
            get(crate::http::jobs::job_status).delete(crate::http::jobs::cancel_job),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
