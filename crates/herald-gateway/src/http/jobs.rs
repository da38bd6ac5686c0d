//! Job observation and cancellation — GET/DELETE /jobs/{id}

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use herald_scheduler::{Job, SchedulerError};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::http::{check_auth, ApiError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub job_group: String,
    pub state: String,
    pub fire_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fired_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            job_group: job.group,
            state: job.state.to_string(),
            fire_at: job.fire_at,
            submitted_at: job.submitted_at,
            fired_at: job.fired_at,
            finished_at: job.finished_at,
            failure: job.failure,
        }
    }
}

/// GET /jobs/{id} — observe a job's outcome while it is retained.
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, (StatusCode, Json<ApiError>)> {
    if !check_auth(&state, &headers) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new("Unauthorized")),
        ));
    }

    match state.scheduler.status(&id) {
        Some(job) => Ok(Json(job.into())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(format!("Job not found: {id}"))),
        )),
    }
}

/// DELETE /jobs/{id} — cancel a job that has not started firing.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    if !check_auth(&state, &headers) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new("Unauthorized")),
        ));
    }

    match state.scheduler.cancel(&id) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(SchedulerError::JobNotFound { .. }) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(format!("Job not found: {id}"))),
        )),
        Err(SchedulerError::AlreadyHandled { .. }) => Err((
            StatusCode::CONFLICT,
            Json(ApiError::new("Job has already started firing")),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(e.to_string())),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use herald_core::Message;

    #[test]
    fn status_response_omits_absent_fields() {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
        let job = Job::new(Message::new("hi"), at, at);
        let json = serde_json::to_string(&JobStatusResponse::from(job)).unwrap();

        assert!(json.contains(r#""state":"pending""#));
        assert!(json.contains(r#""jobGroup":"message-jobs""#));
        assert!(!json.contains("firedAt"));
        assert!(!json.contains("finishedAt"));
        assert!(!json.contains("failure"));
    }
}
