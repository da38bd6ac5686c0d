//! Message scheduling endpoint — POST /schedule-message
//!
//! Request:  `{"message": "hi", "dateTime": "2030-01-01T10:00:00", "timeZone": "Europe/Berlin"}`
//! Response: `{"accepted": true, "jobId": "...", "jobGroup": "message-jobs", "message": "..."}`
//!
//! `dateTime` is a naive local date-time; the handler resolves it against the
//! IANA `timeZone` into a single UTC instant before handing it to the
//! scheduler. An optional `misfirePolicy` of `"fire_now"` (default) or
//! `"skip"` controls what happens if the trigger is observed late.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use herald_core::Message;
use herald_scheduler::{MisfirePolicy, SchedulerError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::app::AppState;
use crate::http::check_auth;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMessageRequest {
    /// The message to deliver.
    pub message: String,
    /// Local wall-clock date-time, e.g. `2030-01-01T10:00:00`.
    pub date_time: NaiveDateTime,
    /// IANA zone identifier, e.g. `America/New_York`.
    pub time_zone: String,
    #[serde(default)]
    pub misfire_policy: MisfirePolicy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMessageResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_group: Option<String>,
    pub message: String,
}

impl ScheduleMessageResponse {
    fn accepted(job_id: String, job_group: String) -> Self {
        Self {
            accepted: true,
            job_id: Some(job_id),
            job_group: Some(job_group),
            message: "Message scheduled successfully!".to_string(),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            job_id: None,
            job_group: None,
            message: message.into(),
        }
    }
}

/// POST /schedule-message — schedule a one-shot delayed message.
pub async fn schedule_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ScheduleMessageRequest>,
) -> (StatusCode, Json<ScheduleMessageResponse>) {
    if !check_auth(&state, &headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ScheduleMessageResponse::rejected(
                "Unauthorized. Set 'Authorization: Bearer <your-token>' header.",
            )),
        );
    }

    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ScheduleMessageResponse::rejected("message must not be empty")),
        );
    }

    let tz: Tz = match req.time_zone.parse() {
        Ok(tz) => tz,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ScheduleMessageResponse::rejected(format!(
                    "unknown time zone: {}",
                    req.time_zone
                ))),
            );
        }
    };

    let fire_at = match resolve_instant(req.date_time, tz) {
        Ok(at) => at,
        Err(reason) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ScheduleMessageResponse::rejected(reason)),
            );
        }
    };

    match state
        .scheduler
        .submit(Message::new(req.message), fire_at, req.misfire_policy)
    {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(ScheduleMessageResponse::accepted(job.id, job.group)),
        ),
        Err(SchedulerError::InvalidSchedule { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(ScheduleMessageResponse::rejected(
                "dateTime must be after current time",
            )),
        ),
        Err(SchedulerError::Unavailable(_)) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ScheduleMessageResponse::rejected(
                "Scheduler is shutting down. Please try later!",
            )),
        ),
        Err(e) => {
            warn!(error = %e, "POST /schedule-message failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ScheduleMessageResponse::rejected(
                    "Error scheduling message. Please try later!",
                )),
            )
        }
    }
}

/// Resolve a naive local date-time in `tz` to a single UTC instant.
///
/// Ambiguous local times (DST fall-back) take the earlier offset; local
/// times that do not exist (spring-forward gap) are rejected.
pub(crate) fn resolve_instant(local: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, String> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(at) => Ok(at.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Ok(earlier.with_timezone(&Utc)),
        LocalResult::None => Err(format!("{local} does not exist in time zone {tz}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn request_accepts_camel_case_fields() {
        let req: ScheduleMessageRequest = serde_json::from_str(
            r#"{"message":"hi","dateTime":"2030-01-01T10:00:00","timeZone":"Europe/Berlin"}"#,
        )
        .unwrap();

        assert_eq!(req.message, "hi");
        assert_eq!(req.date_time, naive(2030, 1, 1, 10, 0));
        assert_eq!(req.time_zone, "Europe/Berlin");
        assert_eq!(req.misfire_policy, MisfirePolicy::FireNow);
    }

    #[test]
    fn request_accepts_explicit_misfire_policy() {
        let req: ScheduleMessageRequest = serde_json::from_str(
            r#"{"message":"hi","dateTime":"2030-01-01T10:00:00","timeZone":"UTC","misfirePolicy":"skip"}"#,
        )
        .unwrap();
        assert_eq!(req.misfire_policy, MisfirePolicy::Skip);
    }

    #[test]
    fn accepted_response_carries_job_identity() {
        let json = serde_json::to_string(&ScheduleMessageResponse::accepted(
            "job-1".into(),
            "message-jobs".into(),
        ))
        .unwrap();

        assert!(json.contains(r#""accepted":true"#));
        assert!(json.contains(r#""jobId":"job-1""#));
        assert!(json.contains(r#""jobGroup":"message-jobs""#));
    }

    #[test]
    fn rejected_response_omits_job_fields() {
        let json =
            serde_json::to_string(&ScheduleMessageResponse::rejected("nope")).unwrap();

        assert!(json.contains(r#""accepted":false"#));
        assert!(!json.contains("jobId"));
        assert!(!json.contains("jobGroup"));
    }

    #[test]
    fn resolves_unambiguous_local_time() {
        let at = resolve_instant(naive(2030, 1, 1, 10, 0), chrono_tz::Europe::Berlin).unwrap();
        // Berlin is UTC+1 in January.
        assert_eq!(at, Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn ambiguous_local_time_takes_the_earlier_offset() {
        // DST ends in New York on 2030-11-03; 01:30 occurs twice.
        let at =
            resolve_instant(naive(2030, 11, 3, 1, 30), chrono_tz::America::New_York).unwrap();
        // Earlier occurrence is still EDT (UTC-4).
        assert_eq!(at, Utc.with_ymd_and_hms(2030, 11, 3, 5, 30, 0).unwrap());
    }

    #[test]
    fn nonexistent_local_time_is_rejected() {
        // DST starts in New York on 2030-03-10; 02:30 is skipped.
        let result = resolve_instant(naive(2030, 3, 10, 2, 30), chrono_tz::America::New_York);
        assert!(result.is_err());
    }
}
