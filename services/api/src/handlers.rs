//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for study planning.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{Local, NaiveDate, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

use studyplan_core::{
    calendar::{PlanType, holiday_status, resolve_plan_type},
    reschedule::{RescheduleEdit, TaskRef},
};

use crate::{
    auth::CallerId,
    models::{
        ApplyRescheduleRequest, ApplyRescheduleResponse, CurrentPlanResponse, ErrorResponse,
        GamificationResponse, GeneratePlanRequest, GeneratePlanResponse, HealthResponse,
        HolidayStatusResponse, ProfileQuery, StudySessionRequest, StudySessionResponse,
        SuggestRescheduleRequest, SuggestRescheduleResponse, TopicsQuery, TopicsResponse,
    },
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated(String),
    BadRequest(String),
    NotFound(String),
    /// The completion service call failed.
    UpstreamFailure(anyhow::Error),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated(message) => {
                (StatusCode::UNAUTHORIZED, Json(ErrorResponse { message })).into_response()
            }
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::UpstreamFailure(err) => {
                warn!("Completion service failure: {:?}", err);
                let message = "The planning assistant is unavailable, please try again.".to_string();
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{field} must be a YYYY-MM-DD date")))
}

fn require(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn parse_plan_type(raw: &str) -> Result<PlanType, ApiError> {
    serde_json::from_value(Value::String(raw.trim().to_lowercase()))
        .map_err(|_| ApiError::BadRequest(format!("Unknown plan type '{raw}'")))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Whether today is a school holiday and which plan type that implies.
#[utoipa::path(
    get,
    path = "/api/v1/holiday-status",
    responses(
        (status = 200, description = "Holiday status for today", body = HolidayStatusResponse)
    )
)]
pub async fn get_holiday_status() -> Json<HolidayStatusResponse> {
    let date = today();
    let status = holiday_status(date);
    let suggested = resolve_plan_type(None, &status);
    Json(HolidayStatusResponse::new(date, status, suggested.as_str()))
}

/// List curriculum topics for a grade.
#[utoipa::path(
    get,
    path = "/api/v1/curriculum/topics",
    params(
        TopicsQuery,
        ("x-user-id" = String, Header, description = "The ID of the user")
    ),
    responses(
        (status = 200, description = "Topics sorted by teaching week", body = TopicsResponse),
        (status = 400, description = "Invalid grade", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse)
    )
)]
pub async fn list_topics(
    State(state): State<Arc<AppState>>,
    _caller: CallerId,
    Query(query): Query<TopicsQuery>,
) -> Result<Json<TopicsResponse>, ApiError> {
    let topics = state.planning.topics(&query.grade, &query.subject_list())?;
    Ok(Json(TopicsResponse {
        grade: query.grade,
        topics,
    }))
}

/// Generate a new four-week study plan, replacing the current one.
#[utoipa::path(
    post,
    path = "/api/v1/plans/generate",
    request_body = GeneratePlanRequest,
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    ),
    responses(
        (status = 201, description = "Plan generated and stored", body = GeneratePlanResponse),
        (status = 400, description = "Incomplete profile or bad input", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 404, description = "Profile or curriculum not found", body = ErrorResponse),
        (status = 502, description = "Completion service failed", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn generate_plan(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Json(payload): Json<GeneratePlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let requested = payload
        .plan_type
        .as_deref()
        .map(parse_plan_type)
        .transpose()?;

    let generated = state
        .planning
        .generate_plan(
            &user_id,
            payload.profile_id.as_deref(),
            requested,
            today(),
            Utc::now(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(GeneratePlanResponse::from(generated)),
    ))
}

/// Get the stored study plan.
#[utoipa::path(
    get,
    path = "/api/v1/plans/current",
    params(
        ProfileQuery,
        ("x-user-id" = String, Header, description = "The ID of the user")
    ),
    responses(
        (status = 200, description = "The stored plan document", body = CurrentPlanResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 404, description = "No plan yet", body = ErrorResponse)
    )
)]
pub async fn get_current_plan(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<CurrentPlanResponse>, ApiError> {
    let plan = state
        .planning
        .current_plan(&user_id, query.profile_id.as_deref())
        .await?;
    Ok(Json(CurrentPlanResponse { plan }))
}

/// Suggest alternative dates for a task.
#[utoipa::path(
    post,
    path = "/api/v1/plans/reschedule/suggest",
    request_body = SuggestRescheduleRequest,
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    ),
    responses(
        (status = 200, description = "Suggestions, possibly the next-day fallback", body = SuggestRescheduleResponse),
        (status = 400, description = "Missing task details", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 502, description = "Completion service failed", body = ErrorResponse)
    )
)]
pub async fn suggest_reschedule(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Json(payload): Json<SuggestRescheduleRequest>,
) -> Result<Json<SuggestRescheduleResponse>, ApiError> {
    let task = TaskRef {
        subject: require("subject", &payload.subject)?,
        topic: require("topic", &payload.topic)?,
        duration_in_minutes: payload.duration_in_minutes,
    };
    let current_date = parse_date("currentDate", &payload.current_date)?;

    let (advice, fallback) = state
        .planning
        .suggest_reschedule(
            &user_id,
            payload.profile_id.as_deref(),
            &task,
            current_date,
            payload.reason.as_deref(),
        )
        .await?
        .into_parts();

    Ok(Json(SuggestRescheduleResponse {
        advice,
        fallback_used: fallback.is_some(),
        fallback_reason: fallback.map(|r| r.to_string()),
    }))
}

/// Move a task to another day of the plan.
#[utoipa::path(
    post,
    path = "/api/v1/plans/reschedule/apply",
    request_body = ApplyRescheduleRequest,
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    ),
    responses(
        (status = 200, description = "The moved task", body = ApplyRescheduleResponse),
        (status = 400, description = "Missing task details", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 404, description = "Plan, task or target day not found", body = ErrorResponse)
    )
)]
pub async fn apply_reschedule(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Json(payload): Json<ApplyRescheduleRequest>,
) -> Result<Json<ApplyRescheduleResponse>, ApiError> {
    let edit = RescheduleEdit {
        subject: require("subject", &payload.subject)?,
        topic: require("topic", &payload.topic)?,
        original_date: parse_date("originalDate", &payload.original_date)?,
        new_date: parse_date("newDate", &payload.new_date)?,
        reason: payload.reason,
    };

    let task = state
        .planning
        .apply_reschedule(&user_id, payload.profile_id.as_deref(), &edit, Utc::now())
        .await?;
    Ok(Json(ApplyRescheduleResponse { task }))
}

/// Log a finished study session and award XP.
#[utoipa::path(
    post,
    path = "/api/v1/study-sessions",
    request_body = StudySessionRequest,
    params(
        ("x-user-id" = String, Header, description = "The ID of the user")
    ),
    responses(
        (status = 201, description = "Session logged", body = StudySessionResponse),
        (status = 400, description = "Invalid session", body = ErrorResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse)
    )
)]
pub async fn log_study_session(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Json(payload): Json<StudySessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .planning
        .log_study_session(
            &user_id,
            payload.profile_id.as_deref(),
            &payload.to_input(),
            Utc::now(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(StudySessionResponse::from(outcome)),
    ))
}

/// Get XP and level.
#[utoipa::path(
    get,
    path = "/api/v1/gamification",
    params(
        ProfileQuery,
        ("x-user-id" = String, Header, description = "The ID of the user")
    ),
    responses(
        (status = 200, description = "Gamification stats", body = GamificationResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse)
    )
)]
pub async fn get_gamification(
    State(state): State<Arc<AppState>>,
    CallerId(user_id): CallerId,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<GamificationResponse>, ApiError> {
    let stats = state
        .planning
        .gamification(&user_id, query.profile_id.as_deref())
        .await?;
    Ok(Json(GamificationResponse::from(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (ApiError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                ApiError::UpstreamFailure(anyhow::anyhow!("timeout")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::InternalServerError(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_parse_plan_type() {
        assert_eq!(parse_plan_type("exam_prep").ok(), Some(PlanType::ExamPrep));
        assert_eq!(parse_plan_type(" Holiday ").ok(), Some(PlanType::Holiday));
        assert!(matches!(
            parse_plan_type("weekend"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_input_helpers() {
        assert_eq!(
            parse_date("newDate", "2025-03-06").ok(),
            NaiveDate::from_ymd_opt(2025, 3, 6)
        );
        assert!(parse_date("newDate", "06.03.2025").is_err());
        assert_eq!(require("subject", " Fizik ").ok().as_deref(), Some("Fizik"));
        assert!(require("subject", "   ").is_err());
    }
}
