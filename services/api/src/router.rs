//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ApplyRescheduleRequest, ApplyRescheduleResponse, CurrentPlanResponse, ErrorResponse,
        GamificationResponse, GeneratePlanRequest, GeneratePlanResponse, HealthResponse,
        HolidayStatusResponse, StudySessionRequest, StudySessionResponse,
        SuggestRescheduleRequest, SuggestRescheduleResponse, TopicsResponse,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::get_holiday_status,
        handlers::list_topics,
        handlers::generate_plan,
        handlers::get_current_plan,
        handlers::suggest_reschedule,
        handlers::apply_reschedule,
        handlers::log_study_session,
        handlers::get_gamification,
    ),
    components(
        schemas(
            HealthResponse, HolidayStatusResponse, TopicsResponse, GeneratePlanRequest,
            GeneratePlanResponse, CurrentPlanResponse, SuggestRescheduleRequest,
            SuggestRescheduleResponse, ApplyRescheduleRequest, ApplyRescheduleResponse,
            StudySessionRequest, StudySessionResponse, GamificationResponse, ErrorResponse
        )
    ),
    tags(
        (name = "Study Planning API", description = "Study plan generation, rescheduling and progress tracking")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/health", get(handlers::health))
        .route("/holiday-status", get(handlers::get_holiday_status))
        .route("/curriculum/topics", get(handlers::list_topics))
        .route("/plans/generate", post(handlers::generate_plan))
        .route("/plans/current", get(handlers::get_current_plan))
        .route(
            "/plans/reschedule/suggest",
            post(handlers::suggest_reschedule),
        )
        .route("/plans/reschedule/apply", post(handlers::apply_reschedule))
        .route("/study-sessions", post(handlers::log_study_session))
        .route("/gamification", get(handlers::get_gamification))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
}
