//! API Models
//!
//! Request and response bodies for the REST API, with `utoipa` schemas for the
//! OpenAPI document. Core types that travel through unchanged are documented as
//! plain objects.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use studyplan_core::{
    calendar::HolidayStatus,
    curriculum::TopicListing,
    gamification::{GamificationStats, SessionOutcome, StudySessionInput, XP_PER_LEVEL},
    plan::DailyTask,
    reschedule::RescheduleAdvice,
};

use crate::planning::{GeneratedPlan, StoredPlan};

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}

#[derive(Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProfileQuery {
    /// Student profile, for family accounts.
    pub profile_id: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TopicsQuery {
    /// Grade number, `"10. Sınıf"` or `"Mezun"`.
    #[param(example = "10")]
    pub grade: String,
    /// Comma-separated subject names; matched case-insensitively by containment.
    #[param(example = "Matematik,Fizik")]
    pub subjects: Option<String>,
}

impl TopicsQuery {
    pub fn subject_list(&self) -> Vec<String> {
        self.subjects
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicsResponse {
    pub grade: String,
    #[schema(value_type = Vec<Object>)]
    pub topics: Vec<TopicListing>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HolidayStatusResponse {
    pub date: NaiveDate,
    pub is_holiday: bool,
    #[schema(example = "summer_break")]
    pub kind: Option<String>,
    pub reason: Option<String>,
    /// The plan type a generation without an explicit type would use today.
    #[schema(example = "holiday")]
    pub suggested_plan_type: String,
}

impl HolidayStatusResponse {
    pub fn new(date: NaiveDate, status: HolidayStatus, suggested_plan_type: &str) -> Self {
        Self {
            date,
            is_holiday: status.is_holiday,
            kind: status.kind.and_then(|k| {
                serde_json::to_value(k)
                    .ok()
                    .and_then(|v| v.as_str().map(String::from))
            }),
            reason: status.reason,
            suggested_plan_type: suggested_plan_type.to_string(),
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePlanRequest {
    pub profile_id: Option<String>,
    /// `regular`, `holiday`, `holiday_balanced`, `holiday_next_grade_prep`,
    /// `holiday_review_past` or `exam_prep`.
    #[schema(example = "regular")]
    pub plan_type: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePlanResponse {
    #[schema(value_type = Object)]
    pub plan: StoredPlan,
    #[schema(example = "10")]
    pub effective_grade: String,
    pub topics_selected: usize,
    pub topic_selection_fallback: bool,
}

impl From<GeneratedPlan> for GeneratePlanResponse {
    fn from(generated: GeneratedPlan) -> Self {
        Self {
            plan: generated.plan,
            effective_grade: generated.effective_grade.to_string(),
            topics_selected: generated.topics_selected,
            topic_selection_fallback: generated.topic_selection_fallback.is_some(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CurrentPlanResponse {
    #[schema(value_type = Object)]
    pub plan: StoredPlan,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRescheduleRequest {
    pub profile_id: Option<String>,
    #[serde(default)]
    #[schema(example = "Matematik")]
    pub subject: String,
    #[serde(default)]
    #[schema(example = "Türev")]
    pub topic: String,
    pub duration_in_minutes: Option<u32>,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    #[schema(example = "2025-03-04")]
    pub current_date: String,
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRescheduleResponse {
    #[schema(value_type = Object)]
    pub advice: RescheduleAdvice,
    pub fallback_used: bool,
    pub fallback_reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRescheduleRequest {
    pub profile_id: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    #[schema(example = "2025-03-04")]
    pub original_date: String,
    #[serde(default)]
    #[schema(example = "2025-03-06")]
    pub new_date: String,
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRescheduleResponse {
    #[schema(value_type = Object)]
    pub task: DailyTask,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudySessionRequest {
    pub profile_id: Option<String>,
    #[serde(default)]
    #[schema(example = 45)]
    pub duration_in_minutes: u32,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub is_manual_entry: bool,
    #[serde(default)]
    #[schema(example = "2025-03-04")]
    pub date: String,
}

impl StudySessionRequest {
    pub fn to_input(&self) -> StudySessionInput {
        StudySessionInput {
            duration_in_minutes: self.duration_in_minutes,
            subject: self.subject.clone(),
            topic: self.topic.clone(),
            is_manual_entry: self.is_manual_entry,
            date: self.date.clone(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudySessionResponse {
    pub xp_gained: u64,
    pub total_xp: u64,
    pub previous_level: u32,
    pub level: u32,
    pub leveled_up: bool,
}

impl From<SessionOutcome> for StudySessionResponse {
    fn from(outcome: SessionOutcome) -> Self {
        Self {
            xp_gained: outcome.xp_gained,
            total_xp: outcome.total_xp,
            previous_level: outcome.previous_level,
            level: outcome.level,
            leveled_up: outcome.leveled_up,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GamificationResponse {
    pub xp: u64,
    pub level: u32,
    pub total_study_minutes: u64,
    pub last_study_session: Option<DateTime<Utc>>,
    /// XP still needed to reach the next level.
    pub xp_to_next_level: u64,
}

impl From<GamificationStats> for GamificationResponse {
    fn from(stats: GamificationStats) -> Self {
        Self {
            xp_to_next_level: XP_PER_LEVEL - stats.xp % XP_PER_LEVEL,
            xp: stats.xp,
            level: stats.level,
            total_study_minutes: stats.total_study_minutes,
            last_study_session: stats.last_study_session,
        }
    }
}
