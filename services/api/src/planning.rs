//! Planning Service
//!
//! Runs every planning operation against a `DocumentStore` and the completion
//! service: plan generation, reschedule advice and edits, study-session logging.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use studyplan_core::{
    calendar::{PlanType, effective_grade, holiday_status, resolve_plan_type, week_start},
    curriculum::{Curriculum, Grade, TopicListing},
    gamification::{
        GamificationStats, SessionKind, SessionOutcome, StudySessionInput, StudySessionLog,
    },
    llm_client::CompletionClient,
    performance::PerformanceAnalytics,
    plan::{DailyTask, RescheduleRecord, StudyPlan},
    profile::StudentProfile,
    prompts::PromptSet,
    reschedule::{
        RescheduleAdvice, RescheduleAdvisor, RescheduleEdit, TaskRef, apply_reschedule,
        context_days,
    },
    synthesis::{FallbackReason, PlanSynthesizer, PlanningContext, Synthesis},
    topic::{PoolOptions, apply_confidence, build_topic_pool},
    tracks::TrackCatalog,
};

use crate::{
    db::{Account, DocumentPaths, DocumentStore, DocumentWrite},
    handlers::ApiError,
};

/// Plan document fields written by the service rather than the plan generator.
const PLAN_METADATA_FIELDS: [&str; 6] = [
    "planType",
    "generatedWith",
    "fallbackReason",
    "createdAt",
    "updatedAt",
    "lastReschedule",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratedWith {
    Ai,
    Fallback,
}

/// The persisted `plan/user_plan` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPlan {
    #[serde(flatten)]
    pub plan: StudyPlan,
    #[serde(default)]
    pub plan_type: PlanType,
    pub generated_with: GeneratedWith,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reschedule: Option<RescheduleRecord>,
}

impl StoredPlan {
    pub fn new(
        mut plan: StudyPlan,
        plan_type: PlanType,
        fallback: Option<&FallbackReason>,
        now: DateTime<Utc>,
    ) -> Self {
        for field in PLAN_METADATA_FIELDS {
            plan.extra.remove(field);
        }
        Self {
            plan,
            plan_type,
            generated_with: if fallback.is_some() {
                GeneratedWith::Fallback
            } else {
                GeneratedWith::Ai
            },
            fallback_reason: fallback.map(ToString::to_string),
            created_at: now,
            updated_at: now,
            last_reschedule: None,
        }
    }
}

/// What a plan generation produced.
#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    pub plan: StoredPlan,
    pub effective_grade: Grade,
    pub topics_selected: usize,
    pub topic_selection_fallback: Option<FallbackReason>,
}

pub struct PlanningService {
    store: Arc<dyn DocumentStore>,
    curriculum: Arc<Curriculum>,
    tracks: TrackCatalog,
    synthesizer: PlanSynthesizer,
    advisor: RescheduleAdvisor,
}

impl PlanningService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        curriculum: Arc<Curriculum>,
        tracks: TrackCatalog,
        client: Arc<dyn CompletionClient>,
        prompts: Arc<PromptSet>,
    ) -> Self {
        Self {
            store,
            curriculum,
            tracks,
            synthesizer: PlanSynthesizer::new(client.clone(), prompts.clone()),
            advisor: RescheduleAdvisor::new(client, prompts),
        }
    }

    /// Finds the document subtree of the student the caller is acting for. A missing
    /// account document is treated as a single account.
    async fn paths(
        &self,
        user_id: &str,
        profile_id: Option<&str>,
    ) -> Result<DocumentPaths, ApiError> {
        let account: Account = self
            .store
            .get_as(&DocumentPaths::account_path(user_id))
            .await?
            .unwrap_or_default();
        DocumentPaths::resolve(user_id, &account, profile_id)
            .map_err(|e| ApiError::BadRequest(e.to_string()))
    }

    async fn profile(&self, paths: &DocumentPaths) -> Result<StudentProfile, ApiError> {
        self.store
            .get_as(&paths.profile())
            .await?
            .ok_or_else(|| ApiError::NotFound("Student profile not found".to_string()))
    }

    /// Lists curriculum topics for a grade and subject filter.
    pub fn topics(&self, grade: &str, subjects: &[String]) -> Result<Vec<TopicListing>, ApiError> {
        let grade = grade
            .parse::<Grade>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok(self.curriculum.topics_for(grade, subjects))
    }

    /// Builds a fresh four-week plan for the student and stores it, replacing any
    /// previous plan.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The caller.
    /// * `profile_id` - The student profile, for family accounts.
    /// * `requested` - The plan type asked for, if any.
    /// * `today` - The generation date. The plan starts on the Monday of its week.
    /// * `now` - Timestamp for the stored document.
    pub async fn generate_plan(
        &self,
        user_id: &str,
        profile_id: Option<&str>,
        requested: Option<PlanType>,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<GeneratedPlan, ApiError> {
        let paths = self.paths(user_id, profile_id).await?;
        let profile = self.profile(&paths).await?;
        let grade = profile
            .validate()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let holiday = holiday_status(today);
        let plan_type = resolve_plan_type(requested, &holiday);
        let target_grade = effective_grade(grade, profile.starting_point, plan_type, &holiday);

        let class = self.curriculum.find_class(target_grade).ok_or_else(|| {
            ApiError::NotFound(format!(
                "No curriculum found for grade {}",
                target_grade.curriculum_label()
            ))
        })?;
        let subjects: Vec<String> = self
            .tracks
            .core_subjects(&profile.academic_track)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        let mut pool = build_topic_pool(
            class,
            &PoolOptions {
                subjects: &subjects,
                track: &profile.academic_track,
                target_exam: &profile.target_exam,
            },
            &self.tracks,
        );
        apply_confidence(&mut pool, &profile.confidence_tiers());
        if pool.is_empty() {
            warn!(
                user_id,
                grade = %target_grade,
                track = %profile.academic_track,
                "Topic pool is empty"
            );
        }
        info!(
            user_id,
            grade = %target_grade,
            plan_type = plan_type.as_str(),
            pool = pool.len(),
            "Topic pool built"
        );

        let performance: Option<PerformanceAnalytics> =
            self.store.get_as(&paths.performance()).await?;

        let ctx = PlanningContext {
            profile: &profile,
            effective_grade: target_grade,
            plan_type,
            holiday: &holiday,
            performance: performance.as_ref(),
            start: week_start(today),
        };

        let (selected, topic_selection_fallback) = self
            .synthesizer
            .select_topics(&ctx, &pool)
            .await
            .map_err(ApiError::UpstreamFailure)?
            .into_parts();
        let (plan, plan_fallback) = self
            .synthesizer
            .synthesize_plan(&ctx, &selected, &pool)
            .await
            .map_err(ApiError::UpstreamFailure)?
            .into_parts();

        let stored = StoredPlan::new(plan, plan_type, plan_fallback.as_ref(), now);
        self.store
            .transact(vec![
                DocumentWrite::replace(paths.plan(), serde_json::to_value(&stored)?),
                DocumentWrite::merge(
                    paths.account(),
                    json!({
                        "hasPlan": true,
                        "planType": plan_type,
                        "planCreatedAt": now,
                    }),
                ),
            ])
            .await?;

        info!(
            user_id,
            weeks = stored.plan.weeks.len(),
            generated_with = ?stored.generated_with,
            "Study plan stored"
        );

        Ok(GeneratedPlan {
            plan: stored,
            effective_grade: target_grade,
            topics_selected: selected.len(),
            topic_selection_fallback,
        })
    }

    /// The stored plan.
    pub async fn current_plan(
        &self,
        user_id: &str,
        profile_id: Option<&str>,
    ) -> Result<StoredPlan, ApiError> {
        let paths = self.paths(user_id, profile_id).await?;
        self.stored_plan(&paths).await
    }

    async fn stored_plan(&self, paths: &DocumentPaths) -> Result<StoredPlan, ApiError> {
        self.store
            .get_as(&paths.plan())
            .await?
            .ok_or_else(|| ApiError::NotFound("No study plan found".to_string()))
    }

    /// Suggests new dates for a task, using the stored plan around `current_date` as context.
    pub async fn suggest_reschedule(
        &self,
        user_id: &str,
        profile_id: Option<&str>,
        task: &TaskRef,
        current_date: NaiveDate,
        reason: Option<&str>,
    ) -> Result<Synthesis<RescheduleAdvice>, ApiError> {
        let paths = self.paths(user_id, profile_id).await?;
        let profile = self.profile(&paths).await?;
        let stored: Option<StoredPlan> = self.store.get_as(&paths.plan()).await?;
        let context = stored
            .as_ref()
            .map(|s| context_days(&s.plan, current_date))
            .unwrap_or_default();

        self.advisor
            .advise(task, current_date, reason, &profile, &context)
            .await
            .map_err(ApiError::UpstreamFailure)
    }

    /// Moves a task within the stored plan and returns it as stored after the move.
    pub async fn apply_reschedule(
        &self,
        user_id: &str,
        profile_id: Option<&str>,
        edit: &RescheduleEdit,
        now: DateTime<Utc>,
    ) -> Result<DailyTask, ApiError> {
        let paths = self.paths(user_id, profile_id).await?;
        let mut stored = self.stored_plan(&paths).await?;

        let moved = apply_reschedule(&mut stored.plan, edit, now)
            .map_err(|e| ApiError::NotFound(e.to_string()))?;
        stored.updated_at = now;
        stored.last_reschedule = moved.reschedule_history.last().cloned();

        self.store.put(&paths.plan(), &stored).await?;
        info!(
            user_id,
            subject = %edit.subject,
            from = %edit.original_date,
            to = %edit.new_date,
            "Task rescheduled"
        );
        Ok(moved)
    }

    /// Records a study session and updates XP, level and performance analytics together.
    pub async fn log_study_session(
        &self,
        user_id: &str,
        profile_id: Option<&str>,
        input: &StudySessionInput,
        now: DateTime<Utc>,
    ) -> Result<SessionOutcome, ApiError> {
        let session = input
            .validate()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let paths = self.paths(user_id, profile_id).await?;

        let mut stats: GamificationStats = self
            .store
            .get_as(&paths.gamification())
            .await?
            .unwrap_or_default();
        let mut analytics: PerformanceAnalytics = self
            .store
            .get_as(&paths.performance())
            .await?
            .unwrap_or_default();

        let outcome = stats.record(&session, now);
        analytics.record(&session, now);

        let log = StudySessionLog {
            user_id: user_id.to_string(),
            subject: session.subject.clone(),
            topic: session.topic.clone(),
            duration_in_minutes: session.minutes,
            xp_gained: outcome.xp_gained,
            is_manual_entry: session.kind == SessionKind::Manual,
            date: session.date,
            timestamp: now,
        };

        self.store
            .transact(vec![
                DocumentWrite::replace(
                    paths.study_session(&Uuid::new_v4().to_string()),
                    serde_json::to_value(&log)?,
                ),
                DocumentWrite::replace(paths.gamification(), serde_json::to_value(&stats)?),
                DocumentWrite::replace(paths.performance(), serde_json::to_value(&analytics)?),
            ])
            .await?;

        if outcome.leveled_up {
            info!(user_id, level = outcome.level, "Level up");
        }
        info!(
            user_id,
            subject = %session.subject,
            minutes = session.minutes,
            xp = outcome.xp_gained,
            "Study session logged"
        );
        Ok(outcome)
    }

    /// XP and level, defaults when nothing has been logged yet.
    pub async fn gamification(
        &self,
        user_id: &str,
        profile_id: Option<&str>,
    ) -> Result<GamificationStats, ApiError> {
        let paths = self.paths(user_id, profile_id).await?;
        Ok(self
            .store
            .get_as(&paths.gamification())
            .await?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn plan() -> StudyPlan {
        serde_json::from_value(json!({
            "planTitle": "Plan",
            "weeks": [{"weekNumber": 1, "days": [
                {"day": "Pazartesi", "date": "2025-03-03", "dailyTasks": []}
            ]}],
            "planType": "from-the-model",
            "motivation": "keep"
        }))
        .unwrap()
    }

    #[test]
    fn test_stored_plan_strips_reserved_fields() {
        let now = Utc::now();
        let stored = StoredPlan::new(plan(), PlanType::ExamPrep, None, now);

        assert_eq!(stored.generated_with, GeneratedWith::Ai);
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["planType"], json!("exam_prep"));
        assert_eq!(value["generatedWith"], json!("ai"));
        assert_eq!(value["motivation"], json!("keep"));
        assert!(value.get("fallbackReason").is_none());

        let back: StoredPlan = serde_json::from_value(value).unwrap();
        assert_eq!(back, stored);
    }

    #[test]
    fn test_stored_plan_records_fallback() {
        let reason = FallbackReason::InvalidStructure("plan has no weeks".to_string());
        let stored = StoredPlan::new(plan(), PlanType::Regular, Some(&reason), Utc::now());

        assert_eq!(stored.generated_with, GeneratedWith::Fallback);
        assert_eq!(stored.fallback_reason, Some(reason.to_string()));
        assert_eq!(
            stored.plan.day_on(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()).map(|d| d.day.as_str()),
            Some("Pazartesi")
        );
    }
}
