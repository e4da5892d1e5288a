//! Plan Synthesizer
//!
//! Talks to the completion service to choose topics and draft the study plan. A
//! failed call is an error for the caller; an unusable answer is not. When the text
//! that comes back cannot be turned into a valid result, a deterministic local result
//! is produced instead and the outcome says so through [`Synthesis::FallbackUsed`].

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::calendar::{HolidayStatus, PlanType, StartingPoint};
use crate::curriculum::Grade;
use crate::fallback::{self, FallbackOptions};
use crate::json::{extract_plan_title, parse_payload};
use crate::llm_client::CompletionClient;
use crate::performance::{PerformanceAnalytics, new_student_rules};
use crate::plan::StudyPlan;
use crate::profile::StudentProfile;
use crate::prompts::{PromptSet, fill};
use crate::topic::{TopicPoolItem, sort_by_priority};

/// Topics listed in the selection prompt at most.
pub const SELECTION_SUMMARY_LIMIT: usize = 300;
/// Below this many matched topics the selection is topped up.
pub const MIN_SELECTED_TOPICS: usize = 10;
/// Size of a topped-up or fallback selection.
pub const TARGET_SELECTED_TOPICS: usize = 15;
const DEFAULT_SESSION_MINUTES: u32 = 25;

/// The outcome of a step that may fall back to local synthesis.
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis<T> {
    /// The completion service produced a usable result.
    Synthesized(T),
    /// The completion answer was unusable; `value` was built locally.
    FallbackUsed { value: T, reason: FallbackReason },
}

impl<T> Synthesis<T> {
    pub fn value(&self) -> &T {
        match self {
            Synthesis::Synthesized(value) | Synthesis::FallbackUsed { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Synthesis::FallbackUsed { .. })
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Synthesis::Synthesized(_) => None,
            Synthesis::FallbackUsed { reason, .. } => Some(reason),
        }
    }

    pub fn into_parts(self) -> (T, Option<FallbackReason>) {
        match self {
            Synthesis::Synthesized(value) => (value, None),
            Synthesis::FallbackUsed { value, reason } => (value, Some(reason)),
        }
    }
}

/// Why a completion answer could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FallbackReason {
    #[error("completion payload could not be parsed: {0}")]
    UnparseablePayload(String),
    #[error("completion payload has an invalid structure: {0}")]
    InvalidStructure(String),
}

/// Everything about the student and the moment that shapes a plan.
#[derive(Debug, Clone, Copy)]
pub struct PlanningContext<'a> {
    pub profile: &'a StudentProfile,
    pub effective_grade: Grade,
    pub plan_type: PlanType,
    pub holiday: &'a HolidayStatus,
    pub performance: Option<&'a PerformanceAnalytics>,
    /// First day of the plan, a Monday.
    pub start: NaiveDate,
}

/// Seed for the fallback builder, stable for a given start date.
pub fn fallback_seed(start: NaiveDate) -> u64 {
    u64::try_from(start.num_days_from_ce()).unwrap_or_default()
}

/// Drives the completion service for topic selection and plan drafting.
pub struct PlanSynthesizer {
    client: Arc<dyn CompletionClient>,
    prompts: Arc<PromptSet>,
}

impl PlanSynthesizer {
    pub fn new(client: Arc<dyn CompletionClient>, prompts: Arc<PromptSet>) -> Self {
        Self { client, prompts }
    }

    /// Asks the completion service which topics to focus on.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The planning context.
    /// * `pool` - The confidence-weighted topic pool.
    ///
    /// # Returns
    ///
    /// The chosen topics, topped up to 15 with the highest-priority remaining topics
    /// when fewer than 10 could be matched, or the 15 highest-priority topics when the
    /// answer is not a JSON array.
    pub async fn select_topics(
        &self,
        ctx: &PlanningContext<'_>,
        pool: &[TopicPoolItem],
    ) -> Result<Synthesis<Vec<TopicPoolItem>>> {
        let summary: Vec<_> = pool
            .iter()
            .take(SELECTION_SUMMARY_LIMIT)
            .map(|t| {
                json!({
                    "subject": t.subject,
                    "unit": t.unit,
                    "topic": t.topic,
                    "importance": t.importance,
                    "confidenceWeight": t.priority_weight(),
                })
            })
            .collect();

        let prompt = fill(
            &self.prompts.topic_selection,
            &[
                ("grade", grade_description(ctx)),
                ("starting_point", starting_point_label(ctx.profile.starting_point).to_string()),
                ("academic_track", ctx.profile.academic_track.clone()),
                ("target_exam", ctx.profile.target_exam.clone()),
                ("target_university", or_unspecified(ctx.profile.target_university.as_deref())),
                ("daily_hours", ctx.profile.daily_hours.to_string()),
                ("study_days", ctx.profile.study_days.join(", ")),
                ("learning_style", or_unspecified(ctx.profile.learning_style.as_deref())),
                ("confidence_levels", to_json(&ctx.profile.confidence_levels)),
                ("last_completed_topics", last_completed(ctx.profile)),
                ("diagnostics", diagnostic_lines(ctx.profile)),
                ("performance_section", performance_section(ctx.performance)),
                ("topic_count", pool.len().to_string()),
                ("topics", to_json(&summary)),
            ],
        );

        let raw = self.client.complete(prompt).await?;

        let names: Vec<String> = match parse_payload(&raw) {
            Ok(names) => names,
            Err(e) => {
                let reason = FallbackReason::UnparseablePayload(e.to_string());
                warn!(%reason, "Topic selection unusable, using highest-priority topics");
                let mut value = pool.to_vec();
                sort_by_priority(&mut value);
                value.truncate(TARGET_SELECTED_TOPICS);
                return Ok(Synthesis::FallbackUsed { value, reason });
            }
        };

        // A name that is some item's full name picks that item only.
        let full_names: HashSet<String> = pool.iter().map(TopicPoolItem::full_name).collect();
        let mut selected: Vec<TopicPoolItem> = pool
            .iter()
            .filter(|item| {
                let full_name = item.full_name();
                names.iter().any(|n| {
                    if full_names.contains(n) {
                        *n == full_name
                    } else {
                        *n == item.topic || n.contains(&item.topic)
                    }
                })
            })
            .cloned()
            .collect();

        let matched = selected.len();
        if matched < MIN_SELECTED_TOPICS {
            let taken: HashSet<String> = selected.iter().map(TopicPoolItem::full_name).collect();
            let mut remaining: Vec<TopicPoolItem> = pool
                .iter()
                .filter(|t| !taken.contains(&t.full_name()))
                .cloned()
                .collect();
            sort_by_priority(&mut remaining);
            remaining.truncate(TARGET_SELECTED_TOPICS.saturating_sub(matched));
            selected.extend(remaining);
        }

        info!(
            requested = names.len(),
            matched,
            selected = selected.len(),
            "Topics selected"
        );
        Ok(Synthesis::Synthesized(selected))
    }

    /// Drafts the study plan, falling back to the local builder on an unusable answer.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The planning context.
    /// * `selected` - Topics the plan should cover.
    /// * `pool` - The full weighted pool, used by the fallback builder.
    pub async fn synthesize_plan(
        &self,
        ctx: &PlanningContext<'_>,
        selected: &[TopicPoolItem],
        pool: &[TopicPoolItem],
    ) -> Result<Synthesis<StudyPlan>> {
        let rules = match ctx.performance.and_then(PerformanceAnalytics::insights) {
            Some(insights) => insights.adaptive_rules(),
            None => new_student_rules(),
        };

        let prompt = fill(
            &self.prompts.study_plan,
            &[
                ("weeks", fallback::WEEKS.to_string()),
                ("grade", grade_description(ctx)),
                ("academic_track", ctx.profile.academic_track.clone()),
                ("target_exam", ctx.profile.target_exam.clone()),
                ("target_university", or_unspecified(ctx.profile.target_university.as_deref())),
                ("daily_hours", ctx.profile.daily_hours.to_string()),
                ("daily_minutes", ctx.profile.daily_minutes().to_string()),
                ("study_days", ctx.profile.study_days.join(", ")),
                ("learning_style", or_unspecified(ctx.profile.learning_style.as_deref())),
                (
                    "session_minutes",
                    ctx.profile
                        .preferred_session_duration
                        .unwrap_or(DEFAULT_SESSION_MINUTES)
                        .to_string(),
                ),
                ("confidence_levels", to_json(&ctx.profile.confidence_levels)),
                ("performance_section", performance_section(ctx.performance)),
                ("adaptive_rules", bullet_list(&rules)),
                ("plan_type_instructions", plan_type_instructions(ctx)),
                ("start_date", ctx.start.to_string()),
                ("topics", to_json(selected)),
            ],
        );

        let raw = self.client.complete(prompt).await?;

        let parsed = parse_payload::<Value>(&raw)
            .map_err(|e| e.to_string())
            .and_then(|draft| StudyPlan::from_draft(draft, ctx.start).map_err(|e| e.to_string()));
        let reason = match parsed {
            Ok(mut plan) => match plan.validate() {
                Ok(()) => {
                    if plan.plan_title.trim().is_empty() {
                        plan.plan_title = fallback::DEFAULT_TITLE.to_string();
                    }
                    info!(weeks = plan.weeks.len(), "Plan synthesized");
                    return Ok(Synthesis::Synthesized(plan));
                }
                Err(e) => FallbackReason::InvalidStructure(e.to_string()),
            },
            Err(e) => FallbackReason::UnparseablePayload(e),
        };

        warn!(%reason, "Plan answer unusable, building fallback plan");
        let value = fallback::build_fallback_plan(
            pool,
            &FallbackOptions {
                daily_hours: ctx.profile.daily_hours,
                start: ctx.start,
                seed: fallback_seed(ctx.start),
                title: extract_plan_title(&raw),
            },
        );
        Ok(Synthesis::FallbackUsed { value, reason })
    }
}

fn grade_description(ctx: &PlanningContext<'_>) -> String {
    let entered = &ctx.profile.grade;
    let effective = ctx.effective_grade.to_string();
    if effective == entered.trim() {
        effective
    } else {
        format!("{effective} (entered grade: {entered})")
    }
}

fn starting_point_label(point: StartingPoint) -> &'static str {
    match point {
        StartingPoint::Behind => "behind, needs to catch up",
        StartingPoint::Current => "on track with the class",
        StartingPoint::Ahead => "wants to get ahead",
    }
}

fn or_unspecified(value: Option<&str>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("unspecified")
        .to_string()
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn last_completed(profile: &StudentProfile) -> String {
    if profile.last_completed_topics.is_empty() {
        "unspecified".to_string()
    } else {
        to_json(&profile.last_completed_topics)
    }
}

fn diagnostic_lines(profile: &StudentProfile) -> String {
    let mut lines = Vec::new();
    if !profile.strength_areas.is_empty() {
        lines.push(format!("- Strengths: {}", profile.strength_areas.join(", ")));
    }
    if !profile.weakness_areas.is_empty() {
        lines.push(format!("- Areas to improve: {}", profile.weakness_areas.join(", ")));
    }
    lines.join("\n")
}

fn performance_section(performance: Option<&PerformanceAnalytics>) -> String {
    match performance.and_then(PerformanceAnalytics::insights) {
        Some(insights) => insights.describe(),
        None => "No study history yet; this is the student's first plan.".to_string(),
    }
}

fn bullet_list(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| format!("- {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn plan_type_instructions(ctx: &PlanningContext<'_>) -> String {
    let hours = ctx.profile.daily_hours;
    let period = ctx.holiday.reason.as_deref().unwrap_or("a school break");
    match ctx.plan_type {
        PlanType::Regular => {
            "PLAN TYPE: regular school term. Follow the school's teaching order and reinforce \
             what is covered in class."
                .to_string()
        }
        PlanType::ExamPrep => {
            "PLAN TYPE: exam preparation. Favour high-importance, exam-relevant topics and add \
             timed practice tests at the end of each week."
                .to_string()
        }
        PlanType::Holiday => format!(
            "PLAN TYPE: holiday. The student is on {period}. Keep a relaxed pace, study in the \
             mornings and leave afternoons free."
        ),
        PlanType::HolidayBalanced => format!(
            "PLAN TYPE: balanced holiday plan during {period}. Study about {} hours a day, cover \
             every subject evenly and add one fun learning activity per day.",
            (hours - 1.0).max(2.0)
        ),
        PlanType::HolidayNextGradePrep => match ctx.effective_grade {
            Grade::Graduate => format!(
                "PLAN TYPE: university preparation for a graduate during {period}. Go deep into \
                 grade 12 material and introduce university-level topics; about {} hours a day.",
                hours.max(3.0)
            ),
            grade => format!(
                "PLAN TYPE: preparation for grade {grade} during {period}. Pick curiosity-raising \
                 introductory topics of the next grade; about {} hours a day.",
                hours.max(2.0)
            ),
        },
        PlanType::HolidayReviewPast => format!(
            "PLAN TYPE: review of past topics during {period}. Focus on the most fundamental \
             topics of low-confidence subjects and close gaps; about {} hours a day.",
            (hours - 1.0).max(2.0)
        ),
    }
}
