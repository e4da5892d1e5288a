//! Reschedule Advisor
//!
//! Suggests new dates for a task the student wants to move, and applies a chosen
//! move to a stored plan.

use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::calendar::{day_name, week_start};
use crate::json::parse_payload;
use crate::llm_client::CompletionClient;
use crate::plan::{DailyTask, Day, RescheduleRecord, StudyPlan};
use crate::profile::StudentProfile;
use crate::prompts::{PromptSet, fill};
use crate::synthesis::{FallbackReason, Synthesis};

/// Days of plan context given to the completion service.
pub const CONTEXT_DAYS: usize = 14;
pub const MAX_RECOMMENDATIONS: usize = 3;
const FALLBACK_CONFIDENCE: u32 = 75;

/// The task a student wants to move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub subject: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub date: NaiveDate,
    #[serde(default)]
    pub day_name: String,
    #[serde(default)]
    pub time_slot: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub confidence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAnalysis {
    #[serde(default)]
    pub current_load: String,
    #[serde(default)]
    pub lightest_day: String,
    #[serde(default)]
    pub heaviest_day: String,
    #[serde(default)]
    pub suggested_optimization: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleAdvice {
    pub recommendations: Vec<Recommendation>,
    #[serde(default)]
    pub motivational_message: String,
    #[serde(default)]
    pub study_tips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_analysis: Option<WeeklyAnalysis>,
}

/// The single suggestion used when the completion answer is unusable: the next day.
pub fn fallback_advice(current_date: NaiveDate) -> RescheduleAdvice {
    let date = current_date
        .checked_add_days(Days::new(1))
        .unwrap_or(current_date);
    RescheduleAdvice {
        recommendations: vec![Recommendation {
            date,
            day_name: day_name(date).to_string(),
            time_slot: "Öğleden sonra".to_string(),
            reason: "Bir gün sonraya ertelemek genellikle iyi bir çözümdür.".to_string(),
            confidence: FALLBACK_CONFIDENCE,
            additional_notes: Some("Yarın için zaman ayırmaya çalış.".to_string()),
        }],
        motivational_message: "Planında esneklik göstermen normal. Önemli olan hedefine odaklanman!"
            .to_string(),
        study_tips: vec![
            "Bu görevi yarın ilk iş olarak yapmayı dene".to_string(),
            "Kısa molalar vererek çalışman daha verimli olur".to_string(),
        ],
        weekly_analysis: None,
    }
}

/// Up to [`CONTEXT_DAYS`] plan days starting at the week of `date`, or the first
/// days of the plan when `date` is outside it.
pub fn context_days(plan: &StudyPlan, date: NaiveDate) -> Vec<&Day> {
    let monday = week_start(date);
    let around: Vec<&Day> = plan
        .days()
        .filter(|d| d.date >= monday)
        .take(CONTEXT_DAYS)
        .collect();
    if around.iter().any(|d| d.date == date) {
        around
    } else {
        plan.days().take(CONTEXT_DAYS).collect()
    }
}

pub struct RescheduleAdvisor {
    client: Arc<dyn CompletionClient>,
    prompts: Arc<PromptSet>,
}

impl RescheduleAdvisor {
    pub fn new(client: Arc<dyn CompletionClient>, prompts: Arc<PromptSet>) -> Self {
        Self { client, prompts }
    }

    /// Asks for 2-3 alternative dates for `task`.
    ///
    /// # Arguments
    ///
    /// * `task` - The task to move.
    /// * `current_date` - The day the task is on now.
    /// * `reason` - Why the student wants to move it, if given.
    /// * `profile` - The student's profile.
    /// * `context` - Surrounding plan days, see [`context_days`].
    pub async fn advise(
        &self,
        task: &TaskRef,
        current_date: NaiveDate,
        reason: Option<&str>,
        profile: &StudentProfile,
        context: &[&Day],
    ) -> Result<Synthesis<RescheduleAdvice>> {
        let prompt = fill(
            &self.prompts.reschedule,
            &[
                ("subject", task.subject.clone()),
                ("topic", task.topic.clone()),
                (
                    "duration",
                    task.duration_in_minutes
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                ),
                ("current_date", current_date.to_string()),
                ("reason", reason.unwrap_or("unspecified").to_string()),
                ("grade", profile.grade.clone()),
                ("daily_hours", profile.daily_hours.to_string()),
                ("study_days", profile.study_days.join(", ")),
                ("target_exam", profile.target_exam.clone()),
                (
                    "learning_style",
                    profile
                        .learning_style
                        .clone()
                        .unwrap_or_else(|| "unspecified".to_string()),
                ),
                ("schedule", serde_json::to_string(context).unwrap_or_default()),
            ],
        );

        let raw = self.client.complete(prompt).await?;

        let reason = match parse_payload::<RescheduleAdvice>(&raw) {
            Ok(mut advice) if !advice.recommendations.is_empty() => {
                advice.recommendations.truncate(MAX_RECOMMENDATIONS);
                info!(
                    subject = %task.subject,
                    suggestions = advice.recommendations.len(),
                    top_confidence = advice.recommendations[0].confidence,
                    "Reschedule advice received"
                );
                return Ok(Synthesis::Synthesized(advice));
            }
            Ok(_) => FallbackReason::InvalidStructure("no recommendations".to_string()),
            Err(e) => FallbackReason::UnparseablePayload(e.to_string()),
        };

        warn!(%reason, "Reschedule answer unusable, suggesting the next day");
        Ok(Synthesis::FallbackUsed {
            value: fallback_advice(current_date),
            reason,
        })
    }
}

/// A move the student has chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleEdit {
    pub subject: String,
    pub topic: String,
    pub original_date: NaiveDate,
    pub new_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RescheduleError {
    #[error("No plan day on {0}")]
    SourceDayNotFound(NaiveDate),
    #[error("Task '{subject} - {topic}' not found on {date}")]
    TaskNotFound {
        subject: String,
        topic: String,
        date: NaiveDate,
    },
    #[error("No plan day on target date {0}")]
    TargetDayNotFound(NaiveDate),
}

/// Moves a task between days.
///
/// The task is removed from the day on `original_date` (matched by subject and
/// topic) and appended to the day on `new_date`, marked as rescheduled with one
/// history entry. The plan is left untouched if anything is missing.
pub fn apply_reschedule(
    plan: &mut StudyPlan,
    edit: &RescheduleEdit,
    now: DateTime<Utc>,
) -> Result<DailyTask, RescheduleError> {
    let source = plan
        .day_on(edit.original_date)
        .ok_or(RescheduleError::SourceDayNotFound(edit.original_date))?;
    let index = source
        .daily_tasks
        .iter()
        .position(|t| t.matches(&edit.subject, &edit.topic))
        .ok_or_else(|| RescheduleError::TaskNotFound {
            subject: edit.subject.clone(),
            topic: edit.topic.clone(),
            date: edit.original_date,
        })?;
    if plan.day_on(edit.new_date).is_none() {
        return Err(RescheduleError::TargetDayNotFound(edit.new_date));
    }

    let mut task = match plan.day_on_mut(edit.original_date) {
        Some(day) => day.daily_tasks.remove(index),
        None => return Err(RescheduleError::SourceDayNotFound(edit.original_date)),
    };
    task.is_rescheduled = true;
    task.reschedule_history.push(RescheduleRecord {
        original_date: edit.original_date,
        new_date: edit.new_date,
        reason: edit.reason.clone().unwrap_or_default(),
        timestamp: now,
    });

    match plan.day_on_mut(edit.new_date) {
        Some(day) => day.daily_tasks.push(task.clone()),
        None => return Err(RescheduleError::TargetDayNotFound(edit.new_date)),
    }
    Ok(task)
}
