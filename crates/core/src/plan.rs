//! Study plan data model.
//!
//! These types are also the persisted document format, so field names follow the
//! camelCase JSON the clients read. Fields the completion service adds beyond the
//! known ones are preserved in `extra` maps rather than dropped.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::calendar::day_name;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlan {
    #[serde(default)]
    pub plan_title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weeks: Vec<Week>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Week {
    #[serde(deserialize_with = "lenient_u32")]
    pub week_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_theme: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub days: Vec<Day>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Day {
    /// Weekday name as shown to the student, e.g. `"Pazartesi"`.
    pub day: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_theme: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_rest_day: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub daily_tasks: Vec<DailyTask>,
}

impl Day {
    pub fn total_minutes(&self) -> u32 {
        self.daily_tasks.iter().map(|t| t.duration_in_minutes).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTask {
    pub subject: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub duration_in_minutes: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_completed: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pomodoro_sessions: Vec<StudySegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feynman: Option<TaskContent>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_rescheduled: bool,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub reschedule_history: Vec<RescheduleRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DailyTask {
    pub fn matches(&self, subject: &str, topic: &str) -> bool {
        self.subject == subject && self.topic == topic
    }
}

/// The kind of a timed segment inside a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Learn,
    Practice,
    Review,
    Break,
    #[serde(other)]
    Other,
}

/// A timed work or break interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySegment {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "lenient_u32")]
    pub duration_in_minutes: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_break: bool,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Explanation and self-check quiz attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskContent {
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub analogy_prompt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quiz: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRecord {
    pub original_date: NaiveDate,
    pub new_date: NaiveDate,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Reads an explicit `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts whole numbers written as integers, floats or numeric strings, rounding fractions.
fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() && n >= 0.0 && n <= f64::from(u32::MAX) => Ok(n.round() as u32),
        _ => Err(de::Error::custom(format!(
            "expected a non-negative number, found {value}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanShapeError {
    #[error("plan has no weeks")]
    NoWeeks,
    #[error("plan has no week with at least one day")]
    NoDays,
}

impl StudyPlan {
    /// Decodes a drafted plan whose days start on `start`.
    ///
    /// Drafts often leave out bookkeeping fields. A missing week number is taken from
    /// the week's position, a missing or malformed date is counted from `start` by
    /// position (seven days per week), and a blank weekday name is derived from the date.
    pub fn from_draft(mut draft: Value, start: NaiveDate) -> Result<Self, serde_json::Error> {
        if let Some(weeks) = draft.get_mut("weeks").and_then(Value::as_array_mut) {
            for (w, week) in weeks.iter_mut().enumerate() {
                let Some(week) = week.as_object_mut() else {
                    continue;
                };
                if !week.get("weekNumber").is_some_and(|n| n.is_number() || n.is_string()) {
                    week.insert("weekNumber".to_string(), Value::from(w + 1));
                }
                let Some(days) = week.get_mut("days").and_then(Value::as_array_mut) else {
                    continue;
                };
                for (d, day) in days.iter_mut().enumerate() {
                    let Some(day) = day.as_object_mut() else {
                        continue;
                    };
                    let offset = Days::new((w * 7 + d) as u64);
                    let date = day
                        .get("date")
                        .and_then(Value::as_str)
                        .and_then(|s| s.trim().parse::<NaiveDate>().ok())
                        .or_else(|| start.checked_add_days(offset))
                        .unwrap_or(start);
                    day.insert("date".to_string(), Value::String(date.to_string()));
                    let named = day
                        .get("day")
                        .and_then(Value::as_str)
                        .is_some_and(|s| !s.trim().is_empty());
                    if !named {
                        day.insert("day".to_string(), Value::String(day_name(date).to_string()));
                    }
                }
            }
        }
        serde_json::from_value(draft)
    }

    /// Checks the minimum structure a usable plan needs.
    pub fn validate(&self) -> Result<(), PlanShapeError> {
        if self.weeks.is_empty() {
            return Err(PlanShapeError::NoWeeks);
        }
        if self.weeks.iter().all(|w| w.days.is_empty()) {
            return Err(PlanShapeError::NoDays);
        }
        Ok(())
    }

    pub fn days(&self) -> impl Iterator<Item = &Day> {
        self.weeks.iter().flat_map(|w| w.days.iter())
    }

    pub fn day_on(&self, date: NaiveDate) -> Option<&Day> {
        self.days().find(|d| d.date == date)
    }

    pub fn day_on_mut(&mut self, date: NaiveDate) -> Option<&mut Day> {
        self.weeks
            .iter_mut()
            .flat_map(|w| w.days.iter_mut())
            .find(|d| d.date == date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan_json() -> Value {
        json!({
            "planTitle": "Hafta 1",
            "weekSummary": { "totalTopics": 3 },
            "weeks": [{
                "weekNumber": 1,
                "days": [{
                    "day": "Pazartesi",
                    "date": "2025-03-03",
                    "isRestDay": false,
                    "dailyTasks": [{
                        "subject": "Matematik",
                        "topic": "Türev",
                        "durationInMinutes": 55,
                        "taskPurpose": "teşhis",
                        "pomodoroSessions": [
                            { "type": "learn", "description": "Konu", "durationInMinutes": 25 },
                            { "type": "break", "durationInMinutes": 5, "isBreak": true },
                            { "type": "quiz", "durationInMinutes": 25 }
                        ],
                        "resource": { "type": "video", "title": "Türev giriş" },
                        "feynman": {
                            "explanation": "...",
                            "analogyPrompt": "...",
                            "quiz": [{ "question": "?", "options": ["A", "B"], "correctAnswer": "A" }]
                        }
                    }]
                }]
            }]
        })
    }

    #[test]
    fn test_plan_deserializes_and_keeps_unknown_fields() {
        let plan: StudyPlan = serde_json::from_value(plan_json()).unwrap();

        assert_eq!(plan.plan_title, "Hafta 1");
        assert!(plan.extra.contains_key("weekSummary"));
        let task = &plan.weeks[0].days[0].daily_tasks[0];
        assert_eq!(task.extra.get("taskPurpose"), Some(&json!("teşhis")));
        assert_eq!(task.pomodoro_sessions[2].kind, SegmentKind::Other);
        assert!(task.pomodoro_sessions[1].is_break);
        assert!(plan.validate().is_ok());

        let back = serde_json::to_value(&plan).unwrap();
        assert_eq!(back["weekSummary"]["totalTopics"], 3);
        assert!(back["weeks"][0]["days"][0]["dailyTasks"][0].get("isRescheduled").is_none());
    }

    #[test]
    fn test_validate_rejects_empty_structures() {
        let mut plan: StudyPlan = serde_json::from_value(plan_json()).unwrap();
        plan.weeks[0].days.clear();
        assert_eq!(plan.validate(), Err(PlanShapeError::NoDays));

        plan.weeks.clear();
        assert_eq!(plan.validate(), Err(PlanShapeError::NoWeeks));
    }

    #[test]
    fn test_day_lookup_by_date() {
        let plan: StudyPlan = serde_json::from_value(plan_json()).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();

        assert_eq!(plan.day_on(date).map(Day::total_minutes), Some(55));
        assert!(plan.day_on(date.succ_opt().unwrap()).is_none());
    }

    #[test]
    fn test_draft_fills_missing_bookkeeping_fields() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let draft = json!({
            "weeks": [
                { "days": [{ "dailyTasks": null }] },
                {
                    "weekNumber": 2.0,
                    "days": [
                        {
                            "day": "",
                            "date": "not a date",
                            "dailyTasks": [{
                                "subject": "Fizik",
                                "topic": "Kuvvet",
                                "durationInMinutes": 44.6,
                                "pomodoroSessions": [
                                    { "type": "learn", "durationInMinutes": "25" }
                                ]
                            }]
                        },
                        { "day": "Salı", "date": "2025-03-11", "dailyTasks": [] }
                    ]
                }
            ]
        });

        let plan = StudyPlan::from_draft(draft, start).unwrap();

        assert!(plan.validate().is_ok());
        assert_eq!(plan.weeks[0].week_number, 1);
        assert_eq!(plan.weeks[1].week_number, 2);
        let first = &plan.weeks[0].days[0];
        assert_eq!(first.date, start);
        assert_eq!(first.day, day_name(start));
        assert!(first.daily_tasks.is_empty());

        let filled = &plan.weeks[1].days[0];
        assert_eq!(filled.date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(filled.day, "Pazartesi");
        assert_eq!(filled.daily_tasks[0].duration_in_minutes, 45);
        assert_eq!(filled.daily_tasks[0].pomodoro_sessions[0].duration_in_minutes, 25);
        assert_eq!(plan.weeks[1].days[1].day, "Salı");
    }

    #[test]
    fn test_draft_rejects_negative_durations() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let draft = json!({
            "weeks": [{ "days": [{
                "dailyTasks": [{ "subject": "Fizik", "topic": "Kuvvet", "durationInMinutes": -5 }]
            }] }]
        });

        assert!(StudyPlan::from_draft(draft, start).is_err());
    }
}
