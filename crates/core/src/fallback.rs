//! Fallback Plan Builder
//!
//! Builds a complete four-week plan locally when the completion service does not
//! return a usable one. Output depends only on the inputs: the one random choice
//! (which topic of a subject's top slice to study) is drawn from a seeded RNG.

use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Map;
use std::collections::HashSet;

use crate::calendar::day_name;
use crate::plan::{
    DailyTask, Day, QuizQuestion, Resource, SegmentKind, StudyPlan, StudySegment, TaskContent,
    Week,
};
use crate::topic::{TopicPoolItem, sort_by_importance};

pub const WEEKS: u32 = 4;
pub const DAYS_PER_WEEK: u32 = 7;
/// Index of the rest day within a week.
pub const REST_DAY_INDEX: u32 = 6;
pub const MIN_TASKS_PER_DAY: u32 = 2;
pub const MAX_TASKS_PER_DAY: u32 = 5;
pub const MIN_TASK_MINUTES: u32 = 30;
pub const MAX_TASK_MINUTES: u32 = 60;
/// Topics considered per subject when picking what to study.
pub const TOPIC_WINDOW: usize = 20;
const REVIEW_TASK_MINUTES: u32 = 60;
const WORK_BLOCK_MINUTES: u32 = 25;
const BREAK_MINUTES: u32 = 5;

pub const DEFAULT_TITLE: &str = "Kişisel Çalışma Planın";

#[derive(Debug, Clone)]
pub struct FallbackOptions {
    pub daily_hours: f64,
    /// First day of the plan. Callers pass a Monday so the rest day lands on Sunday.
    pub start: NaiveDate,
    pub seed: u64,
    pub title: Option<String>,
}

/// Builds a 4 × 7 day plan from the topic pool.
///
/// Each non-rest day gets up to `clamp(floor(daily_hours × 1.5), 2, 5)` tasks, each
/// on a different subject, 30 to 60 minutes long, and never more than the daily
/// budget in total. A day where nothing fits gets a single review task.
pub fn build_fallback_plan(pool: &[TopicPoolItem], options: &FallbackOptions) -> StudyPlan {
    let mut sorted = pool.to_vec();
    sort_by_importance(&mut sorted);

    let mut subjects: Vec<&str> = Vec::new();
    for item in &sorted {
        if !subjects.contains(&item.subject.as_str()) {
            subjects.push(&item.subject);
        }
    }

    let budget = (options.daily_hours.max(0.0) * 60.0).floor() as u32;
    let task_target =
        ((options.daily_hours * 1.5).floor() as u32).clamp(MIN_TASKS_PER_DAY, MAX_TASKS_PER_DAY);
    let mut rng = StdRng::seed_from_u64(options.seed);

    let weeks = (1..=WEEKS)
        .map(|week_number| {
            let days = (0..DAYS_PER_WEEK)
                .map(|day_index| {
                    let offset = u64::from((week_number - 1) * DAYS_PER_WEEK + day_index);
                    let date = options
                        .start
                        .checked_add_days(Days::new(offset))
                        .unwrap_or(options.start);
                    let is_rest_day = day_index == REST_DAY_INDEX;
                    let daily_tasks = if is_rest_day {
                        Vec::new()
                    } else {
                        let mut tasks = plan_day(
                            &sorted,
                            &subjects,
                            week_number as usize + day_index as usize,
                            task_target,
                            budget,
                            &mut rng,
                        );
                        if tasks.is_empty() {
                            tasks.push(review_task(REVIEW_TASK_MINUTES.min(budget)));
                        }
                        tasks
                    };
                    Day {
                        day: day_name(date).to_string(),
                        date,
                        day_theme: None,
                        is_rest_day,
                        daily_tasks,
                    }
                })
                .collect();
            Week {
                week_number,
                week_theme: None,
                days,
            }
        })
        .collect();

    StudyPlan {
        plan_title: options
            .title
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        weeks,
        extra: Map::new(),
    }
}

fn plan_day(
    sorted: &[TopicPoolItem],
    subjects: &[&str],
    rotation: usize,
    task_target: u32,
    budget: u32,
    rng: &mut StdRng,
) -> Vec<DailyTask> {
    let mut tasks = Vec::new();
    if subjects.is_empty() {
        return tasks;
    }

    let mut used: HashSet<&str> = HashSet::new();
    let mut minutes = 0;

    for slot in 0..task_target as usize {
        if used.len() == subjects.len() {
            break;
        }
        let mut index = (rotation + slot) % subjects.len();
        while used.contains(subjects[index]) {
            index = (index + 1) % subjects.len();
        }
        let subject = subjects[index];
        used.insert(subject);

        let candidates: Vec<&TopicPoolItem> =
            sorted.iter().filter(|t| t.subject == subject).collect();
        let window = candidates.len().min(TOPIC_WINDOW);
        let item = candidates[rng.random_range(0..window)];

        let duration = item.duration_minutes.clamp(MIN_TASK_MINUTES, MAX_TASK_MINUTES);
        if minutes + duration > budget {
            continue;
        }
        minutes += duration;
        tasks.push(topic_task(item, duration));
    }

    tasks
}

fn topic_task(item: &TopicPoolItem, duration: u32) -> DailyTask {
    DailyTask {
        subject: item.subject.clone(),
        topic: item.topic.clone(),
        unit: Some(item.unit.clone()),
        duration_in_minutes: duration,
        is_completed: false,
        pomodoro_sessions: segments(duration, &item.topic),
        resource: Some(Resource {
            kind: "video".to_string(),
            title: format!("{} - {} konu anlatımı", item.subject, item.topic),
            url: None,
        }),
        feynman: Some(TaskContent {
            explanation: format!(
                "{} konusunu bir arkadaşına anlatır gibi kendi cümlelerinle açıkla.",
                item.topic
            ),
            analogy_prompt: format!(
                "{} konusunu günlük hayattan bir örnekle nasıl anlatırsın?",
                item.topic
            ),
            quiz: vec![QuizQuestion {
                question: format!("{} konusunun temel fikri nedir?", item.topic),
                options: vec![
                    "Tanımını yapabiliyorum".to_string(),
                    "Örnek verebiliyorum".to_string(),
                    "Tekrar etmem gerekiyor".to_string(),
                ],
                correct_answer: "Tanımını yapabiliyorum".to_string(),
            }],
        }),
        is_rescheduled: false,
        reschedule_history: Vec::new(),
        extra: Map::new(),
    }
}

fn review_task(duration: u32) -> DailyTask {
    DailyTask {
        subject: "Genel Tekrar".to_string(),
        topic: "Haftanın konularını tekrar et".to_string(),
        unit: None,
        duration_in_minutes: duration,
        is_completed: false,
        pomodoro_sessions: segments(duration, "Genel tekrar"),
        resource: None,
        feynman: None,
        is_rescheduled: false,
        reschedule_history: Vec::new(),
        extra: Map::new(),
    }
}

/// Splits a task into 25-minute work blocks separated by 5-minute breaks. A tail too
/// short for another break is folded into the last block, so the segment durations
/// always add up to `duration`.
fn segments(duration: u32, topic: &str) -> Vec<StudySegment> {
    let mut out = Vec::new();
    let mut remaining = duration;
    while remaining > 0 {
        let work = if remaining <= WORK_BLOCK_MINUTES + BREAK_MINUTES {
            remaining
        } else {
            WORK_BLOCK_MINUTES
        };
        out.push(StudySegment {
            kind: SegmentKind::Learn,
            description: format!("{topic} çalışması"),
            duration_in_minutes: work,
            is_break: false,
            is_completed: false,
        });
        remaining -= work;
        if remaining > BREAK_MINUTES {
            out.push(StudySegment {
                kind: SegmentKind::Break,
                description: "Kısa mola".to_string(),
                duration_in_minutes: BREAK_MINUTES,
                is_break: true,
                is_completed: false,
            });
            remaining -= BREAK_MINUTES;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Tier;

    fn item(subject: &str, topic: &str, importance: Tier, minutes: u32) -> TopicPoolItem {
        TopicPoolItem {
            subject: subject.to_string(),
            unit: "Ünite".to_string(),
            topic: topic.to_string(),
            importance,
            exam_relevance: Tier::Medium,
            difficulty: Tier::Medium,
            duration_minutes: minutes,
            track_weight: 1.0,
            confidence_weight: None,
        }
    }

    fn options(daily_hours: f64) -> FallbackOptions {
        FallbackOptions {
            daily_hours,
            start: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            seed: 7,
            title: None,
        }
    }

    fn pool() -> Vec<TopicPoolItem> {
        let mut pool = Vec::new();
        for (subject, importance) in [
            ("Matematik", Tier::High),
            ("Fizik", Tier::Medium),
            ("Kimya", Tier::Low),
            ("Biyoloji", Tier::Medium),
        ] {
            for i in 0..25 {
                pool.push(item(subject, &format!("{subject} {i}"), importance, 30 + i * 5));
            }
        }
        pool
    }

    #[test]
    fn test_shape_is_four_weeks_of_seven_days() {
        let plan = build_fallback_plan(&pool(), &options(3.0));

        assert_eq!(plan.weeks.len(), 4);
        for week in &plan.weeks {
            assert_eq!(week.days.len(), 7);
            for (i, day) in week.days.iter().enumerate() {
                assert_eq!(day.is_rest_day, i == 6);
                if day.is_rest_day {
                    assert!(day.daily_tasks.is_empty());
                }
            }
        }
        assert_eq!(plan.weeks[0].days[0].day, "Pazartesi");
        assert_eq!(plan.weeks[3].days[6].date, NaiveDate::from_ymd_opt(2025, 3, 30).unwrap());
        assert_eq!(plan.plan_title, DEFAULT_TITLE);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_days_respect_budget_and_task_rules() {
        for hours in [0.5, 1.0, 2.0, 3.0, 4.5] {
            let plan = build_fallback_plan(&pool(), &options(hours));
            let budget = (hours * 60.0) as u32;
            for day in plan.days().filter(|d| !d.is_rest_day) {
                assert!(day.total_minutes() <= budget, "{hours}h day over budget");
                assert!(!day.daily_tasks.is_empty());
                assert!(day.daily_tasks.len() <= 5);

                let subjects: HashSet<_> = day.daily_tasks.iter().map(|t| &t.subject).collect();
                assert_eq!(subjects.len(), day.daily_tasks.len());

                for task in &day.daily_tasks {
                    if task.subject != "Genel Tekrar" {
                        assert!((30..=60).contains(&task.duration_in_minutes));
                    }
                    let segment_total: u32 =
                        task.pomodoro_sessions.iter().map(|s| s.duration_in_minutes).sum();
                    assert_eq!(segment_total, task.duration_in_minutes);
                }
            }
        }
    }

    #[test]
    fn test_two_subjects_two_hours_stay_within_budget() {
        let pool = vec![
            item("Math", "Limits", Tier::High, 60),
            item("Bio", "Cells", Tier::Low, 60),
        ];
        let plan = build_fallback_plan(&pool, &options(2.0));

        let first = plan.days().find(|d| !d.is_rest_day).unwrap();
        assert!(first.total_minutes() <= 120);
        assert_eq!(first.daily_tasks.len(), 2);
    }

    #[test]
    fn test_review_task_when_nothing_fits() {
        let plan = build_fallback_plan(&pool(), &options(0.4));
        let day = &plan.weeks[0].days[0];

        assert_eq!(day.daily_tasks.len(), 1);
        assert_eq!(day.daily_tasks[0].subject, "Genel Tekrar");
        assert_eq!(day.daily_tasks[0].duration_in_minutes, 24);
    }

    #[test]
    fn test_empty_pool_still_yields_full_plan() {
        let plan = build_fallback_plan(&[], &options(2.0));

        assert_eq!(plan.days().count(), 28);
        assert!(
            plan.days()
                .filter(|d| !d.is_rest_day)
                .all(|d| d.daily_tasks.len() == 1 && d.total_minutes() == 60)
        );
    }

    #[test]
    fn test_same_seed_same_plan() {
        let a = build_fallback_plan(&pool(), &options(3.0));
        let b = build_fallback_plan(&pool(), &options(3.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_topics_come_from_top_slice_of_subject() {
        let plan = build_fallback_plan(&pool(), &options(3.0));
        let tasks = plan.days().flat_map(|d| d.daily_tasks.iter());
        for task in tasks.filter(|t| t.subject != "Genel Tekrar") {
            let index: usize = task.topic.rsplit(' ').next().unwrap().parse().unwrap();
            assert!(index < TOPIC_WINDOW);
        }
    }

    #[test]
    fn test_segments_split_work_and_breaks() {
        let s = segments(60, "Türev");
        let kinds: Vec<_> = s.iter().map(|x| (x.kind, x.duration_in_minutes)).collect();
        assert_eq!(
            kinds,
            vec![
                (SegmentKind::Learn, 25),
                (SegmentKind::Break, 5),
                (SegmentKind::Learn, 30),
            ]
        );
        assert!(segments(0, "x").is_empty());
    }
}
