//! School calendar: holidays, plan types and the grade a plan should target.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::curriculum::Grade;

const OFFICIAL_HOLIDAYS: [(u32, u32, &str); 7] = [
    (1, 1, "Yılbaşı"),
    (4, 23, "Ulusal Egemenlik ve Çocuk Bayramı"),
    (5, 1, "Emek ve Dayanışma Günü"),
    (5, 19, "Atatürk'ü Anma, Gençlik ve Spor Bayramı"),
    (7, 15, "Demokrasi ve Milli Birlik Günü"),
    (8, 30, "Zafer Bayramı"),
    (10, 29, "Cumhuriyet Bayramı"),
];

/// (month, day) bounds, inclusive.
const SEMESTER_BREAK: ((u32, u32), (u32, u32)) = ((1, 22), (2, 5));
const SUMMER_BREAK: ((u32, u32), (u32, u32)) = ((6, 15), (9, 15));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayKind {
    Official,
    SemesterBreak,
    SummerBreak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolidayStatus {
    pub is_holiday: bool,
    pub kind: Option<HolidayKind>,
    pub reason: Option<String>,
}

impl HolidayStatus {
    fn school_day() -> Self {
        Self {
            is_holiday: false,
            kind: None,
            reason: None,
        }
    }

    fn holiday(kind: HolidayKind, reason: &str) -> Self {
        Self {
            is_holiday: true,
            kind: Some(kind),
            reason: Some(reason.to_string()),
        }
    }
}

/// Whether `date` falls on an official holiday or a school break.
pub fn holiday_status(date: NaiveDate) -> HolidayStatus {
    let md = (date.month(), date.day());

    if let Some((_, _, name)) = OFFICIAL_HOLIDAYS
        .iter()
        .find(|(m, d, _)| (*m, *d) == md)
    {
        return HolidayStatus::holiday(HolidayKind::Official, name);
    }
    if (SEMESTER_BREAK.0..=SEMESTER_BREAK.1).contains(&md) {
        return HolidayStatus::holiday(HolidayKind::SemesterBreak, "Yarıyıl Tatili");
    }
    if (SUMMER_BREAK.0..=SUMMER_BREAK.1).contains(&md) {
        return HolidayStatus::holiday(HolidayKind::SummerBreak, "Yaz Tatili");
    }
    HolidayStatus::school_day()
}

/// The kind of plan being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    #[default]
    Regular,
    Holiday,
    HolidayBalanced,
    HolidayNextGradePrep,
    HolidayReviewPast,
    ExamPrep,
}

impl PlanType {
    pub fn is_holiday_plan(self) -> bool {
        matches!(
            self,
            PlanType::Holiday
                | PlanType::HolidayBalanced
                | PlanType::HolidayNextGradePrep
                | PlanType::HolidayReviewPast
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Regular => "regular",
            PlanType::Holiday => "holiday",
            PlanType::HolidayBalanced => "holiday_balanced",
            PlanType::HolidayNextGradePrep => "holiday_next_grade_prep",
            PlanType::HolidayReviewPast => "holiday_review_past",
            PlanType::ExamPrep => "exam_prep",
        }
    }
}

/// The requested plan type, or `Holiday` when none was asked for during a break.
pub fn resolve_plan_type(requested: Option<PlanType>, status: &HolidayStatus) -> PlanType {
    match requested {
        Some(plan_type) => plan_type,
        None if status.is_holiday => PlanType::Holiday,
        None => PlanType::Regular,
    }
}

/// Where the student places themselves relative to their grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StartingPoint {
    Behind,
    #[default]
    Current,
    Ahead,
}

/// The grade whose curriculum the plan should draw from.
///
/// During a break students enter the grade they are moving up to, so the material
/// they are actually on is one level lower. Outside breaks the starting point shifts
/// the level by one in either direction, within grades 9 to 12.
pub fn effective_grade(
    grade: Grade,
    starting_point: StartingPoint,
    plan_type: PlanType,
    status: &HolidayStatus,
) -> Grade {
    if status.is_holiday && plan_type != PlanType::HolidayNextGradePrep {
        return match grade {
            Grade::Class(n) if n > 9 => Grade::Class(n - 1),
            other => other,
        };
    }
    if plan_type == PlanType::HolidayNextGradePrep {
        return grade;
    }
    match (starting_point, grade) {
        (StartingPoint::Behind, Grade::Graduate) => Grade::Class(11),
        (StartingPoint::Behind, Grade::Class(n)) if n > 9 => Grade::Class(n - 1),
        (StartingPoint::Ahead, Grade::Class(n)) if n < 12 => Grade::Class(n + 1),
        (_, grade) => grade,
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Turkish weekday name shown in plans.
pub fn day_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Pazartesi",
        Weekday::Tue => "Salı",
        Weekday::Wed => "Çarşamba",
        Weekday::Thu => "Perşembe",
        Weekday::Fri => "Cuma",
        Weekday::Sat => "Cumartesi",
        Weekday::Sun => "Pazar",
    }
}
