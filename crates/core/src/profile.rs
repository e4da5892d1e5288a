//! Student profile as stored in the private profile document.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::Tier;
use crate::calendar::StartingPoint;
use crate::curriculum::Grade;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub academic_track: String,
    #[serde(default)]
    pub target_exam: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_university: Option<String>,
    #[serde(default)]
    pub daily_hours: f64,
    #[serde(default)]
    pub study_days: Vec<String>,
    /// Subject name to `low | medium | high`, as entered during onboarding.
    #[serde(default)]
    pub confidence_levels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_style: Option<String>,
    #[serde(default)]
    pub starting_point: StartingPoint,
    #[serde(default)]
    pub last_completed_topics: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_session_duration: Option<u32>,
    #[serde(default)]
    pub strength_areas: Vec<String>,
    #[serde(default)]
    pub weakness_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("Profile is missing '{0}'")]
    MissingField(&'static str),
    #[error("Profile field '{field}' is invalid: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl StudentProfile {
    /// Checks the fields plan generation cannot do without.
    pub fn validate(&self) -> Result<Grade, ProfileError> {
        if self.grade.trim().is_empty() {
            return Err(ProfileError::MissingField("grade"));
        }
        if self.academic_track.trim().is_empty() {
            return Err(ProfileError::MissingField("academicTrack"));
        }
        if self.target_exam.trim().is_empty() {
            return Err(ProfileError::MissingField("targetExam"));
        }
        if self.study_days.is_empty() {
            return Err(ProfileError::MissingField("studyDays"));
        }
        if !(self.daily_hours <= 24.0) || self.daily_minutes() == 0 {
            return Err(ProfileError::InvalidValue {
                field: "dailyHours",
                reason: format!(
                    "{} must give at least one minute and at most 24 hours",
                    self.daily_hours
                ),
            });
        }
        self.grade
            .parse::<Grade>()
            .map_err(|e| ProfileError::InvalidValue {
                field: "grade",
                reason: e.to_string(),
            })
    }

    /// Confidence per subject; unrecognized values count as medium.
    pub fn confidence_tiers(&self) -> HashMap<String, Tier> {
        self.confidence_levels
            .iter()
            .map(|(subject, raw)| (subject.clone(), Tier::parse_or_default(raw)))
            .collect()
    }

    /// Subjects the student rated `low`.
    pub fn weak_subjects(&self) -> Vec<String> {
        self.confidence_levels
            .iter()
            .filter(|(_, raw)| Tier::parse_or_default(raw) == Tier::Low)
            .map(|(subject, _)| subject.clone())
            .collect()
    }

    pub fn daily_minutes(&self) -> u32 {
        (self.daily_hours * 60.0).floor() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> StudentProfile {
        serde_json::from_value(json!({
            "grade": "11",
            "academicTrack": "Sayısal",
            "targetExam": "YKS",
            "dailyHours": 2.5,
            "studyDays": ["Pazartesi", "Salı"],
            "confidenceLevels": { "Matematik": "low", "Fizik": "HIGH", "Kimya": "unsure" },
            "startingPoint": "behind",
            "onboardingNotes": "ignored"
        }))
        .unwrap()
    }

    #[test]
    fn test_profile_deserializes_with_defaults() {
        let p = profile();

        assert_eq!(p.starting_point, StartingPoint::Behind);
        assert_eq!(p.daily_minutes(), 150);
        assert!(p.learning_style.is_none());
        assert_eq!(p.validate(), Ok(Grade::Class(11)));
    }

    #[test]
    fn test_confidence_tiers_are_lenient() {
        let tiers = profile().confidence_tiers();

        assert_eq!(tiers["Matematik"], Tier::Low);
        assert_eq!(tiers["Fizik"], Tier::High);
        assert_eq!(tiers["Kimya"], Tier::Medium);
        assert_eq!(profile().weak_subjects(), vec!["Matematik".to_string()]);
    }

    #[test]
    fn test_validate_reports_missing_and_invalid_fields() {
        let mut p = profile();
        p.academic_track = " ".into();
        assert_eq!(p.validate(), Err(ProfileError::MissingField("academicTrack")));

        let mut p = profile();
        p.daily_hours = 0.0;
        assert!(matches!(p.validate(), Err(ProfileError::InvalidValue { field: "dailyHours", .. })));
        p.daily_hours = 0.01;
        assert!(matches!(p.validate(), Err(ProfileError::InvalidValue { field: "dailyHours", .. })));
        p.daily_hours = 0.02;
        assert!(p.validate().is_ok());

        let mut p = profile();
        p.grade = "üniversite".into();
        assert!(matches!(p.validate(), Err(ProfileError::InvalidValue { field: "grade", .. })));
    }
}
