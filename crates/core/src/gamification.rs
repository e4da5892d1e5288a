//! XP, levels and study-session logging.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const XP_PER_LEVEL: u64 = 100;
pub const MAX_SESSION_MINUTES: u32 = 720;
const FOCUS_MULTIPLIER: f64 = 1.5;
const MANUAL_MULTIPLIER: f64 = 0.75;

/// How a study session was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Entered by hand after the fact.
    Manual,
    /// Tracked live with the focus timer.
    Focus,
}

impl SessionKind {
    pub fn from_manual_flag(is_manual_entry: bool) -> Self {
        if is_manual_entry {
            SessionKind::Manual
        } else {
            SessionKind::Focus
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            SessionKind::Manual => MANUAL_MULTIPLIER,
            SessionKind::Focus => FOCUS_MULTIPLIER,
        }
    }
}

/// XP earned for a session.
pub fn xp_for(minutes: u32, kind: SessionKind) -> u64 {
    (f64::from(minutes) * kind.multiplier()).floor() as u64
}

pub fn level_for_xp(xp: u64) -> u32 {
    u32::try_from(xp / XP_PER_LEVEL + 1).unwrap_or(u32::MAX)
}

/// A study session as submitted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySessionInput {
    pub duration_in_minutes: u32,
    pub subject: String,
    pub topic: String,
    #[serde(default)]
    pub is_manual_entry: bool,
    /// `YYYY-MM-DD`
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Duration must be between 1 and 720 minutes, got {0}")]
    InvalidDuration(u32),
    #[error("Subject is required")]
    MissingSubject,
    #[error("Topic is required")]
    MissingTopic,
    #[error("Date must be in YYYY-MM-DD format, got '{0}'")]
    InvalidDate(String),
}

/// A validated session ready to be logged.
#[derive(Debug, Clone, PartialEq)]
pub struct StudySession {
    pub minutes: u32,
    pub subject: String,
    pub topic: String,
    pub kind: SessionKind,
    pub date: NaiveDate,
}

impl StudySessionInput {
    pub fn validate(&self) -> Result<StudySession, SessionError> {
        if !(1..=MAX_SESSION_MINUTES).contains(&self.duration_in_minutes) {
            return Err(SessionError::InvalidDuration(self.duration_in_minutes));
        }
        let subject = self.subject.trim();
        if subject.is_empty() {
            return Err(SessionError::MissingSubject);
        }
        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(SessionError::MissingTopic);
        }
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|_| SessionError::InvalidDate(self.date.clone()))?;

        Ok(StudySession {
            minutes: self.duration_in_minutes,
            subject: subject.to_string(),
            topic: topic.to_string(),
            kind: SessionKind::from_manual_flag(self.is_manual_entry),
            date,
        })
    }
}

/// The persisted log entry for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySessionLog {
    pub user_id: String,
    pub subject: String,
    pub topic: String,
    pub duration_in_minutes: u32,
    pub xp_gained: u64,
    pub is_manual_entry: bool,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
}

/// The gamification document of a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationStats {
    #[serde(default)]
    pub xp: u64,
    #[serde(default = "first_level")]
    pub level: u32,
    #[serde(default)]
    pub total_study_minutes: u64,
    #[serde(default)]
    pub last_study_session: Option<DateTime<Utc>>,
}

fn first_level() -> u32 {
    1
}

impl Default for GamificationStats {
    fn default() -> Self {
        Self {
            xp: 0,
            level: first_level(),
            total_study_minutes: 0,
            last_study_session: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub xp_gained: u64,
    pub total_xp: u64,
    pub previous_level: u32,
    pub level: u32,
    pub leveled_up: bool,
}

impl GamificationStats {
    /// Credits a session and returns what changed.
    pub fn record(&mut self, session: &StudySession, now: DateTime<Utc>) -> SessionOutcome {
        let xp_gained = xp_for(session.minutes, session.kind);
        let previous_level = self.level;

        self.xp += xp_gained;
        self.level = level_for_xp(self.xp);
        self.total_study_minutes += u64::from(session.minutes);
        self.last_study_session = Some(now);

        SessionOutcome {
            xp_gained,
            total_xp: self.xp,
            previous_level,
            level: self.level,
            leveled_up: self.level > previous_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(minutes: u32, manual: bool) -> StudySessionInput {
        StudySessionInput {
            duration_in_minutes: minutes,
            subject: "Matematik".to_string(),
            topic: "Türev".to_string(),
            is_manual_entry: manual,
            date: "2025-03-04".to_string(),
        }
    }

    #[test]
    fn test_xp_multipliers() {
        assert_eq!(xp_for(45, SessionKind::Focus), 67);
        assert_eq!(xp_for(45, SessionKind::Manual), 33);
        assert_eq!(xp_for(1, SessionKind::Manual), 0);
    }

    #[test]
    fn test_levels() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(1050), 11);
    }

    #[test]
    fn test_session_validation() {
        assert!(input(30, false).validate().is_ok());
        assert_eq!(input(0, false).validate(), Err(SessionError::InvalidDuration(0)));
        assert_eq!(input(721, false).validate(), Err(SessionError::InvalidDuration(721)));

        let mut blank = input(30, false);
        blank.subject = "  ".to_string();
        assert_eq!(blank.validate(), Err(SessionError::MissingSubject));

        let mut blank = input(30, false);
        blank.topic = String::new();
        assert_eq!(blank.validate(), Err(SessionError::MissingTopic));

        let mut bad_date = input(30, false);
        bad_date.date = "04.03.2025".to_string();
        assert!(matches!(bad_date.validate(), Err(SessionError::InvalidDate(_))));
    }

    #[test]
    fn test_record_reports_level_up() {
        let mut stats = GamificationStats {
            xp: 90,
            ..GamificationStats::default()
        };
        let session = input(20, false).validate().unwrap();
        let outcome = stats.record(&session, Utc::now());

        assert_eq!(outcome.xp_gained, 30);
        assert_eq!(outcome.total_xp, 120);
        assert_eq!(outcome.previous_level, 1);
        assert_eq!(outcome.level, 2);
        assert!(outcome.leveled_up);
        assert_eq!(stats.total_study_minutes, 20);
        assert!(stats.last_study_session.is_some());
    }

    #[test]
    fn test_stats_defaults_from_empty_document() {
        let stats: GamificationStats = serde_json::from_str("{}").unwrap();
        assert_eq!(stats, GamificationStats::default());
        assert_eq!(stats.level, 1);
    }
}
