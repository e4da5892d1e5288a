//! Performance analytics summary and the insights derived from it for planning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::gamification::{SessionKind, StudySession};

/// Average session above this multiple of the overall average marks a subject as hard.
pub const DIFFICULTY_RATIO: f64 = 1.3;
const SHORT_ATTENTION_MINUTES: u32 = 30;
const LONG_ATTENTION_MINUTES: u32 = 45;
const NEGLECT_RATIO: f64 = 0.3;

/// The `performance_analytics/summary` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceAnalytics {
    pub total_minutes_studied: u64,
    pub total_manual_minutes: u64,
    pub total_focus_minutes: u64,
    pub sessions_by_subject: BTreeMap<String, u32>,
    pub time_by_subject: BTreeMap<String, u64>,
    pub total_sessions: u32,
    pub average_session_duration: u32,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_session_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_session_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_session_type: Option<SessionKind>,
}

impl PerformanceAnalytics {
    pub fn record(&mut self, session: &StudySession, now: DateTime<Utc>) {
        let minutes = u64::from(session.minutes);
        self.total_minutes_studied += minutes;
        match session.kind {
            SessionKind::Manual => self.total_manual_minutes += minutes,
            SessionKind::Focus => self.total_focus_minutes += minutes,
        }
        *self
            .sessions_by_subject
            .entry(session.subject.clone())
            .or_default() += 1;
        *self.time_by_subject.entry(session.subject.clone()).or_default() += minutes;
        self.total_sessions += 1;
        self.average_session_duration =
            (self.total_minutes_studied as f64 / f64::from(self.total_sessions)).round() as u32;
        self.last_updated = Some(now);
        self.last_session_duration = Some(session.minutes);
        self.last_session_subject = Some(session.subject.clone());
        self.last_session_type = Some(session.kind);
    }

    /// Derives planning insights; `None` when nothing has been logged yet.
    pub fn insights(&self) -> Option<PerformanceInsights> {
        if self.total_sessions == 0 {
            return None;
        }

        // Ties resolve to the alphabetically first subject.
        let most_studied = self
            .time_by_subject
            .iter()
            .fold(None::<(&String, u64)>, |best, (s, &m)| match best {
                Some((_, bm)) if bm >= m => best,
                _ => Some((s, m)),
            })
            .map(|(s, m)| (s.clone(), m));
        let least_studied = self
            .time_by_subject
            .iter()
            .fold(None::<(&String, u64)>, |best, (s, &m)| match best {
                Some((_, bm)) if bm <= m => best,
                _ => Some((s, m)),
            })
            .map(|(s, m)| (s.clone(), m));

        let overall = f64::from(self.average_session_duration);
        let difficulty_signals = self
            .time_by_subject
            .iter()
            .filter(|(subject, minutes)| {
                let sessions = self.sessions_by_subject.get(*subject).copied().unwrap_or(1).max(1);
                **minutes as f64 / f64::from(sessions) > overall * DIFFICULTY_RATIO
            })
            .map(|(subject, _)| subject.clone())
            .collect();

        let attention = if self.average_session_duration < SHORT_ATTENTION_MINUTES {
            AttentionSpan::Short
        } else if self.average_session_duration > LONG_ATTENTION_MINUTES {
            AttentionSpan::Long
        } else {
            AttentionSpan::Standard
        };

        let neglected_subject = match (&most_studied, &least_studied) {
            (Some((_, most)), Some((least, minutes)))
                if (*minutes as f64) < *most as f64 * NEGLECT_RATIO =>
            {
                Some(least.clone())
            }
            _ => None,
        };

        let mode_balance = if self.total_manual_minutes > self.total_focus_minutes * 2 {
            Some(ModeBalance::ManualHeavy)
        } else if self.total_focus_minutes > self.total_manual_minutes * 3 {
            Some(ModeBalance::FocusHeavy)
        } else {
            None
        };

        Some(PerformanceInsights {
            average_session_minutes: self.average_session_duration,
            total_sessions: self.total_sessions,
            manual_minutes: self.total_manual_minutes,
            focus_minutes: self.total_focus_minutes,
            most_studied,
            least_studied,
            difficulty_signals,
            attention,
            neglected_subject,
            mode_balance,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionSpan {
    Short,
    Standard,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeBalance {
    ManualHeavy,
    FocusHeavy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceInsights {
    pub average_session_minutes: u32,
    pub total_sessions: u32,
    pub manual_minutes: u64,
    pub focus_minutes: u64,
    pub most_studied: Option<(String, u64)>,
    pub least_studied: Option<(String, u64)>,
    pub difficulty_signals: Vec<String>,
    pub attention: AttentionSpan,
    pub neglected_subject: Option<String>,
    pub mode_balance: Option<ModeBalance>,
}

impl PerformanceInsights {
    /// Summary of past study behaviour for the plan prompt.
    pub fn describe(&self) -> String {
        let subject = |entry: &Option<(String, u64)>| match entry {
            Some((name, minutes)) => format!("{name} ({minutes} minutes)"),
            None => "no data".to_string(),
        };
        let signals = if self.difficulty_signals.is_empty() {
            "none detected".to_string()
        } else {
            self.difficulty_signals.join(", ")
        };
        format!(
            "- Average focus duration: {} minutes\n\
             - Total study sessions: {}\n\
             - Most studied subject: {}\n\
             - Least studied subject: {}\n\
             - Manual vs focus-mode minutes: {} / {}\n\
             - Difficulty signals: {}",
            self.average_session_minutes,
            self.total_sessions,
            subject(&self.most_studied),
            subject(&self.least_studied),
            self.manual_minutes,
            self.focus_minutes,
            signals,
        )
    }

    /// Planning rules that adapt the schedule to the observed behaviour.
    pub fn adaptive_rules(&self) -> Vec<String> {
        let avg = self.average_session_minutes;
        let mut rules = vec![match self.attention {
            AttentionSpan::Short => format!(
                "Short attention span ({avg} min average): keep every work block at 25 minutes or less and add frequent short breaks."
            ),
            AttentionSpan::Long => format!(
                "Long attention span ({avg} min average): 45-50 minute work blocks are fine."
            ),
            AttentionSpan::Standard => format!(
                "Standard attention span ({avg} min average): use regular 25-minute blocks."
            ),
        }];
        if let Some(subject) = &self.neglected_subject {
            rules.push(format!(
                "\"{subject}\" is barely studied: open the week with easy, motivating tasks from it."
            ));
        }
        if !self.difficulty_signals.is_empty() {
            rules.push(format!(
                "Difficulty signals in {}: break those topics into smaller steps, start from the basics and add worked examples.",
                self.difficulty_signals.join(", ")
            ));
        }
        match self.mode_balance {
            Some(ModeBalance::ManualHeavy) => rules.push(
                "Mostly manual entries: plan short, achievable tasks that encourage using focus mode."
                    .to_string(),
            ),
            Some(ModeBalance::FocusHeavy) => rules.push(
                "Uses focus mode consistently: longer, deeper study sessions are appropriate."
                    .to_string(),
            ),
            None => {}
        }
        rules
    }
}

/// Rules used when a student has no study history yet.
pub fn new_student_rules() -> Vec<String> {
    [
        "Start the first week with shorter tasks (20-25 minutes).",
        "Offer a variety of subjects and task types so preferences can emerge.",
        "Set motivating, achievable goals.",
        "Begin each subject with its most fundamental topics.",
        "Include tasks that introduce focus mode.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn session(subject: &str, minutes: u32, kind: SessionKind) -> StudySession {
        StudySession {
            minutes,
            subject: subject.to_string(),
            topic: "x".to_string(),
            kind,
            date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
        }
    }

    #[test]
    fn test_record_updates_totals_and_average() {
        let mut analytics = PerformanceAnalytics::default();
        analytics.record(&session("Matematik", 40, SessionKind::Focus), Utc::now());
        analytics.record(&session("Fizik", 25, SessionKind::Manual), Utc::now());

        assert_eq!(analytics.total_minutes_studied, 65);
        assert_eq!(analytics.total_focus_minutes, 40);
        assert_eq!(analytics.total_manual_minutes, 25);
        assert_eq!(analytics.total_sessions, 2);
        assert_eq!(analytics.average_session_duration, 33);
        assert_eq!(analytics.sessions_by_subject["Matematik"], 1);
        assert_eq!(analytics.last_session_subject.as_deref(), Some("Fizik"));
        assert_eq!(analytics.last_session_type, Some(SessionKind::Manual));
    }

    #[test]
    fn test_no_insights_without_sessions() {
        assert!(PerformanceAnalytics::default().insights().is_none());
        assert_eq!(new_student_rules().len(), 5);
    }

    #[test]
    fn test_insights() {
        let mut analytics = PerformanceAnalytics::default();
        for _ in 0..4 {
            analytics.record(&session("Matematik", 30, SessionKind::Focus), Utc::now());
        }
        analytics.record(&session("Fizik", 90, SessionKind::Focus), Utc::now());
        analytics.record(&session("Tarih", 10, SessionKind::Focus), Utc::now());

        let insights = analytics.insights().unwrap();
        // 220 minutes over 6 sessions
        assert_eq!(insights.average_session_minutes, 37);
        assert_eq!(insights.most_studied, Some(("Matematik".to_string(), 120)));
        assert_eq!(insights.least_studied, Some(("Tarih".to_string(), 10)));
        assert_eq!(insights.difficulty_signals, vec!["Fizik".to_string()]);
        assert_eq!(insights.attention, AttentionSpan::Standard);
        assert_eq!(insights.neglected_subject.as_deref(), Some("Tarih"));
        assert_eq!(insights.mode_balance, Some(ModeBalance::FocusHeavy));

        let rules = insights.adaptive_rules();
        assert_eq!(rules.len(), 4);
        assert!(insights.describe().contains("Matematik (120 minutes)"));
    }

    #[test]
    fn test_attention_thresholds() {
        let mut analytics = PerformanceAnalytics::default();
        analytics.record(&session("Kimya", 20, SessionKind::Manual), Utc::now());
        let insights = analytics.insights().unwrap();
        assert_eq!(insights.attention, AttentionSpan::Short);
        assert_eq!(insights.mode_balance, Some(ModeBalance::ManualHeavy));

        analytics.record(&session("Kimya", 100, SessionKind::Manual), Utc::now());
        assert_eq!(analytics.insights().unwrap().attention, AttentionSpan::Long);
    }
}
