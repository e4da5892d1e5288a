//! Study planning core.
//!
//! Pure planning logic for the study-plan service: the curriculum model, topic pool
//! construction and weighting, plan and reschedule data types, the deterministic
//! fallback builder, and the completion-service seam used to synthesize plans.
//! Nothing in this crate touches HTTP or storage.

pub mod calendar;
pub mod curriculum;
pub mod fallback;
pub mod gamification;
pub mod json;
pub mod llm_client;
pub mod performance;
pub mod plan;
pub mod profile;
pub mod prompts;
pub mod reschedule;
pub mod synthesis;
pub mod topic;
pub mod tracks;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A three-level rating used for importance, difficulty, exam relevance and
/// self-reported confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    #[default]
    Medium,
    High,
}

impl Tier {
    /// Ordering rank used when sorting by importance (high first).
    pub fn rank(self) -> u8 {
        match self {
            Tier::Low => 1,
            Tier::Medium => 2,
            Tier::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::Medium => "medium",
            Tier::High => "high",
        }
    }

    /// Parses a tier, falling back to `Medium` for anything unrecognized.
    pub fn parse_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Tier::Low),
            "medium" => Ok(Tier::Medium),
            "high" => Ok(Tier::High),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
