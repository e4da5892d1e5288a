//! Prompt templates for the completion service.
//!
//! Templates use `{name}` placeholders. Built-in defaults ship with the crate; a
//! deployment can replace any of them by key (`topic_selection`, `study_plan`,
//! `reschedule`).

use std::collections::HashMap;
use tracing::info;

pub const TOPIC_SELECTION: &str = "topic_selection";
pub const STUDY_PLAN: &str = "study_plan";
pub const RESCHEDULE: &str = "reschedule";

#[derive(Debug, Clone)]
pub struct PromptSet {
    pub topic_selection: String,
    pub study_plan: String,
    pub reschedule: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            topic_selection: include_str!("../prompts/topic_selection.md").to_string(),
            study_plan: include_str!("../prompts/study_plan.md").to_string(),
            reschedule: include_str!("../prompts/reschedule.md").to_string(),
        }
    }
}

impl PromptSet {
    /// Defaults with any matching keys from `overrides` swapped in. Unknown keys are ignored.
    pub fn with_overrides(mut overrides: HashMap<String, String>) -> Self {
        let mut set = Self::default();
        for (key, slot) in [
            (TOPIC_SELECTION, &mut set.topic_selection),
            (STUDY_PLAN, &mut set.study_plan),
            (RESCHEDULE, &mut set.reschedule),
        ] {
            if let Some(template) = overrides.remove(key) {
                info!(prompt = key, "Using prompt override");
                *slot = template;
            }
        }
        set
    }
}

/// Replaces each `{key}` in `template` with its value in a single pass.
///
/// Inserted values are never scanned again, and braces that do not enclose a known
/// key are kept as written.
pub fn fill(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let known = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (value, close))
        });
        match known {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_placeholders_only() {
        let out = fill(
            "Grade {grade}, {grade} again, keep {\"json\": 1} and {unknown}",
            &[("grade", "10".to_string())],
        );
        assert_eq!(out, "Grade 10, 10 again, keep {\"json\": 1} and {unknown}");
    }

    #[test]
    fn test_fill_does_not_expand_inserted_values() {
        let out = fill(
            "Style: {learning_style}\nTopics: {topics}",
            &[
                ("learning_style", "{topics}".to_string()),
                ("topics", "[\"Türev\"]".to_string()),
            ],
        );
        assert_eq!(out, "Style: {topics}\nTopics: [\"Türev\"]");
    }

    #[test]
    fn test_fill_handles_nested_and_unclosed_braces() {
        let out = fill("{\"a\": {grade}} {grade", &[("grade", "9".to_string())]);
        assert_eq!(out, "{\"a\": 9} {grade");
    }

    #[test]
    fn test_defaults_contain_expected_placeholders() {
        let prompts = PromptSet::default();
        assert!(prompts.topic_selection.contains("{topics}"));
        assert!(prompts.study_plan.contains("{daily_minutes}"));
        assert!(prompts.study_plan.contains("{start_date}"));
        assert!(prompts.reschedule.contains("{current_date}"));
    }

    #[test]
    fn test_overrides_replace_by_key() {
        let overrides = HashMap::from([
            (STUDY_PLAN.to_string(), "custom {grade}".to_string()),
            ("system_prompt".to_string(), "ignored".to_string()),
        ]);
        let prompts = PromptSet::with_overrides(overrides);

        assert_eq!(prompts.study_plan, "custom {grade}");
        assert_eq!(prompts.reschedule, PromptSet::default().reschedule);
    }
}
