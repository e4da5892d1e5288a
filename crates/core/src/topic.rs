//! Topic Pool
//!
//! Flattens a curriculum class into a list of weighted [`TopicPoolItem`]s. The pool
//! is what the planner reasons about: each entry carries the resolved importance,
//! difficulty and exam relevance of a topic, a track weight, and (once the student's
//! self-assessment is applied) a confidence weight.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::Tier;
use crate::curriculum::{CurriculumClass, Parsed, parse_class};
use crate::tracks::TrackCatalog;

/// Multiplier applied to the track weight of a track's core subjects.
pub const CORE_SUBJECT_BOOST: f64 = 1.5;

/// A flattened, weighted projection of one curriculum topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicPoolItem {
    pub subject: String,
    pub unit: String,
    pub topic: String,
    pub importance: Tier,
    pub exam_relevance: Tier,
    pub difficulty: Tier,
    pub duration_minutes: u32,
    pub track_weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_weight: Option<f64>,
}

impl TopicPoolItem {
    /// `"Subject - Topic"`, the name used when talking to the completion service.
    pub fn full_name(&self) -> String {
        format!("{} - {}", self.subject, self.topic)
    }

    /// The weight used for prioritizing; 1.0 until confidence has been applied.
    pub fn priority_weight(&self) -> f64 {
        self.confidence_weight.unwrap_or(1.0)
    }
}

/// Inputs that shape a topic pool besides the curriculum itself.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions<'a> {
    /// Subjects to include. Empty means every subject.
    pub subjects: &'a [String],
    pub track: &'a str,
    pub target_exam: &'a str,
}

/// Builds the topic pool for one curriculum class.
///
/// # Arguments
///
/// * `class` - The grade level to flatten.
/// * `options` - Subject filter, academic track and target exam.
/// * `catalog` - Track table used for the core-subject boost.
pub fn build_topic_pool(
    class: &CurriculumClass,
    options: &PoolOptions<'_>,
    catalog: &TrackCatalog,
) -> Vec<TopicPoolItem> {
    let mut pool = Vec::new();

    for subject in &class.subjects {
        if !options.subjects.is_empty() && !options.subjects.iter().any(|s| s == &subject.name) {
            continue;
        }
        let boost = if catalog.is_core(options.track, &subject.name) {
            CORE_SUBJECT_BOOST
        } else {
            1.0
        };

        for unit in &subject.units {
            for topic in &unit.topics {
                let base_weight = topic.track_weights.get(options.track).copied().unwrap_or(1.0);
                let hours = topic.estimated_hours.unwrap_or(1.0);
                pool.push(TopicPoolItem {
                    subject: subject.name.clone(),
                    unit: unit.name.clone(),
                    topic: topic.name.clone(),
                    importance: topic.importance.unwrap_or_default(),
                    exam_relevance: topic
                        .exam_relevance
                        .get(options.target_exam)
                        .copied()
                        .unwrap_or_default(),
                    difficulty: topic.difficulty.unwrap_or_default(),
                    duration_minutes: (hours * 60.0).round() as u32,
                    track_weight: base_weight * boost,
                    confidence_weight: None,
                });
            }
        }
    }

    pool
}

/// Builds a pool straight from a raw curriculum class document.
///
/// Malformed nodes never abort the build; they are skipped and returned as diagnostics.
pub fn build_topic_pool_from_value(
    value: &Value,
    options: &PoolOptions<'_>,
    catalog: &TrackCatalog,
) -> Parsed<Vec<TopicPoolItem>> {
    let parsed = parse_class(value);
    Parsed {
        value: build_topic_pool(&parsed.value, options, catalog),
        diagnostics: parsed.diagnostics,
    }
}

/// Weight applied for a self-reported confidence tier. Weak subjects get more attention.
pub fn confidence_multiplier(tier: Tier) -> f64 {
    match tier {
        Tier::Low => 2.0,
        Tier::Medium => 1.0,
        Tier::High => 0.7,
    }
}

/// Sets `confidence_weight` on every item. Subjects missing from `levels` count as medium.
pub fn apply_confidence(pool: &mut [TopicPoolItem], levels: &HashMap<String, Tier>) {
    for item in pool.iter_mut() {
        let tier = levels.get(&item.subject).copied().unwrap_or_default();
        item.confidence_weight = Some(confidence_multiplier(tier) * item.track_weight);
    }
}

/// Stable ordering by importance, highest first.
pub fn sort_by_importance(pool: &mut [TopicPoolItem]) {
    pool.sort_by(|a, b| b.importance.rank().cmp(&a.importance.rank()));
}

/// Stable ordering by importance, then by priority weight, both descending.
pub fn sort_by_priority(pool: &mut [TopicPoolItem]) {
    pool.sort_by(compare_priority);
}

fn compare_priority(a: &TopicPoolItem, b: &TopicPoolItem) -> Ordering {
    b.importance.rank().cmp(&a.importance.rank()).then_with(|| {
        b.priority_weight()
            .partial_cmp(&a.priority_weight())
            .unwrap_or(Ordering::Equal)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn class_doc() -> Value {
        json!({
            "sinifDuzeyi": "11. Sınıf",
            "dersler": [
                {
                    "dersAdi": "Fizik",
                    "uniteVeTemalar": [{
                        "uniteAdi": "Kuvvet ve Hareket",
                        "konular": [
                            { "konuAdi": "Vektörler", "importance": "high", "estimatedHours": 1.5,
                              "examRelevance": { "AYT": "high" }, "academicTrackWeight": { "Sayısal": 1.2, "Sözel": 1.2 } },
                            { "konuAdi": "Newton Yasaları" }
                        ]
                    }]
                },
                {
                    "dersAdi": "Tarih",
                    "uniteVeTemalar": [{
                        "uniteAdi": "Osmanlı",
                        "konular": [ { "konuAdi": "Kuruluş Dönemi", "importance": "low" } ]
                    }]
                }
            ]
        })
    }

    fn options<'a>(subjects: &'a [String], track: &'a str) -> PoolOptions<'a> {
        PoolOptions {
            subjects,
            track,
            target_exam: "AYT",
        }
    }

    #[test]
    fn test_pool_flattens_and_resolves_defaults() {
        let pool = build_topic_pool_from_value(&class_doc(), &options(&[], "Sözel"), &TrackCatalog::default());

        assert!(pool.is_clean());
        assert_eq!(pool.value.len(), 3);
        let vectors = &pool.value[0];
        assert_eq!(vectors.full_name(), "Fizik - Vektörler");
        assert_eq!(vectors.exam_relevance, Tier::High);
        assert_eq!(vectors.duration_minutes, 90);
        assert_eq!(vectors.track_weight, 1.2);

        let newton = &pool.value[1];
        assert_eq!(newton.importance, Tier::Medium);
        assert_eq!(newton.difficulty, Tier::Medium);
        assert_eq!(newton.duration_minutes, 60);
        assert_eq!(newton.track_weight, 1.0);
        assert_eq!(newton.confidence_weight, None);
    }

    #[test]
    fn test_subject_filter_skips_other_subjects() {
        let subjects = vec!["Tarih".to_string()];
        let pool = build_topic_pool_from_value(&class_doc(), &options(&subjects, "Sözel"), &TrackCatalog::default());

        assert_eq!(pool.value.len(), 1);
        assert_eq!(pool.value[0].subject, "Tarih");
    }

    #[test]
    fn test_core_subject_gets_boosted_track_weight() {
        let catalog = TrackCatalog::default();
        let core = build_topic_pool_from_value(&class_doc(), &options(&[], "Sayısal"), &catalog).value;
        let not_core = build_topic_pool_from_value(&class_doc(), &options(&[], "Sözel"), &catalog).value;

        assert!((core[0].track_weight - not_core[0].track_weight * CORE_SUBJECT_BOOST).abs() < 1e-9);
        // Tarih is core for Sözel only
        assert!((not_core[2].track_weight - 1.5).abs() < 1e-9);
        assert!((core[2].track_weight - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dersler_not_a_list_returns_empty_pool() {
        let pool = build_topic_pool_from_value(
            &json!({ "sinifDuzeyi": "9. Sınıf", "dersler": "broken" }),
            &options(&[], "Sayısal"),
            &TrackCatalog::default(),
        );

        assert!(pool.value.is_empty());
        assert_eq!(pool.diagnostics.len(), 1);
    }

    #[test]
    fn test_confidence_multipliers() {
        assert_eq!(confidence_multiplier(Tier::Low), 2.0);
        assert_eq!(confidence_multiplier(Tier::Medium), 1.0);
        assert_eq!(confidence_multiplier(Tier::High), 0.7);
    }

    #[test]
    fn test_apply_confidence_multiplies_track_weight() {
        let mut pool = build_topic_pool_from_value(&class_doc(), &options(&[], "Sayısal"), &TrackCatalog::default()).value;
        let levels = HashMap::from([("Fizik".to_string(), Tier::Low)]);
        apply_confidence(&mut pool, &levels);

        assert!((pool[0].priority_weight() - 2.0 * 1.8).abs() < 1e-9);
        // Tarih has no entry and counts as medium
        assert_eq!(pool[2].confidence_weight, Some(1.0));
        assert!(pool.iter().all(|item| item.priority_weight() > 0.0));
    }

    #[test]
    fn test_sort_by_priority_uses_importance_then_weight() {
        let mut pool = build_topic_pool_from_value(&class_doc(), &options(&[], "Sayısal"), &TrackCatalog::default()).value;
        apply_confidence(&mut pool, &HashMap::new());
        pool.reverse();
        sort_by_priority(&mut pool);

        let names: Vec<_> = pool.iter().map(|p| p.topic.as_str()).collect();
        assert_eq!(names, vec!["Vektörler", "Newton Yasaları", "Kuruluş Dönemi"]);
    }
}
