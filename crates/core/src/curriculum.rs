//! Curriculum Model and Loader
//!
//! The curriculum is static reference data: a list of grade levels, each holding
//! subjects, units and topics. The source document is hand-maintained JSON, so it is
//! parsed defensively. Every node is validated on its own; an invalid node is
//! dropped and recorded in a diagnostics list while its siblings keep loading.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::Tier;

/// Label used in the curriculum document for graduates.
pub const GRADUATE_LABEL: &str = "Mezun";

/// One grade level of the curriculum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurriculumClass {
    pub grade_level: String,
    pub description: String,
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subject {
    pub name: String,
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unit {
    pub name: String,
    pub topics: Vec<Topic>,
}

/// A single curriculum topic and its planning metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Topic {
    pub name: String,
    pub teaching_week: Option<u32>,
    pub importance: Option<Tier>,
    pub difficulty: Option<Tier>,
    pub exam_relevance: BTreeMap<String, Tier>,
    pub estimated_hours: Option<f64>,
    pub track_weights: BTreeMap<String, f64>,
}

/// A node that was skipped or a field that was ignored while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The outcome of a validated parse: the usable value plus everything that was dropped.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Parsed<T> {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CurriculumError {
    #[error("Failed to read curriculum file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Curriculum file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Curriculum document must be a list of grade levels")]
    NotAList,
    #[error("Invalid grade '{0}'")]
    InvalidGrade(String),
}

/// A student's grade: a numbered class or a graduate preparing for the exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grade {
    Class(u8),
    Graduate,
}

impl Grade {
    /// The numeric level used for curriculum lookups. Graduates study grade 12 material.
    pub fn level(self) -> u8 {
        match self {
            Grade::Class(n) => n,
            Grade::Graduate => 12,
        }
    }

    /// The `sinifDuzeyi` label of the matching curriculum class, e.g. `"10. Sınıf"`.
    pub fn curriculum_label(self) -> String {
        format!("{}. Sınıf", self.level())
    }
}

impl FromStr for Grade {
    type Err = CurriculumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(GRADUATE_LABEL) {
            return Ok(Grade::Graduate);
        }
        trimmed
            .trim_end_matches(". Sınıf")
            .parse::<u8>()
            .ok()
            .filter(|n| (1..=12).contains(n))
            .map(Grade::Class)
            .ok_or_else(|| CurriculumError::InvalidGrade(s.to_string()))
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Class(n) => write!(f, "{n}"),
            Grade::Graduate => f.write_str(GRADUATE_LABEL),
        }
    }
}

/// A topic listing entry, flattened for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicListing {
    pub grade_level: String,
    pub subject: String,
    pub unit: String,
    pub topic: String,
    pub teaching_week: Option<u32>,
}

/// The full multi-grade curriculum.
#[derive(Debug, Clone, Default)]
pub struct Curriculum {
    classes: Vec<CurriculumClass>,
}

impl Curriculum {
    pub fn new(classes: Vec<CurriculumClass>) -> Self {
        Self { classes }
    }

    /// Reads and parses a curriculum JSON file.
    pub fn load(path: &Path) -> Result<Parsed<Curriculum>, CurriculumError> {
        let raw = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&raw)?;
        Self::from_value(&value)
    }

    /// Parses a curriculum document. Only a non-list top level is fatal.
    pub fn from_value(value: &Value) -> Result<Parsed<Curriculum>, CurriculumError> {
        let entries = value.as_array().ok_or(CurriculumError::NotAList)?;
        let mut diagnostics = Vec::new();
        let mut classes = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let path = format!("[{i}]");
            if !entry.is_object() {
                diagnostics.push(Diagnostic::new(path, "grade level is not an object"));
                continue;
            }
            let parsed = parse_class_at(entry, &path);
            diagnostics.extend(parsed.diagnostics);
            classes.push(parsed.value);
        }
        Ok(Parsed {
            value: Curriculum { classes },
            diagnostics,
        })
    }

    pub fn classes(&self) -> &[CurriculumClass] {
        &self.classes
    }

    pub fn find_class(&self, grade: Grade) -> Option<&CurriculumClass> {
        let label = grade.curriculum_label();
        self.classes.iter().find(|c| c.grade_level == label)
    }

    /// Lists topics of the given subjects, ordered by teaching week.
    ///
    /// Subject filters match case-insensitively by containment, so `"matematik"`
    /// matches `"Matematik"`. An empty filter lists every subject. Grade 12 and
    /// graduates see topics from every grade, since they review the whole syllabus.
    pub fn topics_for(&self, grade: Grade, subjects: &[String]) -> Vec<TopicListing> {
        let filters: Vec<String> = subjects.iter().map(|s| s.to_lowercase()).collect();
        let label = grade.curriculum_label();
        let all_grades = grade.level() >= 12;

        let mut listings = Vec::new();
        for class in self
            .classes
            .iter()
            .filter(|c| all_grades || c.grade_level == label)
        {
            for subject in &class.subjects {
                let name = subject.name.to_lowercase();
                if !filters.is_empty() && !filters.iter().any(|f| name.contains(f.as_str())) {
                    continue;
                }
                for unit in &subject.units {
                    for topic in &unit.topics {
                        listings.push(TopicListing {
                            grade_level: class.grade_level.clone(),
                            subject: subject.name.clone(),
                            unit: unit.name.clone(),
                            topic: topic.name.clone(),
                            teaching_week: topic.teaching_week,
                        });
                    }
                }
            }
        }

        listings.sort_by_key(|l| l.teaching_week.unwrap_or(u32::MAX));
        listings
    }
}

/// Parses one grade level. Never fails; invalid descendants are reported in the diagnostics.
pub fn parse_class(value: &Value) -> Parsed<CurriculumClass> {
    parse_class_at(value, "class")
}

fn parse_class_at(value: &Value, path: &str) -> Parsed<CurriculumClass> {
    let mut diagnostics = Vec::new();

    let grade_level = match value.get("sinifDuzeyi").and_then(Value::as_str) {
        Some(label) => label.to_string(),
        None => {
            diagnostics.push(Diagnostic::new(path, "missing 'sinifDuzeyi'"));
            String::new()
        }
    };
    let description = value
        .get("aciklama")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let subjects = match value.get("dersler").and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                parse_subject(item, &format!("{path}.dersler[{i}]"), &mut diagnostics)
            })
            .collect(),
        None => {
            diagnostics.push(Diagnostic::new(path, "'dersler' is not a list"));
            Vec::new()
        }
    };

    Parsed {
        value: CurriculumClass {
            grade_level,
            description,
            subjects,
        },
        diagnostics,
    }
}

fn parse_subject(value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<Subject> {
    let Some(name) = value.get("dersAdi").and_then(Value::as_str) else {
        diagnostics.push(Diagnostic::new(path, "subject without 'dersAdi' skipped"));
        return None;
    };

    let units = match value.get("uniteVeTemalar").and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                parse_unit(item, &format!("{path}.uniteVeTemalar[{i}]"), diagnostics)
            })
            .collect(),
        None => {
            diagnostics.push(Diagnostic::new(
                path,
                format!("'uniteVeTemalar' of '{name}' is not a list"),
            ));
            Vec::new()
        }
    };

    Some(Subject {
        name: name.to_string(),
        units,
    })
}

fn parse_unit(value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<Unit> {
    let Some(name) = value.get("uniteAdi").and_then(Value::as_str) else {
        diagnostics.push(Diagnostic::new(path, "unit without 'uniteAdi' skipped"));
        return None;
    };

    let topics = match value.get("konular").and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| parse_topic(item, &format!("{path}.konular[{i}]"), diagnostics))
            .collect(),
        None => {
            diagnostics.push(Diagnostic::new(
                path,
                format!("'konular' of '{name}' is not a list"),
            ));
            Vec::new()
        }
    };

    Some(Unit {
        name: name.to_string(),
        topics,
    })
}

fn parse_topic(value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) -> Option<Topic> {
    let Some(name) = value.get("konuAdi").and_then(Value::as_str) else {
        diagnostics.push(Diagnostic::new(path, "topic without 'konuAdi' skipped"));
        return None;
    };

    let mut topic = Topic {
        name: name.to_string(),
        teaching_week: value
            .get("islenmeHaftasi")
            .and_then(Value::as_u64)
            .and_then(|w| u32::try_from(w).ok()),
        ..Topic::default()
    };

    topic.importance = parse_tier_field(value, "importance", path, diagnostics);
    topic.difficulty = parse_tier_field(value, "difficulty", path, diagnostics);

    if let Some(raw) = value.get("estimatedHours") {
        match raw.as_f64() {
            Some(hours) if hours > 0.0 => topic.estimated_hours = Some(hours),
            _ => diagnostics.push(Diagnostic::new(path, "ignored invalid 'estimatedHours'")),
        }
    }

    if let Some(raw) = value.get("examRelevance") {
        match raw.as_object() {
            Some(map) => {
                for (exam, tier) in map {
                    match tier.as_str().map(str::parse::<Tier>) {
                        Some(Ok(tier)) => {
                            topic.exam_relevance.insert(exam.clone(), tier);
                        }
                        _ => diagnostics.push(Diagnostic::new(
                            path,
                            format!("ignored invalid exam relevance for '{exam}'"),
                        )),
                    }
                }
            }
            None => diagnostics.push(Diagnostic::new(path, "'examRelevance' is not an object")),
        }
    }

    if let Some(raw) = value.get("academicTrackWeight") {
        match raw.as_object() {
            Some(map) => {
                for (track, weight) in map {
                    match weight.as_f64() {
                        Some(w) if w > 0.0 => {
                            topic.track_weights.insert(track.clone(), w);
                        }
                        _ => diagnostics.push(Diagnostic::new(
                            path,
                            format!("ignored non-positive track weight for '{track}'"),
                        )),
                    }
                }
            }
            None => diagnostics.push(Diagnostic::new(
                path,
                "'academicTrackWeight' is not an object",
            )),
        }
    }

    Some(topic)
}

fn parse_tier_field(
    value: &Value,
    key: &str,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Tier> {
    let raw = value.get(key)?;
    match raw.as_str().map(str::parse::<Tier>) {
        Some(Ok(tier)) => Some(tier),
        _ => {
            diagnostics.push(Diagnostic::new(path, format!("ignored invalid '{key}'")));
            None
        }
    }
}
