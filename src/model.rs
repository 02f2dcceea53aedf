//! Candidate data produced by the pipeline.
//!
//! [`CandidateRecord`] is the structured shape the LLM must return. It is
//! deserialised strictly: every required field must be present and every
//! numeric field must be a JSON number or a string that parses as one.
//! Anything else is rejected as a whole; there is no partially valid record.

use crate::error::ScoringValueError;
use serde::{Deserialize, Deserializer, Serialize};

/// Identity and contact fields from the resume header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentMetadata {
    pub name: String,
    pub gender: String,
    pub reg_no: String,
    pub dob: String,
    pub email: String,
    pub phone: String,
    pub mobile: String,
    pub branch: String,
    pub degree: String,
}

/// Performance in one semester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicRecord {
    #[serde(deserialize_with = "de_u32_lenient")]
    pub semester: u32,
    /// Month and year label, e.g. "Nov 2023".
    pub duration: String,
    #[serde(deserialize_with = "de_f64_lenient")]
    pub sgpa: f64,
    #[serde(deserialize_with = "de_f64_lenient")]
    pub cgpa: f64,
    pub degree: String,
}

impl AcademicRecord {
    /// Check that both grade points are finite and within 0–10.
    pub fn validate(&self) -> Result<(), ScoringValueError> {
        for (field, value) in [("sgpa", self.sgpa), ("cgpa", self.cgpa)] {
            if !value.is_finite() {
                return Err(ScoringValueError::NonFinite {
                    semester: self.semester,
                    field: field.to_string(),
                });
            }
            if !(0.0..=10.0).contains(&value) {
                return Err(ScoringValueError::OutOfRange {
                    semester: self.semester,
                    field: field.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Five skill lists. Order is irrelevant and duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSet {
    #[serde(default)]
    pub programming_languages: Vec<String>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub databases: Vec<String>,
    #[serde(default)]
    pub other_technologies: Vec<String>,
    #[serde(default)]
    pub knowledge_area: Vec<String>,
}

impl SkillSet {
    /// All five lists in a fixed order.
    pub fn lists(&self) -> [&[String]; 5] {
        [
            &self.programming_languages,
            &self.frameworks,
            &self.databases,
            &self.other_technologies,
            &self.knowledge_area,
        ]
    }

    /// Item count used for project relevance. `other_technologies` is not
    /// part of it.
    pub fn relevance_count(&self) -> usize {
        self.programming_languages.len()
            + self.frameworks.len()
            + self.databases.len()
            + self.knowledge_area.len()
    }
}

/// A project, internship or publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Company for internships; "personal" or "NA" otherwise.
    pub company: String,
    pub duration: String,
    #[serde(default)]
    pub skill: SkillSet,
}

/// Everything the LLM extracts from one resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub metadata: StudentMetadata,
    pub academic_performance: Vec<AcademicRecord>,
    pub projects: Vec<Project>,
    pub technical_skills: SkillSet,
}

/// Extra-curricular items found by pattern matching.
///
/// Each list holds at most [`crate::sections::MAX_ITEMS`] entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraCurricularRecord {
    #[serde(default)]
    pub leadership: Vec<String>,
    #[serde(default)]
    pub awards: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

impl ExtraCurricularRecord {
    /// Entry count used for scoring. Languages are not counted.
    pub fn scored_count(&self) -> usize {
        self.leadership.len() + self.awards.len() + self.certifications.len() + self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scored_count() == 0 && self.languages.is_empty()
    }
}

/// Token counters reported by the LLM backend for one candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub reg_no: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

// ── Lenient numeric deserialisers ────────────────────────────────────────────
//
// Models are inconsistent about quoting numbers ("9.2" vs 9.2). Both are
// accepted; "NA", "" or any other non-numeric string is an error.

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

fn de_f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            serde::de::Error::custom(format!("expected a number, got {s:?}"))
        }),
    }
}

fn de_u32_lenient<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = de_f64_lenient(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative integer, got {value}"
        )));
    }
    Ok(value as u32)
}
