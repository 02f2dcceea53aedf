//! Extra-curricular extraction by section-header pattern matching.
//!
//! Resume text is scanned line by line for headers belonging to five fixed
//! categories. Each header opens a span that runs until the next header of
//! *any* category, the next `Reference N:` line, or the end of the text.
//! Span lines are grouped into items, cleaned, and the first
//! [`MAX_ITEMS`] survivors are kept per category.
//!
//! ```text
//! POSITIONS OF RESPONSIBILITY        ← leadership header
//! • Coordinator, robotics club ...   ┐
//!                                    │ leadership span
//! • Class representative for ...     ┘
//! ACHIEVEMENTS                       ← awards header, closes the span above
//! ...
//! Reference 1: Dr. ...               ← closes any span, never an item
//! ```
//!
//! Extraction is total: no input produces an error, and categories with no
//! matching header yield empty lists.

use crate::model::ExtraCurricularRecord;
use crate::text::{collapse_whitespace, word_count};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum entries kept per category.
pub const MAX_ITEMS: usize = 5;

/// Items must have strictly more words than this.
const MIN_WORDS_EXCLUSIVE: usize = 3;

/// Lines longer than this (in characters) that contain a full stop are split
/// into sentences.
const LONG_LINE_CHARS: usize = 50;

/// The five extra-curricular categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Leadership,
    Awards,
    Certifications,
    Activities,
    Languages,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Leadership,
        Category::Awards,
        Category::Certifications,
        Category::Activities,
        Category::Languages,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Leadership => "leadership",
            Category::Awards => "awards",
            Category::Certifications => "certifications",
            Category::Activities => "activities",
            Category::Languages => "languages",
        }
    }

    /// Header patterns for this category, in match order.
    pub fn patterns(self) -> &'static [Regex] {
        &PATTERN_TABLE[self as usize].1
    }

    fn header_sources(self) -> &'static [&'static str] {
        match self {
            Category::Leadership => &[
                r"positions?\s+of\s+responsibility",
                r"leadership",
                r"(?:campus|college|university)\s+involvement",
                r"student\s+activities",
            ],
            Category::Awards => &[
                r"achievements",
                r"awards",
                r"honors",
                r"recognitions?",
                r"scholarships?",
            ],
            Category::Certifications => &[
                r"certifications?",
                r"courses?\s+completed",
                r"training\s+programs?",
            ],
            Category::Activities => &[
                r"extra.?curricular",
                r"co.?curricular",
                r"sports",
                r"cultural\s+activities?",
                r"volunteer(?:ing)?",
                r"nss|ncc",
                r"competitions?",
                r"clubs?\s+and\s+societies?",
            ],
            Category::Languages => &[
                r"languages?\s+known",
                r"language\s+proficiency",
                r"linguistic",
            ],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled header patterns, indexed by `Category as usize`.
static PATTERN_TABLE: Lazy<Vec<(Category, Vec<Regex>)>> = Lazy::new(|| {
    Category::ALL
        .iter()
        .map(|&cat| {
            let compiled = cat
                .header_sources()
                .iter()
                .map(|src| Regex::new(&format!("(?i)(?:{src})")).unwrap())
                .collect();
            (cat, compiled)
        })
        .collect()
});

static RE_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^reference\s*\d*\s*:").unwrap());
static RE_LEADING_NON_LETTERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^a-zA-Z]+").unwrap());
static RE_HAS_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z]").unwrap());

/// A half-open line range `[start, end)` attributed to one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpan {
    pub category: Category,
    pub start: usize,
    pub end: usize,
}

/// Does this line open a references block?
///
/// Leading indentation is ignored so `   Reference 2:` is caught too.
pub fn is_reference_line(line: &str) -> bool {
    RE_REFERENCE.is_match(line.trim_start())
}

fn is_any_header(line: &str) -> bool {
    PATTERN_TABLE
        .iter()
        .any(|(_, patterns)| patterns.iter().any(|p| p.is_match(line)))
}

/// Extract all five categories from a candidate's full resume text.
pub fn extract_extra_curricular(text: &str) -> ExtraCurricularRecord {
    let lines: Vec<&str> = text.lines().collect();
    let mut record = ExtraCurricularRecord::default();

    for category in Category::ALL {
        let items: Vec<String> = find_section_spans(&lines, category)
            .into_iter()
            .flat_map(|span| extract_items(&lines[span.start..span.end]))
            .collect();
        let cleaned = clean_items(items);

        let slot = match category {
            Category::Leadership => &mut record.leadership,
            Category::Awards => &mut record.awards,
            Category::Certifications => &mut record.certifications,
            Category::Activities => &mut record.activities,
            Category::Languages => &mut record.languages,
        };
        *slot = cleaned;
    }

    record
}

/// Locate every span belonging to `category`.
pub fn find_section_spans(lines: &[&str], category: Category) -> Vec<SectionSpan> {
    let patterns = category.patterns();
    let mut spans = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if is_reference_line(line) {
            continue;
        }
        if !patterns.iter().any(|p| p.is_match(line)) {
            continue;
        }

        let start = i + 1;
        let end = lines[start..]
            .iter()
            .position(|next| is_reference_line(next) || is_any_header(next))
            .map(|offset| start + offset)
            .unwrap_or(lines.len());

        if start < end {
            spans.push(SectionSpan {
                category,
                start,
                end,
            });
        }
    }

    spans
}

/// Group the lines of one span into raw items.
pub fn extract_items(lines: &[&str]) -> Vec<String> {
    let mut items = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for raw in lines {
        let line = raw.trim();
        if is_reference_line(line) {
            continue;
        }

        if line.is_empty() {
            if !current.is_empty() {
                items.push(current.join(" "));
                current.clear();
            }
            continue;
        }

        if line.chars().count() > LONG_LINE_CHARS && line.contains('.') {
            items.extend(
                line.split('.')
                    .map(str::trim)
                    .filter(|s| !s.is_empty() && word_count(s) > MIN_WORDS_EXCLUSIVE)
                    .map(str::to_string),
            );
        } else {
            current.push(line);
        }
    }

    if !current.is_empty() {
        items.push(current.join(" "));
    }

    items
}

/// Strip bullets, drop short or letter-free items, keep the first [`MAX_ITEMS`].
pub fn clean_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .filter(|item| !is_reference_line(item))
        .map(|item| {
            let stripped = RE_LEADING_NON_LETTERS.replace(&item, "");
            collapse_whitespace(&stripped)
        })
        .filter(|item| word_count(item) > MIN_WORDS_EXCLUSIVE && RE_HAS_LETTER.is_match(item))
        .take(MAX_ITEMS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_table_follows_category_order() {
        for (idx, (cat, patterns)) in PATTERN_TABLE.iter().enumerate() {
            assert_eq!(*cat as usize, idx);
            assert!(!patterns.is_empty());
        }
    }

    #[test]
    fn empty_text_yields_empty_record() {
        let record = extract_extra_curricular("");
        assert_eq!(record, ExtraCurricularRecord::default());
    }

    #[test]
    fn reference_lines_are_detected_with_indentation() {
        assert!(is_reference_line("Reference 1:"));
        assert!(is_reference_line("   REFERENCE: Dr. Rao"));
        assert!(is_reference_line("reference 12 : Prof. Iyer"));
        assert!(!is_reference_line("References available on request"));
        assert!(!is_reference_line("Cross reference 1: nope"));
    }

    #[test]
    fn span_stops_at_next_header_of_any_category() {
        let lines = vec![
            "LEADERSHIP",
            "Coordinator of the robotics club for two years",
            "ACHIEVEMENTS",
            "Won the regional hackathon held at Bengaluru",
        ];
        let spans = find_section_spans(&lines, Category::Leadership);
        assert_eq!(
            spans,
            vec![SectionSpan {
                category: Category::Leadership,
                start: 1,
                end: 2
            }]
        );
        let awards = find_section_spans(&lines, Category::Awards);
        assert_eq!(awards[0].start, 3);
        assert_eq!(awards[0].end, 4);
    }

    #[test]
    fn header_followed_directly_by_header_yields_no_span() {
        let lines = vec!["Leadership", "Awards", "Dean's list for academic excellence twice"];
        assert!(find_section_spans(&lines, Category::Leadership).is_empty());
    }

    #[test]
    fn blank_lines_separate_items() {
        let lines = vec!["Head of the", "cultural committee", "", "Mentor for first year students"];
        assert_eq!(
            extract_items(&lines),
            vec!["Head of the cultural committee", "Mentor for first year students"]
        );
    }

    #[test]
    fn long_lines_are_split_into_sentences() {
        let line = "Organised the annual tech fest with 2000 attendees. Led a team. Managed a budget of five lakh rupees";
        let items = extract_items(&[line]);
        assert_eq!(
            items,
            vec![
                "Organised the annual tech fest with 2000 attendees",
                "Managed a budget of five lakh rupees"
            ]
        );
    }

    #[test]
    fn cleaning_strips_bullets_and_short_items() {
        let items = vec![
            "• Team lead for the college fest".to_string(),
            "1. Captain of the cricket team".to_string(),
            "- Team Lead".to_string(),
            "12345 6789 000 111".to_string(),
            "Reference 1: Dr. Kumar, Professor of Physics".to_string(),
        ];
        assert_eq!(
            clean_items(items),
            vec!["Team lead for the college fest", "Captain of the cricket team"]
        );
    }

    #[test]
    fn cleaning_truncates_to_max_items() {
        let items: Vec<String> = (0..8).map(|i| format!("Item number {i} of many")).collect();
        let cleaned = clean_items(items);
        assert_eq!(cleaned.len(), MAX_ITEMS);
        assert_eq!(cleaned[0], "Item number 0 of many");
    }

    #[test]
    fn leadership_span_followed_by_reference_has_no_items() {
        let text = "POSITIONS OF RESPONSIBILITY\nReference 1: Dr. A. Sharma, Head of Department\nProfessor of Computer Science at NITK";
        let record = extract_extra_curricular(text);
        assert!(record.leadership.is_empty());
    }

    #[test]
    fn extracts_several_categories() {
        let text = "\
POSITIONS OF RESPONSIBILITY
• Coordinator of the robotics club at NITK

• Class representative for the 2021 batch
ACHIEVEMENTS
• Secured first rank in the institute hackathon
CERTIFICATIONS
• AWS Certified Cloud Practitioner from Amazon
LANGUAGES KNOWN
English, Hindi, Kannada and Tamil
Reference 1:
Dr. R. Mehta, Professor, Department of Computer Science";

        let record = extract_extra_curricular(text);
        assert_eq!(
            record.leadership,
            vec![
                "Coordinator of the robotics club at NITK",
                "Class representative for the 2021 batch"
            ]
        );
        assert_eq!(record.awards, vec!["Secured first rank in the institute hackathon"]);
        assert_eq!(
            record.certifications,
            vec!["AWS Certified Cloud Practitioner from Amazon"]
        );
        assert_eq!(record.languages, vec!["English, Hindi, Kannada and Tamil"]);
        assert!(record.activities.is_empty());
    }

    #[test]
    fn every_item_satisfies_invariants() {
        let text = "\
Extra-curricular
* Played state level football for Karnataka

- ok
Volunteering
### 42 ###
Volunteer teacher at the NSS night school for two years. Taught maths. Organised weekly quiz sessions for village children";
        let record = extract_extra_curricular(text);
        let all = [
            &record.leadership,
            &record.awards,
            &record.certifications,
            &record.activities,
            &record.languages,
        ];
        for list in all {
            assert!(list.len() <= MAX_ITEMS);
            for item in list.iter() {
                assert!(word_count(item) > 3, "too short: {item:?}");
                assert!(item.chars().next().unwrap().is_ascii_alphabetic(), "{item:?}");
            }
        }
        assert_eq!(record.activities, vec!["Played state level football for Karnataka"]);
    }
}
