//! Tabular output: per-candidate CSV files, raw LLM response, token usage.
//!
//! Layout under the parsed-data root:
//!
//! ```text
//! parsed_data/
//! ├── token_usage.csv
//! └── <id>/
//!     ├── <id>_metadata.csv          metadata + five score columns
//!     ├── <id>_academic.csv          one row per semester
//!     ├── <id>_skills.csv
//!     ├── <id>_projects.csv          one row per project
//!     ├── <id>_extracurricular.csv
//!     └── llm_response.json
//! ```
//!
//! Multi-value fields are joined with `;`. Reading them back splits on `;`,
//! which cannot tell an empty list from a list holding one empty string, and
//! splits any item that itself contains `;`.
//!
//! A candidate directory is written into a `.staging-*` sibling and renamed
//! into place, so it appears complete or not at all.

use crate::error::ResumeParserError;
use crate::model::{
    AcademicRecord, CandidateRecord, ExtraCurricularRecord, Project, SkillSet, StudentMetadata,
    TokenUsage,
};
use crate::scoring::ScoreBreakdown;
use crate::splitter::is_valid_identifier;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PDF_DIR: &str = "pdfs";
pub const PARSED_DIR: &str = "parsed_data";
pub const TOKEN_USAGE_FILE: &str = "token_usage.csv";
pub const LLM_RESPONSE_FILE: &str = "llm_response.json";

const LIST_SEPARATOR: &str = ";";

const METADATA_HEADER: [&str; 14] = [
    "name",
    "gender",
    "reg_no",
    "dob",
    "email",
    "phone",
    "mobile",
    "branch",
    "degree",
    "total_score",
    "academic_score",
    "technical_score",
    "projects_score",
    "extra_score",
];
const ACADEMIC_HEADER: [&str; 5] = ["semester", "duration", "sgpa", "cgpa", "degree"];
const SKILLS_HEADER: [&str; 5] = [
    "programming_languages",
    "frameworks",
    "databases",
    "other_technologies",
    "knowledge_area",
];
const PROJECTS_HEADER: [&str; 8] = [
    "name",
    "company",
    "duration",
    "programming_languages",
    "frameworks",
    "databases",
    "other_technologies",
    "knowledge_area",
];
const EXTRA_HEADER: [&str; 5] = ["leadership", "awards", "certifications", "activities", "languages"];
const USAGE_HEADER: [&str; 4] = ["reg_no", "prompt_tokens", "completion_tokens", "total_tokens"];

// ── Row shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct MetadataRow {
    name: String,
    gender: String,
    reg_no: String,
    dob: String,
    email: String,
    phone: String,
    mobile: String,
    branch: String,
    degree: String,
    total_score: f64,
    academic_score: f64,
    technical_score: f64,
    projects_score: f64,
    extra_score: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SkillsRow {
    programming_languages: String,
    frameworks: String,
    databases: String,
    other_technologies: String,
    knowledge_area: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectRow {
    name: String,
    company: String,
    duration: String,
    programming_languages: String,
    frameworks: String,
    databases: String,
    other_technologies: String,
    knowledge_area: String,
}

impl ProjectRow {
    fn from_project(p: &Project) -> Self {
        let skill = SkillsRow::from_skills(&p.skill);
        Self {
            name: p.name.clone(),
            company: p.company.clone(),
            duration: p.duration.clone(),
            programming_languages: skill.programming_languages,
            frameworks: skill.frameworks,
            databases: skill.databases,
            other_technologies: skill.other_technologies,
            knowledge_area: skill.knowledge_area,
        }
    }

    fn into_project(self) -> Project {
        let skill = SkillsRow {
            programming_languages: self.programming_languages,
            frameworks: self.frameworks,
            databases: self.databases,
            other_technologies: self.other_technologies,
            knowledge_area: self.knowledge_area,
        };
        Project {
            name: self.name,
            company: self.company,
            duration: self.duration,
            skill: skill.into_skills(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ExtraRow {
    leadership: String,
    awards: String,
    certifications: String,
    activities: String,
    languages: String,
}

#[derive(Serialize)]
struct LlmResponseFile<'a> {
    response: &'a CandidateRecord,
    usage: UsageBody,
}

#[derive(Serialize)]
struct UsageBody {
    completion_tokens: u64,
    prompt_tokens: u64,
    total_tokens: u64,
}

fn join_list(items: &[String]) -> String {
    items.join(LIST_SEPARATOR)
}

fn split_list(field: &str) -> Vec<String> {
    if field.is_empty() {
        Vec::new()
    } else {
        field.split(LIST_SEPARATOR).map(str::to_string).collect()
    }
}

impl SkillsRow {
    fn from_skills(s: &SkillSet) -> Self {
        Self {
            programming_languages: join_list(&s.programming_languages),
            frameworks: join_list(&s.frameworks),
            databases: join_list(&s.databases),
            other_technologies: join_list(&s.other_technologies),
            knowledge_area: join_list(&s.knowledge_area),
        }
    }

    fn into_skills(self) -> SkillSet {
        SkillSet {
            programming_languages: split_list(&self.programming_languages),
            frameworks: split_list(&self.frameworks),
            databases: split_list(&self.databases),
            other_technologies: split_list(&self.other_technologies),
            knowledge_area: split_list(&self.knowledge_area),
        }
    }
}

// ── Writing ──────────────────────────────────────────────────────────────────

/// Paths of one candidate's output files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFiles {
    pub dir: PathBuf,
    pub metadata: PathBuf,
    pub academic: PathBuf,
    pub skills: PathBuf,
    pub projects: PathBuf,
    pub extracurricular: PathBuf,
    pub llm_response: PathBuf,
}

impl CandidateFiles {
    pub fn new(parsed_root: &Path, id: &str) -> Self {
        Self::in_dir(parsed_root.join(id), id)
    }

    fn in_dir(dir: PathBuf, id: &str) -> Self {
        Self {
            metadata: dir.join(format!("{id}_metadata.csv")),
            academic: dir.join(format!("{id}_academic.csv")),
            skills: dir.join(format!("{id}_skills.csv")),
            projects: dir.join(format!("{id}_projects.csv")),
            extracurricular: dir.join(format!("{id}_extracurricular.csv")),
            llm_response: dir.join(LLM_RESPONSE_FILE),
            dir,
        }
    }
}

fn write_failed(path: &Path) -> impl FnOnce(io::Error) -> ResumeParserError + '_ {
    move |source| ResumeParserError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_writer(path: &Path, header: &[&str]) -> csv::Result<csv::Writer<std::fs::File>> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    w.write_record(header)?;
    Ok(w)
}

fn write_rows<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> io::Result<()> {
    let run = || -> csv::Result<()> {
        let mut w = csv_writer(path, header)?;
        for row in rows {
            w.serialize(row)?;
        }
        w.flush()?;
        Ok(())
    };
    run().map_err(io::Error::other)
}

fn write_files(
    files: &CandidateFiles,
    record: &CandidateRecord,
    extra: &ExtraCurricularRecord,
    scores: &ScoreBreakdown,
    usage: &TokenUsage,
) -> io::Result<()> {
    let m = &record.metadata;
    let metadata = MetadataRow {
        name: m.name.clone(),
        gender: m.gender.clone(),
        reg_no: m.reg_no.clone(),
        dob: m.dob.clone(),
        email: m.email.clone(),
        phone: m.phone.clone(),
        mobile: m.mobile.clone(),
        branch: m.branch.clone(),
        degree: m.degree.clone(),
        total_score: scores.total,
        academic_score: scores.academic,
        technical_score: scores.technical,
        projects_score: scores.projects,
        extra_score: scores.extracurricular,
    };
    write_rows(&files.metadata, &METADATA_HEADER, &[metadata])?;

    write_rows(&files.academic, &ACADEMIC_HEADER, &record.academic_performance)?;

    write_rows(
        &files.skills,
        &SKILLS_HEADER,
        &[SkillsRow::from_skills(&record.technical_skills)],
    )?;

    let projects: Vec<ProjectRow> = record.projects.iter().map(ProjectRow::from_project).collect();
    write_rows(&files.projects, &PROJECTS_HEADER, &projects)?;

    let extra_row = ExtraRow {
        leadership: join_list(&extra.leadership),
        awards: join_list(&extra.awards),
        certifications: join_list(&extra.certifications),
        activities: join_list(&extra.activities),
        languages: join_list(&extra.languages),
    };
    write_rows(&files.extracurricular, &EXTRA_HEADER, &[extra_row])?;

    let response = LlmResponseFile {
        response: record,
        usage: UsageBody {
            completion_tokens: usage.completion_tokens,
            prompt_tokens: usage.prompt_tokens,
            total_tokens: usage.total_tokens,
        },
    };
    let json = serde_json::to_string_pretty(&response).map_err(io::Error::other)?;
    std::fs::write(&files.llm_response, json)
}

/// Write all output files for one candidate under `<parsed_root>/<id>/`,
/// replacing any previous output for the same id.
pub fn save_candidate(
    parsed_root: &Path,
    id: &str,
    record: &CandidateRecord,
    extra: &ExtraCurricularRecord,
    scores: &ScoreBreakdown,
    usage: &TokenUsage,
) -> Result<CandidateFiles, ResumeParserError> {
    check_identifier(id)?;
    std::fs::create_dir_all(parsed_root).map_err(write_failed(parsed_root))?;

    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(parsed_root)
        .map_err(write_failed(parsed_root))?;

    let staged = CandidateFiles::in_dir(staging.path().to_path_buf(), id);
    write_files(&staged, record, extra, scores, usage).map_err(write_failed(&staged.dir))?;

    let target = CandidateFiles::new(parsed_root, id);
    replace_dir(parsed_root, staging.path(), &target.dir).map_err(write_failed(&target.dir))?;

    debug!("Saved parsed data to {}", target.dir.display());
    Ok(target)
}

fn check_identifier(id: &str) -> Result<(), ResumeParserError> {
    if is_valid_identifier(id) {
        Ok(())
    } else {
        Err(ResumeParserError::InvalidIdentifier { id: id.to_string() })
    }
}

/// Move `staged` to `target`. An existing `target` is first moved into a
/// `.retired-*` directory under `parsed_root` and only deleted once the new
/// directory is in place; if the final rename fails it is moved back.
fn replace_dir(parsed_root: &Path, staged: &Path, target: &Path) -> io::Result<()> {
    let retired = if target.exists() {
        let holder = tempfile::Builder::new()
            .prefix(".retired-")
            .tempdir_in(parsed_root)?;
        let aside = holder.path().join("previous");
        std::fs::rename(target, &aside)?;
        Some((holder, aside))
    } else {
        None
    };

    if let Err(e) = std::fs::rename(staged, target) {
        if let Some((_, aside)) = &retired {
            if let Err(restore) = std::fs::rename(aside, target) {
                warn!(
                    "Could not restore {} from {}: {}",
                    target.display(),
                    aside.display(),
                    restore
                );
            }
        }
        return Err(e);
    }
    // Dropping the holder removes the previous output.
    drop(retired);
    Ok(())
}

/// Write `token_usage.csv` in one go (temp file + rename).
pub fn write_token_usage(parsed_root: &Path, usages: &[TokenUsage]) -> Result<PathBuf, ResumeParserError> {
    std::fs::create_dir_all(parsed_root).map_err(write_failed(parsed_root))?;
    let path = parsed_root.join(TOKEN_USAGE_FILE);
    let tmp = parsed_root.join(format!("{TOKEN_USAGE_FILE}.tmp"));

    write_rows(&tmp, &USAGE_HEADER, usages).map_err(write_failed(&path))?;
    std::fs::rename(&tmp, &path).map_err(write_failed(&path))?;
    Ok(path)
}

// ── Reading ──────────────────────────────────────────────────────────────────

/// A candidate as reconstructed from its CSV files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedCandidate {
    pub record: CandidateRecord,
    pub extra_curricular: ExtraCurricularRecord,
    pub scores: ScoreBreakdown,
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, ResumeParserError> {
    let unreadable = |e: csv::Error| ResumeParserError::ParsedDataUnreadable {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };
    let mut reader = csv::Reader::from_path(path).map_err(unreadable)?;
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(unreadable)
}

fn read_single<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ResumeParserError> {
    read_rows(path)?
        .into_iter()
        .next()
        .ok_or_else(|| ResumeParserError::ParsedDataUnreadable {
            path: path.to_path_buf(),
            detail: "no data row".to_string(),
        })
}

/// Re-read the five CSV files of candidate `id` under `parsed_root`.
pub fn load_candidate(parsed_root: &Path, id: &str) -> Result<LoadedCandidate, ResumeParserError> {
    check_identifier(id)?;
    let files = CandidateFiles::new(parsed_root, id);

    let m: MetadataRow = read_single(&files.metadata)?;
    let academic_performance: Vec<AcademicRecord> = read_rows(&files.academic)?;
    let technical_skills = read_single::<SkillsRow>(&files.skills)?.into_skills();
    let projects = read_rows::<ProjectRow>(&files.projects)?
        .into_iter()
        .map(ProjectRow::into_project)
        .collect();
    let e: ExtraRow = read_single(&files.extracurricular)?;

    Ok(LoadedCandidate {
        record: CandidateRecord {
            metadata: StudentMetadata {
                name: m.name,
                gender: m.gender,
                reg_no: m.reg_no,
                dob: m.dob,
                email: m.email,
                phone: m.phone,
                mobile: m.mobile,
                branch: m.branch,
                degree: m.degree,
            },
            academic_performance,
            projects,
            technical_skills,
        },
        extra_curricular: ExtraCurricularRecord {
            leadership: split_list(&e.leadership),
            awards: split_list(&e.awards),
            certifications: split_list(&e.certifications),
            activities: split_list(&e.activities),
            languages: split_list(&e.languages),
        },
        scores: ScoreBreakdown {
            academic: m.academic_score,
            technical: m.technical_score,
            projects: m.projects_score,
            extracurricular: m.extra_score,
            total: m.total_score,
        },
    })
}

/// Read `token_usage.csv` back.
pub fn read_token_usage(parsed_root: &Path) -> Result<Vec<TokenUsage>, ResumeParserError> {
    read_rows(&parsed_root.join(TOKEN_USAGE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> (CandidateRecord, ExtraCurricularRecord, ScoreBreakdown, TokenUsage) {
        let record = CandidateRecord {
            metadata: StudentMetadata {
                name: "Asha Rao".into(),
                gender: "Female".into(),
                reg_no: "221CS101".into(),
                dob: "01/02/2003".into(),
                email: "asha@example.com".into(),
                phone: "NA".into(),
                mobile: "9876543210".into(),
                branch: "Computer Science, Engineering".into(),
                degree: "B.Tech".into(),
            },
            academic_performance: vec![
                AcademicRecord {
                    semester: 1,
                    duration: "Dec 2022".into(),
                    sgpa: 9.0,
                    cgpa: 9.0,
                    degree: "B.Tech".into(),
                },
                AcademicRecord {
                    semester: 2,
                    duration: "May 2023".into(),
                    sgpa: 8.5,
                    cgpa: 8.75,
                    degree: "B.Tech".into(),
                },
            ],
            projects: vec![Project {
                name: "Distributed \"KV\" store".into(),
                company: "Acme Labs".into(),
                duration: "Jun 2024 - Aug 2024".into(),
                skill: SkillSet {
                    programming_languages: strings(&["Rust", "Go"]),
                    databases: strings(&["RocksDB"]),
                    ..Default::default()
                },
            }],
            technical_skills: SkillSet {
                programming_languages: strings(&["Rust", "C++", "Python"]),
                frameworks: strings(&["Axum"]),
                databases: vec![],
                other_technologies: strings(&["Docker", "Git"]),
                knowledge_area: strings(&["Operating Systems"]),
            },
        };
        let extra = ExtraCurricularRecord {
            leadership: strings(&["Coordinator of the robotics club at NITK"]),
            languages: strings(&["English, Hindi and Kannada fluently spoken"]),
            ..Default::default()
        };
        let scores = ScoreBreakdown {
            academic: 18.19,
            technical: 21.0,
            projects: 4.2,
            extracurricular: 1.88,
            total: 45.27,
        };
        let usage = TokenUsage {
            reg_no: "221CS101".into(),
            prompt_tokens: 1500,
            completion_tokens: 420,
            total_tokens: 1920,
        };
        (record, extra, scores, usage)
    }

    #[test]
    fn save_then_load_reconstructs_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let (record, extra, scores, usage) = sample();

        let files = save_candidate(dir.path(), "221CS101", &record, &extra, &scores, &usage).unwrap();
        assert!(files.metadata.ends_with("221CS101/221CS101_metadata.csv"));
        assert!(files.llm_response.exists());

        let loaded = load_candidate(dir.path(), "221CS101").unwrap();
        assert_eq!(loaded.record, record);
        assert_eq!(loaded.extra_curricular, extra);
        assert_eq!(loaded.scores, scores);
    }

    #[test]
    fn multi_value_fields_are_semicolon_joined() {
        let dir = tempfile::tempdir().unwrap();
        let (record, extra, scores, usage) = sample();
        let files = save_candidate(dir.path(), "221CS101", &record, &extra, &scores, &usage).unwrap();

        let skills = std::fs::read_to_string(&files.skills).unwrap();
        let mut lines = skills.lines();
        assert_eq!(
            lines.next(),
            Some("programming_languages,frameworks,databases,other_technologies,knowledge_area")
        );
        assert_eq!(lines.next(), Some("Rust;C++;Python,Axum,,Docker;Git,Operating Systems"));
    }

    #[test]
    fn metadata_carries_score_columns() {
        let dir = tempfile::tempdir().unwrap();
        let (record, extra, scores, usage) = sample();
        let files = save_candidate(dir.path(), "221CS101", &record, &extra, &scores, &usage).unwrap();

        let text = std::fs::read_to_string(&files.metadata).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.ends_with("total_score,academic_score,technical_score,projects_score,extra_score"));
        assert!(text.contains("45.27"));
    }

    #[test]
    fn llm_response_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        let (record, extra, scores, usage) = sample();
        let files = save_candidate(dir.path(), "221CS101", &record, &extra, &scores, &usage).unwrap();

        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&files.llm_response).unwrap()).unwrap();
        assert_eq!(v["response"]["metadata"]["reg_no"], "221CS101");
        assert_eq!(v["usage"]["total_tokens"], 1920);
    }

    #[test]
    fn empty_lists_round_trip_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let (mut record, _, scores, usage) = sample();
        record.academic_performance.clear();
        record.projects.clear();
        record.technical_skills = SkillSet::default();
        let extra = ExtraCurricularRecord::default();

        let files = save_candidate(dir.path(), "X1", &record, &extra, &scores, &usage).unwrap();
        let academic = std::fs::read_to_string(&files.academic).unwrap();
        assert_eq!(academic.trim_end(), "semester,duration,sgpa,cgpa,degree");

        let loaded = load_candidate(dir.path(), "X1").unwrap();
        assert_eq!(loaded.record, record);
        assert!(loaded.extra_curricular.is_empty());
    }

    #[test]
    fn single_empty_string_item_is_lossy() {
        let dir = tempfile::tempdir().unwrap();
        let (record, _, scores, usage) = sample();
        let extra = ExtraCurricularRecord {
            awards: vec![String::new()],
            ..Default::default()
        };
        save_candidate(dir.path(), "X2", &record, &extra, &scores, &usage).unwrap();
        let loaded = load_candidate(dir.path(), "X2").unwrap();
        assert!(loaded.extra_curricular.awards.is_empty());
    }

    #[test]
    fn save_replaces_previous_output_and_leaves_no_staging() {
        let dir = tempfile::tempdir().unwrap();
        let (record, extra, scores, usage) = sample();
        let stale = dir.path().join("221CS101").join("stale.txt");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "old").unwrap();

        save_candidate(dir.path(), "221CS101", &record, &extra, &scores, &usage).unwrap();
        assert!(!stale.exists());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(".staging-"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn dot_identifiers_are_rejected_before_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let parsed_root = out.join(PARSED_DIR);
        let split_pdf = out.join(PDF_DIR).join("221CS101.pdf");
        std::fs::create_dir_all(split_pdf.parent().unwrap()).unwrap();
        std::fs::write(&split_pdf, b"%PDF").unwrap();

        let (record, extra, scores, usage) = sample();
        save_candidate(&parsed_root, "221CS101", &record, &extra, &scores, &usage).unwrap();

        for id in ["..", ".", "", "a/b"] {
            let err = save_candidate(&parsed_root, id, &record, &extra, &scores, &usage).unwrap_err();
            assert!(matches!(err, ResumeParserError::InvalidIdentifier { .. }), "{id:?}: {err}");
            assert!(matches!(
                load_candidate(&parsed_root, id),
                Err(ResumeParserError::InvalidIdentifier { .. })
            ));
        }

        assert!(split_pdf.exists());
        assert!(load_candidate(&parsed_root, "221CS101").is_ok());
    }

    #[test]
    fn failed_replace_keeps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("221CS101");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("old.csv"), "old").unwrap();

        let missing = dir.path().join("never-staged");
        assert!(replace_dir(dir.path(), &missing, &target).is_err());
        assert_eq!(std::fs::read_to_string(target.join("old.csv")).unwrap(), "old");

        let staged = dir.path().join("staged");
        std::fs::create_dir_all(&staged).unwrap();
        std::fs::write(staged.join("new.csv"), "new").unwrap();
        replace_dir(dir.path(), &staged, &target).unwrap();
        assert!(!target.join("old.csv").exists());
        assert!(target.join("new.csv").exists());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(".retired-"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn token_usage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (_, _, _, usage) = sample();
        let other = TokenUsage {
            reg_no: "221EC042".into(),
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        write_token_usage(dir.path(), &[usage.clone(), other.clone()]).unwrap();
        assert_eq!(read_token_usage(dir.path()).unwrap(), vec![usage, other]);
    }
}
