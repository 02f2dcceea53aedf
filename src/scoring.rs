//! Composite candidate score.
//!
//! | Sub-score        | Max | Input                                          |
//! |------------------|-----|------------------------------------------------|
//! | academic         | 20  | mean CGPA and SGPA consistency                 |
//! | technical        | 35  | size of each of the five skill lists           |
//! | projects         | 30  | internships, per-project skill breadth         |
//! | extracurricular  | 15  | items found by [`crate::sections`]             |
//!
//! Every function here is pure. Sub-scores are rounded to two decimals; the
//! total is the rounded sum of the *unrounded* sub-scores, so it can differ
//! from the sum of the rounded parts by at most 0.02.

use crate::error::ScoringValueError;
use crate::model::{AcademicRecord, CandidateRecord, ExtraCurricularRecord, Project, SkillSet};
use serde::{Deserialize, Serialize};

pub const ACADEMIC_MAX: f64 = 20.0;
pub const TECHNICAL_MAX: f64 = 35.0;
pub const PROJECTS_MAX: f64 = 30.0;
pub const EXTRACURRICULAR_MAX: f64 = 15.0;

/// Companies that mark a project as not being an internship.
const NON_INTERNSHIP_COMPANIES: [&str; 3] = ["personal", "na", "n/a"];

/// Normalisation denominators for the open-ended sub-scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Raw project points that map to the full 30. Default: 100.
    pub projects_max_points: f64,
    /// Raw extra-curricular points that map to the full 15. Default: 8.
    pub extracurricular_max_points: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            projects_max_points: 100.0,
            extracurricular_max_points: 8.0,
        }
    }
}

/// The four sub-scores and their total, each rounded to two decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub academic: f64,
    pub technical: f64,
    pub projects: f64,
    pub extracurricular: f64,
    pub total: f64,
}

/// Step function over item counts: none → 0, a few → 1, more than three → 2.
pub fn count_points(n: usize) -> u32 {
    match n {
        0 => 0,
        1..=3 => 1,
        _ => 2,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 for fewer than two values.
fn pstdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Academic sub-score, unrounded.
pub fn academic_score(records: &[AcademicRecord]) -> Result<f64, ScoringValueError> {
    if records.is_empty() {
        return Ok(0.0);
    }
    for record in records {
        record.validate()?;
    }

    let cgpas: Vec<f64> = records.iter().map(|r| r.cgpa).collect();
    let sgpas: Vec<f64> = records.iter().map(|r| r.sgpa).collect();

    let raw = mean(&cgpas) * 0.75 + (10.0 - pstdev(&sgpas)) * 0.25;
    Ok((raw * 2.0).min(ACADEMIC_MAX))
}

/// Technical sub-score, unrounded.
pub fn technical_score(skills: &SkillSet) -> f64 {
    let points: u32 = skills.lists().iter().map(|list| count_points(list.len())).sum();
    (f64::from(points) / 10.0 * TECHNICAL_MAX).min(TECHNICAL_MAX)
}

/// Raw points for a single project, 5 to 20.
pub fn project_points(project: &Project) -> f64 {
    let company = project.company.trim().to_lowercase();
    let internship = if NON_INTERNSHIP_COMPANIES.contains(&company.as_str()) {
        0.0
    } else {
        5.0
    };
    let relevance = (f64::from(count_points(project.skill.relevance_count())) * 2.0).min(10.0);
    5.0 + internship + relevance
}

/// Projects sub-score, unrounded.
pub fn projects_score(projects: &[Project], config: &ScoringConfig) -> f64 {
    let points: f64 = projects.iter().map(project_points).sum();
    (points / config.projects_max_points * PROJECTS_MAX).min(PROJECTS_MAX)
}

/// Extra-curricular sub-score, unrounded.
pub fn extracurricular_score(extra: &ExtraCurricularRecord, config: &ScoringConfig) -> f64 {
    let points = f64::from(count_points(extra.scored_count()));
    (points / config.extracurricular_max_points * EXTRACURRICULAR_MAX).min(EXTRACURRICULAR_MAX)
}

/// Score a candidate from its parts.
pub fn score(
    academic: &[AcademicRecord],
    technical: &SkillSet,
    projects: &[Project],
    extra: &ExtraCurricularRecord,
    config: &ScoringConfig,
) -> Result<ScoreBreakdown, ScoringValueError> {
    let a = academic_score(academic)?;
    let t = technical_score(technical);
    let p = projects_score(projects, config);
    let e = extracurricular_score(extra, config);

    Ok(ScoreBreakdown {
        academic: round2(a),
        technical: round2(t),
        projects: round2(p),
        extracurricular: round2(e),
        total: round2(a + t + p + e),
    })
}

/// Score an extracted record together with its extra-curricular sections.
pub fn compute_score(
    record: &CandidateRecord,
    extra: &ExtraCurricularRecord,
    config: &ScoringConfig,
) -> Result<ScoreBreakdown, ScoringValueError> {
    score(
        &record.academic_performance,
        &record.technical_skills,
        &record.projects,
        extra,
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sem(semester: u32, sgpa: f64, cgpa: f64) -> AcademicRecord {
        AcademicRecord {
            semester,
            duration: "Dec 2023".into(),
            sgpa,
            cgpa,
            degree: "B.Tech".into(),
        }
    }

    fn strings(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("item{i}")).collect()
    }

    fn project(company: &str, skills: usize) -> Project {
        Project {
            name: "Compiler".into(),
            company: company.into(),
            duration: "3 months".into(),
            skill: SkillSet {
                programming_languages: strings(skills),
                ..Default::default()
            },
        }
    }

    #[test]
    fn count_points_steps() {
        assert_eq!(count_points(0), 0);
        assert_eq!(count_points(1), 1);
        assert_eq!(count_points(3), 1);
        assert_eq!(count_points(4), 2);
        assert_eq!(count_points(40), 2);
    }

    #[test]
    fn academic_worked_example() {
        let records = [sem(1, 9.0, 9.0), sem(2, 8.5, 8.75)];
        let a = academic_score(&records).unwrap();
        assert_eq!(round2(a), 18.19);
    }

    #[test]
    fn academic_single_semester_has_no_spread_penalty() {
        let a = academic_score(&[sem(1, 7.0, 8.0)]).unwrap();
        assert!((a - (8.0 * 0.75 + 10.0 * 0.25) * 2.0).abs() < 1e-9);
    }

    #[test]
    fn academic_is_capped() {
        let a = academic_score(&[sem(1, 10.0, 10.0), sem(2, 10.0, 10.0)]).unwrap();
        assert_eq!(a, ACADEMIC_MAX);
    }

    #[test]
    fn academic_empty_is_zero() {
        assert_eq!(academic_score(&[]).unwrap(), 0.0);
    }

    #[test]
    fn academic_rejects_out_of_range() {
        let err = academic_score(&[sem(1, 8.0, 84.0)]).unwrap_err();
        assert!(matches!(err, ScoringValueError::OutOfRange { semester: 1, .. }));
    }

    #[test]
    fn technical_worked_example() {
        let skills = SkillSet {
            programming_languages: strings(2),
            frameworks: strings(1),
            databases: strings(1),
            other_technologies: strings(1),
            knowledge_area: strings(1),
        };
        assert_eq!(technical_score(&skills), 17.5);
    }

    #[test]
    fn technical_maxes_out_at_35() {
        let skills = SkillSet {
            programming_languages: strings(4),
            frameworks: strings(4),
            databases: strings(4),
            other_technologies: strings(4),
            knowledge_area: strings(4),
        };
        assert_eq!(technical_score(&skills), TECHNICAL_MAX);
    }

    #[test]
    fn internship_earns_bonus() {
        assert_eq!(project_points(&project("personal", 0)), 5.0);
        assert_eq!(project_points(&project("N/A", 0)), 5.0);
        assert_eq!(project_points(&project("Acme Corp", 0)), 10.0);
        assert_eq!(project_points(&project("Acme Corp", 2)), 12.0);
        assert_eq!(project_points(&project("Acme Corp", 5)), 14.0);
    }

    #[test]
    fn projects_score_is_normalised_and_capped() {
        let config = ScoringConfig::default();
        let projects = vec![project("Acme", 5), project("personal", 1)];
        // 14 + 7 = 21 points out of 100
        assert!((projects_score(&projects, &config) - 6.3).abs() < 1e-9);

        let many: Vec<Project> = (0..20).map(|_| project("Acme", 5)).collect();
        assert_eq!(projects_score(&many, &config), PROJECTS_MAX);
    }

    #[test]
    fn extracurricular_ignores_languages() {
        let config = ScoringConfig::default();
        let only_languages = ExtraCurricularRecord {
            languages: strings(5),
            ..Default::default()
        };
        assert_eq!(extracurricular_score(&only_languages, &config), 0.0);

        let busy = ExtraCurricularRecord {
            leadership: strings(2),
            awards: strings(2),
            ..Default::default()
        };
        // 2 points out of 8
        assert_eq!(extracurricular_score(&busy, &config), 3.75);
    }

    #[test]
    fn empty_candidate_scores_zero() {
        let s = score(
            &[],
            &SkillSet::default(),
            &[],
            &ExtraCurricularRecord::default(),
            &ScoringConfig::default(),
        )
        .unwrap();
        assert_eq!(s, ScoreBreakdown::default());
    }

    #[test]
    fn total_matches_sum_and_stays_in_bounds() {
        let config = ScoringConfig::default();
        let extra = ExtraCurricularRecord {
            leadership: strings(3),
            certifications: strings(3),
            ..Default::default()
        };
        let cases: Vec<(Vec<AcademicRecord>, usize, Vec<Project>)> = vec![
            (vec![sem(1, 9.0, 9.0), sem(2, 8.5, 8.75)], 2, vec![project("Acme", 3)]),
            (vec![sem(1, 6.13, 6.13)], 0, vec![]),
            (
                vec![sem(1, 10.0, 10.0), sem(2, 10.0, 10.0)],
                6,
                (0..30).map(|_| project("Acme", 6)).collect(),
            ),
            (vec![sem(1, 0.0, 0.0), sem(2, 10.0, 5.0), sem(3, 3.3, 4.4)], 1, vec![project("na", 0)]),
        ];

        for (academic, skill_count, projects) in cases {
            let skills = SkillSet {
                programming_languages: strings(skill_count),
                frameworks: strings(skill_count),
                ..Default::default()
            };
            let s = score(&academic, &skills, &projects, &extra, &config).unwrap();
            let sum = s.academic + s.technical + s.projects + s.extracurricular;
            assert!((s.total - sum).abs() <= 0.1, "{s:?}");
            assert!((0.0..=100.0).contains(&s.total), "{s:?}");
            assert!(s.academic <= ACADEMIC_MAX);
            assert!(s.technical <= TECHNICAL_MAX);
            assert!(s.projects <= PROJECTS_MAX);
            assert!(s.extracurricular <= EXTRACURRICULAR_MAX);
        }
    }

    #[test]
    fn custom_denominators_are_respected() {
        let config = ScoringConfig {
            projects_max_points: 10.0,
            extracurricular_max_points: 2.0,
        };
        assert_eq!(projects_score(&[project("personal", 0)], &config), 15.0);
        let extra = ExtraCurricularRecord {
            awards: strings(1),
            ..Default::default()
        };
        assert_eq!(extracurricular_score(&extra, &config), 7.5);
    }
}
