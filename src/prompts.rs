//! Prompts for LLM field extraction.
//!
//! Callers can override the system prompt via
//! [`crate::config::ParserConfig::system_prompt`]; the constant here is used
//! only when no override is provided. The JSON shape described in the prompt
//! must stay in step with [`crate::model::CandidateRecord`].

/// Default system prompt for turning resume text into a candidate record.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert resume parsing system. Extract the exact information mentioned in the resume into a structured JSON object.

Rules:
- Return ONLY a JSON object, no commentary and no Markdown fences.
- If a text field is missing, use "NA".
- semester, sgpa and cgpa must be numbers. Leave out any semester whose grades are not stated.
- For internships, "company" is the company name. For personal or academic projects use "personal".
- Skill lists may be empty but must be present.

The output must match this structure exactly:

{
  "metadata": {"name", "gender", "reg_no", "dob", "email", "phone", "mobile", "branch", "degree"},
  "academic_performance": [{"semester", "duration", "sgpa", "cgpa", "degree"}],
  "projects": [{"name", "company", "duration",
                "skill": {"programming_languages": [], "frameworks": [], "databases": [],
                          "other_technologies": [], "knowledge_area": []}}],
  "technical_skills": {"programming_languages": [], "frameworks": [], "databases": [],
                       "other_technologies": [], "knowledge_area": []}
}"#;

/// User message carrying the candidate's full resume text.
pub fn candidate_message(text: &str) -> String {
    format!("Candidate resume:\n\n{text}")
}
