// Prompt templates for the LLM narrative backend.
// Placeholders are substituted with str::replace before the call.

pub const NARRATIVE_SYSTEM: &str = "You are a career coach reviewing a candidate's resume \
against a job description. You only use facts present in the supplied resume excerpt, \
retrieved resume passages and computed analysis. You respond with a single JSON object and \
nothing else.";

pub const NARRATIVE_PROMPT_TEMPLATE: &str = r#"Job description:
{job_text}

Resume excerpt:
{resume_excerpt}

Most relevant resume passages:
{retrieval_context}

Skill analysis (computed):
{skill_analysis}

ATS result (computed):
{ats_result}

Write a skill-gap summary, a 30/60/90-day learning plan focused on the missing skills, and
concrete resume improvement tips. Return JSON with exactly this shape:
{
  "skill_gap_summary": "string",
  "roadmap": {
    "plan_30_days": "string",
    "plan_60_days": "string",
    "plan_90_days": "string",
    "raw_reasoning": "string or null"
  },
  "resume_improvement_tips": "string"
}"#;
