//! Narrative generation: gap summary, 30/60/90-day plan and résumé tips.
//!
//! Pluggable behind `NarrativeGenerator`. Default: `RuleBasedNarrator`
//! (templated, deterministic). `LlmNarrator` asks the LLM client for the same
//! JSON shape. The pipeline substitutes `degraded_narrative` on any failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analysis::ats::AtsResult;
use crate::analysis::prompts::{NARRATIVE_PROMPT_TEMPLATE, NARRATIVE_SYSTEM};
use crate::analysis::skills::SkillAnalysis;
use crate::errors::AppError;
use crate::llm_client::LlmClient;

const MAX_LISTED_SKILLS: usize = 20;
const PLAN_SLICE: usize = 5;
/// Retrieval context is truncated to this many characters before prompting.
const MAX_CONTEXT_CHARS: usize = 6000;
const MAX_RESUME_EXCERPT_CHARS: usize = 2000;

const UNAVAILABLE: &str = "Narrative generator not available.";

const IMPROVEMENT_TIPS: &str = "To improve ATS compatibility, weave missing job keywords \
    naturally into your resume, ensure key sections (Experience, Education, Skills, Projects) \
    are clearly labeled, and keep formatting simple so automated parsers can read it reliably.";

const RULE_REASONING: &str =
    "Roadmap generated from simple rules using missing and matched skills.";

/// Everything the generator may look at.
pub struct NarrativeInput<'a> {
    pub resume_text: &'a str,
    pub job_text: &'a str,
    pub retrieval_context: &'a str,
    pub skills: &'a SkillAnalysis,
    pub ats: &'a AtsResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    pub plan_30_days: String,
    pub plan_60_days: String,
    pub plan_90_days: String,
    #[serde(default)]
    pub raw_reasoning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub skill_gap_summary: String,
    pub roadmap: Roadmap,
    pub resume_improvement_tips: String,
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, input: &NarrativeInput<'_>) -> Result<Narrative, AppError>;

    /// "rules" or "llm", for logs.
    fn backend(&self) -> &'static str;
}

/// Placeholder narrative used when the generator fails.
pub fn degraded_narrative(cause: &str) -> Narrative {
    Narrative {
        skill_gap_summary: format!("Narrative analysis unavailable: {cause}"),
        roadmap: Roadmap {
            plan_30_days: UNAVAILABLE.to_string(),
            plan_60_days: UNAVAILABLE.to_string(),
            plan_90_days: UNAVAILABLE.to_string(),
            raw_reasoning: None,
        },
        resume_improvement_tips: UNAVAILABLE.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RuleBasedNarrator
// ────────────────────────────────────────────────────────────────────────────

pub struct RuleBasedNarrator;

#[async_trait]
impl NarrativeGenerator for RuleBasedNarrator {
    async fn generate(&self, input: &NarrativeInput<'_>) -> Result<Narrative, AppError> {
        Ok(build_rule_narrative(input.skills, input.ats))
    }

    fn backend(&self) -> &'static str {
        "rules"
    }
}

fn list_skills(skills: &[String]) -> String {
    let shown = skills
        .iter()
        .take(MAX_LISTED_SKILLS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if skills.len() > MAX_LISTED_SKILLS {
        format!("{shown}...")
    } else {
        shown
    }
}

/// Joins `missing[from..from + PLAN_SLICE]`, or `fallback` when that slice is empty.
fn plan_focus(missing: &[String], from: usize, fallback: &str) -> String {
    let slice: Vec<&str> = missing
        .iter()
        .skip(from)
        .take(PLAN_SLICE)
        .map(String::as_str)
        .collect();
    if slice.is_empty() {
        fallback.to_string()
    } else {
        slice.join(", ")
    }
}

fn build_rule_narrative(skills: &SkillAnalysis, ats: &AtsResult) -> Narrative {
    let missing = &skills.missing_skills;
    let matched = &skills.matched_skills;

    let mut gap_lines = Vec::new();
    if missing.is_empty() {
        gap_lines.push("Your skills closely match the job requirements.".to_string());
    } else {
        gap_lines.push(format!(
            "Your profile is missing several skills mentioned in the job description: {}",
            list_skills(missing)
        ));
    }
    if !matched.is_empty() {
        gap_lines.push(format!(
            "You already demonstrate strength in: {}",
            list_skills(matched)
        ));
    }
    gap_lines.push(format!(
        "Current ATS score is {:.1}/100 with keyword match {:.1}/100 and semantic similarity {:.2}.",
        ats.score, ats.keyword_match_score, ats.semantic_similarity_score
    ));

    let early = plan_focus(missing, 0, "core job-related fundamentals");
    let mid = plan_focus(missing, PLAN_SLICE, "projects that deepen your existing skills");
    let late = plan_focus(
        missing,
        PLAN_SLICE * 2,
        "advanced topics and interview preparation",
    );

    Narrative {
        skill_gap_summary: gap_lines.join("\n"),
        roadmap: Roadmap {
            plan_30_days: format!(
                "Focus on building strong foundations for the most critical missing skills: {early}."
            ),
            plan_60_days: format!(
                "Consolidate your knowledge with 1-2 portfolio projects highlighting: {mid}."
            ),
            plan_90_days: format!(
                "Polish your profile with advanced topics, systematic practice, and interview prep around: {late}."
            ),
            raw_reasoning: Some(RULE_REASONING.to_string()),
        },
        resume_improvement_tips: IMPROVEMENT_TIPS.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmNarrator
// ────────────────────────────────────────────────────────────────────────────

/// Narrative via the LLM client. Selected at startup when an API key is configured.
pub struct LlmNarrator(pub LlmClient);

#[async_trait]
impl NarrativeGenerator for LlmNarrator {
    async fn generate(&self, input: &NarrativeInput<'_>) -> Result<Narrative, AppError> {
        let prompt = build_llm_prompt(input)?;
        self.0
            .call_json::<Narrative>(&prompt, NARRATIVE_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("Narrative generation failed: {e}")))
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

fn build_llm_prompt(input: &NarrativeInput<'_>) -> Result<String, AppError> {
    let skills_json = serde_json::to_string_pretty(input.skills)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize skills: {e}")))?;
    let ats_json = serde_json::to_string_pretty(input.ats)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize ATS result: {e}")))?;
    let context: String = input.retrieval_context.chars().take(MAX_CONTEXT_CHARS).collect();
    let excerpt: String = input.resume_text.chars().take(MAX_RESUME_EXCERPT_CHARS).collect();

    Ok(NARRATIVE_PROMPT_TEMPLATE
        .replace("{job_text}", input.job_text)
        .replace("{resume_excerpt}", &excerpt)
        .replace("{retrieval_context}", &context)
        .replace("{skill_analysis}", &skills_json)
        .replace("{ats_result}", &ats_json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ats::ATS_EXPLANATION;

    fn skills(matched: &[&str], missing: &[&str]) -> SkillAnalysis {
        let to_vec = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        SkillAnalysis {
            resume_skills: to_vec(matched),
            job_skills: [to_vec(matched), to_vec(missing)].concat(),
            matched_skills: to_vec(matched),
            missing_skills: to_vec(missing),
            tools: vec![],
            education: vec![],
            experience_summary: String::new(),
        }
    }

    fn ats() -> AtsResult {
        AtsResult {
            score: 62.5,
            keyword_match_score: 50.0,
            semantic_similarity_score: 0.71,
            section_completeness_score: 75.0,
            explanation: ATS_EXPLANATION.to_string(),
            matched_keywords: vec![],
            missing_keywords: vec![],
            diagnostic: None,
        }
    }

    #[test]
    fn test_no_missing_skills_says_close_match() {
        let narrative = build_rule_narrative(&skills(&["python"], &[]), &ats());
        assert!(narrative.skill_gap_summary.contains("closely match"));
        assert!(narrative.skill_gap_summary.contains("python"));
        assert!(narrative.roadmap.plan_30_days.contains("core job-related fundamentals"));
        assert!(narrative.roadmap.plan_90_days.contains("interview preparation"));
    }

    #[test]
    fn test_missing_skills_are_sliced_across_plans() {
        let missing: Vec<String> = (0..12).map(|i| format!("skill{i:02}")).collect();
        let refs: Vec<&str> = missing.iter().map(String::as_str).collect();
        let narrative = build_rule_narrative(&skills(&[], &refs), &ats());

        assert!(narrative.roadmap.plan_30_days.contains("skill00, skill01, skill02, skill03, skill04."));
        assert!(narrative.roadmap.plan_60_days.contains("skill05"));
        assert!(narrative.roadmap.plan_60_days.contains("skill09."));
        assert!(narrative.roadmap.plan_90_days.contains("skill10, skill11."));
        assert!(!narrative.skill_gap_summary.contains("already demonstrate"));
    }

    #[test]
    fn test_long_skill_lists_are_truncated() {
        let many: Vec<String> = (0..25).map(|i| format!("s{i}")).collect();
        let listed = list_skills(&many);
        assert!(listed.ends_with("..."));
        assert!(!listed.contains("s20"));
    }

    #[test]
    fn test_summary_carries_ats_line() {
        let narrative = build_rule_narrative(&skills(&[], &["go"]), &ats());
        assert!(narrative.skill_gap_summary.contains("62.5/100"));
        assert!(narrative.skill_gap_summary.contains("0.71"));
        assert!(narrative.roadmap.raw_reasoning.is_some());
    }

    #[test]
    fn test_degraded_narrative_embeds_cause() {
        let narrative = degraded_narrative("timeout");
        assert_eq!(narrative.skill_gap_summary, "Narrative analysis unavailable: timeout");
        assert_eq!(narrative.roadmap.plan_60_days, UNAVAILABLE);
        assert!(narrative.roadmap.raw_reasoning.is_none());
    }

    #[test]
    fn test_llm_prompt_fills_placeholders() {
        let s = skills(&["sql"], &["kubernetes"]);
        let a = ats();
        let input = NarrativeInput {
            resume_text: "resume",
            job_text: "Need Kubernetes",
            retrieval_context: "chunk one",
            skills: &s,
            ats: &a,
        };
        let prompt = build_llm_prompt(&input).unwrap();
        assert!(prompt.contains("Need Kubernetes"));
        assert!(prompt.contains("chunk one"));
        assert!(prompt.contains("kubernetes"));
        assert!(!prompt.contains("{ats_result}"));
    }

    #[test]
    fn test_narrative_deserializes_without_reasoning() {
        let json = r#"{
            "skill_gap_summary": "gap",
            "roadmap": {"plan_30_days": "a", "plan_60_days": "b", "plan_90_days": "c"},
            "resume_improvement_tips": "tips"
        }"#;
        let narrative: Narrative = serde_json::from_str(json).unwrap();
        assert!(narrative.roadmap.raw_reasoning.is_none());
    }
}
