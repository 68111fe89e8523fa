//! Skill extraction: deterministic tokenizer plus set overlap between résumé and JD.
//!
//! The token grammar keeps `+`, `#`, `.` and `-` so names like "c++", "c#" and
//! "node.js" survive intact. Output depends only on the input text and the
//! fixed tables below.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\w+#.\-]{2,}").expect("token regex is valid")
});

const STOPWORDS: &[&str] = &[
    "the", "and", "a", "an", "of", "for", "to", "in", "on", "with", "at", "by", "is", "are",
    "was", "were", "be", "this", "that", "as", "or", "from", "your", "our", "we", "you", "i",
];

const KNOWN_TOOLS: &[&str] = &[
    "python",
    "pandas",
    "numpy",
    "sql",
    "postgresql",
    "mysql",
    "excel",
    "powerbi",
    "tableau",
    "docker",
    "kubernetes",
    "aws",
    "azure",
    "gcp",
    "git",
    "github",
    "gitlab",
    "tensorflow",
    "pytorch",
    "sklearn",
    "scikit-learn",
    "jira",
    "confluence",
];

/// (stems, label). Each level contributes its label at most once.
const DEGREE_LEVELS: &[(&[&str], &str)] = &[
    (&["bachelor", "b.sc", "bsc"], "Bachelor's degree"),
    (&["master", "m.sc", "msc"], "Master's degree"),
    (&["phd", "ph.d"], "PhD"),
];

const EXPERIENCE_SUMMARY: &str = "Experience details extracted from resume text.";

static STOPWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOPWORDS.iter().copied().collect());

/// Skills and tools found in a job description alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSkills {
    pub job_skills: Vec<String>,
    pub tools: Vec<String>,
}

/// Skill-set comparison between a résumé and a job description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillAnalysis {
    pub resume_skills: Vec<String>,
    pub job_skills: Vec<String>,
    /// resume ∩ job, sorted.
    pub matched_skills: Vec<String>,
    /// job − resume, sorted.
    pub missing_skills: Vec<String>,
    pub tools: Vec<String>,
    pub education: Vec<String>,
    pub experience_summary: String,
}

/// Lowercases `text` and returns its tokens in order, stopwords removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !STOPWORD_SET.contains(*t))
        .map(String::from)
        .collect()
}

/// De-duplicates while keeping first-occurrence order.
fn unique(tokens: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}

/// Known-tool vocabulary hits, sorted.
fn extract_tools<'a>(tokens: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let present: HashSet<&str> = tokens.into_iter().map(String::as_str).collect();
    KNOWN_TOOLS
        .iter()
        .filter(|tool| present.contains(**tool))
        .map(|tool| tool.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn detect_education(resume_text: &str) -> Vec<String> {
    let lowered = resume_text.to_lowercase();
    DEGREE_LEVELS
        .iter()
        .filter(|(stems, _)| stems.iter().any(|stem| lowered.contains(stem)))
        .map(|(_, label)| label.to_string())
        .collect()
}

pub fn extract_job_skills(job_text: &str) -> JobSkills {
    let tokens = tokenize(job_text);
    JobSkills {
        job_skills: unique(&tokens),
        tools: extract_tools(&tokens),
    }
}

pub fn extract_profile(resume_text: &str, job_text: &str) -> SkillAnalysis {
    let resume_tokens = tokenize(resume_text);
    let job_tokens = tokenize(job_text);

    let resume_skills = unique(&resume_tokens);
    let job_skills = unique(&job_tokens);

    let resume_set: BTreeSet<&String> = resume_skills.iter().collect();
    let job_set: BTreeSet<&String> = job_skills.iter().collect();

    let matched_skills = job_set.intersection(&resume_set).map(|s| s.to_string()).collect();
    let missing_skills = job_set.difference(&resume_set).map(|s| s.to_string()).collect();
    let tools = extract_tools(resume_tokens.iter().chain(job_tokens.iter()));

    SkillAnalysis {
        resume_skills,
        job_skills,
        matched_skills,
        missing_skills,
        tools,
        education: detect_education(resume_text),
        experience_summary: EXPERIENCE_SUMMARY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESUME: &str = "Experience: Built data pipelines in Python and SQL at Acme.\n\
        Education: Bachelor's in Computer Science.\n\
        Skills: Python, SQL, Docker\n\
        Projects: churn model";
    const JOB: &str = "Looking for Python, SQL, Kubernetes, Docker";

    #[test]
    fn test_tokenize_keeps_tech_punctuation() {
        let tokens = tokenize("C++ and C# with Node.js, scikit-learn");
        assert_eq!(tokens, vec!["c++", "c#", "node.js", "scikit-learn"]);
    }

    #[test]
    fn test_tokenize_drops_stopwords_and_short_tokens() {
        let tokens = tokenize("I am the x of Go");
        assert_eq!(tokens, vec!["am", "go"]);
    }

    #[test]
    fn test_tokenize_keeps_trailing_period() {
        let tokens = tokenize("Skills: Python, SQL, Docker.");
        assert_eq!(tokens, vec!["skills", "python", "sql", "docker."]);

        let analysis = extract_profile("Skills: Python, SQL, Docker.", "Docker");
        assert_eq!(analysis.missing_skills, vec!["docker"]);
    }

    #[test]
    fn test_tokenize_keeps_digits() {
        assert_eq!(tokenize("Python3 and S3"), vec!["python3", "s3"]);
    }

    #[test]
    fn test_job_skills_unique_in_first_occurrence_order() {
        let result = extract_job_skills("Docker python docker SQL python");
        assert_eq!(result.job_skills, vec!["docker", "python", "sql"]);
        assert_eq!(result.tools, vec!["docker", "python", "sql"]);
    }

    #[test]
    fn test_job_skills_deterministic() {
        let a = extract_job_skills(JOB);
        let b = extract_job_skills(JOB);
        assert_eq!(a, b);
    }

    #[test]
    fn test_profile_matched_and_missing() {
        let analysis = extract_profile(RESUME, JOB);
        for skill in ["python", "sql", "docker"] {
            assert!(analysis.matched_skills.contains(&skill.to_string()), "{skill}");
        }
        assert!(analysis.missing_skills.contains(&"kubernetes".to_string()));
        assert_eq!(analysis.education, vec!["Bachelor's degree"]);
    }

    #[test]
    fn test_matched_and_missing_partition_job_skills() {
        let analysis = extract_profile(RESUME, "Kubernetes, Python, Terraform and Go with SQL");
        let matched: BTreeSet<_> = analysis.matched_skills.iter().collect();
        let missing: BTreeSet<_> = analysis.missing_skills.iter().collect();
        let job: BTreeSet<_> = analysis.job_skills.iter().collect();

        assert!(matched.is_disjoint(&missing));
        let union: BTreeSet<_> = matched.union(&missing).copied().collect();
        assert_eq!(union, job);
    }

    #[test]
    fn test_matched_and_missing_are_sorted() {
        let analysis = extract_profile("zeta alpha", "zeta alpha omega beta");
        assert_eq!(analysis.matched_skills, vec!["alpha", "zeta"]);
        assert_eq!(analysis.missing_skills, vec!["beta", "omega"]);
    }

    #[test]
    fn test_tools_span_both_texts() {
        let analysis = extract_profile("pandas expert", "needs tableau");
        assert_eq!(analysis.tools, vec!["pandas", "tableau"]);
    }

    #[test]
    fn test_education_one_label_per_level() {
        let education = detect_education("BSc, B.Sc and Bachelor; MSc; Ph.D candidate");
        assert_eq!(education, vec!["Bachelor's degree", "Master's degree", "PhD"]);
    }

    #[test]
    fn test_education_none() {
        assert!(detect_education("Self-taught engineer").is_empty());
    }
}
