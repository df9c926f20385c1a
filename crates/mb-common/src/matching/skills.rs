use std::collections::BTreeMap;

use crate::normalize::{contains_ci, normalize_token};
use crate::JobRecord;

/// Generic technology vocabulary used by the keyword-floor fallback for
/// profiles with no rated skills. Deliberately coarse: the goal is to give
/// fresher profiles a non-zero skill signal, not to infer a stack.
const FALLBACK_VOCABULARY: &[&str] = &[
    "python", "java", "javascript", "typescript", "sql", "html", "css", "react", "node", "c++",
    "c#", "go", "rust", "php", "ruby", "kotlin", "swift", "aws", "docker", "linux", "git",
    "excel", "testing",
];

/// Hits from the fallback path are capped so a keyword-stuffed posting does
/// not award a zero-skill profile more credit than a real skill match.
pub const FALLBACK_MATCH_CAP: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillMatch {
    /// Fraction of the skill category cap earned, in [0, 1].
    pub ratio: f64,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    /// True when the keyword-floor fallback produced the score.
    pub used_fallback: bool,
}

/// Match rated candidate skills against the job's requirement strings by
/// case-insensitive substring. A requirement counts as matched when any
/// candidate skill appears inside it (or the requirement inside the skill,
/// for terse requirements like "SQL").
pub fn check_skills(requirements: &[String], skills: &BTreeMap<String, u8>) -> SkillMatch {
    if skills.is_empty() {
        return SkillMatch::default();
    }

    let normalized: Vec<String> = skills
        .keys()
        .map(|name| normalize_token(name))
        .filter(|name| !name.is_empty())
        .collect();

    let usable: Vec<&String> = requirements
        .iter()
        .filter(|req| !req.trim().is_empty())
        .collect();

    if usable.is_empty() {
        return SkillMatch::default();
    }

    let mut matched = Vec::new();
    let mut missing = Vec::new();
    let mut satisfied = 0usize;
    for req in &usable {
        let hit = normalized
            .iter()
            .find(|skill| contains_ci(req, skill) || contains_ci(skill, req));
        match hit {
            Some(skill) => {
                satisfied += 1;
                matched.push(skill.clone());
            }
            None => missing.push(normalize_token(req)),
        }
    }

    // The ratio counts requirements, not distinct skills: one skill may
    // satisfy several requirements. Dedup only the display lists.
    matched.sort();
    matched.dedup();
    missing.sort();
    missing.dedup();

    SkillMatch {
        ratio: satisfied as f64 / usable.len() as f64,
        matched,
        missing,
        used_fallback: false,
    }
}

/// Keyword-floor fallback for zero-skill profiles: scan the job's visible
/// text for the generic vocabulary and convert the capped hit count into a
/// partial skill ratio. Without this, every fresher profile would score zero
/// skill on every job.
pub fn keyword_floor(job: &JobRecord) -> SkillMatch {
    let mut text = String::with_capacity(
        job.title.len() + job.description.len() + job.requirements.len() * 16,
    );
    text.push_str(&job.title);
    text.push(' ');
    text.push_str(&job.description);
    for req in &job.requirements {
        text.push(' ');
        text.push_str(req);
    }

    let mut matched: Vec<String> = FALLBACK_VOCABULARY
        .iter()
        .filter(|keyword| contains_ci(&text, keyword))
        .map(|keyword| keyword.to_string())
        .collect();
    matched.truncate(FALLBACK_MATCH_CAP);

    SkillMatch {
        ratio: matched.len() as f64 / FALLBACK_MATCH_CAP as f64,
        matched,
        missing: Vec::new(),
        used_fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills(entries: &[(&str, u8)]) -> BTreeMap<String, u8> {
        entries
            .iter()
            .map(|(name, rating)| (name.to_string(), *rating))
            .collect()
    }

    #[test]
    fn partial_requirement_match_yields_partial_ratio() {
        let result = check_skills(
            &["Python".into(), "SQL".into()],
            &skills(&[("Python", 4)]),
        );

        assert!((result.ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(result.matched, vec!["python"]);
        assert_eq!(result.missing, vec!["sql"]);
        assert!(!result.used_fallback);
    }

    #[test]
    fn one_skill_can_satisfy_several_requirements() {
        let result = check_skills(
            &["SQL basics".into(), "Advanced SQL".into()],
            &skills(&[("sql", 4)]),
        );

        assert_eq!(result.ratio, 1.0);
        assert_eq!(result.matched, vec!["sql"]);
        assert!(result.missing.is_empty());
    }

    #[test]
    fn substring_matching_is_case_insensitive_both_ways() {
        let result = check_skills(
            &["Experience with PostgreSQL databases".into()],
            &skills(&[("postgresql", 5)]),
        );
        assert_eq!(result.ratio, 1.0);
    }

    #[test]
    fn empty_requirements_contribute_zero() {
        let result = check_skills(&[], &skills(&[("rust", 5)]));
        assert_eq!(result.ratio, 0.0);
        assert!(result.matched.is_empty());
    }

    #[test]
    fn blank_requirement_strings_are_ignored() {
        let result = check_skills(
            &["  ".into(), "Rust".into()],
            &skills(&[("rust", 3)]),
        );
        assert_eq!(result.ratio, 1.0);
    }

    #[test]
    fn fallback_caps_hits_at_three() {
        let job = JobRecord {
            title: "Graduate Developer".into(),
            description: "Work with Python, Java, SQL, Docker and AWS".into(),
            ..JobRecord::default()
        };

        let result = keyword_floor(&job);
        assert_eq!(result.matched.len(), FALLBACK_MATCH_CAP);
        assert_eq!(result.ratio, 1.0);
        assert!(result.used_fallback);
    }

    #[test]
    fn fallback_on_unrelated_text_finds_nothing() {
        let job = JobRecord {
            title: "Farm Equipment Operator".into(),
            description: "Operate harvesters and tractors".into(),
            ..JobRecord::default()
        };

        let result = keyword_floor(&job);
        assert_eq!(result.ratio, 0.0);
        assert!(result.matched.is_empty());
    }
}
