use serde::{Deserialize, Serialize};

use super::location::{evaluate_location, evaluate_work_mode};
use super::skills::{check_skills, keyword_floor, SkillMatch};
use crate::normalize::{contains_ci, mutual_contains_ci};
use crate::{CandidateProfile, JobRecord};

/// Per-category point caps on the canonical 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub skill: f64,
    pub role: f64,
    pub level: f64,
    pub experience: f64,
    pub location: f64,
    pub work_mode: f64,
}

impl Weights {
    pub fn total(&self) -> f64 {
        self.skill + self.role + self.level + self.experience + self.location + self.work_mode
    }
}

pub const DETAILED_WEIGHTS: Weights = Weights {
    skill: 40.0,
    role: 20.0,
    level: 15.0,
    experience: 10.0,
    location: 10.0,
    work_mode: 5.0,
};

/// The keyword-floor fallback earns at most half the skill cap so a
/// zero-skill profile can never outscore a profile with real matches.
const FALLBACK_SKILL_SCALE: f64 = 0.5;

const GENERIC_ROLE_KEYWORDS: &[&str] = &[
    "developer",
    "engineer",
    "analyst",
    "programmer",
    "trainee",
    "consultant",
    "administrator",
];

const ENTRY_OPENING_SIGNALS: &[&str] = &[
    "fresher",
    "junior",
    "entry level",
    "entry-level",
    "trainee",
    "graduate",
    "intern",
    "no experience",
];

/// Experience saturates at five years: beyond that, more years do not make a
/// candidate a better match for this product's job corpus.
const EXPERIENCE_SATURATION_YEARS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchClass {
    Excellent,
    Good,
    Okay,
    Poor,
}

impl MatchClass {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchClass::Excellent => "excellent",
            MatchClass::Good => "good",
            MatchClass::Okay => "okay",
            MatchClass::Poor => "poor",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "excellent" => Some(MatchClass::Excellent),
            "good" => Some(MatchClass::Good),
            "okay" => Some(MatchClass::Okay),
            "poor" => Some(MatchClass::Poor),
            _ => None,
        }
    }

    pub fn from_total(total: f64) -> Self {
        if total >= 80.0 {
            MatchClass::Excellent
        } else if total >= 60.0 {
            MatchClass::Good
        } else if total >= 40.0 {
            MatchClass::Okay
        } else {
            MatchClass::Poor
        }
    }
}

/// Scoring output for one (candidate, job) evaluation. Identity fields and
/// lifecycle status are attached by the caller that persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub skill_score: f64,
    pub role_score: f64,
    pub level_score: f64,
    pub experience_score: f64,
    pub location_score: f64,
    pub work_mode_score: f64,
    pub total: f64,
    pub class: MatchClass,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub used_skill_fallback: bool,
    /// Profile completeness in [0, 1]; a low value means the total rests on
    /// little signal and should be displayed with caution.
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct Scorer {
    weights: Weights,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            weights: DETAILED_WEIGHTS,
        }
    }
}

/// Score a candidate against one job on the canonical 0-100 scale. Pure and
/// infallible: missing or malformed fields degrade to a zero contribution for
/// their category instead of erroring.
pub fn score(profile: &CandidateProfile, job: &JobRecord) -> ScoredMatch {
    Scorer::default().score(profile, job)
}

impl Scorer {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    pub fn score(&self, profile: &CandidateProfile, job: &JobRecord) -> ScoredMatch {
        let skill = self.score_skill(profile, job);
        let role = self.score_role(profile, job) * self.weights.role;
        let level = self.score_level(profile, job) * self.weights.level;
        let experience = self.score_experience(profile) * self.weights.experience;
        let location = evaluate_location(profile, job).ratio * self.weights.location;
        let work_mode = evaluate_work_mode(profile, job) * self.weights.work_mode;

        let total = (skill.score + role + level + experience + location + work_mode)
            .clamp(0.0, 100.0);

        ScoredMatch {
            skill_score: skill.score,
            role_score: role,
            level_score: level,
            experience_score: experience,
            location_score: location,
            work_mode_score: work_mode,
            total,
            class: MatchClass::from_total(total),
            matched_skills: skill.detail.matched,
            missing_skills: skill.detail.missing,
            used_skill_fallback: skill.detail.used_fallback,
            confidence: profile_confidence(profile),
        }
    }

    fn score_skill(&self, profile: &CandidateProfile, job: &JobRecord) -> SkillContribution {
        if profile.skills.is_empty() {
            let detail = keyword_floor(job);
            return SkillContribution {
                score: detail.ratio * self.weights.skill * FALLBACK_SKILL_SCALE,
                detail,
            };
        }

        let detail = check_skills(&job.requirements, &profile.skills);
        SkillContribution {
            score: detail.ratio * self.weights.skill,
            detail,
        }
    }

    fn score_role(&self, profile: &CandidateProfile, job: &JobRecord) -> f64 {
        let preferred = profile
            .preferred_roles
            .iter()
            .any(|role| !role.trim().is_empty() && mutual_contains_ci(&job.title, role.trim()));

        let mut ratio: f64 = if preferred {
            1.0
        } else if GENERIC_ROLE_KEYWORDS
            .iter()
            .any(|keyword| contains_ci(&job.title, keyword))
        {
            0.6
        } else {
            0.0
        };

        // Entry-level candidates are open to any role.
        if profile.career_level.is_entry_level() {
            ratio = ratio.max(0.4);
        }

        ratio
    }

    fn score_level(&self, profile: &CandidateProfile, job: &JobRecord) -> f64 {
        if !profile.career_level.is_entry_level() {
            return 0.5;
        }

        let signals_entry = ENTRY_OPENING_SIGNALS.iter().any(|signal| {
            contains_ci(&job.title, signal) || contains_ci(&job.description, signal)
        });

        if signals_entry {
            1.0
        } else {
            0.5
        }
    }

    fn score_experience(&self, profile: &CandidateProfile) -> f64 {
        if profile.experience_years == 0 {
            // Light default so unspecified experience is not a hard zero.
            return 0.4;
        }

        (profile.experience_years as f64 / EXPERIENCE_SATURATION_YEARS).min(1.0)
    }
}

struct SkillContribution {
    score: f64,
    detail: SkillMatch,
}

fn profile_confidence(profile: &CandidateProfile) -> f64 {
    let signals = [
        !profile.skills.is_empty(),
        !profile.preferred_roles.is_empty(),
        !profile.preferred_locations.is_empty(),
        !profile.preferred_tech.is_empty(),
        profile.experience_years > 0,
    ];

    signals.iter().filter(|present| **present).count() as f64 / signals.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CareerLevel;
    use std::collections::BTreeMap;

    fn skills(entries: &[(&str, u8)]) -> BTreeMap<String, u8> {
        entries
            .iter()
            .map(|(name, rating)| (name.to_string(), *rating))
            .collect()
    }

    fn backend_job() -> JobRecord {
        JobRecord {
            id: 1,
            title: "Backend Engineer".into(),
            description: "Build APIs and data pipelines".into(),
            requirements: vec!["Python".into(), "SQL".into()],
            location: Some("Remote".into()),
            employment_type: Some("Full-time".into()),
            ..JobRecord::default()
        }
    }

    fn python_candidate() -> CandidateProfile {
        CandidateProfile {
            id: 7,
            skills: skills(&[("Python", 4)]),
            experience_years: 3,
            career_level: CareerLevel::Mid,
            preferred_locations: vec!["Remote".into()],
            ..CandidateProfile::default()
        }
    }

    #[test]
    fn partial_skill_and_generic_role_beat_zero_overlap() {
        let candidate = python_candidate();

        let relevant = score(&candidate, &backend_job());

        let unrelated = JobRecord {
            id: 2,
            title: "Farm Equipment Operator".into(),
            description: "Operate harvesters and tractors".into(),
            requirements: vec!["Rust removal".into(), "Go-kart license".into()],
            location: Some("Rural Kansas".into()),
            employment_type: Some("Seasonal".into()),
            ..JobRecord::default()
        };
        let irrelevant = score(&candidate, &unrelated);

        assert!(relevant.total > irrelevant.total);
        // One of two requirements matched.
        assert_eq!(relevant.skill_score, DETAILED_WEIGHTS.skill * 0.5);
        // No preferred roles, but "Engineer" earns the generic keyword credit.
        assert_eq!(relevant.role_score, DETAILED_WEIGHTS.role * 0.6);
        assert_eq!(relevant.matched_skills, vec!["python"]);
        assert_eq!(relevant.missing_skills, vec!["sql"]);
    }

    #[test]
    fn zero_skill_profile_uses_keyword_floor() {
        let fresher = CandidateProfile {
            career_level: CareerLevel::Fresher,
            ..CandidateProfile::default()
        };

        let result = score(&fresher, &backend_job());

        assert!(result.used_skill_fallback);
        assert!(result.skill_score > 0.0);
        assert!(result.skill_score <= DETAILED_WEIGHTS.skill * 0.5);
    }

    #[test]
    fn entry_level_floors_role_and_location() {
        let fresher = CandidateProfile {
            career_level: CareerLevel::Junior,
            preferred_locations: vec!["Berlin".into()],
            ..CandidateProfile::default()
        };
        let job = JobRecord {
            title: "Sous Chef".into(),
            location: Some("Paris".into()),
            ..JobRecord::default()
        };

        let result = score(&fresher, &job);
        assert_eq!(result.role_score, DETAILED_WEIGHTS.role * 0.4);
        assert_eq!(result.location_score, DETAILED_WEIGHTS.location * 0.5);
    }

    #[test]
    fn entry_opening_signal_earns_full_level_credit() {
        let fresher = CandidateProfile {
            career_level: CareerLevel::Fresher,
            ..CandidateProfile::default()
        };
        let mut job = backend_job();
        job.title = "Junior Backend Engineer".into();

        let with_signal = score(&fresher, &job);
        assert_eq!(with_signal.level_score, DETAILED_WEIGHTS.level);

        let without_signal = score(&fresher, &backend_job());
        assert_eq!(without_signal.level_score, DETAILED_WEIGHTS.level * 0.5);
    }

    #[test]
    fn experience_saturates_at_five_years() {
        let mut candidate = python_candidate();
        candidate.experience_years = 12;
        let veteran = score(&candidate, &backend_job());
        assert_eq!(veteran.experience_score, DETAILED_WEIGHTS.experience);

        candidate.experience_years = 0;
        let unspecified = score(&candidate, &backend_job());
        assert_eq!(
            unspecified.experience_score,
            DETAILED_WEIGHTS.experience * 0.4
        );
    }

    #[test]
    fn total_is_bounded_and_classified() {
        let strong = CandidateProfile {
            skills: skills(&[("Python", 5), ("SQL", 5)]),
            preferred_roles: vec!["Backend Engineer".into()],
            preferred_locations: vec!["any".into()],
            preferred_tech: vec!["Python".into()],
            experience_years: 6,
            career_level: CareerLevel::Senior,
            ..CandidateProfile::default()
        };

        let result = score(&strong, &backend_job());
        assert!(result.total <= 100.0);
        assert!(result.total >= 80.0);
        assert_eq!(result.class, MatchClass::Excellent);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn malformed_job_degrades_instead_of_erroring() {
        let candidate = python_candidate();
        let empty = JobRecord::default();

        let result = score(&candidate, &empty);
        assert_eq!(result.skill_score, 0.0);
        assert_eq!(result.class, MatchClass::Poor);
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(MatchClass::from_total(80.0), MatchClass::Excellent);
        assert_eq!(MatchClass::from_total(79.9), MatchClass::Good);
        assert_eq!(MatchClass::from_total(60.0), MatchClass::Good);
        assert_eq!(MatchClass::from_total(40.0), MatchClass::Okay);
        assert_eq!(MatchClass::from_total(39.9), MatchClass::Poor);
    }

    #[test]
    fn detailed_weights_sum_to_one_hundred() {
        assert_eq!(DETAILED_WEIGHTS.total(), 100.0);
    }
}
