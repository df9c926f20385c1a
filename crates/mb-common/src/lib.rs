pub mod db;
pub mod logging;
pub mod matching;
pub mod normalize;
pub mod quota;
pub mod settings;
pub mod store;
pub mod testing;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Career level self-reported by the candidate. Fresher and Junior are the
/// "entry level" segment that receives floor credit in several scoring
/// categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CareerLevel {
    Fresher,
    Junior,
    Mid,
    Senior,
    Lead,
}

impl CareerLevel {
    pub fn is_entry_level(self) -> bool {
        matches!(self, CareerLevel::Fresher | CareerLevel::Junior)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CareerLevel::Fresher => "fresher",
            CareerLevel::Junior => "junior",
            CareerLevel::Mid => "mid",
            CareerLevel::Senior => "senior",
            CareerLevel::Lead => "lead",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "fresher" => Some(CareerLevel::Fresher),
            "junior" => Some(CareerLevel::Junior),
            "mid" => Some(CareerLevel::Mid),
            "senior" => Some(CareerLevel::Senior),
            "lead" => Some(CareerLevel::Lead),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkMode {
    Remote,
    Hybrid,
    Onsite,
    Any,
}

impl WorkMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "remote" => Some(WorkMode::Remote),
            "hybrid" => Some(WorkMode::Hybrid),
            "onsite" => Some(WorkMode::Onsite),
            "any" => Some(WorkMode::Any),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

impl SubscriptionTier {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "free" => Some(SubscriptionTier::Free),
            "premium" => Some(SubscriptionTier::Premium),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Paused,
    Archived,
}

impl JobStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(JobStatus::Active),
            "paused" => Some(JobStatus::Paused),
            "archived" => Some(JobStatus::Archived),
            _ => None,
        }
    }
}

/// Job-seeker profile. Owned by the user-management side of the product and
/// read-only inside this subsystem; resume parsing and profile edits mutate
/// it elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub id: i64,
    pub preferred_roles: Vec<String>,
    pub preferred_locations: Vec<String>,
    pub preferred_tech: Vec<String>,
    pub preferred_domains: Vec<String>,
    pub experience_years: u32,
    pub career_level: CareerLevel,
    pub work_mode: WorkMode,
    /// Skill name -> self-rating 1..=5. Keys unique by construction.
    pub skills: BTreeMap<String, u8>,
    pub tier: SubscriptionTier,
}

impl Default for CandidateProfile {
    fn default() -> Self {
        Self {
            id: 0,
            preferred_roles: Vec::new(),
            preferred_locations: Vec::new(),
            preferred_tech: Vec::new(),
            preferred_domains: Vec::new(),
            experience_years: 0,
            career_level: CareerLevel::Fresher,
            work_mode: WorkMode::Any,
            skills: BTreeMap::new(),
            tier: SubscriptionTier::Free,
        }
    }
}

/// Job posting as produced by the ingestion side. Immutable for the duration
/// of one batch run; archived jobs never enter batch scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub tech_stack: Vec<String>,
    /// Missing location is treated as "Remote" by the scorer.
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub status: JobStatus,
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::Active
    }
}
