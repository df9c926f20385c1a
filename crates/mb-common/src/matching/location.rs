use crate::normalize::contains_ci;
use crate::{CandidateProfile, JobRecord};

const REMOTE_INDICATORS: &[&str] = &["remote", "work from home", "wfh", "anywhere", "distributed"];

const FULL_TIME_TYPES: &[&str] = &["full-time", "full time", "fulltime", "permanent"];
const CONTRACT_TYPES: &[&str] = &["contract", "freelance"];
const INTERNSHIP_TYPES: &[&str] = &["internship", "intern"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFit {
    /// Fraction of the location cap earned, in [0, 1].
    pub ratio: f64,
    pub remote: bool,
}

/// Evaluate job location against the candidate's preferred locations. A job
/// with no location is treated as remote; entry-level candidates get partial
/// credit for any location, reflecting relocation flexibility.
pub fn evaluate_location(profile: &CandidateProfile, job: &JobRecord) -> LocationFit {
    let location = job.location.as_deref().unwrap_or("Remote");
    let remote = REMOTE_INDICATORS
        .iter()
        .any(|indicator| contains_ci(location, indicator));

    let wants_any = profile
        .preferred_locations
        .iter()
        .any(|pref| pref.trim().eq_ignore_ascii_case("any"));

    let preferred = profile
        .preferred_locations
        .iter()
        .any(|pref| !pref.trim().is_empty() && contains_ci(location, pref.trim()));

    let ratio = if preferred || wants_any || remote {
        1.0
    } else if profile.career_level.is_entry_level() {
        0.5
    } else {
        0.0
    };

    LocationFit { ratio, remote }
}

/// Evaluate the job's employment type. Full-time and contract openings earn
/// full credit; internships count fully only for the entry-level segment.
pub fn evaluate_work_mode(profile: &CandidateProfile, job: &JobRecord) -> f64 {
    let Some(kind) = job.employment_type.as_deref() else {
        return 0.0;
    };

    let matches_any = |types: &[&str]| types.iter().any(|t| contains_ci(kind, t));

    if matches_any(FULL_TIME_TYPES) || matches_any(CONTRACT_TYPES) {
        1.0
    } else if matches_any(INTERNSHIP_TYPES) {
        if profile.career_level.is_entry_level() {
            1.0
        } else {
            0.5
        }
    } else {
        0.0
    }
}
