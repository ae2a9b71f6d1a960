//! Point-based profile strength (0–100).
//!
//! Four sections: academics (40), tests (20), documents (20), strategy (20).
//! Each section also carries a qualitative label for display.

use rust_decimal::Decimal;
use serde::Serialize;

use super::model::UserProfile;

const DONE_STATUSES: [&str; 3] = ["completed", "done", "ready"];
const DRAFT_STATUSES: [&str; 3] = ["draft", "drafting", "in progress"];

/// Points and label for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionScore {
    pub points: u8,
    pub label: &'static str,
}

/// Overall profile strength.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileStrength {
    pub percentage: u8,
    pub academics: SectionScore,
    pub tests: SectionScore,
    pub documents: SectionScore,
    pub strategy: SectionScore,
}

fn status_in(status: &Option<String>, set: &[&str]) -> bool {
    status
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .is_some_and(|s| set.contains(&s.as_str()))
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Score a profile. `has_locked` says whether the user has any locked university.
pub fn profile_strength(profile: &UserProfile, has_locked: bool) -> ProfileStrength {
    let mut academics = 0u8;
    if profile.gpa.is_some_and(|g| g > Decimal::ZERO) {
        academics += 25;
    }
    if non_blank(&profile.degree) && non_blank(&profile.field_of_study) {
        academics += 10;
    }
    if profile.graduation_year.is_some_and(|y| y > 0) {
        academics += 5;
    }
    let academics_label = match academics {
        35.. => "strong",
        20.. => "moderate",
        _ => "weak",
    };

    let mut tests = 0u8;
    if status_in(&profile.ielts_status, &DONE_STATUSES) {
        tests += 10;
    }
    if status_in(&profile.gre_gmat_status, &DONE_STATUSES) {
        tests += 10;
    }
    let tests_label = match tests {
        15.. => "complete",
        5.. => "in_progress",
        _ => "incomplete",
    };

    let mut documents = 0u8;
    if status_in(&profile.sop_status, &DONE_STATUSES) {
        documents += 10;
    } else if status_in(&profile.sop_status, &DRAFT_STATUSES) {
        documents += 5;
    }
    if non_blank(&profile.funding_plan) {
        documents += 10;
    }
    let documents_label = match documents {
        15.. => "ready",
        5.. => "drafting",
        _ => "pending",
    };

    let mut strategy = 0u8;
    if !profile.preferred_countries.is_empty() {
        strategy += 10;
    }
    if has_locked {
        strategy += 10;
    }
    let strategy_label = match strategy {
        15.. => "locked",
        10.. => "planning",
        _ => "pending",
    };

    ProfileStrength {
        percentage: academics + tests + documents + strategy,
        academics: SectionScore {
            points: academics,
            label: academics_label,
        },
        tests: SectionScore {
            points: tests,
            label: tests_label,
        },
        documents: SectionScore {
            points: documents,
            label: documents_label,
        },
        strategy: SectionScore {
            points: strategy,
            label: strategy_label,
        },
    }
}
