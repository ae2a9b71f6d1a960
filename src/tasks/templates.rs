//! The fixed task sets generated per stage and per locked university.

use super::model::TaskTemplate;
use crate::stage::Stage;

/// Stage that owns university-scoped tasks.
pub const UNIVERSITY_TASK_STAGE: Stage = Stage::InProgress;

const PROFILING_COMPLETE: &[TaskTemplate] = &[
    TaskTemplate {
        key: "explore_universities",
        title: "Explore universities",
        description: "Browse the universities that match your countries and budget",
    },
    TaskTemplate {
        key: "review_budget",
        title: "Review your budget",
        description: "Confirm your yearly budget covers tuition and living costs",
    },
];

const SHORTLISTING: &[TaskTemplate] = &[
    TaskTemplate {
        key: "compare_shortlist",
        title: "Compare shortlisted universities",
        description: "Weigh programs, costs and admission chances side by side",
    },
    TaskTemplate {
        key: "balance_shortlist",
        title: "Balance your shortlist",
        description: "Keep a mix of reach, match and safety choices",
    },
];

const LOCKED: &[TaskTemplate] = &[
    TaskTemplate {
        key: "standardized_tests",
        title: "Complete Standardized Tests",
        description: "Ensure GRE/GMAT and IELTS/TOEFL scores meet university requirements",
    },
    TaskTemplate {
        key: "resume",
        title: "Prepare Resume/CV",
        description: "Update your resume highlighting relevant experience and achievements",
    },
    TaskTemplate {
        key: "financial_documents",
        title: "Prepare Financial Documents",
        description: "Gather bank statements and financial proof for visa application",
    },
];

const IN_PROGRESS: &[TaskTemplate] = &[TaskTemplate {
    key: "track_applications",
    title: "Track application status",
    description: "Check each portal regularly and answer requests quickly",
}];

const DECISION: &[TaskTemplate] = &[
    TaskTemplate {
        key: "compare_offers",
        title: "Compare offers",
        description: "Compare admission offers, scholarships and total cost",
    },
    TaskTemplate {
        key: "accept_offer",
        title: "Accept an offer",
        description: "Confirm your chosen university and pay any deposit",
    },
    TaskTemplate {
        key: "visa_application",
        title: "Start your visa application",
        description: "Book the visa appointment and prepare the required documents",
    },
];

const PER_UNIVERSITY: &[TaskTemplate] = &[
    TaskTemplate {
        key: "statement_of_purpose",
        title: "Complete Statement of Purpose",
        description: "Draft your SOP highlighting why this university aligns with your goals",
    },
    TaskTemplate {
        key: "recommendation_letters",
        title: "Gather Recommendation Letters",
        description: "Request 2-3 letters from professors or supervisors who know your work well",
    },
    TaskTemplate {
        key: "transcripts",
        title: "Prepare Official Transcripts",
        description: "Get official transcripts from your institution, sealed and stamped",
    },
    TaskTemplate {
        key: "deadlines",
        title: "Check Application Deadlines",
        description: "Verify all deadlines for this university and set calendar reminders",
    },
    TaskTemplate {
        key: "submit_application",
        title: "Submit application",
        description: "Submit the completed application and keep the confirmation",
    },
];

/// Stage-generic templates owned by `stage`.
pub fn for_stage(stage: Stage) -> &'static [TaskTemplate] {
    match stage {
        Stage::Onboarding => &[],
        Stage::ProfilingComplete => PROFILING_COMPLETE,
        Stage::Shortlisting => SHORTLISTING,
        Stage::Locked => LOCKED,
        Stage::InProgress => IN_PROGRESS,
        Stage::Decision => DECISION,
    }
}

/// Templates generated for every locked university.
pub fn per_university() -> &'static [TaskTemplate] {
    PER_UNIVERSITY
}
