//! Counseling stages: the closed set of journey phases and their entry checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::UnmetCondition;

/// The phases of a user's counseling journey.
///
/// Progresses linearly: Onboarding → ProfilingComplete → Shortlisting →
/// Locked → InProgress → Decision. Declaration order is journey order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Onboarding,
    ProfilingComplete,
    Shortlisting,
    Locked,
    InProgress,
    Decision,
}

impl Stage {
    /// Every stage in journey order.
    pub const ALL: [Stage; 6] = [
        Stage::Onboarding,
        Stage::ProfilingComplete,
        Stage::Shortlisting,
        Stage::Locked,
        Stage::InProgress,
        Stage::Decision,
    ];

    /// Get the next stage in the linear progression, if any.
    pub fn next(&self) -> Option<Stage> {
        use Stage::*;
        match self {
            Onboarding => Some(ProfilingComplete),
            ProfilingComplete => Some(Shortlisting),
            Shortlisting => Some(Locked),
            Locked => Some(InProgress),
            InProgress => Some(Decision),
            Decision => None,
        }
    }

    /// Decide whether a user described by `facts` may enter this stage.
    pub fn entry_check(&self, facts: &StageFacts) -> Result<(), UnmetCondition> {
        match self {
            Stage::Onboarding => Ok(()),
            Stage::ProfilingComplete => {
                if facts.missing_profile_fields.is_empty() {
                    Ok(())
                } else {
                    Err(UnmetCondition::ProfileIncomplete {
                        missing: facts.missing_profile_fields.clone(),
                    })
                }
            }
            Stage::Shortlisting => {
                if facts.shortlisted > 0 {
                    Ok(())
                } else {
                    Err(UnmetCondition::NothingShortlisted)
                }
            }
            Stage::Locked => facts.check_lock_count(),
            Stage::InProgress => {
                if facts.open_locked_stage_tasks == 0 {
                    Ok(())
                } else {
                    Err(UnmetCondition::StageTasksOpen {
                        stage: Stage::Locked,
                        remaining: facts.open_locked_stage_tasks,
                    })
                }
            }
            Stage::Decision => {
                facts.check_lock_count()?;
                if facts.open_university_tasks == 0 {
                    Ok(())
                } else {
                    Err(UnmetCondition::UniversityTasksOpen {
                        remaining: facts.open_university_tasks,
                    })
                }
            }
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::Onboarding
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Onboarding => "ONBOARDING",
            Self::ProfilingComplete => "PROFILING_COMPLETE",
            Self::Shortlisting => "SHORTLISTING",
            Self::Locked => "LOCKED",
            Self::InProgress => "IN_PROGRESS",
            Self::Decision => "DECISION",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.to_string() == s)
            .ok_or_else(|| format!("unknown stage: {s}"))
    }
}

/// Snapshot of everything a stage entry check looks at.
#[derive(Debug, Clone, Default)]
pub struct StageFacts {
    /// Required profile fields that are still empty.
    pub missing_profile_fields: Vec<String>,
    /// Number of shortlisted universities (locked ones included).
    pub shortlisted: usize,
    /// Number of locked universities.
    pub locked: usize,
    /// Configured lock limit.
    pub max_locked: usize,
    /// Open stage-generic tasks owned by `Stage::Locked`.
    pub open_locked_stage_tasks: usize,
    /// Open university-scoped tasks of currently locked universities.
    pub open_university_tasks: usize,
}

impl StageFacts {
    fn check_lock_count(&self) -> Result<(), UnmetCondition> {
        if (1..=self.max_locked).contains(&self.locked) {
            Ok(())
        } else {
            Err(UnmetCondition::LockCountOutOfRange {
                locked: self.locked,
                max: self.max_locked,
            })
        }
    }
}

/// Persisted per-user stage record. Exactly one per profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserState {
    pub user_id: Uuid,
    pub current_stage: Stage,
    pub updated_at: DateTime<Utc>,
}

impl UserState {
    /// Fresh state at the initial stage.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            current_stage: Stage::default(),
            updated_at: Utc::now(),
        }
    }

    /// Move to `stage`, stamping the update time.
    pub fn enter(&mut self, stage: Stage) {
        self.current_stage = stage;
        self.updated_at = Utc::now();
    }
}
