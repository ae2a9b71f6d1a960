//! Shortlist/lock records and category tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::UniversityId;

/// How ambitious a shortlisted choice is.
///
/// The three known tags cover the usual taxonomy; anything else is stored
/// and returned verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Reach,
    Match,
    Safety,
    Other(String),
}

impl Category {
    /// Parse a tag. Known aliases (dream/target/safe) map onto the closed
    /// set, case-insensitively. Blank tags are rejected.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("category must not be empty".to_string());
        }
        Ok(match trimmed.to_lowercase().as_str() {
            "reach" | "dream" => Self::Reach,
            "match" | "target" => Self::Match,
            "safety" | "safe" => Self::Safety,
            _ => Self::Other(trimmed.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Reach => "reach",
            Self::Match => "match",
            Self::Safety => "safety",
            Self::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

/// One user's relation to one university. At most one per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserUniversity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub university_id: UniversityId,
    pub category: Category,
    pub shortlisted: bool,
    /// Only ever true while `shortlisted` is true.
    pub locked: bool,
    /// Set when the catalog entry was withdrawn; archived rows are history only.
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserUniversity {
    /// A fresh, unlocked shortlist entry.
    pub fn shortlisted(user_id: Uuid, university_id: UniversityId, category: Category) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            university_id,
            category,
            shortlisted: true,
            locked: false,
            archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the lock flag, stamping the update time.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        self.updated_at = Utc::now();
    }
}

/// Shortlist counts per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryBalance {
    pub reach: usize,
    #[serde(rename = "match")]
    pub match_: usize,
    pub safety: usize,
    pub other: usize,
}

impl CategoryBalance {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a UserUniversity>) -> Self {
        let mut balance = Self::default();
        for record in records {
            match record.category {
                Category::Reach => balance.reach += 1,
                Category::Match => balance.match_ += 1,
                Category::Safety => balance.safety += 1,
                Category::Other(_) => balance.other += 1,
            }
        }
        balance
    }

    /// Whether every known category is represented at least once.
    pub fn covers_all_known(&self) -> bool {
        self.reach > 0 && self.match_ > 0 && self.safety > 0
    }
}
