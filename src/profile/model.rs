//! User profile data model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields that must be filled before a profile counts as complete.
pub const REQUIRED_FIELDS: [&str; 5] = [
    "education_level",
    "intended_degree",
    "field_of_study",
    "budget_per_year",
    "preferred_countries",
];

/// Onboarding record for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education_level: Option<String>,
    /// Degree already held.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i32>,
    /// GPA on a 0–10 scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intended_degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_of_study: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intake_year: Option<i32>,
    #[serde(default)]
    pub preferred_countries: Vec<String>,
    /// Annual budget in USD.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_per_year: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ielts_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gre_gmat_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sop_status: Option<String>,
    /// Derived from the required fields; see [`UserProfile::refresh_completeness`].
    pub profile_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Create an empty profile for `email`.
    pub fn new(email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            name: None,
            education_level: None,
            degree: None,
            graduation_year: None,
            gpa: None,
            intended_degree: None,
            field_of_study: None,
            intake_year: None,
            preferred_countries: Vec::new(),
            budget_per_year: None,
            funding_plan: None,
            ielts_status: None,
            gre_gmat_status: None,
            sop_status: None,
            profile_complete: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: set education level, intended degree and field of study.
    pub fn with_academics(
        mut self,
        education_level: impl Into<String>,
        intended_degree: impl Into<String>,
        field_of_study: impl Into<String>,
    ) -> Self {
        self.education_level = Some(education_level.into());
        self.intended_degree = Some(intended_degree.into());
        self.field_of_study = Some(field_of_study.into());
        self
    }

    /// Builder: set annual budget.
    pub fn with_budget(mut self, budget: Decimal) -> Self {
        self.budget_per_year = Some(budget);
        self
    }

    /// Builder: set preferred countries.
    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_countries = countries.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set GPA.
    pub fn with_gpa(mut self, gpa: Decimal) -> Self {
        self.gpa = Some(gpa);
        self
    }

    /// Required fields that are still empty, in declaration order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        let mut missing = Vec::new();
        if !filled(&self.education_level) {
            missing.push(REQUIRED_FIELDS[0]);
        }
        if !filled(&self.intended_degree) {
            missing.push(REQUIRED_FIELDS[1]);
        }
        if !filled(&self.field_of_study) {
            missing.push(REQUIRED_FIELDS[2]);
        }
        if !self.budget_per_year.is_some_and(|b| b > Decimal::ZERO) {
            missing.push(REQUIRED_FIELDS[3]);
        }
        if !self.preferred_countries.iter().any(|c| !c.trim().is_empty()) {
            missing.push(REQUIRED_FIELDS[4]);
        }
        missing
    }

    /// Recompute `profile_complete` from the required fields.
    pub fn refresh_completeness(&mut self) -> bool {
        self.profile_complete = self.missing_fields().is_empty();
        self.profile_complete
    }
}
