//! Catalog filter criteria.
//!
//! The filtering itself belongs to the catalog collaborator; this module only
//! builds the criteria it is asked to apply.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::model::RankingBand;
use crate::config::EngineConfig;
use crate::profile::UserProfile;

/// Aliases users commonly type for catalog country names.
const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("usa", "United States"),
    ("us", "United States"),
    ("united states", "United States"),
    ("uk", "United Kingdom"),
    ("united kingdom", "United Kingdom"),
    ("canada", "Canada"),
    ("australia", "Australia"),
    ("germany", "Germany"),
];

/// Map user input to the catalog's country spelling.
///
/// Unknown names pass through trimmed.
pub fn normalize_country(country: &str) -> String {
    let trimmed = country.trim();
    let lower = trimmed.to_lowercase();
    COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// What the catalog should return. Empty sets mean "no restriction".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub countries: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tuition: Option<Decimal>,
    pub bands: BTreeSet<RankingBand>,
    pub limit: usize,
}

impl FilterCriteria {
    /// Criteria derived from a profile: its preferred countries and its
    /// budget widened by the configured buffer.
    pub fn for_profile(profile: &UserProfile, config: &EngineConfig) -> Self {
        Self {
            countries: profile
                .preferred_countries
                .iter()
                .filter(|c| !c.trim().is_empty())
                .map(|c| normalize_country(c))
                .collect(),
            max_tuition: profile
                .budget_per_year
                .map(|b| (b * config.budget_buffer).round_dp(2)),
            bands: BTreeSet::new(),
            limit: config.filter_limit,
        }
    }

    /// Builder: restrict to `bands`.
    pub fn with_bands(mut self, bands: impl IntoIterator<Item = RankingBand>) -> Self {
        self.bands = bands.into_iter().collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn normalizes_aliases() {
        assert_eq!(normalize_country("USA"), "United States");
        assert_eq!(normalize_country(" uk "), "United Kingdom");
        assert_eq!(normalize_country("germany"), "Germany");
        assert_eq!(normalize_country("  Netherlands "), "Netherlands");
    }

    #[test]
    fn profile_criteria_apply_budget_buffer() {
        let profile = UserProfile::new("x@example.com")
            .with_budget(dec!(30000))
            .with_countries(["USA", "Canada", ""]);
        let criteria = FilterCriteria::for_profile(&profile, &EngineConfig::default());

        assert_eq!(criteria.max_tuition, Some(dec!(36000)));
        assert_eq!(criteria.limit, 30);
        assert_eq!(
            criteria.countries.into_iter().collect::<Vec<_>>(),
            vec!["Canada".to_string(), "United States".to_string()]
        );
    }
}
