//! University catalog records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog identifier of a university.
pub type UniversityId = i64;

/// Ranking band, derived from the numeric rank. Ordered best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RankingBand {
    #[serde(rename = "Top 50")]
    Top50,
    #[serde(rename = "50-100")]
    Top100,
    #[serde(rename = "100-300")]
    Top300,
    #[serde(rename = "300+")]
    Beyond300,
}

impl RankingBand {
    pub const ALL: [RankingBand; 4] = [
        RankingBand::Top50,
        RankingBand::Top100,
        RankingBand::Top300,
        RankingBand::Beyond300,
    ];

    /// Band for a numeric rank. Unranked entries land in the last band.
    pub fn from_rank(rank: Option<u32>) -> Self {
        match rank {
            Some(r) if r <= 50 => Self::Top50,
            Some(r) if r <= 100 => Self::Top100,
            Some(r) if r <= 300 => Self::Top300,
            _ => Self::Beyond300,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top50 => "Top 50",
            Self::Top100 => "50-100",
            Self::Top300 => "100-300",
            Self::Beyond300 => "300+",
        }
    }
}

impl std::fmt::Display for RankingBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RankingBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == s.trim())
            .ok_or_else(|| format!("unknown ranking band: {s}"))
    }
}

/// Admission competitiveness tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Competitiveness {
    High,
    Medium,
    Low,
    VeryLow,
}

impl Competitiveness {
    /// Default tier for a ranking band.
    pub fn for_band(band: RankingBand) -> Self {
        match band {
            RankingBand::Top50 => Self::High,
            RankingBand::Top100 => Self::Medium,
            RankingBand::Top300 => Self::Low,
            RankingBand::Beyond300 => Self::VeryLow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::VeryLow => "VERY_LOW",
        }
    }
}

impl std::fmt::Display for Competitiveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Competitiveness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            "VERY_LOW" => Ok(Self::VeryLow),
            other => Err(format!("unknown competitiveness: {other}")),
        }
    }
}

/// A catalog entry. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct University {
    pub id: UniversityId,
    pub name: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    pub ranking_band: RankingBand,
    pub competitiveness: Competitiveness,
    /// Average yearly tuition in USD.
    pub avg_tuition_usd: Decimal,
}

impl University {
    /// Build an entry, deriving band and competitiveness from the rank.
    pub fn new(
        id: UniversityId,
        name: impl Into<String>,
        country: impl Into<String>,
        rank: Option<u32>,
        avg_tuition_usd: Decimal,
    ) -> Self {
        let ranking_band = RankingBand::from_rank(rank);
        Self {
            id,
            name: name.into(),
            country: country.into(),
            rank,
            ranking_band,
            competitiveness: Competitiveness::for_band(ranking_band),
            avg_tuition_usd,
        }
    }
}
