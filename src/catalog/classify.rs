//! Category suggestion and fit scoring for catalog entries.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::model::{Competitiveness, University};
use crate::shortlist::Category;

/// Suggest a category from rank and competitiveness alone.
pub fn suggest_category(university: &University) -> Category {
    let rank = university.rank.unwrap_or(u32::MAX);
    match (rank, university.competitiveness) {
        (r, Competitiveness::High) if r <= 50 => Category::Reach,
        (r, Competitiveness::Medium) if r <= 100 => Category::Match,
        (r, Competitiveness::Low | Competitiveness::VeryLow) if r > 100 => Category::Safety,
        (r, _) if r <= 50 => Category::Reach,
        (r, _) if r <= 100 => Category::Match,
        _ => Category::Safety,
    }
}

/// How well a university fits a student, 0–100.
///
/// Rank contributes up to 40, budget fit up to 30, GPA (0–10 scale) against
/// competitiveness up to 30.
pub fn fit_score(gpa: Decimal, budget: Decimal, university: &University) -> u8 {
    let rank_points = match university.rank.unwrap_or(500) {
        0..=50 => 40,
        51..=100 => 35,
        101..=200 => 30,
        201..=300 => 25,
        _ => 20,
    };

    let tuition = university.avg_tuition_usd;
    let budget_points = if tuition <= budget * dec!(0.7) {
        30
    } else if tuition <= budget {
        25
    } else if tuition <= budget * dec!(1.2) {
        15
    } else {
        5
    };

    let gpa = gpa.to_f64().unwrap_or(0.0);
    let gpa_points = match university.competitiveness {
        Competitiveness::High if gpa >= 8.5 => 30,
        Competitiveness::High if gpa >= 7.5 => 20,
        Competitiveness::High => 10,
        Competitiveness::Medium if gpa >= 7.0 => 30,
        Competitiveness::Medium if gpa >= 6.0 => 25,
        Competitiveness::Medium => 15,
        _ if gpa >= 6.0 => 30,
        _ => 25,
    };

    rank_points + budget_points + gpa_points
}

/// A catalog entry with its suggested category and fit.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub university: University,
    pub category: Category,
    pub fit: u8,
}

/// Per-category suggestions, best fit first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Suggestions {
    pub reach: Vec<Suggestion>,
    #[serde(rename = "match")]
    pub match_: Vec<Suggestion>,
    pub safety: Vec<Suggestion>,
}

/// Split `universities` into reach/match/safety, keeping at most
/// `per_category` of each, ordered by descending fit.
pub fn categorize(
    universities: Vec<University>,
    gpa: Decimal,
    budget: Decimal,
    per_category: usize,
) -> Suggestions {
    let mut scored: Vec<Suggestion> = universities
        .into_iter()
        .map(|u| Suggestion {
            fit: fit_score(gpa, budget, &u),
            category: suggest_category(&u),
            university: u,
        })
        .collect();
    scored.sort_by(|a, b| b.fit.cmp(&a.fit));

    let mut out = Suggestions::default();
    for s in scored {
        let bucket = match s.category {
            Category::Reach => &mut out.reach,
            Category::Match => &mut out.match_,
            _ => &mut out.safety,
        };
        if bucket.len() < per_category {
            bucket.push(s);
        }
    }
    out
}
