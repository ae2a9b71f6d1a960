//! Shortlist and lock lifecycle.

pub mod manager;
pub mod model;

pub use manager::{ShortlistManager, ShortlistSummary};
pub use model::{Category, CategoryBalance, UserUniversity};
