//! User profiles: onboarding record, completeness and strength.

pub mod model;
pub mod store;
pub mod strength;

pub use model::{REQUIRED_FIELDS, UserProfile};
pub use store::ProfileStore;
pub use strength::{ProfileStrength, SectionScore, profile_strength};
