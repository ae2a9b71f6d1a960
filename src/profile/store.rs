//! Profile store: one profile per user, gating stage progression.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::model::UserProfile;
use crate::error::{DatabaseError, EngineError};
use crate::scope::UserScope;
use crate::stage::UserState;
use crate::store::Database;

pub struct ProfileStore {
    db: Arc<dyn Database>,
}

impl ProfileStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Register a new profile and its stage row at `ONBOARDING`.
    ///
    /// The email is trimmed and lowercased; an email or id already on file
    /// fails with `DuplicateEntry`. If the stage row cannot be written the
    /// profile row is removed again.
    pub async fn create_profile(&self, mut profile: UserProfile) -> Result<UserProfile, EngineError> {
        profile.email = normalize_email(&profile.email)?;
        if self.db.get_profile(profile.id).await?.is_some() {
            return Err(duplicate_id(profile.id));
        }
        if self.db.get_profile_by_email(&profile.email).await?.is_some() {
            return Err(duplicate_email(&profile.email));
        }

        profile.refresh_completeness();
        self.db
            .insert_profile(&profile)
            .await
            .map_err(|e| match e {
                DatabaseError::Constraint(msg) if msg.contains("email") => {
                    duplicate_email(&profile.email)
                }
                DatabaseError::Constraint(_) => duplicate_id(profile.id),
                other => other.into(),
            })?;

        if let Err(e) = self.db.insert_user_state(&UserState::new(profile.id)).await {
            if let Err(cleanup) = self.db.delete_profile(profile.id).await {
                warn!(user_id = %profile.id, error = %cleanup, "Orphaned profile left behind");
            }
            return Err(e.into());
        }

        info!(user_id = %profile.id, complete = profile.profile_complete, "Profile created");
        Ok(profile)
    }

    /// Fetch the profile for `email`, creating an empty one on first sight.
    pub async fn get_or_create_by_email(&self, email: &str) -> Result<UserProfile, EngineError> {
        let email = normalize_email(email)?;
        match self.db.get_profile_by_email(&email).await? {
            Some(profile) => Ok(profile),
            None => self.create_profile(UserProfile::new(email)).await,
        }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile, EngineError> {
        self.db
            .get_profile(user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("profile", user_id))
    }

    pub async fn is_complete(&self, user_id: Uuid) -> Result<bool, EngineError> {
        Ok(self.get_profile(user_id).await?.profile_complete)
    }

    /// Required fields the user has yet to fill in.
    pub async fn missing_fields(&self, user_id: Uuid) -> Result<Vec<&'static str>, EngineError> {
        Ok(self.get_profile(user_id).await?.missing_fields())
    }

    /// Replace the stored onboarding record with `profile`.
    ///
    /// Identity and creation time are kept from the stored row and
    /// `profile_complete` is recomputed.
    pub async fn update_profile(
        &self,
        scope: &UserScope,
        mut profile: UserProfile,
    ) -> Result<UserProfile, EngineError> {
        if profile.id != scope.user_id() {
            return Err(EngineError::InvalidOperation(format!(
                "profile {} cannot be updated under the scope of {}",
                profile.id,
                scope.user_id()
            )));
        }
        let stored = self.get_profile(profile.id).await?;

        profile.email = normalize_email(&profile.email)?;
        if profile.email != stored.email {
            if let Some(other) = self.db.get_profile_by_email(&profile.email).await? {
                if other.id != profile.id {
                    return Err(duplicate_email(&profile.email));
                }
            }
        }

        profile.created_at = stored.created_at;
        profile.updated_at = Utc::now();
        let was_complete = stored.profile_complete;
        profile.refresh_completeness();

        self.db
            .update_profile(&profile)
            .await
            .map_err(|e| match e {
                DatabaseError::Constraint(_) => duplicate_email(&profile.email),
                other => other.into(),
            })?;

        info!(
            user_id = %profile.id,
            was_complete,
            complete = profile.profile_complete,
            "Profile updated"
        );
        Ok(profile)
    }

    /// Delete the profile with everything the user owns.
    pub async fn delete_profile(&self, scope: &UserScope) -> Result<(), EngineError> {
        let user_id = scope.user_id();
        if !self.db.delete_profile(user_id).await? {
            return Err(EngineError::not_found("profile", user_id));
        }
        info!(user_id = %user_id, "Profile deleted");
        Ok(())
    }
}

fn normalize_email(email: &str) -> Result<String, EngineError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(EngineError::InvalidOperation(
            "email must not be empty".to_string(),
        ));
    }
    Ok(email)
}

fn duplicate_id(id: Uuid) -> EngineError {
    EngineError::DuplicateEntry {
        entity: "profile",
        key: id.to_string(),
    }
}

fn duplicate_email(email: &str) -> EngineError {
    EngineError::DuplicateEntry {
        entity: "profile",
        key: email.to_string(),
    }
}
