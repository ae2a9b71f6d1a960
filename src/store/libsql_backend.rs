//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Also serves as a
//! [`Catalog`] over its `universities` table.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::{
    Catalog, Competitiveness, FilterCriteria, RankingBand, University, UniversityId,
};
use crate::error::{DatabaseError, EngineError};
use crate::profile::UserProfile;
use crate::shortlist::{Category, UserUniversity};
use crate::stage::{Stage, UserState};
use crate::store::migrations;
use crate::store::traits::Database;
use crate::tasks::Task;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::connect(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::connect(db).await
    }

    async fn connect(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to enable foreign keys: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.filter(|s| !s.is_empty()).map(|s| parse_datetime(&s))
}

fn parse_decimal(field: &str, s: &str) -> Result<Decimal, DatabaseError> {
    Decimal::from_str(s).map_err(|e| DatabaseError::Serialization(format!("{field}: {e}")))
}

fn parse_uuid(field: &str, s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Query(format!("{field} parse: {e}")))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_decimal(d: Option<Decimal>) -> libsql::Value {
    match d {
        Some(d) => libsql::Value::Text(d.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_int(n: Option<i64>) -> libsql::Value {
    match n {
        Some(n) => libsql::Value::Integer(n),
        None => libsql::Value::Null,
    }
}

fn flag(b: bool) -> i64 {
    i64::from(b)
}

fn get_text(row: &libsql::Row, idx: i32, field: &str) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::Query(format!("{field}: {e}")))
}

// ── Row mapping ─────────────────────────────────────────────────────

const PROFILE_COLUMNS: &str = "id, email, name, education_level, degree, graduation_year, gpa, intended_degree, field_of_study, intake_year, preferred_countries, budget_per_year, funding_plan, ielts_status, gre_gmat_status, sop_status, profile_complete, created_at, updated_at";

const UNIVERSITY_COLUMNS: &str =
    "id, name, country, rank, ranking_band, competitiveness, avg_tuition_usd";

const USER_UNIVERSITY_COLUMNS: &str =
    "id, user_id, university_id, category, shortlisted, locked, archived, created_at, updated_at";

const TASK_COLUMNS: &str = "id, user_id, title, description, stage, university_id, template_key, completed, completed_at, obsolete, created_at, updated_at";

fn row_to_profile(row: &libsql::Row) -> Result<UserProfile, DatabaseError> {
    let id = parse_uuid("profile.id", &get_text(row, 0, "profile.id")?)?;
    let email = get_text(row, 1, "profile.email")?;

    let countries_raw: String = row.get(10).unwrap_or_else(|_| "[]".to_string());
    let preferred_countries: Vec<String> = serde_json::from_str(&countries_raw)
        .map_err(|e| DatabaseError::Serialization(format!("profile.preferred_countries: {e}")))?;

    let gpa = row
        .get::<String>(6)
        .ok()
        .map(|s| parse_decimal("profile.gpa", &s))
        .transpose()?;
    let budget_per_year = row
        .get::<String>(11)
        .ok()
        .map(|s| parse_decimal("profile.budget_per_year", &s))
        .transpose()?;

    Ok(UserProfile {
        id,
        email,
        name: row.get(2).ok(),
        education_level: row.get(3).ok(),
        degree: row.get(4).ok(),
        graduation_year: row.get::<i64>(5).ok().map(|y| y as i32),
        gpa,
        intended_degree: row.get(7).ok(),
        field_of_study: row.get(8).ok(),
        intake_year: row.get::<i64>(9).ok().map(|y| y as i32),
        preferred_countries,
        budget_per_year,
        funding_plan: row.get(12).ok(),
        ielts_status: row.get(13).ok(),
        gre_gmat_status: row.get(14).ok(),
        sop_status: row.get(15).ok(),
        profile_complete: row.get::<i64>(16).unwrap_or(0) != 0,
        created_at: parse_datetime(&get_text(row, 17, "profile.created_at")?),
        updated_at: parse_datetime(&get_text(row, 18, "profile.updated_at")?),
    })
}

fn row_to_university(row: &libsql::Row) -> Result<University, DatabaseError> {
    let id: i64 = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("university.id: {e}")))?;
    let rank = row.get::<i64>(3).ok().map(|r| r as u32);

    let band_str = get_text(row, 4, "university.ranking_band")?;
    let ranking_band = RankingBand::from_str(&band_str).unwrap_or(RankingBand::from_rank(rank));
    let competitiveness_str = get_text(row, 5, "university.competitiveness")?;
    let competitiveness = Competitiveness::from_str(&competitiveness_str)
        .unwrap_or(Competitiveness::for_band(ranking_band));

    Ok(University {
        id,
        name: get_text(row, 1, "university.name")?,
        country: get_text(row, 2, "university.country")?,
        rank,
        ranking_band,
        competitiveness,
        avg_tuition_usd: parse_decimal(
            "university.avg_tuition_usd",
            &get_text(row, 6, "university.avg_tuition_usd")?,
        )?,
    })
}

fn row_to_user_university(row: &libsql::Row) -> Result<UserUniversity, DatabaseError> {
    let id = parse_uuid("user_university.id", &get_text(row, 0, "user_university.id")?)?;
    let user_id = parse_uuid(
        "user_university.user_id",
        &get_text(row, 1, "user_university.user_id")?,
    )?;
    let university_id: i64 = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("user_university.university_id: {e}")))?;
    let category_raw = get_text(row, 3, "user_university.category")?;
    let category = Category::parse(&category_raw)
        .map_err(|e| DatabaseError::Serialization(format!("user_university.category: {e}")))?;

    Ok(UserUniversity {
        id,
        user_id,
        university_id,
        category,
        shortlisted: row.get::<i64>(4).unwrap_or(0) != 0,
        locked: row.get::<i64>(5).unwrap_or(0) != 0,
        archived: row.get::<i64>(6).unwrap_or(0) != 0,
        created_at: parse_datetime(&get_text(row, 7, "user_university.created_at")?),
        updated_at: parse_datetime(&get_text(row, 8, "user_university.updated_at")?),
    })
}

fn row_to_task(row: &libsql::Row) -> Result<Task, DatabaseError> {
    let id = parse_uuid("task.id", &get_text(row, 0, "task.id")?)?;
    let user_id = parse_uuid("task.user_id", &get_text(row, 1, "task.user_id")?)?;
    let stage_str = get_text(row, 4, "task.stage")?;
    let stage = Stage::from_str(&stage_str)
        .map_err(|e| DatabaseError::Serialization(format!("task.stage: {e}")))?;

    Ok(Task {
        id,
        user_id,
        title: get_text(row, 2, "task.title")?,
        description: row.get(3).unwrap_or_default(),
        stage,
        university_id: row.get::<i64>(5).ok(),
        template_key: get_text(row, 6, "task.template_key")?,
        completed: row.get::<i64>(7).unwrap_or(0) != 0,
        completed_at: parse_optional_datetime(row.get(8).ok()),
        obsolete: row.get::<i64>(9).unwrap_or(0) != 0,
        created_at: parse_datetime(&get_text(row, 10, "task.created_at")?),
        updated_at: parse_datetime(&get_text(row, 11, "task.updated_at")?),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), DatabaseError> {
        let countries = serde_json::to_string(&profile.preferred_countries)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO user_profiles ({PROFILE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
                ),
                params![
                    profile.id.to_string(),
                    profile.email.as_str(),
                    opt_text(profile.name.as_deref()),
                    opt_text(profile.education_level.as_deref()),
                    opt_text(profile.degree.as_deref()),
                    opt_int(profile.graduation_year.map(i64::from)),
                    opt_decimal(profile.gpa),
                    opt_text(profile.intended_degree.as_deref()),
                    opt_text(profile.field_of_study.as_deref()),
                    opt_int(profile.intake_year.map(i64::from)),
                    countries,
                    opt_decimal(profile.budget_per_year),
                    opt_text(profile.funding_plan.as_deref()),
                    opt_text(profile.ielts_status.as_deref()),
                    opt_text(profile.gre_gmat_status.as_deref()),
                    opt_text(profile.sop_status.as_deref()),
                    flag(profile.profile_complete),
                    profile.created_at.to_rfc3339(),
                    profile.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_write("insert_profile", e))?;

        debug!(user_id = %profile.id, "Inserted profile");
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<UserProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile row: {e}"))),
        }
    }

    async fn get_profile_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserProfile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile_by_email row: {e}"))),
        }
    }

    async fn update_profile(&self, profile: &UserProfile) -> Result<(), DatabaseError> {
        let countries = serde_json::to_string(&profile.preferred_countries)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "UPDATE user_profiles SET
                    email = ?2, name = ?3, education_level = ?4, degree = ?5,
                    graduation_year = ?6, gpa = ?7, intended_degree = ?8,
                    field_of_study = ?9, intake_year = ?10, preferred_countries = ?11,
                    budget_per_year = ?12, funding_plan = ?13, ielts_status = ?14,
                    gre_gmat_status = ?15, sop_status = ?16, profile_complete = ?17,
                    updated_at = ?18
                 WHERE id = ?1",
                params![
                    profile.id.to_string(),
                    profile.email.as_str(),
                    opt_text(profile.name.as_deref()),
                    opt_text(profile.education_level.as_deref()),
                    opt_text(profile.degree.as_deref()),
                    opt_int(profile.graduation_year.map(i64::from)),
                    opt_decimal(profile.gpa),
                    opt_text(profile.intended_degree.as_deref()),
                    opt_text(profile.field_of_study.as_deref()),
                    opt_int(profile.intake_year.map(i64::from)),
                    countries,
                    opt_decimal(profile.budget_per_year),
                    opt_text(profile.funding_plan.as_deref()),
                    opt_text(profile.ielts_status.as_deref()),
                    opt_text(profile.gre_gmat_status.as_deref()),
                    opt_text(profile.sop_status.as_deref()),
                    flag(profile.profile_complete),
                    profile.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_write("update_profile", e))?;

        debug!(user_id = %profile.id, complete = profile.profile_complete, "Updated profile");
        Ok(())
    }

    async fn delete_profile(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let id_str = id.to_string();
        let conn = self.conn();

        // Owned rows go first so the cascade holds even with foreign keys off.
        for (table, column) in [
            ("tasks", "user_id"),
            ("user_universities", "user_id"),
            ("user_states", "user_id"),
        ] {
            conn.execute(
                &format!("DELETE FROM {table} WHERE {column} = ?1"),
                params![id_str.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_profile {table}: {e}")))?;
        }

        let affected = conn
            .execute(
                "DELETE FROM user_profiles WHERE id = ?1",
                params![id_str.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_profile: {e}")))?;

        debug!(user_id = %id, deleted = affected > 0, "Deleted profile");
        Ok(affected > 0)
    }

    // ── Stage state ─────────────────────────────────────────────────

    async fn insert_user_state(&self, state: &UserState) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO user_states (user_id, current_stage, updated_at) VALUES (?1, ?2, ?3)",
                params![
                    state.user_id.to_string(),
                    state.current_stage.to_string(),
                    state.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_write("insert_user_state", e))?;
        Ok(())
    }

    async fn get_user_state(&self, user_id: Uuid) -> Result<Option<UserState>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT user_id, current_stage, updated_at FROM user_states WHERE user_id = ?1",
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_state: {e}")))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(DatabaseError::Query(format!("get_user_state row: {e}"))),
        };

        let stage_str = get_text(&row, 1, "user_state.current_stage")?;
        let current_stage = Stage::from_str(&stage_str)
            .map_err(|e| DatabaseError::Serialization(format!("user_state.current_stage: {e}")))?;

        Ok(Some(UserState {
            user_id,
            current_stage,
            updated_at: parse_datetime(&get_text(&row, 2, "user_state.updated_at")?),
        }))
    }

    async fn update_user_state(&self, state: &UserState) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE user_states SET current_stage = ?2, updated_at = ?3 WHERE user_id = ?1",
                params![
                    state.user_id.to_string(),
                    state.current_stage.to_string(),
                    state.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_user_state: {e}")))?;

        debug!(user_id = %state.user_id, stage = %state.current_stage, "Updated user state");
        Ok(())
    }

    // ── Catalog storage ─────────────────────────────────────────────

    async fn upsert_university(&self, university: &University) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO universities ({UNIVERSITY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    university.id,
                    university.name.as_str(),
                    university.country.as_str(),
                    opt_int(university.rank.map(i64::from)),
                    university.ranking_band.as_str(),
                    university.competitiveness.as_str(),
                    university.avg_tuition_usd.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_write("upsert_university", e))?;
        Ok(())
    }

    async fn get_university(
        &self,
        id: UniversityId,
    ) -> Result<Option<University>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {UNIVERSITY_COLUMNS} FROM universities WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_university: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_university(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_university row: {e}"))),
        }
    }

    async fn filter_universities(
        &self,
        criteria: &FilterCriteria,
    ) -> Result<Vec<University>, DatabaseError> {
        let countries = serde_json::to_string(&criteria.countries)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let bands: Vec<&str> = criteria.bands.iter().map(|b| b.as_str()).collect();
        let bands = serde_json::to_string(&bands)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        // SQLite treats a negative LIMIT as unbounded.
        let limit = if criteria.limit == 0 {
            -1
        } else {
            criteria.limit as i64
        };

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {UNIVERSITY_COLUMNS} FROM universities
                     WHERE (?1 = '[]' OR LOWER(country) IN (SELECT LOWER(value) FROM json_each(?1)))
                       AND (?2 IS NULL OR CAST(avg_tuition_usd AS REAL) <= CAST(?2 AS REAL))
                       AND (?3 = '[]' OR ranking_band IN (SELECT value FROM json_each(?3)))
                     ORDER BY rank IS NULL, rank ASC, id ASC
                     LIMIT ?4"
                ),
                params![countries, opt_decimal(criteria.max_tuition), bands, limit],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("filter_universities: {e}")))?;

        let mut out = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            out.push(row_to_university(&row)?);
        }
        debug!(found = out.len(), limit = criteria.limit, "Filtered catalog");
        Ok(out)
    }

    async fn delete_university(&self, id: UniversityId) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE user_universities SET archived = 1, locked = 0, updated_at = ?2
             WHERE university_id = ?1",
            params![id, now.as_str()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("delete_university archive: {e}")))?;

        conn.execute(
            "UPDATE tasks SET obsolete = 1, updated_at = ?2
             WHERE university_id = ?1 AND completed = 0",
            params![id, now.as_str()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("delete_university tasks: {e}")))?;

        let affected = conn
            .execute("DELETE FROM universities WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_university: {e}")))?;

        info!(university_id = id, deleted = affected > 0, "Withdrew catalog entry");
        Ok(affected > 0)
    }

    // ── Shortlist records ───────────────────────────────────────────

    async fn insert_user_university(&self, record: &UserUniversity) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO user_universities ({USER_UNIVERSITY_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    record.id.to_string(),
                    record.user_id.to_string(),
                    record.university_id,
                    record.category.as_str(),
                    flag(record.shortlisted),
                    flag(record.locked),
                    flag(record.archived),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_write("insert_user_university", e))?;
        Ok(())
    }

    async fn get_user_university(
        &self,
        user_id: Uuid,
        university_id: UniversityId,
    ) -> Result<Option<UserUniversity>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {USER_UNIVERSITY_COLUMNS} FROM user_universities
                     WHERE user_id = ?1 AND university_id = ?2"
                ),
                params![user_id.to_string(), university_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_university: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user_university(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user_university row: {e}"))),
        }
    }

    async fn update_user_university(&self, record: &UserUniversity) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE user_universities SET
                    category = ?2, shortlisted = ?3, locked = ?4, updated_at = ?5
                 WHERE id = ?1 AND archived = 0",
                params![
                    record.id.to_string(),
                    record.category.as_str(),
                    flag(record.shortlisted),
                    flag(record.locked),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_user_university: {e}")))?;
        Ok(affected > 0)
    }

    async fn restore_user_university(&self, record: &UserUniversity) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE user_universities SET
                    category = ?2, shortlisted = 1, locked = 0, archived = 0, updated_at = ?3
                 WHERE id = ?1 AND archived = 1",
                params![
                    record.id.to_string(),
                    record.category.as_str(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("restore_user_university: {e}")))?;
        Ok(affected > 0)
    }

    async fn delete_user_university(
        &self,
        user_id: Uuid,
        university_id: UniversityId,
    ) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "DELETE FROM user_universities WHERE user_id = ?1 AND university_id = ?2",
                params![user_id.to_string(), university_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_user_university: {e}")))?;
        Ok(affected > 0)
    }

    async fn list_user_universities(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserUniversity>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {USER_UNIVERSITY_COLUMNS} FROM user_universities
                     WHERE user_id = ?1 AND archived = 0 ORDER BY rowid ASC"
                ),
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_user_universities: {e}")))?;

        let mut records = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            records.push(row_to_user_university(&row)?);
        }
        Ok(records)
    }

    // ── Tasks ───────────────────────────────────────────────────────

    async fn insert_task(&self, task: &Task) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO tasks ({TASK_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    task.id.to_string(),
                    task.user_id.to_string(),
                    task.title.as_str(),
                    task.description.as_str(),
                    task.stage.to_string(),
                    opt_int(task.university_id),
                    task.template_key.as_str(),
                    flag(task.completed),
                    opt_text(task.completed_at.map(|t| t.to_rfc3339()).as_deref()),
                    flag(task.obsolete),
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_write("insert_task", e))?;
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_task: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_task(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_task row: {e}"))),
        }
    }

    async fn update_task(&self, task: &Task) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE tasks SET completed = ?2, completed_at = ?3, obsolete = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    task.id.to_string(),
                    flag(task.completed),
                    opt_text(task.completed_at.map(|t| t.to_rfc3339()).as_deref()),
                    flag(task.obsolete),
                    task.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_task: {e}")))?;
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_task: {e}")))?;
        Ok(affected > 0)
    }

    async fn list_tasks(&self, user_id: Uuid) -> Result<Vec<Task>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 ORDER BY rowid ASC"),
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_tasks: {e}")))?;

        let mut tasks = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }
}

#[async_trait]
impl Catalog for LibSqlBackend {
    async fn get_university(&self, id: UniversityId) -> Result<University, EngineError> {
        Database::get_university(self, id)
            .await?
            .ok_or_else(|| EngineError::not_found("university", id))
    }

    async fn filter(&self, criteria: &FilterCriteria) -> Result<Vec<University>, EngineError> {
        Ok(self.filter_universities(criteria).await?)
    }
}
