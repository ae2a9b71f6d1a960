//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "counseling_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS user_profiles (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT,
                education_level TEXT,
                degree TEXT,
                graduation_year INTEGER,
                gpa TEXT,
                intended_degree TEXT,
                field_of_study TEXT,
                intake_year INTEGER,
                preferred_countries TEXT NOT NULL DEFAULT '[]',
                budget_per_year TEXT,
                funding_plan TEXT,
                ielts_status TEXT,
                gre_gmat_status TEXT,
                sop_status TEXT,
                profile_complete INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_states (
                user_id TEXT PRIMARY KEY REFERENCES user_profiles(id) ON DELETE CASCADE,
                current_stage TEXT NOT NULL DEFAULT 'ONBOARDING',
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS universities (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                country TEXT NOT NULL,
                rank INTEGER,
                ranking_band TEXT NOT NULL,
                competitiveness TEXT NOT NULL,
                avg_tuition_usd TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_universities_country ON universities(country);
            CREATE INDEX IF NOT EXISTS idx_universities_rank ON universities(rank);

            CREATE TABLE IF NOT EXISTS user_universities (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES user_profiles(id) ON DELETE CASCADE,
                university_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                shortlisted INTEGER NOT NULL DEFAULT 1,
                locked INTEGER NOT NULL DEFAULT 0,
                archived INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, university_id)
            );
            CREATE INDEX IF NOT EXISTS idx_user_universities_user ON user_universities(user_id);
        "#,
    },
    Migration {
        version: 2,
        name: "tasks",
        sql: r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES user_profiles(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                stage TEXT NOT NULL,
                template_key TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT,
                obsolete INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);
        "#,
    },
    Migration {
        version: 3,
        name: "task_university_scope",
        sql: r#"
            ALTER TABLE tasks ADD COLUMN university_id INTEGER;
            CREATE INDEX IF NOT EXISTS idx_tasks_university_id ON tasks(university_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_identity
                ON tasks(user_id, stage, template_key, COALESCE(university_id, 0));
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    let version = get_current_version(conn).await?;
    tracing::debug!(version, "Database migrations complete");
    Ok(())
}

/// Latest version this build knows about.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Get the highest applied migration version, or 0 if none.
pub(crate) async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Migration(format!("Failed to parse version: {e}"))),
        None => Ok(0),
    }
}

async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record V{version}: {e}")))?;
    Ok(())
}
