// src/database.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Opportunity {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExternalJob {
    pub id: i64,
    pub title: String,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct DatabaseConfig {
    pub database_path: PathBuf,
    pub pool: Option<SqlitePool>,
}

impl DatabaseConfig {
    pub fn new(database_path: PathBuf) -> Self {
        Self {
            database_path,
            pool: None,
        }
    }

    /// Initialize the database connection pool
    pub async fn init_pool(&mut self) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.database_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", self.database_path.display());

        let pool = SqlitePool::connect(&database_url)
            .await
            .context("Failed to connect to SQLite database")?;
        self.pool = Some(pool);

        info!("Database connection pool initialized: {}", database_url);
        Ok(())
    }

    /// Get the database pool
    pub fn pool(&self) -> Result<&SqlitePool> {
        self.pool.as_ref().ok_or_else(|| {
            anyhow::anyhow!("Database pool not initialized. Call init_pool() first.")
        })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        run_migrations(self.pool()?).await
    }
}

/// Create the portal tables and indexes if they do not exist yet.
///
/// The unique index on skills.normalized_name is what makes concurrent
/// first references to the same skill safe: the second insert is a no-op
/// and the caller re-reads the winner's row.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS opportunities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS external_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            company TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS skills (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            category TEXT,
            normalized_name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS student_skills (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            skill_id INTEGER NOT NULL,
            proficiency_level TEXT NOT NULL DEFAULT 'intermediate',
            years_experience REAL,
            UNIQUE(student_id, skill_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_student_skills_student
        ON student_skills(student_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS opportunity_skills (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            opportunity_id INTEGER NOT NULL,
            skill_id INTEGER NOT NULL,
            is_required BOOLEAN NOT NULL DEFAULT TRUE,
            priority INTEGER NOT NULL DEFAULT 1,
            UNIQUE(opportunity_id, skill_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_opportunity_skills_opportunity
        ON opportunity_skills(opportunity_id);
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS external_job_skills (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_job_id INTEGER NOT NULL,
            skill_id INTEGER NOT NULL,
            UNIQUE(external_job_id, skill_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_external_job_skills_job
        ON external_job_skills(external_job_id);
        "#,
    )
    .execute(pool)
    .await?;

    info!("Database migrations completed successfully");
    Ok(())
}

/// Registry of students, opportunities and external jobs.
///
/// The matching engine only needs this to tell an unknown identifier apart
/// from a known one with an empty skill set; selecting which candidates are
/// eligible for ranking stays with the caller.
pub struct Roster<'a> {
    pool: &'a SqlitePool,
}

impl<'a> Roster<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a new student
    pub async fn add_student(&self, name: &str) -> Result<Student> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO students (name, created_at)
            VALUES (?, ?)
            "#,
        )
        .bind(name)
        .bind(now)
        .execute(self.pool)
        .await?;

        let student = Student {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            created_at: now,
        };

        info!("Created student: {} (id {})", student.name, student.id);
        Ok(student)
    }

    /// Register a new opportunity
    pub async fn add_opportunity(&self, title: &str) -> Result<Opportunity> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO opportunities (title, created_at)
            VALUES (?, ?)
            "#,
        )
        .bind(title)
        .bind(now)
        .execute(self.pool)
        .await?;

        let opportunity = Opportunity {
            id: result.last_insert_rowid(),
            title: title.to_string(),
            created_at: now,
        };

        info!(
            "Created opportunity: {} (id {})",
            opportunity.title, opportunity.id
        );
        Ok(opportunity)
    }

    /// Register an externally-sourced job posting
    pub async fn add_external_job(&self, title: &str, company: Option<&str>) -> Result<ExternalJob> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO external_jobs (title, company, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(title)
        .bind(company)
        .bind(now)
        .execute(self.pool)
        .await?;

        let job = ExternalJob {
            id: result.last_insert_rowid(),
            title: title.to_string(),
            company: company.map(|c| c.to_string()),
            created_at: now,
        };

        info!("Created external job: {} (id {})", job.title, job.id);
        Ok(job)
    }

    /// List all student ids
    pub async fn list_student_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM students ORDER BY id")
            .fetch_all(self.pool)
            .await?;
        Ok(ids)
    }

    /// List all opportunity ids
    pub async fn list_opportunity_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM opportunities ORDER BY id")
            .fetch_all(self.pool)
            .await?;
        Ok(ids)
    }

    /// List all external job ids
    pub async fn list_external_job_ids(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM external_jobs ORDER BY id")
            .fetch_all(self.pool)
            .await?;
        Ok(ids)
    }
}

/// In-memory pool for tests. Capped at one connection so every query sees
/// the same SQLite memory database.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    use sqlx::sqlite::SqlitePoolOptions;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    run_migrations(&pool).await.expect("Migrations failed");
    pool
}
