// src/catalog.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::normalizer::normalize_skill_name;

/// Canonical skill entity, deduplicated by its normalized name.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Skill {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub normalized_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Proficiency {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
    Expert,
}

impl Proficiency {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }
}

/// Links a student to a skill with a proficiency level.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentSkill {
    pub id: i64,
    pub student_id: i64,
    pub skill_id: i64,
    pub proficiency_level: Proficiency,
    pub years_experience: Option<f64>,
}

/// Links an opportunity to a skill, mandatory or nice-to-have.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OpportunitySkill {
    pub id: i64,
    pub opportunity_id: i64,
    pub skill_id: i64,
    pub is_required: bool,
    pub priority: i64,
}

/// Links an external job to a skill. External postings make no
/// required/preferred distinction.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExternalJobSkill {
    pub id: i64,
    pub external_job_id: i64,
    pub skill_id: i64,
}

/// Deduplicated skill registry with resolve-or-create semantics, plus the
/// wholesale skill-set replacements for students, opportunities and
/// external jobs.
pub struct SkillCatalog<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SkillCatalog<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve the canonical skill for a name, creating it on first reference.
    ///
    /// Lookup order: normalized name, then case-insensitive display name
    /// (rows that predate normalization), then insert. The category of an
    /// existing row is never overwritten.
    pub async fn resolve_or_create(&self, name: &str, category: Option<&str>) -> Result<Skill> {
        let display_name = name.trim();
        if display_name.is_empty() {
            anyhow::bail!("Skill name must not be blank");
        }
        let normalized = normalize_skill_name(display_name);

        if let Some(skill) = self.find_by_normalized(&normalized).await? {
            return Ok(skill);
        }

        let legacy = sqlx::query_as::<_, Skill>(
            r#"
            SELECT id, name, category, normalized_name, created_at
            FROM skills
            WHERE lower(name) = ?
            "#,
        )
        .bind(&normalized)
        .fetch_optional(self.pool)
        .await?;

        if let Some(skill) = legacy {
            return Ok(skill);
        }

        // A lost race leaves the insert a no-op; the re-select below then
        // returns the winner's row.
        sqlx::query(
            r#"
            INSERT INTO skills (name, category, normalized_name, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(normalized_name) DO NOTHING
            "#,
        )
        .bind(display_name)
        .bind(category)
        .bind(&normalized)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        let skill = self
            .find_by_normalized(&normalized)
            .await?
            .context("Skill row missing after upsert")?;

        debug!(
            "Resolved skill '{}' -> '{}' (id {})",
            display_name, skill.normalized_name, skill.id
        );
        Ok(skill)
    }

    async fn find_by_normalized(&self, normalized: &str) -> Result<Option<Skill>> {
        let skill = sqlx::query_as::<_, Skill>(
            r#"
            SELECT id, name, category, normalized_name, created_at
            FROM skills
            WHERE normalized_name = ?
            "#,
        )
        .bind(normalized)
        .fetch_optional(self.pool)
        .await?;

        Ok(skill)
    }

    /// Wholesale replace of a student's skill set.
    ///
    /// Clears every existing record for the student and inserts the new set
    /// in one transaction, so a concurrent reader never sees a half-cleared
    /// profile. Blank names are skipped; proficiency comes from the map
    /// keyed by the raw name and defaults to intermediate; years of
    /// experience are optional and must be non-negative.
    pub async fn replace_student_skills(
        &self,
        student_id: i64,
        skill_names: &[String],
        proficiency_by_name: &HashMap<String, String>,
        years_by_name: &HashMap<String, f64>,
    ) -> Result<Vec<StudentSkill>> {
        let mut resolved = Vec::new();
        for raw in skill_names {
            if raw.trim().is_empty() {
                continue;
            }
            let skill = self.resolve_or_create(raw, None).await?;
            let proficiency = proficiency_by_name
                .get(raw)
                .and_then(|label| Proficiency::parse(label))
                .unwrap_or_default();
            let years = years_by_name.get(raw).copied();
            if let Some(years) = years {
                if years < 0.0 {
                    anyhow::bail!("Years of experience for '{}' must be non-negative", raw);
                }
            }
            resolved.push((skill, proficiency, years));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM student_skills WHERE student_id = ?")
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

        for (skill, proficiency, years) in &resolved {
            sqlx::query(
                r#"
                INSERT INTO student_skills (student_id, skill_id, proficiency_level, years_experience)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(student_id, skill_id) DO UPDATE SET
                    proficiency_level = excluded.proficiency_level,
                    years_experience = excluded.years_experience
                "#,
            )
            .bind(student_id)
            .bind(skill.id)
            .bind(*proficiency)
            .bind(*years)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.context("Failed to commit skill update")?;

        info!(
            "Replaced skills for student {}: {} entries",
            student_id,
            resolved.len()
        );

        let records = sqlx::query_as::<_, StudentSkill>(
            r#"
            SELECT id, student_id, skill_id, proficiency_level, years_experience
            FROM student_skills
            WHERE student_id = ?
            ORDER BY id
            "#,
        )
        .bind(student_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Wholesale replace of an opportunity's skill set.
    ///
    /// `required_names` marks the mandatory subset by raw name; when absent,
    /// every listed skill is mandatory. Required skills carry priority 1,
    /// preferred skills priority 0.
    pub async fn replace_opportunity_skills(
        &self,
        opportunity_id: i64,
        skill_names: &[String],
        required_names: Option<&[String]>,
    ) -> Result<Vec<OpportunitySkill>> {
        let required_set: HashSet<&str> = required_names
            .unwrap_or(skill_names)
            .iter()
            .map(|s| s.as_str())
            .collect();

        let mut resolved = Vec::new();
        for raw in skill_names {
            if raw.trim().is_empty() {
                continue;
            }
            let skill = self.resolve_or_create(raw, None).await?;
            let is_required = required_set.contains(raw.as_str());
            resolved.push((skill, is_required));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM opportunity_skills WHERE opportunity_id = ?")
            .bind(opportunity_id)
            .execute(&mut *tx)
            .await?;

        for (skill, is_required) in &resolved {
            let priority: i64 = if *is_required { 1 } else { 0 };
            sqlx::query(
                r#"
                INSERT INTO opportunity_skills (opportunity_id, skill_id, is_required, priority)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(opportunity_id, skill_id) DO UPDATE SET
                    is_required = excluded.is_required,
                    priority = excluded.priority
                "#,
            )
            .bind(opportunity_id)
            .bind(skill.id)
            .bind(*is_required)
            .bind(priority)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.context("Failed to commit skill update")?;

        info!(
            "Replaced skills for opportunity {}: {} entries",
            opportunity_id,
            resolved.len()
        );

        let records = sqlx::query_as::<_, OpportunitySkill>(
            r#"
            SELECT id, opportunity_id, skill_id, is_required, priority
            FROM opportunity_skills
            WHERE opportunity_id = ?
            ORDER BY id
            "#,
        )
        .bind(opportunity_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Wholesale replace of an external job's skill set. All skills weigh
    /// equally, there is no required/preferred split.
    pub async fn replace_external_job_skills(
        &self,
        external_job_id: i64,
        skill_names: &[String],
    ) -> Result<Vec<ExternalJobSkill>> {
        let mut resolved = Vec::new();
        for raw in skill_names {
            if raw.trim().is_empty() {
                continue;
            }
            resolved.push(self.resolve_or_create(raw, None).await?);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM external_job_skills WHERE external_job_id = ?")
            .bind(external_job_id)
            .execute(&mut *tx)
            .await?;

        for skill in &resolved {
            sqlx::query(
                r#"
                INSERT INTO external_job_skills (external_job_id, skill_id)
                VALUES (?, ?)
                ON CONFLICT(external_job_id, skill_id) DO NOTHING
                "#,
            )
            .bind(external_job_id)
            .bind(skill.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.context("Failed to commit skill update")?;

        info!(
            "Replaced skills for external job {}: {} entries",
            external_job_id,
            resolved.len()
        );

        let records = sqlx::query_as::<_, ExternalJobSkill>(
            r#"
            SELECT id, external_job_id, skill_id
            FROM external_job_skills
            WHERE external_job_id = ?
            ORDER BY id
            "#,
        )
        .bind(external_job_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }
}
