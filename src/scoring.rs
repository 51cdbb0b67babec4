// src/scoring.rs
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::debug;

use crate::error::MatchError;

/// Share of the score carried by required skills when any are present.
const REQUIRED_WEIGHT: f64 = 0.8;
/// Share of the score carried by preferred skills when required ones exist.
const PREFERRED_WEIGHT: f64 = 0.2;

/// Outcome of scoring one student against one target.
///
/// Never persisted; recomputed on every query so it stays live as skills
/// and requirements change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_percentage: f64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub total_required: usize,
    pub matched_count: usize,
    pub preferred_matched: usize,
    pub total_preferred: usize,
}

impl MatchResult {
    fn zero() -> Self {
        Self {
            match_percentage: 0.0,
            matched_skills: Vec::new(),
            missing_skills: Vec::new(),
            total_required: 0,
            matched_count: 0,
            preferred_matched: 0,
            total_preferred: 0,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, sqlx::FromRow)]
struct RequirementRow {
    skill_id: i64,
    is_required: bool,
    name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct JobSkillRow {
    skill_id: i64,
    name: String,
}

/// Computes weighted match percentages between one student and one target.
pub struct MatchScorer<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MatchScorer<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Score a student against an opportunity.
    ///
    /// Required skills carry 80% of the score and preferred skills the
    /// remaining 20%; with no required skills the preferred ratio stands
    /// alone. A student with an empty skill set scores zero, which is a
    /// valid result, not an error.
    pub async fn score_opportunity(
        &self,
        student_id: i64,
        opportunity_id: i64,
    ) -> Result<MatchResult, MatchError> {
        self.ensure_student(student_id).await?;
        self.ensure_opportunity(opportunity_id).await?;

        let possessed = self.student_skill_ids(student_id).await?;
        if possessed.is_empty() {
            return Ok(MatchResult::zero());
        }

        let rows: Vec<RequirementRow> = sqlx::query_as(
            r#"
            SELECT os.skill_id, os.is_required, s.name
            FROM opportunity_skills os
            JOIN skills s ON s.id = os.skill_id
            WHERE os.opportunity_id = ?
            ORDER BY os.id
            "#,
        )
        .bind(opportunity_id)
        .fetch_all(self.pool)
        .await?;

        let (required, preferred): (Vec<_>, Vec<_>) =
            rows.into_iter().partition(|row| row.is_required);

        let total_required = required.len();
        let total_preferred = preferred.len();
        let matched_count = required
            .iter()
            .filter(|row| possessed.contains(&row.skill_id))
            .count();
        let preferred_matched = preferred
            .iter()
            .filter(|row| possessed.contains(&row.skill_id))
            .count();

        let match_percentage = if total_required > 0 {
            let required_score =
                matched_count as f64 / total_required as f64 * REQUIRED_WEIGHT;
            let preferred_score = if total_preferred > 0 {
                preferred_matched as f64 / total_preferred as f64 * PREFERRED_WEIGHT
            } else {
                0.0
            };
            (required_score + preferred_score) * 100.0
        } else if total_preferred > 0 {
            preferred_matched as f64 / total_preferred as f64 * 100.0
        } else {
            0.0
        };

        // Required matches first, then preferred, each group in insertion
        // order. Preferred gaps are never reported as missing.
        let matched_skills = required
            .iter()
            .chain(preferred.iter())
            .filter(|row| possessed.contains(&row.skill_id))
            .map(|row| row.name.clone())
            .collect();
        let missing_skills = required
            .iter()
            .filter(|row| !possessed.contains(&row.skill_id))
            .map(|row| row.name.clone())
            .collect();

        debug!(
            "Scored student {} against opportunity {}: {}/{} required, {}/{} preferred",
            student_id, opportunity_id, matched_count, total_required,
            preferred_matched, total_preferred
        );

        Ok(MatchResult {
            match_percentage: round2(match_percentage),
            matched_skills,
            missing_skills,
            total_required,
            matched_count,
            preferred_matched,
            total_preferred,
        })
    }

    /// Score a student against an external job posting.
    ///
    /// External postings have no required/preferred distinction; every
    /// skill weighs equally.
    pub async fn score_external_job(
        &self,
        student_id: i64,
        external_job_id: i64,
    ) -> Result<MatchResult, MatchError> {
        self.ensure_student(student_id).await?;
        self.ensure_external_job(external_job_id).await?;

        let possessed = self.student_skill_ids(student_id).await?;
        if possessed.is_empty() {
            return Ok(MatchResult::zero());
        }

        let rows: Vec<JobSkillRow> = sqlx::query_as(
            r#"
            SELECT ejs.skill_id, s.name
            FROM external_job_skills ejs
            JOIN skills s ON s.id = ejs.skill_id
            WHERE ejs.external_job_id = ?
            ORDER BY ejs.id
            "#,
        )
        .bind(external_job_id)
        .fetch_all(self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(MatchResult::zero());
        }

        let total_required = rows.len();
        let matched_count = rows
            .iter()
            .filter(|row| possessed.contains(&row.skill_id))
            .count();
        let match_percentage = matched_count as f64 / total_required as f64 * 100.0;

        let matched_skills = rows
            .iter()
            .filter(|row| possessed.contains(&row.skill_id))
            .map(|row| row.name.clone())
            .collect();
        let missing_skills = rows
            .iter()
            .filter(|row| !possessed.contains(&row.skill_id))
            .map(|row| row.name.clone())
            .collect();

        debug!(
            "Scored student {} against external job {}: {}/{} skills",
            student_id, external_job_id, matched_count, total_required
        );

        Ok(MatchResult {
            match_percentage: round2(match_percentage),
            matched_skills,
            missing_skills,
            total_required,
            matched_count,
            preferred_matched: 0,
            total_preferred: 0,
        })
    }

    async fn student_skill_ids(&self, student_id: i64) -> Result<HashSet<i64>, sqlx::Error> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT skill_id FROM student_skills WHERE student_id = ?")
                .bind(student_id)
                .fetch_all(self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }

    async fn ensure_student(&self, student_id: i64) -> Result<(), MatchError> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM students WHERE id = ?")
            .bind(student_id)
            .fetch_optional(self.pool)
            .await?;
        match exists {
            Some(_) => Ok(()),
            None => Err(MatchError::StudentNotFound(student_id)),
        }
    }

    async fn ensure_opportunity(&self, opportunity_id: i64) -> Result<(), MatchError> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM opportunities WHERE id = ?")
            .bind(opportunity_id)
            .fetch_optional(self.pool)
            .await?;
        match exists {
            Some(_) => Ok(()),
            None => Err(MatchError::OpportunityNotFound(opportunity_id)),
        }
    }

    async fn ensure_external_job(&self, external_job_id: i64) -> Result<(), MatchError> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM external_jobs WHERE id = ?")
            .bind(external_job_id)
            .fetch_optional(self.pool)
            .await?;
        match exists {
            Some(_) => Ok(()),
            None => Err(MatchError::ExternalJobNotFound(external_job_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SkillCatalog;
    use crate::database::{test_pool, Roster};
    use std::collections::HashMap;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    async fn set_student_skills(pool: &SqlitePool, student_id: i64, skills: &[&str]) {
        SkillCatalog::new(pool)
            .replace_student_skills(student_id, &names(skills), &HashMap::new(), &HashMap::new())
            .await
            .unwrap();
    }

    async fn set_opportunity_skills(
        pool: &SqlitePool,
        opportunity_id: i64,
        skills: &[&str],
        required: &[&str],
    ) {
        let required = names(required);
        SkillCatalog::new(pool)
            .replace_opportunity_skills(opportunity_id, &names(skills), Some(required.as_slice()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_possession_short_circuits() {
        let pool = test_pool().await;
        let roster = Roster::new(&pool);
        let student = roster.add_student("Ada").await.unwrap();
        let opportunity = roster.add_opportunity("Backend Intern").await.unwrap();
        set_opportunity_skills(&pool, opportunity.id, &["React", "Vue"], &["React"]).await;

        let result = MatchScorer::new(&pool)
            .score_opportunity(student.id, opportunity.id)
            .await
            .unwrap();

        assert_eq!(result.match_percentage, 0.0);
        assert!(result.matched_skills.is_empty());
        assert!(result.missing_skills.is_empty());
        assert_eq!(result.total_required, 0);
    }

    #[tokio::test]
    async fn test_zero_requirements_scores_zero() {
        let pool = test_pool().await;
        let roster = Roster::new(&pool);
        let student = roster.add_student("Ada").await.unwrap();
        let opportunity = roster.add_opportunity("Backend Intern").await.unwrap();
        set_student_skills(&pool, student.id, &["React"]).await;

        let result = MatchScorer::new(&pool)
            .score_opportunity(student.id, opportunity.id)
            .await
            .unwrap();

        assert_eq!(result.match_percentage, 0.0);
        assert_eq!(result.total_required, 0);
        assert_eq!(result.total_preferred, 0);
    }

    #[tokio::test]
    async fn test_required_matched_preferred_missed_is_80() {
        let pool = test_pool().await;
        let roster = Roster::new(&pool);
        let student = roster.add_student("Ada").await.unwrap();
        let opportunity = roster.add_opportunity("Backend Intern").await.unwrap();
        set_opportunity_skills(&pool, opportunity.id, &["A", "B", "C", "D"], &["A", "B"]).await;
        set_student_skills(&pool, student.id, &["A", "B"]).await;

        let result = MatchScorer::new(&pool)
            .score_opportunity(student.id, opportunity.id)
            .await
            .unwrap();

        assert_eq!(result.match_percentage, 80.00);
        assert_eq!(result.matched_count, 2);
        assert_eq!(result.preferred_matched, 0);
    }

    #[tokio::test]
    async fn test_all_matched_is_100() {
        let pool = test_pool().await;
        let roster = Roster::new(&pool);
        let student = roster.add_student("Ada").await.unwrap();
        let opportunity = roster.add_opportunity("Backend Intern").await.unwrap();
        set_opportunity_skills(&pool, opportunity.id, &["A", "B", "C", "D"], &["A", "B"]).await;
        set_student_skills(&pool, student.id, &["A", "B", "C", "D"]).await;

        let result = MatchScorer::new(&pool)
            .score_opportunity(student.id, opportunity.id)
            .await
            .unwrap();

        assert_eq!(result.match_percentage, 100.00);
    }

    #[tokio::test]
    async fn test_preferred_only_fallback_is_50() {
        let pool = test_pool().await;
        let roster = Roster::new(&pool);
        let student = roster.add_student("Ada").await.unwrap();
        let opportunity = roster.add_opportunity("Backend Intern").await.unwrap();
        set_opportunity_skills(&pool, opportunity.id, &["C", "D"], &[]).await;
        set_student_skills(&pool, student.id, &["C"]).await;

        let result = MatchScorer::new(&pool)
            .score_opportunity(student.id, opportunity.id)
            .await
            .unwrap();

        assert_eq!(result.match_percentage, 50.00);
        assert_eq!(result.total_required, 0);
        assert_eq!(result.total_preferred, 2);
        assert_eq!(result.preferred_matched, 1);
    }

    #[tokio::test]
    async fn test_end_to_end_scenario_is_40() {
        let pool = test_pool().await;
        let roster = Roster::new(&pool);
        let student = roster.add_student("Ada").await.unwrap();
        let opportunity = roster.add_opportunity("Full-stack Intern").await.unwrap();

        set_opportunity_skills(
            &pool,
            opportunity.id,
            &["React", "Node.js", "MongoDB"],
            &["React", "Node.js"],
        )
        .await;
        set_student_skills(&pool, student.id, &["React", "JavaScript"]).await;

        // React, Node.js, MongoDB plus the student's JavaScript
        let skill_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM skills")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(skill_count, 4);

        let result = MatchScorer::new(&pool)
            .score_opportunity(student.id, opportunity.id)
            .await
            .unwrap();

        assert_eq!(result.match_percentage, 40.00);
        assert_eq!(result.matched_skills, vec!["React".to_string()]);
        assert_eq!(result.missing_skills, vec!["Node.js".to_string()]);
        assert_eq!(result.total_required, 2);
        assert_eq!(result.matched_count, 1);
        assert_eq!(result.preferred_matched, 0);
        assert_eq!(result.total_preferred, 1);
    }

    #[tokio::test]
    async fn test_adding_required_skill_never_decreases_score() {
        let pool = test_pool().await;
        let roster = Roster::new(&pool);
        let student = roster.add_student("Ada").await.unwrap();
        let opportunity = roster.add_opportunity("Backend Intern").await.unwrap();
        set_opportunity_skills(&pool, opportunity.id, &["A", "B", "C"], &["A", "B"]).await;

        let scorer = MatchScorer::new(&pool);

        set_student_skills(&pool, student.id, &["A"]).await;
        let before = scorer
            .score_opportunity(student.id, opportunity.id)
            .await
            .unwrap();

        set_student_skills(&pool, student.id, &["A", "B"]).await;
        let after = scorer
            .score_opportunity(student.id, opportunity.id)
            .await
            .unwrap();

        assert!(after.match_percentage >= before.match_percentage);
    }

    #[tokio::test]
    async fn test_matched_skills_order_required_then_preferred() {
        let pool = test_pool().await;
        let roster = Roster::new(&pool);
        let student = roster.add_student("Ada").await.unwrap();
        let opportunity = roster.add_opportunity("Backend Intern").await.unwrap();

        // Insertion order: A (preferred), B (required)
        set_opportunity_skills(&pool, opportunity.id, &["A", "B"], &["B"]).await;
        set_student_skills(&pool, student.id, &["A", "B"]).await;

        let result = MatchScorer::new(&pool)
            .score_opportunity(student.id, opportunity.id)
            .await
            .unwrap();

        assert_eq!(
            result.matched_skills,
            vec!["B".to_string(), "A".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_ids_are_errors_not_zero_results() {
        let pool = test_pool().await;
        let roster = Roster::new(&pool);
        let student = roster.add_student("Ada").await.unwrap();
        let opportunity = roster.add_opportunity("Backend Intern").await.unwrap();

        let scorer = MatchScorer::new(&pool);

        let err = scorer
            .score_opportunity(9999, opportunity.id)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::StudentNotFound(9999)));

        let err = scorer
            .score_opportunity(student.id, 9999)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::OpportunityNotFound(9999)));

        let err = scorer
            .score_external_job(student.id, 9999)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::ExternalJobNotFound(9999)));

        // A known student with no skills is a zero result, not an error
        let result = scorer
            .score_opportunity(student.id, opportunity.id)
            .await
            .unwrap();
        assert_eq!(result.match_percentage, 0.0);
    }

    #[tokio::test]
    async fn test_external_job_uniform_weighting() {
        let pool = test_pool().await;
        let roster = Roster::new(&pool);
        let catalog = SkillCatalog::new(&pool);
        let student = roster.add_student("Ada").await.unwrap();
        let job = roster
            .add_external_job("Data Engineer", Some("Acme"))
            .await
            .unwrap();

        catalog
            .replace_external_job_skills(job.id, &names(&["Python", "SQL", "Spark"]))
            .await
            .unwrap();
        set_student_skills(&pool, student.id, &["Python", "SQL"]).await;

        let result = MatchScorer::new(&pool)
            .score_external_job(student.id, job.id)
            .await
            .unwrap();

        assert_eq!(result.match_percentage, 66.67);
        assert_eq!(result.total_required, 3);
        assert_eq!(result.matched_count, 2);
        assert_eq!(
            result.matched_skills,
            vec!["Python".to_string(), "SQL".to_string()]
        );
        assert_eq!(result.missing_skills, vec!["Spark".to_string()]);
    }

    #[tokio::test]
    async fn test_external_job_without_skills_scores_zero() {
        let pool = test_pool().await;
        let roster = Roster::new(&pool);
        let student = roster.add_student("Ada").await.unwrap();
        let job = roster.add_external_job("Data Engineer", None).await.unwrap();
        set_student_skills(&pool, student.id, &["Python"]).await;

        let result = MatchScorer::new(&pool)
            .score_external_job(student.id, job.id)
            .await
            .unwrap();

        assert_eq!(result.match_percentage, 0.0);
        assert_eq!(result.total_required, 0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(66.66666), 66.67);
        assert_eq!(round2(40.0), 40.0);
        assert_eq!(round2(0.005), 0.01);
    }
}
