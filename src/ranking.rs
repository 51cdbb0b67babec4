// src/ranking.rs
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::cmp::Ordering;

use crate::error::MatchError;
use crate::scoring::{MatchResult, MatchScorer};

/// One ranked candidate with its computed match details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMatch {
    pub id: i64,
    pub match_data: MatchResult,
}

/// Applies the scorer across a caller-supplied candidate set and returns a
/// filtered, descending-ordered slice of it.
///
/// Which candidates are eligible at all (active, approved, ...) is the
/// caller's concern, as is any apply-eligibility threshold; the only filter
/// here is `min_match`.
pub struct BulkRanker<'a> {
    scorer: MatchScorer<'a>,
}

impl<'a> BulkRanker<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self {
            scorer: MatchScorer::new(pool),
        }
    }

    /// Rank candidate opportunities for one student.
    pub async fn rank_opportunities_for_student(
        &self,
        student_id: i64,
        candidate_ids: &[i64],
        min_match: f64,
        limit: usize,
    ) -> Result<Vec<RankedMatch>, MatchError> {
        let mut ranked = Vec::new();
        for &opportunity_id in candidate_ids {
            let match_data = self
                .scorer
                .score_opportunity(student_id, opportunity_id)
                .await?;
            if match_data.match_percentage >= min_match {
                ranked.push(RankedMatch {
                    id: opportunity_id,
                    match_data,
                });
            }
        }
        Ok(sort_and_truncate(ranked, limit))
    }

    /// Rank candidate students for one opportunity.
    pub async fn rank_students_for_opportunity(
        &self,
        opportunity_id: i64,
        candidate_ids: &[i64],
        min_match: f64,
        limit: usize,
    ) -> Result<Vec<RankedMatch>, MatchError> {
        let mut ranked = Vec::new();
        for &student_id in candidate_ids {
            let match_data = self
                .scorer
                .score_opportunity(student_id, opportunity_id)
                .await?;
            if match_data.match_percentage >= min_match {
                ranked.push(RankedMatch {
                    id: student_id,
                    match_data,
                });
            }
        }
        Ok(sort_and_truncate(ranked, limit))
    }

    /// Rank candidate external jobs for one student.
    pub async fn rank_external_jobs_for_student(
        &self,
        student_id: i64,
        candidate_ids: &[i64],
        min_match: f64,
        limit: usize,
    ) -> Result<Vec<RankedMatch>, MatchError> {
        let mut ranked = Vec::new();
        for &external_job_id in candidate_ids {
            let match_data = self
                .scorer
                .score_external_job(student_id, external_job_id)
                .await?;
            if match_data.match_percentage >= min_match {
                ranked.push(RankedMatch {
                    id: external_job_id,
                    match_data,
                });
            }
        }
        Ok(sort_and_truncate(ranked, limit))
    }
}

/// Stable descending sort by percentage; ties keep the caller's candidate
/// order.
fn sort_and_truncate(mut ranked: Vec<RankedMatch>, limit: usize) -> Vec<RankedMatch> {
    ranked.sort_by(|a, b| {
        b.match_data
            .match_percentage
            .partial_cmp(&a.match_data.match_percentage)
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}
