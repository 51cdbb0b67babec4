// src/cli.rs
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

use crate::catalog::SkillCatalog;
use crate::database::{DatabaseConfig, Roster};
use crate::ranking::BulkRanker;
use crate::scoring::MatchScorer;

#[derive(Parser)]
#[command(name = "skillbridge")]
#[command(about = "Manage skills and run matching for the placement portal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, default_value = "data/skillbridge.db")]
    pub database_path: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize the database
    Init,
    /// Register a student
    AddStudent { name: String },
    /// Register an opportunity
    AddOpportunity { title: String },
    /// Register an external job posting
    AddExternalJob {
        title: String,
        #[arg(long)]
        company: Option<String>,
    },
    /// Replace a student's skill set (comma-separated names)
    SetStudentSkills {
        student_id: i64,
        skills: String,
        /// Proficiency per skill, e.g. "React=expert,SQL=beginner"
        #[arg(long)]
        proficiency: Option<String>,
    },
    /// Replace an opportunity's skill set (comma-separated names)
    SetOpportunitySkills {
        opportunity_id: i64,
        skills: String,
        /// Comma-separated subset of mandatory skills; defaults to all
        #[arg(long)]
        required: Option<String>,
    },
    /// Replace an external job's skill set (comma-separated names)
    SetExternalJobSkills { external_job_id: i64, skills: String },
    /// Score one student against one opportunity
    Match {
        student_id: i64,
        opportunity_id: i64,
    },
    /// Score one student against one external job
    MatchExternal {
        student_id: i64,
        external_job_id: i64,
    },
    /// Rank all registered opportunities for a student
    RankOpportunities {
        student_id: i64,
        #[arg(long, default_value_t = 0.0)]
        min_match: f64,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Rank all registered students for an opportunity
    RankStudents {
        opportunity_id: i64,
        #[arg(long, default_value_t = 0.0)]
        min_match: f64,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Rank all registered external jobs for a student
    RankExternalJobs {
        student_id: i64,
        #[arg(long, default_value_t = 0.0)]
        min_match: f64,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut db_config = DatabaseConfig::new(cli.database_path.clone());
    db_config.init_pool().await?;
    db_config.migrate().await?;

    let pool = db_config.pool()?;
    let roster = Roster::new(pool);
    let catalog = SkillCatalog::new(pool);

    match cli.command {
        Command::Init => {
            info!("Database initialized at {}", cli.database_path.display());
            println!("Database initialized at {}", cli.database_path.display());
        }

        Command::AddStudent { name } => {
            let student = roster.add_student(&name).await?;
            println!("Created student '{}' (id {})", student.name, student.id);
        }

        Command::AddOpportunity { title } => {
            let opportunity = roster.add_opportunity(&title).await?;
            println!(
                "Created opportunity '{}' (id {})",
                opportunity.title, opportunity.id
            );
        }

        Command::AddExternalJob { title, company } => {
            let job = roster.add_external_job(&title, company.as_deref()).await?;
            println!("Created external job '{}' (id {})", job.title, job.id);
        }

        Command::SetStudentSkills {
            student_id,
            skills,
            proficiency,
        } => {
            let skill_names = parse_list(&skills);
            let proficiency_by_name = parse_pairs(proficiency.as_deref());
            let records = catalog
                .replace_student_skills(
                    student_id,
                    &skill_names,
                    &proficiency_by_name,
                    &HashMap::new(),
                )
                .await?;
            println!(
                "Replaced skills for student {}: {} entries",
                student_id,
                records.len()
            );
        }

        Command::SetOpportunitySkills {
            opportunity_id,
            skills,
            required,
        } => {
            let skill_names = parse_list(&skills);
            let required_names = required.as_deref().map(parse_list);
            let records = catalog
                .replace_opportunity_skills(
                    opportunity_id,
                    &skill_names,
                    required_names.as_deref(),
                )
                .await?;
            println!(
                "Replaced skills for opportunity {}: {} entries",
                opportunity_id,
                records.len()
            );
        }

        Command::SetExternalJobSkills {
            external_job_id,
            skills,
        } => {
            let skill_names = parse_list(&skills);
            let records = catalog
                .replace_external_job_skills(external_job_id, &skill_names)
                .await?;
            println!(
                "Replaced skills for external job {}: {} entries",
                external_job_id,
                records.len()
            );
        }

        Command::Match {
            student_id,
            opportunity_id,
        } => {
            let result = MatchScorer::new(pool)
                .score_opportunity(student_id, opportunity_id)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::MatchExternal {
            student_id,
            external_job_id,
        } => {
            let result = MatchScorer::new(pool)
                .score_external_job(student_id, external_job_id)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::RankOpportunities {
            student_id,
            min_match,
            limit,
        } => {
            let candidates = roster.list_opportunity_ids().await?;
            let ranked = BulkRanker::new(pool)
                .rank_opportunities_for_student(student_id, &candidates, min_match, limit)
                .await?;
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }

        Command::RankStudents {
            opportunity_id,
            min_match,
            limit,
        } => {
            let candidates = roster.list_student_ids().await?;
            let ranked = BulkRanker::new(pool)
                .rank_students_for_opportunity(opportunity_id, &candidates, min_match, limit)
                .await?;
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }

        Command::RankExternalJobs {
            student_id,
            min_match,
            limit,
        } => {
            let candidates = roster.list_external_job_ids().await?;
            let ranked = BulkRanker::new(pool)
                .rank_external_jobs_for_student(student_id, &candidates, min_match, limit)
                .await?;
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }
    }

    Ok(())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_pairs(raw: Option<&str>) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    let Some(raw) = raw else {
        return pairs;
    };
    for part in raw.split(',') {
        if let Some((name, value)) = part.split_once('=') {
            pairs.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list("React, Node.js ,,MongoDB"),
            vec!["React", "Node.js", "MongoDB"]
        );
        assert!(parse_list("  ").is_empty());
    }

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs(Some("React=expert, SQL = beginner,broken"));
        assert_eq!(pairs.get("React").map(String::as_str), Some("expert"));
        assert_eq!(pairs.get("SQL").map(String::as_str), Some("beginner"));
        assert_eq!(pairs.len(), 2);
        assert!(parse_pairs(None).is_empty());
    }
}
