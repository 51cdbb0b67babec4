//! Skills-matching engine for an internship placement portal.
//!
//! Students register the skills they possess; opportunities and externally
//! sourced job postings register the skills they demand. The engine
//! canonicalizes skill names, keeps a deduplicated skill catalog, computes
//! weighted match percentages between one student and one target, and ranks
//! whole candidate sets. Results are always recomputed from the current
//! skill data, never cached.

pub mod catalog;
pub mod cli;
pub mod database;
pub mod error;
pub mod normalizer;
pub mod ranking;
pub mod scoring;

pub use catalog::{ExternalJobSkill, OpportunitySkill, Proficiency, Skill, SkillCatalog, StudentSkill};
pub use database::{run_migrations, DatabaseConfig, ExternalJob, Opportunity, Roster, Student};
pub use error::MatchError;
pub use normalizer::normalize_skill_name;
pub use ranking::{BulkRanker, RankedMatch};
pub use scoring::{MatchResult, MatchScorer};
