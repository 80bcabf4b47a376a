//! Consistency tiers, streaks and cohort elite weeks derived from logged
//! workouts.
//!
//! Activity records come from an [`store::ActivityStore`]; everything else is
//! recomputed on each query. The only durable output is the per-cohort,
//! per-week [`models::EliteWeekRecord`].

pub mod cohort;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod report;
pub mod store;
pub mod streak;
pub mod tiers;
pub mod weeks;

pub use config::EngineConfig;
pub use engine::TierEngine;
pub use error::{TierError, TierResult};
pub use models::{
    ActivityRecord, CohortTierStats, EliteWeekRecord, StreakData, TierLevel, UserTierStatus,
    WeeklyAggregate,
};
pub use store::{ActivityStore, MemoryStore};
