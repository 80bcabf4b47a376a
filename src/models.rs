use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One logged workout, as handed over by the storage layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub user_id: Uuid,
    pub logged_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
}

impl ActivityRecord {
    /// Missing or negative durations count as zero.
    pub fn minutes(&self) -> i64 {
        self.duration_minutes.map(|m| m.max(0) as i64).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyAggregate {
    pub week_start: NaiveDate,
    pub activity_count: u32,
    pub total_duration_minutes: i64,
    /// Indexes into the record slice the aggregate was built from.
    pub member_activity_refs: Vec<usize>,
}

impl WeeklyAggregate {
    pub fn empty(week_start: NaiveDate) -> Self {
        Self {
            week_start,
            activity_count: 0,
            total_duration_minutes: 0,
            member_activity_refs: Vec::new(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TierLevel {
    Bronze,
    Silver,
    Gold,
    Elite,
}

impl TierLevel {
    pub const ALL: [TierLevel; 4] = [
        TierLevel::Bronze,
        TierLevel::Silver,
        TierLevel::Gold,
        TierLevel::Elite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TierLevel::Bronze => "bronze",
            TierLevel::Silver => "silver",
            TierLevel::Gold => "gold",
            TierLevel::Elite => "elite",
        }
    }

    /// Score used by the cohort weighted average.
    pub fn score(self) -> u32 {
        match self {
            TierLevel::Bronze => 1,
            TierLevel::Silver => 2,
            TierLevel::Gold => 3,
            TierLevel::Elite => 4,
        }
    }

    pub fn next(self) -> Option<TierLevel> {
        match self {
            TierLevel::Bronze => Some(TierLevel::Silver),
            TierLevel::Silver => Some(TierLevel::Gold),
            TierLevel::Gold => Some(TierLevel::Elite),
            TierLevel::Elite => None,
        }
    }

    /// Maps a mean score back onto the nearest tier.
    pub fn from_average_score(score: f64) -> TierLevel {
        if score >= 3.5 {
            TierLevel::Elite
        } else if score >= 2.5 {
            TierLevel::Gold
        } else if score >= 1.5 {
            TierLevel::Silver
        } else {
            TierLevel::Bronze
        }
    }
}

impl fmt::Display for TierLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TierLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bronze" => Ok(TierLevel::Bronze),
            "silver" => Ok(TierLevel::Silver),
            "gold" => Ok(TierLevel::Gold),
            "elite" => Ok(TierLevel::Elite),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDisplay {
    pub name: String,
    pub color: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRequirement {
    pub level: TierLevel,
    pub min_weekly_activities: u32,
    pub consecutive_weeks_required: u32,
    pub description: String,
    pub display: TierDisplay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierProgress {
    pub tier: TierLevel,
    pub consecutive_weeks: u32,
    pub weeks_required: u32,
    pub min_weekly_activities: u32,
    pub activities_needed_this_week: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserTierStatus {
    pub user_id: Uuid,
    pub current_tier: TierLevel,
    pub consecutive_weeks_at_tier: u32,
    pub current_week_activity_count: u32,
    pub next_tier: Option<TierLevel>,
    pub can_promote: bool,
    pub next_tier_progress: Option<TierProgress>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakWeek {
    pub week_start: NaiveDate,
    pub activity_count: u32,
    pub total_duration_minutes: i64,
    pub met_goal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreakData {
    pub user_id: Uuid,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<DateTime<Utc>>,
    pub weekly_streak_entries: Vec<StreakWeek>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub bronze: u32,
    pub silver: u32,
    pub gold: u32,
    pub elite: u32,
}

impl TierCounts {
    pub fn record(&mut self, tier: TierLevel) {
        match tier {
            TierLevel::Bronze => self.bronze += 1,
            TierLevel::Silver => self.silver += 1,
            TierLevel::Gold => self.gold += 1,
            TierLevel::Elite => self.elite += 1,
        }
    }

    pub fn get(&self, tier: TierLevel) -> u32 {
        match tier {
            TierLevel::Bronze => self.bronze,
            TierLevel::Silver => self.silver,
            TierLevel::Gold => self.gold,
            TierLevel::Elite => self.elite,
        }
    }

    pub fn total(&self) -> u32 {
        self.bronze + self.silver + self.gold + self.elite
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMember {
    pub user_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberTier {
    pub user_id: Uuid,
    pub tier: TierLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortTierStats {
    pub cohort_id: Uuid,
    pub week_start: NaiveDate,
    pub active_member_count: u32,
    pub total_members: u32,
    pub tier_counts: TierCounts,
    pub weighted_average_score: f64,
    pub weighted_average_tier: TierLevel,
    pub elite_member_count: u32,
    pub members_required: u32,
    pub elite_week_achieved: bool,
    pub historical_elite_week_count: i64,
    pub members: Vec<MemberTier>,
    pub skipped_members: Vec<SkippedMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EliteWeekRecord {
    pub cohort_id: Uuid,
    pub week_start: NaiveDate,
    pub members_completed: i32,
    pub members_required: i32,
    pub elite_week_achieved: bool,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered_bronze_to_elite() {
        assert!(TierLevel::Bronze < TierLevel::Silver);
        assert!(TierLevel::Gold < TierLevel::Elite);
        assert_eq!(TierLevel::Elite.next(), None);
        assert_eq!(TierLevel::Gold.next(), Some(TierLevel::Elite));
    }

    #[test]
    fn average_score_maps_to_nearest_tier() {
        assert_eq!(TierLevel::from_average_score(3.8), TierLevel::Elite);
        assert_eq!(TierLevel::from_average_score(3.5), TierLevel::Elite);
        assert_eq!(TierLevel::from_average_score(3.49), TierLevel::Gold);
        assert_eq!(TierLevel::from_average_score(1.5), TierLevel::Silver);
        assert_eq!(TierLevel::from_average_score(1.0), TierLevel::Bronze);
    }

    #[test]
    fn tier_names_parse_back() {
        for tier in TierLevel::ALL {
            assert_eq!(tier.to_string().parse::<TierLevel>(), Ok(tier));
        }
        assert!("platinum".parse::<TierLevel>().is_err());
    }

    #[test]
    fn missing_duration_counts_as_zero() {
        let record = ActivityRecord {
            user_id: Uuid::new_v4(),
            logged_at: Utc::now(),
            duration_minutes: None,
        };
        assert_eq!(record.minutes(), 0);
        let negative = ActivityRecord {
            duration_minutes: Some(-10),
            ..record
        };
        assert_eq!(negative.minutes(), 0);
    }
}
