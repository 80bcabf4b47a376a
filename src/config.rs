use std::path::Path;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::{TierError, TierResult};
use crate::models::{TierDisplay, TierLevel, TierRequirement};

/// Static rules for tier, streak and elite-week evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tiers: Vec<TierRequirement>,
    pub streak_min_activities: u32,
    pub tier_lookback_weeks: u32,
    pub streak_lookback_weeks: u32,
    pub elite_week_percent: u32,
    pub week_starts_on: Weekday,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            streak_min_activities: 3,
            tier_lookback_weeks: 8,
            streak_lookback_weeks: 12,
            elite_week_percent: 80,
            week_starts_on: Weekday::Mon,
        }
    }
}

fn requirement(
    level: TierLevel,
    min_weekly_activities: u32,
    consecutive_weeks_required: u32,
    description: &str,
    color: &str,
    icon: &str,
) -> TierRequirement {
    let mut name = level.as_str().to_string();
    name[..1].make_ascii_uppercase();
    TierRequirement {
        level,
        min_weekly_activities,
        consecutive_weeks_required,
        description: description.to_string(),
        display: TierDisplay {
            name,
            color: color.to_string(),
            icon: icon.to_string(),
        },
    }
}

pub fn default_tiers() -> Vec<TierRequirement> {
    vec![
        requirement(
            TierLevel::Bronze,
            3,
            1,
            "Log 3 workouts in a week",
            "#CD7F32",
            "medal-bronze",
        ),
        requirement(
            TierLevel::Silver,
            4,
            2,
            "Log 4 workouts a week for 2 weeks running",
            "#C0C0C0",
            "medal-silver",
        ),
        requirement(
            TierLevel::Gold,
            5,
            3,
            "Log 5 workouts a week for 3 weeks running",
            "#FFD700",
            "medal-gold",
        ),
        requirement(
            TierLevel::Elite,
            6,
            4,
            "Log 6 workouts a week for 4 weeks running",
            "#8A2BE2",
            "crown",
        ),
    ]
}

impl EngineConfig {
    pub fn from_path(path: &Path) -> TierResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| TierError::Config(format!("{}: {err}", path.display())))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .map_err(|err| TierError::Config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TierResult<()> {
        for level in TierLevel::ALL {
            let count = self.tiers.iter().filter(|t| t.level == level).count();
            if count != 1 {
                return Err(TierError::Config(format!(
                    "tier table must define {level} exactly once (found {count})"
                )));
            }
        }

        if let Some(tier) = self.tiers.iter().find(|t| t.consecutive_weeks_required == 0) {
            return Err(TierError::Config(format!(
                "{} requires zero consecutive weeks",
                tier.level
            )));
        }

        let longest = self
            .tiers
            .iter()
            .map(|t| t.consecutive_weeks_required)
            .max()
            .unwrap_or(0);
        if self.tier_lookback_weeks < longest {
            return Err(TierError::Config(format!(
                "tier lookback of {} weeks cannot cover a {longest}-week requirement",
                self.tier_lookback_weeks
            )));
        }
        if self.streak_lookback_weeks == 0 {
            return Err(TierError::Config("streak lookback must be at least one week".into()));
        }
        if !(1..=100).contains(&self.elite_week_percent) {
            return Err(TierError::Config(format!(
                "elite week percent must be within 1..=100, got {}",
                self.elite_week_percent
            )));
        }
        Ok(())
    }

    pub fn requirement(&self, level: TierLevel) -> Option<&TierRequirement> {
        self.tiers.iter().find(|t| t.level == level)
    }
}
