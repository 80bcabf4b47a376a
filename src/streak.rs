use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ActivityRecord, StreakData, StreakWeek, WeeklyAggregate};
use crate::tiers::consecutive_weeks;

/// Longest run of qualifying weeks, scanned oldest to newest.
pub fn longest_run(weeks: &[WeeklyAggregate], min_activities: u32) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    for week in weeks.iter().rev() {
        if week.activity_count >= min_activities {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

pub fn last_activity(records: &[ActivityRecord]) -> Option<DateTime<Utc>> {
    records.iter().map(|r| r.logged_at).max()
}

/// Streaks over a dense, most-recent-first window.
pub fn calculate_streak(
    user_id: Uuid,
    weeks: &[WeeklyAggregate],
    records: &[ActivityRecord],
    min_activities: u32,
) -> StreakData {
    let weekly_streak_entries = weeks
        .iter()
        .map(|w| StreakWeek {
            week_start: w.week_start,
            activity_count: w.activity_count,
            total_duration_minutes: w.total_duration_minutes,
            met_goal: w.activity_count >= min_activities,
        })
        .collect();

    StreakData {
        user_id,
        current_streak: consecutive_weeks(weeks, min_activities),
        longest_streak: longest_run(weeks, min_activities),
        last_activity_date: last_activity(records),
        weekly_streak_entries,
    }
}
