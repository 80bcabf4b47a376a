use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::error::{TierError, TierResult};
use crate::models::{
    CohortTierStats, EliteWeekRecord, MemberTier, SkippedMember, TierCounts, TierLevel,
};

/// Smallest elite head count that reaches `percent` of `total`.
pub fn members_required(total: u32, percent: u32) -> u32 {
    (total * percent).div_ceil(100)
}

pub fn elite_week_achieved(elite: u32, total: u32, percent: u32) -> bool {
    total > 0 && elite * 100 >= total * percent
}

/// Collects per-member outcomes. Failures are kept, never dropped.
#[derive(Debug)]
pub struct CohortAccumulator {
    cohort_id: Uuid,
    active_member_count: u32,
    members: Vec<MemberTier>,
    skipped: Vec<SkippedMember>,
}

impl CohortAccumulator {
    pub fn new(cohort_id: Uuid, active_member_count: usize) -> Self {
        Self {
            cohort_id,
            active_member_count: active_member_count as u32,
            members: Vec::with_capacity(active_member_count),
            skipped: Vec::new(),
        }
    }

    pub fn record_tier(&mut self, user_id: Uuid, tier: TierLevel) {
        self.members.push(MemberTier { user_id, tier });
    }

    pub fn record_failure(&mut self, user_id: Uuid, reason: impl std::fmt::Display) {
        let reason = reason.to_string();
        warn!(
            cohort_id = %self.cohort_id,
            user_id = %user_id,
            %reason,
            "skipping member in cohort tier evaluation"
        );
        self.skipped.push(SkippedMember { user_id, reason });
    }

    pub fn evaluated(&self) -> usize {
        self.members.len()
    }

    pub fn skipped(&self) -> &[SkippedMember] {
        &self.skipped
    }

    pub fn finish(
        self,
        week_start: NaiveDate,
        elite_week_percent: u32,
        historical_elite_week_count: i64,
    ) -> TierResult<CohortTierStats> {
        if self.members.is_empty() {
            return Err(TierError::NoEvaluatedMembers(self.cohort_id));
        }

        let mut tier_counts = TierCounts::default();
        for member in &self.members {
            tier_counts.record(member.tier);
        }

        let total = tier_counts.total();
        let score_sum: u32 = self.members.iter().map(|m| m.tier.score()).sum();
        let weighted_average_score = score_sum as f64 / total as f64;
        let elite_member_count = tier_counts.elite;

        Ok(CohortTierStats {
            cohort_id: self.cohort_id,
            week_start,
            active_member_count: self.active_member_count,
            total_members: total,
            tier_counts,
            weighted_average_score,
            weighted_average_tier: TierLevel::from_average_score(weighted_average_score),
            elite_member_count,
            members_required: members_required(total, elite_week_percent),
            elite_week_achieved: elite_week_achieved(elite_member_count, total, elite_week_percent),
            historical_elite_week_count,
            members: self.members,
            skipped_members: self.skipped,
        })
    }
}

/// Row written for the week the stats were computed in.
pub fn elite_week_record(stats: &CohortTierStats, updated_at: DateTime<Utc>) -> EliteWeekRecord {
    EliteWeekRecord {
        cohort_id: stats.cohort_id,
        week_start: stats.week_start,
        members_completed: stats.elite_member_count as i32,
        members_required: stats.members_required as i32,
        elite_week_achieved: stats.elite_week_achieved,
        updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 12).unwrap()
    }

    fn accumulate(tiers: &[TierLevel]) -> CohortAccumulator {
        let mut acc = CohortAccumulator::new(Uuid::new_v4(), tiers.len());
        for &tier in tiers {
            acc.record_tier(Uuid::new_v4(), tier);
        }
        acc
    }

    #[test]
    fn four_of_five_elite_is_an_elite_week() {
        use TierLevel::*;
        let stats = accumulate(&[Elite, Elite, Gold, Elite, Elite])
            .finish(week(), 80, 2)
            .unwrap();
        assert_eq!(
            stats.tier_counts,
            TierCounts {
                bronze: 0,
                silver: 0,
                gold: 1,
                elite: 4
            }
        );
        assert_eq!(stats.elite_member_count, 4);
        assert_eq!(stats.members_required, 4);
        assert!(stats.elite_week_achieved);
        assert_eq!(stats.weighted_average_tier, Elite);
        assert!((stats.weighted_average_score - 3.8).abs() < 1e-9);
        assert_eq!(stats.historical_elite_week_count, 2);
    }

    #[test]
    fn three_of_five_elite_falls_short() {
        use TierLevel::*;
        let stats = accumulate(&[Elite, Elite, Elite, Silver, Bronze])
            .finish(week(), 80, 0)
            .unwrap();
        assert!(!stats.elite_week_achieved);
        assert_eq!(stats.weighted_average_tier, Gold);
    }

    #[test]
    fn threshold_is_exact_at_the_boundary() {
        assert!(elite_week_achieved(4, 5, 80));
        assert!(!elite_week_achieved(3, 5, 80));
        assert!(elite_week_achieved(8, 10, 80));
        assert!(!elite_week_achieved(7, 10, 80));
        assert!(!elite_week_achieved(0, 0, 80));
        assert_eq!(members_required(5, 80), 4);
        assert_eq!(members_required(10, 80), 8);
        assert_eq!(members_required(7, 80), 6);
        assert_eq!(members_required(1, 80), 1);
    }

    #[test]
    fn failures_are_kept_and_excluded_from_tallies() {
        let mut acc = CohortAccumulator::new(Uuid::new_v4(), 3);
        acc.record_tier(Uuid::new_v4(), TierLevel::Elite);
        acc.record_tier(Uuid::new_v4(), TierLevel::Silver);
        let failed = Uuid::new_v4();
        acc.record_failure(failed, "timeout");
        assert_eq!(acc.evaluated(), 2);
        assert_eq!(acc.skipped().len(), 1);

        let stats = acc.finish(week(), 80, 0).unwrap();
        assert_eq!(stats.total_members, 2);
        assert_eq!(stats.active_member_count, 3);
        assert_eq!(stats.skipped_members[0].user_id, failed);
        assert_eq!(stats.skipped_members[0].reason, "timeout");
        assert!((stats.weighted_average_score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn all_members_failing_is_an_error() {
        let mut acc = CohortAccumulator::new(Uuid::new_v4(), 1);
        acc.record_failure(Uuid::new_v4(), "boom");
        assert!(matches!(
            acc.finish(week(), 80, 0),
            Err(TierError::NoEvaluatedMembers(_))
        ));
    }

    #[test]
    fn record_copies_the_weekly_outcome() {
        use TierLevel::*;
        let stats = accumulate(&[Elite, Elite, Gold]).finish(week(), 80, 0).unwrap();
        let now = Utc::now();
        let record = elite_week_record(&stats, now);
        assert_eq!(record.week_start, week());
        assert_eq!(record.members_completed, 2);
        assert_eq!(record.members_required, 3);
        assert!(!record.elite_week_achieved);
        assert_eq!(record.updated_at, now);
    }
}
