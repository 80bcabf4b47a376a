use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cohort::{self, CohortAccumulator};
use crate::config::EngineConfig;
use crate::error::{TierError, TierResult};
use crate::models::{
    ActivityRecord, CohortTierStats, EliteWeekRecord, StreakData, TierLevel, UserTierStatus,
    WeeklyAggregate,
};
use crate::store::ActivityStore;
use crate::streak;
use crate::tiers;
use crate::weeks;

/// Query surface over a storage collaborator. Holds no mutable state, so one
/// instance can serve concurrent requests.
pub struct TierEngine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: ActivityStore> TierEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> TierResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn window(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        window_weeks: u32,
    ) -> TierResult<(Vec<ActivityRecord>, Vec<WeeklyAggregate>)> {
        let starts_on = self.config.week_starts_on;
        let since = weeks::lookback_start(now, window_weeks, starts_on);
        let records = self.store.fetch_activity_records(user_id, since).await?;
        let dense = weeks::dense_weeks(&records, now, window_weeks, starts_on);
        Ok((records, dense))
    }

    async fn current_tier(&self, user_id: Uuid, now: DateTime<Utc>) -> TierResult<TierLevel> {
        let (_, dense) = self
            .window(user_id, now, self.config.tier_lookback_weeks)
            .await?;
        Ok(tiers::evaluate_tier(&dense, &self.config.tiers))
    }

    pub async fn user_tier_status(&self, user_id: Uuid) -> TierResult<UserTierStatus> {
        self.user_tier_status_at(user_id, Utc::now()).await
    }

    pub async fn user_tier_status_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> TierResult<UserTierStatus> {
        let (records, dense) = self
            .window(user_id, now, self.config.tier_lookback_weeks)
            .await?;
        let table = &self.config.tiers;

        let current_tier = tiers::evaluate_tier(&dense, table);
        let promotion = tiers::advise_promotion(current_tier, &dense, table);

        debug!(
            user_id = %user_id,
            records = records.len(),
            tier = %current_tier,
            can_promote = promotion.can_promote,
            "evaluated user tier"
        );

        Ok(UserTierStatus {
            user_id,
            current_tier,
            consecutive_weeks_at_tier: tiers::weeks_at_tier(&dense, table, current_tier),
            current_week_activity_count: dense.first().map(|w| w.activity_count).unwrap_or(0),
            next_tier: promotion.next_tier,
            can_promote: promotion.can_promote,
            next_tier_progress: promotion.progress,
            computed_at: now,
        })
    }

    pub async fn user_streak_data(&self, user_id: Uuid) -> TierResult<StreakData> {
        self.user_streak_data_at(user_id, Utc::now()).await
    }

    pub async fn user_streak_data_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> TierResult<StreakData> {
        let (records, dense) = self
            .window(user_id, now, self.config.streak_lookback_weeks)
            .await?;
        let data =
            streak::calculate_streak(user_id, &dense, &records, self.config.streak_min_activities);
        debug!(
            user_id = %user_id,
            current = data.current_streak,
            longest = data.longest_streak,
            "calculated streak"
        );
        Ok(data)
    }

    pub async fn cohort_tier_stats(&self, cohort_id: Uuid) -> TierResult<CohortTierStats> {
        self.cohort_tier_stats_at(cohort_id, Utc::now()).await
    }

    /// Members whose data cannot be read are skipped and listed in the
    /// result; the cohort only fails when nobody could be evaluated.
    pub async fn cohort_tier_stats_at(
        &self,
        cohort_id: Uuid,
        now: DateTime<Utc>,
    ) -> TierResult<CohortTierStats> {
        let members = self.store.fetch_cohort_members(cohort_id).await?;
        if members.is_empty() {
            return Err(TierError::EmptyCohort(cohort_id));
        }

        let mut acc = CohortAccumulator::new(cohort_id, members.len());
        for user_id in members {
            match self.current_tier(user_id, now).await {
                Ok(tier) => acc.record_tier(user_id, tier),
                Err(err) => acc.record_failure(user_id, err),
            }
        }

        let historical = self.store.count_elite_weeks(cohort_id).await?;
        let stats = acc.finish(
            weeks::week_start(now, self.config.week_starts_on),
            self.config.elite_week_percent,
            historical,
        )?;

        info!(
            cohort_id = %cohort_id,
            evaluated = stats.total_members,
            skipped = stats.skipped_members.len(),
            elite = stats.elite_member_count,
            average = %stats.weighted_average_tier,
            "computed cohort tier stats"
        );
        Ok(stats)
    }

    pub async fn update_elite_week_status(&self, cohort_id: Uuid) -> TierResult<EliteWeekRecord> {
        self.update_elite_week_status_at(cohort_id, Utc::now()).await
    }

    /// Recomputes this week's outcome and overwrites the stored row for
    /// `(cohort_id, week_start)`.
    pub async fn update_elite_week_status_at(
        &self,
        cohort_id: Uuid,
        now: DateTime<Utc>,
    ) -> TierResult<EliteWeekRecord> {
        let stats = self.cohort_tier_stats_at(cohort_id, now).await?;
        let record = cohort::elite_week_record(&stats, now);
        self.store.upsert_elite_week_record(&record).await?;

        info!(
            cohort_id = %cohort_id,
            week_start = %record.week_start,
            completed = record.members_completed,
            required = record.members_required,
            achieved = record.elite_week_achieved,
            "recorded elite week status"
        );
        Ok(record)
    }

    pub async fn elite_week_history(
        &self,
        cohort_id: Uuid,
        limit: usize,
    ) -> TierResult<Vec<EliteWeekRecord>> {
        self.store.fetch_elite_week_history(cohort_id, limit).await
    }
}
