use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{TierError, TierResult};
use crate::models::{ActivityRecord, EliteWeekRecord};

/// Read/write contract with whatever owns activity and cohort data.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Records logged by `user_id` at or after `since`.
    async fn fetch_activity_records(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> TierResult<Vec<ActivityRecord>>;

    /// Active members only.
    async fn fetch_cohort_members(&self, cohort_id: Uuid) -> TierResult<Vec<Uuid>>;

    /// Insert or overwrite the row keyed by `(cohort_id, week_start)`.
    async fn upsert_elite_week_record(&self, record: &EliteWeekRecord) -> TierResult<()>;

    /// Stored weeks for a cohort, most recent first.
    async fn fetch_elite_week_history(
        &self,
        cohort_id: Uuid,
        limit: usize,
    ) -> TierResult<Vec<EliteWeekRecord>>;

    /// Weeks in which the cohort reached elite status.
    async fn count_elite_weeks(&self, cohort_id: Uuid) -> TierResult<i64>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process store with the same keying as the database tables.
#[derive(Default)]
pub struct MemoryStore {
    activities: Mutex<Vec<ActivityRecord>>,
    members: Mutex<HashMap<Uuid, Vec<Uuid>>>,
    elite_weeks: Mutex<BTreeMap<(Uuid, NaiveDate), EliteWeekRecord>>,
    failing_users: Mutex<HashSet<Uuid>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_activity(&self, user_id: Uuid, logged_at: DateTime<Utc>, minutes: Option<i32>) {
        lock(&self.activities).push(ActivityRecord {
            user_id,
            logged_at,
            duration_minutes: minutes,
        });
    }

    pub fn add_member(&self, cohort_id: Uuid, user_id: Uuid) {
        let mut members = lock(&self.members);
        let list = members.entry(cohort_id).or_default();
        if !list.contains(&user_id) {
            list.push(user_id);
        }
    }

    /// Makes every activity fetch for `user_id` fail.
    pub fn fail_user(&self, user_id: Uuid) {
        lock(&self.failing_users).insert(user_id);
    }

    /// Makes every call fail, as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn elite_week_rows(&self, cohort_id: Uuid) -> Vec<EliteWeekRecord> {
        lock(&self.elite_weeks)
            .values()
            .filter(|r| r.cohort_id == cohort_id)
            .cloned()
            .collect()
    }

    fn check_available(&self, what: &'static str) -> TierResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TierError::fetch(what, "store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn fetch_activity_records(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> TierResult<Vec<ActivityRecord>> {
        self.check_available("activity records")?;
        if lock(&self.failing_users).contains(&user_id) {
            return Err(TierError::fetch(
                "activity records",
                format!("read failed for user {user_id}"),
            ));
        }
        Ok(lock(&self.activities)
            .iter()
            .filter(|r| r.user_id == user_id && r.logged_at >= since)
            .cloned()
            .collect())
    }

    async fn fetch_cohort_members(&self, cohort_id: Uuid) -> TierResult<Vec<Uuid>> {
        self.check_available("cohort members")?;
        Ok(lock(&self.members)
            .get(&cohort_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_elite_week_record(&self, record: &EliteWeekRecord) -> TierResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TierError::write("elite week record", "store unavailable"));
        }
        lock(&self.elite_weeks).insert((record.cohort_id, record.week_start), record.clone());
        Ok(())
    }

    async fn fetch_elite_week_history(
        &self,
        cohort_id: Uuid,
        limit: usize,
    ) -> TierResult<Vec<EliteWeekRecord>> {
        self.check_available("elite week history")?;
        Ok(lock(&self.elite_weeks)
            .range((cohort_id, NaiveDate::MIN)..=(cohort_id, NaiveDate::MAX))
            .rev()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn count_elite_weeks(&self, cohort_id: Uuid) -> TierResult<i64> {
        self.check_available("elite week count")?;
        Ok(lock(&self.elite_weeks)
            .values()
            .filter(|r| r.cohort_id == cohort_id && r.elite_week_achieved)
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn elite_row(cohort_id: Uuid, week_start: NaiveDate, achieved: bool) -> EliteWeekRecord {
        EliteWeekRecord {
            cohort_id,
            week_start,
            members_completed: 4,
            members_required: 4,
            elite_week_achieved: achieved,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn filters_activity_by_user_and_window() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap();
        store.log_activity(user, now, Some(30));
        store.log_activity(user, now - Duration::days(90), Some(30));
        store.log_activity(other, now, Some(30));

        let records = store
            .fetch_activity_records(user, now - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, user);
    }

    #[tokio::test]
    async fn upsert_keeps_one_row_per_week() {
        let store = MemoryStore::new();
        let cohort = Uuid::new_v4();
        let week = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        store
            .upsert_elite_week_record(&elite_row(cohort, week, false))
            .await
            .unwrap();
        store
            .upsert_elite_week_record(&elite_row(cohort, week, true))
            .await
            .unwrap();

        let rows = store.elite_week_rows(cohort);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].elite_week_achieved);
        assert_eq!(store.count_elite_weeks(cohort).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn history_is_most_recent_first_and_scoped_to_cohort() {
        let store = MemoryStore::new();
        let cohort = Uuid::new_v4();
        let other = Uuid::new_v4();
        let first = NaiveDate::from_ymd_opt(2026, 9, 28).unwrap();
        for i in 0..3 {
            store
                .upsert_elite_week_record(&elite_row(cohort, first + Duration::weeks(i), i != 1))
                .await
                .unwrap();
        }
        store
            .upsert_elite_week_record(&elite_row(other, first, true))
            .await
            .unwrap();

        let history = store.fetch_elite_week_history(cohort, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].week_start, first + Duration::weeks(2));
        assert_eq!(history[1].week_start, first + Duration::weeks(1));
        assert_eq!(store.count_elite_weeks(cohort).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unavailable_store_reports_fetch_errors() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.fetch_cohort_members(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, TierError::Fetch { .. }));
    }
}
