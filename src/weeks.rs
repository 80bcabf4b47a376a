use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};

use crate::models::{ActivityRecord, WeeklyAggregate};

/// Canonical start of the week containing `ts` (UTC calendar).
pub fn week_start(ts: DateTime<Utc>, starts_on: Weekday) -> NaiveDate {
    let date = ts.date_naive();
    let offset = (date.weekday().num_days_from_monday() + 7 - starts_on.num_days_from_monday()) % 7;
    date - Duration::days(offset as i64)
}

/// Earliest instant whose week still falls inside a `window_weeks` window
/// ending with the week of `now`.
pub fn lookback_start(now: DateTime<Utc>, window_weeks: u32, starts_on: Weekday) -> DateTime<Utc> {
    let back = window_weeks.saturating_sub(1) as i64;
    let first_week = week_start(now, starts_on) - Duration::weeks(back);
    first_week.and_time(NaiveTime::MIN).and_utc()
}

/// Groups records by week. Only weeks with data appear, most recent first.
pub fn aggregate_weeks(records: &[ActivityRecord], starts_on: Weekday) -> Vec<WeeklyAggregate> {
    let mut weeks: BTreeMap<NaiveDate, WeeklyAggregate> = BTreeMap::new();

    for (idx, record) in records.iter().enumerate() {
        let start = week_start(record.logged_at, starts_on);
        let entry = weeks
            .entry(start)
            .or_insert_with(|| WeeklyAggregate::empty(start));
        entry.activity_count += 1;
        entry.total_duration_minutes += record.minutes();
        entry.member_activity_refs.push(idx);
    }

    weeks.into_values().rev().collect()
}

/// Calendar-accurate view of `sparse`: exactly `window_weeks` entries,
/// starting at `anchor` and stepping back one week at a time. Weeks without
/// records come back as zero-activity entries.
pub fn fill_gaps(
    sparse: &[WeeklyAggregate],
    anchor: NaiveDate,
    window_weeks: u32,
) -> Vec<WeeklyAggregate> {
    let by_week: HashMap<NaiveDate, &WeeklyAggregate> =
        sparse.iter().map(|w| (w.week_start, w)).collect();

    (0..window_weeks as i64)
        .map(|i| {
            let start = anchor - Duration::weeks(i);
            by_week
                .get(&start)
                .map(|w| (*w).clone())
                .unwrap_or_else(|| WeeklyAggregate::empty(start))
        })
        .collect()
}

/// Aggregates and densifies in one step, anchored at the week of `now`.
pub fn dense_weeks(
    records: &[ActivityRecord],
    now: DateTime<Utc>,
    window_weeks: u32,
    starts_on: Weekday,
) -> Vec<WeeklyAggregate> {
    let sparse = aggregate_weeks(records, starts_on);
    fill_gaps(&sparse, week_start(now, starts_on), window_weeks)
}
