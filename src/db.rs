use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{TierError, TierResult};
use crate::models::{ActivityRecord, EliteWeekRecord};
use crate::store::ActivityStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed storage collaborator.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn fetch_activity_records(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> TierResult<Vec<ActivityRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, logged_at, duration_minutes
            FROM tier_engine.activities
            WHERE user_id = $1 AND logged_at >= $2
            ORDER BY logged_at DESC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TierError::fetch("activity records", e))?;

        Ok(rows
            .into_iter()
            .map(|row| ActivityRecord {
                user_id: row.get("user_id"),
                logged_at: row.get("logged_at"),
                duration_minutes: row.get("duration_minutes"),
            })
            .collect())
    }

    async fn fetch_cohort_members(&self, cohort_id: Uuid) -> TierResult<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id
            FROM tier_engine.cohort_members
            WHERE cohort_id = $1 AND status = 'active'
            ORDER BY joined_at
            "#,
        )
        .bind(cohort_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TierError::fetch("cohort members", e))?;

        Ok(rows.into_iter().map(|row| row.get("user_id")).collect())
    }

    async fn upsert_elite_week_record(&self, record: &EliteWeekRecord) -> TierResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tier_engine.elite_weeks
            (cohort_id, week_start, members_completed, members_required, elite_week_achieved, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (cohort_id, week_start) DO UPDATE
            SET members_completed = EXCLUDED.members_completed,
                members_required = EXCLUDED.members_required,
                elite_week_achieved = EXCLUDED.elite_week_achieved,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.cohort_id)
        .bind(record.week_start)
        .bind(record.members_completed)
        .bind(record.members_required)
        .bind(record.elite_week_achieved)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| TierError::write("elite week record", e))?;

        Ok(())
    }

    async fn fetch_elite_week_history(
        &self,
        cohort_id: Uuid,
        limit: usize,
    ) -> TierResult<Vec<EliteWeekRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT cohort_id, week_start, members_completed, members_required,
                   elite_week_achieved, updated_at
            FROM tier_engine.elite_weeks
            WHERE cohort_id = $1
            ORDER BY week_start DESC
            LIMIT $2
            "#,
        )
        .bind(cohort_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TierError::fetch("elite week history", e))?;

        Ok(rows
            .into_iter()
            .map(|row| EliteWeekRecord {
                cohort_id: row.get("cohort_id"),
                week_start: row.get("week_start"),
                members_completed: row.get("members_completed"),
                members_required: row.get("members_required"),
                elite_week_achieved: row.get("elite_week_achieved"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    async fn count_elite_weeks(&self, cohort_id: Uuid) -> TierResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tier_engine.elite_weeks WHERE cohort_id = $1 AND elite_week_achieved",
        )
        .bind(cohort_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| TierError::fetch("elite week count", e))?;

        Ok(count)
    }
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Option<Uuid>> {
    let row = sqlx::query("SELECT id FROM tier_engine.profiles WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("id")))
}

pub async fn find_cohort_by_name(pool: &PgPool, name: &str) -> anyhow::Result<Option<Uuid>> {
    let row = sqlx::query("SELECT id FROM tier_engine.cohorts WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("id")))
}

pub async fn fetch_member_names(
    pool: &PgPool,
    cohort_id: Uuid,
) -> anyhow::Result<HashMap<Uuid, String>> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.full_name
        FROM tier_engine.cohort_members m
        JOIN tier_engine.profiles p ON p.id = m.user_id
        WHERE m.cohort_id = $1
        "#,
    )
    .bind(cohort_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("id"), row.get("full_name")))
        .collect())
}

async fn upsert_profile(pool: &PgPool, full_name: &str, email: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO tier_engine.profiles (id, full_name, email)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(email)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn upsert_cohort(pool: &PgPool, name: &str) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO tier_engine.cohorts (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE
        SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

async fn add_membership(pool: &PgPool, cohort_id: Uuid, user_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tier_engine.cohort_members (cohort_id, user_id, status)
        VALUES ($1, $2, 'active')
        ON CONFLICT (cohort_id, user_id) DO UPDATE
        SET status = 'active'
        "#,
    )
    .bind(cohort_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns whether a new row was written; `source_key` makes re-imports no-ops.
async fn insert_activity(
    pool: &PgPool,
    user_id: Uuid,
    logged_at: DateTime<Utc>,
    duration_minutes: Option<i32>,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO tier_engine.activities
        (id, user_id, logged_at, duration_minutes, source_key)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(logged_at)
    .bind(duration_minutes)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let cohort_id = upsert_cohort(pool, "Morning Crew").await?;

    // Workouts per week, current week first.
    let members: [(&str, &str, &[u32]); 5] = [
        ("Avery Lee", "avery.lee@morningcrew.example", &[6, 7, 6, 6, 5, 4]),
        ("Jules Moreno", "jules.moreno@morningcrew.example", &[6, 6, 6, 6, 6, 6, 6, 6]),
        ("Kiara Patel", "kiara.patel@morningcrew.example", &[7, 6, 6, 6, 3]),
        ("Sam Ortiz", "sam.ortiz@morningcrew.example", &[6, 6, 8, 6]),
        ("Riley Chen", "riley.chen@morningcrew.example", &[5, 5, 5, 2, 4, 4]),
    ];

    let now = Utc::now();
    for (name, email, weeks) in members {
        let user_id = upsert_profile(pool, name, email).await?;
        add_membership(pool, cohort_id, user_id).await?;

        for (week, &count) in weeks.iter().enumerate() {
            for slot in 0..count {
                let logged_at = now - Duration::weeks(week as i64) - Duration::minutes(slot as i64 * 90);
                let minutes = 30 + (slot as i32 * 5);
                let key = format!("seed-{email}-{week}-{slot}");
                insert_activity(pool, user_id, logged_at, Some(minutes), &key)
                    .await
                    .with_context(|| format!("failed to seed activity {key}"))?;
            }
        }
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        cohort: String,
        logged_at: DateTime<Utc>,
        duration_minutes: Option<i32>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut cohorts: HashMap<String, Uuid> = HashMap::new();
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let user_id = upsert_profile(pool, &row.full_name, &row.email).await?;

        let cohort_id = match cohorts.get(&row.cohort) {
            Some(id) => *id,
            None => {
                let id = upsert_cohort(pool, &row.cohort).await?;
                cohorts.insert(row.cohort.clone(), id);
                id
            }
        };
        add_membership(pool, cohort_id, user_id).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_activity(pool, user_id, row.logged_at, row.duration_minutes, &source_key).await? {
            inserted += 1;
        }
    }

    Ok(inserted)
}
