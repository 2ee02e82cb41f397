// src/sweep.rs

use sqlx::PgPool;
use std::time::Duration;

use crate::config::{ATTEMPT_GRACE_SECONDS, STALE_ATTEMPT_TTL_SECONDS, SWEEP_INTERVAL_SECONDS};

/// Periodic reconciliation of stale attempts. A learner closing the tab
/// sends no cancel signal, so in-progress attempts left past their quiz's
/// time limit (plus a grace window) are marked abandoned here.
///
/// Abandoned attempts still consume the user's attempt budget; otherwise
/// walking away would grant unlimited retries.
pub async fn run(pool: PgPool) {
    let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));
    loop {
        ticker.tick().await;
        match sweep_once(&pool).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Expiry sweep abandoned {} stale attempt(s)", n),
            Err(e) => tracing::error!("Expiry sweep failed: {:?}", e),
        }
    }
}

/// One idempotent pass; safe to run concurrently with live traffic.
pub async fn sweep_once(pool: &PgPool) -> Result<u64, sqlx::Error> {
    // Attempts on timed quizzes: inactive past time limit + grace.
    let timed = sqlx::query(
        r#"
        UPDATE quiz_attempts AS a
        SET status = 'abandoned',
            time_spent_seconds = GREATEST(
                EXTRACT(EPOCH FROM (a.last_activity_at - a.started_at))::BIGINT, 0)
        FROM quizzes AS q
        WHERE a.quiz_id = q.id
          AND a.status = 'in_progress'
          AND q.time_limit_minutes IS NOT NULL
          AND a.last_activity_at < now()
              - make_interval(secs => (q.time_limit_minutes * 60 + $1)::double precision)
        "#,
    )
    .bind(ATTEMPT_GRACE_SECONDS)
    .execute(pool)
    .await?
    .rows_affected();

    // Untimed quizzes (or attempts whose quiz is gone): fall back to a TTL.
    let cutoff = chrono::Utc::now() - chrono::Duration::seconds(STALE_ATTEMPT_TTL_SECONDS);
    let untimed = sqlx::query(
        r#"
        UPDATE quiz_attempts AS a
        SET status = 'abandoned',
            time_spent_seconds = GREATEST(
                EXTRACT(EPOCH FROM (a.last_activity_at - a.started_at))::BIGINT, 0)
        WHERE a.status = 'in_progress'
          AND a.last_activity_at < $1
          AND (a.quiz_id IS NULL OR EXISTS (
                SELECT 1 FROM quizzes q
                WHERE q.id = a.quiz_id AND q.time_limit_minutes IS NULL))
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(timed + untimed)
}
