//! Review History Ledger
//!
//! Counts how many times each user has been picked as a reviewer, either on
//! creation or as a replacement. The count is never decremented.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::services::assignment::AssignmentError;
use crate::services::pull_request_store::PgUnitOfWork;
use crate::services::store::ReviewHistoryLedger;

#[async_trait]
impl ReviewHistoryLedger for PgUnitOfWork {
    async fn increment_or_init(&mut self, user_id: &str) -> Result<i64, AssignmentError> {
        // Single upsert so two first-time increments cannot both insert
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO review_history (user_id, review_count, updated_at)
            VALUES ($1, 1, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET review_count = review_history.review_count + 1,
                updated_at = NOW()
            RETURNING review_count
            "#,
        )
        .bind(user_id)
        .fetch_one(self.conn())
        .await?;

        Ok(count)
    }
}

/// Committed ledger value, `None` when the user was never assigned
pub async fn review_count(pool: &PgPool, user_id: &str) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT review_count FROM review_history WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}
