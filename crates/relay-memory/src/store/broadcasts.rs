//! Promotion ledger: at most one broadcast per calendar date.

use super::Store;
use chrono::{NaiveDate, Utc};
use relay_core::error::RelayError;

/// A recorded broadcast run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastRecord {
    pub sent_on: NaiveDate,
    pub template: String,
    pub delivered: i64,
    pub failed: i64,
    /// `false` while the run is still in progress (or was interrupted).
    pub finished: bool,
}

impl Store {
    /// Claim `date` for a broadcast.
    ///
    /// Returns `false` when the date was already claimed, in which case the
    /// caller must not send.
    pub async fn claim_broadcast(&self, date: NaiveDate, template: &str) -> Result<bool, RelayError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO broadcasts (sent_on, template, started_at) VALUES (?, ?, ?)",
        )
        .bind(date.to_string())
        .bind(template)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RelayError::Memory(format!("insert failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the final counts of a claimed broadcast.
    pub async fn finish_broadcast(
        &self,
        date: NaiveDate,
        delivered: i64,
        failed: i64,
    ) -> Result<(), RelayError> {
        sqlx::query(
            "UPDATE broadcasts SET delivered = ?, failed = ?, finished_at = ? WHERE sent_on = ?",
        )
        .bind(delivered)
        .bind(failed)
        .bind(Utc::now().to_rfc3339())
        .bind(date.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RelayError::Memory(format!("update failed: {e}")))?;

        Ok(())
    }

    /// The most recent broadcast, if any.
    pub async fn last_broadcast(&self) -> Result<Option<BroadcastRecord>, RelayError> {
        let row: Option<(String, String, i64, i64, Option<String>)> = sqlx::query_as(
            "SELECT sent_on, template, delivered, failed, finished_at FROM broadcasts \
             ORDER BY sent_on DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RelayError::Memory(format!("query failed: {e}")))?;

        let Some((sent_on, template, delivered, failed, finished_at)) = row else {
            return Ok(None);
        };

        let sent_on = sent_on
            .parse::<NaiveDate>()
            .map_err(|e| RelayError::Memory(format!("corrupt broadcast date {sent_on}: {e}")))?;

        Ok(Some(BroadcastRecord {
            sent_on,
            template,
            delivered,
            failed,
            finished: finished_at.is_some(),
        }))
    }
}
