//! Customer registry: every contact ever seen as a sender.

use super::Store;
use chrono::Utc;
use relay_core::error::RelayError;

impl Store {
    /// Register a contact. Returns `true` the first time it is seen.
    pub async fn register_customer(&self, contact: &str) -> Result<bool, RelayError> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO customers (contact, first_seen) VALUES (?, ?)")
                .bind(contact)
                .bind(Utc::now().to_rfc3339())
                .execute(&self.pool)
                .await
                .map_err(|e| RelayError::Memory(format!("insert failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// All registered contacts, in registration order.
    pub async fn list_customers(&self) -> Result<Vec<String>, RelayError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT contact FROM customers ORDER BY first_seen ASC, rowid ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RelayError::Memory(format!("query failed: {e}")))?;

        Ok(rows.into_iter().map(|(c,)| c).collect())
    }

    pub async fn customer_count(&self) -> Result<i64, RelayError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RelayError::Memory(format!("query failed: {e}")))?;
        Ok(count)
    }
}
