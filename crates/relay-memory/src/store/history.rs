//! Append-only conversation history.

use super::Store;
use chrono::{DateTime, Utc};
use relay_core::{
    error::RelayError,
    message::{HistoryEntry, Role},
};
use tracing::warn;

impl Store {
    /// Append one entry to a contact's history, timestamped now.
    pub async fn append_history(
        &self,
        contact: &str,
        role: Role,
        content: &str,
    ) -> Result<(), RelayError> {
        sqlx::query("INSERT INTO history (contact, role, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(contact)
            .bind(role.as_str())
            .bind(content)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| RelayError::Memory(format!("insert failed: {e}")))?;

        Ok(())
    }

    /// The last `limit` entries for a contact, oldest first.
    pub async fn recent_history(
        &self,
        contact: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, RelayError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT role, content, created_at FROM history \
             WHERE contact = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(contact)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RelayError::Memory(format!("query failed: {e}")))?;

        let mut entries: Vec<HistoryEntry> = rows
            .into_iter()
            .filter_map(|(role, content, created_at)| {
                let role = match role.parse::<Role>() {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("history: skipping row for {contact}: {e}");
                        return None;
                    }
                };
                let timestamp = DateTime::parse_from_rfc3339(&created_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());
                Some(HistoryEntry {
                    contact: contact.to_string(),
                    role,
                    content,
                    timestamp,
                })
            })
            .collect();

        entries.reverse();
        Ok(entries)
    }

    /// The configured context window for a contact.
    pub async fn context_window(&self, contact: &str) -> Result<Vec<HistoryEntry>, RelayError> {
        self.recent_history(contact, self.max_context_messages).await
    }

    /// Total number of stored entries for a contact.
    pub async fn history_len(&self, contact: &str) -> Result<i64, RelayError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM history WHERE contact = ?")
            .bind(contact)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RelayError::Memory(format!("query failed: {e}")))?;
        Ok(count)
    }
}
