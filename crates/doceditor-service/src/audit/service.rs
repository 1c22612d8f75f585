//! Audit log service.

use std::sync::Arc;

use tracing::warn;

use doceditor_core::result::AppResult;
use doceditor_core::types::FileId;
use doceditor_database::repositories::AuditLogRepository;
use doceditor_entity::audit::{AuditLogEntry, CreateAuditLogEntry};

/// Appends and reads audit entries.
#[derive(Debug, Clone)]
pub struct AuditService {
    /// Audit log repository.
    audit_repo: Arc<AuditLogRepository>,
    /// Entries returned when the caller gives no limit.
    default_limit: u32,
}

impl AuditService {
    /// Creates a new audit service.
    pub fn new(audit_repo: Arc<AuditLogRepository>, default_limit: u32) -> Self {
        Self {
            audit_repo,
            default_limit,
        }
    }

    /// Append one entry.
    pub async fn record(
        &self,
        user: &str,
        action: &str,
        file_id: Option<FileId>,
        details: serde_json::Value,
    ) -> AppResult<AuditLogEntry> {
        let entry = CreateAuditLogEntry {
            user: user.to_string(),
            action: action.to_string(),
            file_id: file_id.map(|id| id.to_string()).unwrap_or_default(),
            details,
        };
        self.audit_repo.create(&entry).await
    }

    /// Append one entry after the action it describes already happened.
    ///
    /// A failed write is logged and does not undo the action.
    pub async fn log(
        &self,
        user: &str,
        action: &str,
        file_id: Option<FileId>,
        details: serde_json::Value,
    ) {
        if let Err(e) = self.record(user, action, file_id, details).await {
            warn!(action = %action, user = %user, error = %e, "Failed to write audit entry");
        }
    }

    /// The most recent entries in chronological order (oldest first).
    pub async fn recent(
        &self,
        limit: Option<u32>,
        file_id: Option<FileId>,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let limit = limit.unwrap_or(self.default_limit);
        let file_key = file_id.map(|id| id.to_string());
        let mut entries = self
            .audit_repo
            .find_recent(limit, file_key.as_deref())
            .await?;
        entries.reverse();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::TestContext;
    use doceditor_core::types::FileId;

    #[tokio::test]
    async fn test_recent_is_oldest_first() {
        let ctx = TestContext::new().await;
        let audit = &ctx.state.audit;
        let id = FileId::new();

        for action in ["upload", "image_crop", "revert"] {
            audit
                .record("ann", action, Some(id), serde_json::json!({}))
                .await
                .unwrap();
        }
        audit
            .record("bob", "upload", None, serde_json::json!({}))
            .await
            .unwrap();

        let all = audit.recent(None, None).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all.last().unwrap().user, "bob");

        let limited = audit.recent(Some(2), Some(id)).await.unwrap();
        let actions: Vec<&str> = limited.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["image_crop", "revert"]);
    }
}
