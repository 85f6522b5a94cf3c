//! Audit Trail - capped, most-recent-first record of user actions

use anyhow::{Context, Result};
use async_trait::async_trait;
use farm_common::audit::{AUDIT_CAPACITY, DASHBOARD_ACCESS_ACTION};
use farm_common::{AccessControl, AuditEntry, LogFilter, Outcome};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, create_dir_all};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Where actions are recorded. The log owns timestamps, actor identity and
/// capacity; callers only say what happened.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn add_entry(&self, action: &str, outcome: Outcome);
}

/// Record the start of a dashboard session
pub async fn record_dashboard_access(log: &dyn AuditLog) {
    log.add_entry(DASHBOARD_ACCESS_ACTION, Outcome::Success).await;
}

/// Audit trail kept in memory and optionally mirrored to a JSON file
pub struct AuditTrail {
    entries: RwLock<VecDeque<AuditEntry>>,
    access: Arc<dyn AccessControl>,
    path: Option<PathBuf>,
    capacity: usize,
}

impl AuditTrail {
    /// Trail that is lost when the process exits
    pub fn in_memory(access: Arc<dyn AccessControl>) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(AUDIT_CAPACITY)),
            access,
            path: None,
            capacity: AUDIT_CAPACITY,
        }
    }

    /// Trail persisted at `path`, reloading earlier entries if present
    pub async fn open(path: &Path, access: Arc<dyn AccessControl>) -> Result<Self> {
        if let Some(dir) = path.parent() {
            create_dir_all(dir)
                .await
                .context("Failed to create audit log directory")?;
        }

        let mut entries = VecDeque::with_capacity(AUDIT_CAPACITY);
        if fs::try_exists(path).await.unwrap_or(false) {
            let content = fs::read_to_string(path)
                .await
                .context("Failed to read audit log")?;
            match serde_json::from_str::<Vec<AuditEntry>>(&content) {
                Ok(loaded) => entries.extend(loaded.into_iter().take(AUDIT_CAPACITY)),
                Err(e) => warn!("Ignoring unreadable audit log {}: {}", path.display(), e),
            }
        }

        info!(
            "Audit trail initialized: {} ({} entries)",
            path.display(),
            entries.len()
        );

        Ok(Self {
            entries: RwLock::new(entries),
            access,
            path: Some(path.to_path_buf()),
            capacity: AUDIT_CAPACITY,
        })
    }

    /// All entries, newest first
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Entries matching the view filters, newest first
    pub async fn filtered(&self, filter: LogFilter, date: Option<&str>) -> Vec<AuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| filter.matches(e, date))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Get the path of the backing file
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn persist(&self, entries: &VecDeque<AuditEntry>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(path, json)
            .await
            .context("Failed to write audit log")?;
        Ok(())
    }
}

#[async_trait]
impl AuditLog for AuditTrail {
    async fn add_entry(&self, action: &str, outcome: Outcome) {
        let entry = AuditEntry::new(&self.access.actor_id(), action, outcome);
        debug!("audit: {} {} -> {}", entry.actor, entry.action, entry.outcome);

        let mut entries = self.entries.write().await;
        entries.push_front(entry);
        entries.truncate(self.capacity);

        if let Err(e) = self.persist(&entries).await {
            warn!("Audit entry kept in memory only: {:#}", e);
        }
    }
}
