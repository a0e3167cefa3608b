//! Audit trail for exec decisions.
//!
//! Every command that reaches the executor is recorded with the verdict it
//! received, so callers can review what an agent attempted and what was
//! refused.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use warden_config::constants::execution::MAX_AUDIT_ENTRIES;

use crate::validation::{ValidationResult, ViolationCategory};

/// A single exec decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub command: String,
    pub allowed: bool,
    /// Present only for refused commands
    pub reason: Option<String>,
    pub category: Option<ViolationCategory>,
    pub timestamp: DateTime<Local>,
}

impl AuditEntry {
    pub fn new(command: impl Into<String>, verdict: &ValidationResult) -> Self {
        Self {
            command: command.into(),
            allowed: verdict.is_safe(),
            reason: verdict.reason().map(str::to_owned),
            category: verdict.category(),
            timestamp: Local::now(),
        }
    }
}

/// Shared log of the most recent [`AuditEntry`] values.
///
/// Clones share the same underlying entries. Once `capacity` entries are
/// held, each new one evicts the oldest.
#[derive(Debug)]
pub struct SafetyAuditLogger {
    entries: Arc<Mutex<VecDeque<AuditEntry>>>,
    enabled: bool,
    capacity: usize,
}

impl SafetyAuditLogger {
    pub fn new(enabled: bool) -> Self {
        Self::with_capacity(enabled, MAX_AUDIT_ENTRIES)
    }

    pub fn with_capacity(enabled: bool, capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            enabled,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn log(&self, entry: AuditEntry) {
        if !self.enabled || self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().await;
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Returns all logged entries, oldest first
    pub async fn entries(&self) -> Vec<AuditEntry> {
        let entries = self.entries.lock().await;
        entries.iter().cloned().collect()
    }

    pub async fn entries_for_command(&self, needle: &str) -> Vec<AuditEntry> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|entry| entry.command.contains(needle))
            .cloned()
            .collect()
    }

    pub async fn denied_entries(&self) -> Vec<AuditEntry> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|entry| !entry.allowed)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.clear();
    }

    pub async fn count(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.len()
    }
}

impl Clone for SafetyAuditLogger {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            enabled: self.enabled,
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied(reason: &str) -> ValidationResult {
        ValidationResult::unsafe_because(ViolationCategory::PrivilegedCommand, reason)
    }

    #[tokio::test]
    async fn records_verdicts() {
        let logger = SafetyAuditLogger::new(true);
        logger
            .log(AuditEntry::new("echo hi", &ValidationResult::Safe))
            .await;
        logger
            .log(AuditEntry::new("sudo ls", &denied("Privileged command not allowed: sudo")))
            .await;

        assert_eq!(logger.count().await, 2);
        let denied = logger.denied_entries().await;
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].command, "sudo ls");
        assert_eq!(denied[0].category, Some(ViolationCategory::PrivilegedCommand));
    }

    #[tokio::test]
    async fn disabled_logger_keeps_nothing() {
        let logger = SafetyAuditLogger::new(false);
        logger
            .log(AuditEntry::new("echo hi", &ValidationResult::Safe))
            .await;
        assert_eq!(logger.count().await, 0);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let logger = SafetyAuditLogger::new(true);
        let clone = logger.clone();
        clone
            .log(AuditEntry::new("ls -la", &ValidationResult::Safe))
            .await;

        assert_eq!(logger.entries_for_command("ls").await.len(), 1);
        logger.clear().await;
        assert_eq!(clone.count().await, 0);
    }

    #[tokio::test]
    async fn oldest_entries_are_evicted_at_capacity() {
        let logger = SafetyAuditLogger::with_capacity(true, 3);
        for n in 0..5 {
            logger
                .log(AuditEntry::new(format!("echo {n}"), &ValidationResult::Safe))
                .await;
        }

        let commands: Vec<String> = logger
            .entries()
            .await
            .into_iter()
            .map(|entry| entry.command)
            .collect();
        assert_eq!(commands, ["echo 2", "echo 3", "echo 4"]);
        assert_eq!(SafetyAuditLogger::new(true).capacity(), MAX_AUDIT_ENTRIES);
    }
}
