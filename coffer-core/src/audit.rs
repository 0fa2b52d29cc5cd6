//! Audit logging infrastructure.
//!
//! Provides traits and implementations for logging security-critical
//! events: authorization decisions, role lifecycle changes, snapshot
//! loads.

use crate::role::RoleId;
use crate::treasury::TreasuryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Authorized,
    Rejected,
    RoleAdded,
    RoleRemoved,
    ActionsGranted,
    ActionsRevoked,
    SnapshotLoaded,
}

/// One security-relevant event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event id.
    pub id: String,
    pub event_type: AuditEventType,
    pub timestamp: DateTime<Utc>,
    /// Hex form of the treasury id the event belongs to.
    pub treasury: String,
    /// The acting role, when the event has one.
    pub actor: Option<u8>,
    /// Kebab-case rejection reason, for `Rejected` events.
    pub reason: Option<String>,
    /// Free-form detail.
    pub details: Option<String>,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        treasury: &TreasuryId,
        actor: Option<RoleId>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            treasury: treasury.to_string(),
            actor: actor.map(RoleId::value),
            reason: None,
            details: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Trait for audit loggers.
pub trait AuditLogger: Send + Sync + std::fmt::Debug {
    /// Log an audit event.
    fn log(&self, event: AuditEvent);
}

/// A logger that writes events to stdout as JSON lines.
///
/// Suitable for containerized environments where logs are scraped by an
/// external agent.
#[derive(Debug, Default)]
pub struct StdoutLogger;

impl StdoutLogger {
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for StdoutLogger {
    fn log(&self, event: AuditEvent) {
        if let Ok(json) = serde_json::to_string(&event) {
            println!("{}", json);
        } else {
            eprintln!("Failed to serialize audit event: {:?}", event);
        }
    }
}

/// A logger that does nothing (for testing or when auditing is disabled).
#[derive(Debug, Default)]
pub struct NoOpLogger;

impl AuditLogger for NoOpLogger {
    fn log(&self, _event: AuditEvent) {}
}

/// Global audit logger instance.
///
/// A global avoids threading the logger through every engine call. It is
/// unset by default, in which case events are dropped.
static GLOBAL_LOGGER: RwLock<Option<Arc<dyn AuditLogger>>> = RwLock::new(None);

/// Set the global audit logger.
pub fn set_global_logger(logger: Arc<dyn AuditLogger>) {
    if let Ok(mut lock) = GLOBAL_LOGGER.write() {
        *lock = Some(logger);
    }
}

/// Log an event using the global logger.
pub fn log_event(event: AuditEvent) {
    if let Ok(lock) = GLOBAL_LOGGER.read() {
        if let Some(logger) = lock.as_ref() {
            logger.log(event);
        }
    }
}
