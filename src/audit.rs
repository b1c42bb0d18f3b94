//! Fire-and-forget audit trail.
//!
//! The engine hands one event per committed change to an [`AuditSink`]. Sinks
//! cannot fail the operation that produced the event.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::model::{ClassId, EnrollmentId, LifecycleStatus, StudentId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    ClassCreated {
        class_id: ClassId,
        actor: UserId,
    },
    ClassUpdated {
        class_id: ClassId,
        actor: UserId,
    },
    ClassStatusChanged {
        class_id: ClassId,
        actor: UserId,
        status: LifecycleStatus,
    },
    ClassDeleted {
        class_id: ClassId,
        actor: UserId,
    },
    Enrolled {
        enrollment_id: EnrollmentId,
        class_id: ClassId,
        student_id: StudentId,
        actor: UserId,
    },
    Waitlisted {
        enrollment_id: EnrollmentId,
        class_id: ClassId,
        student_id: StudentId,
        position: u32,
    },
    LeftWaitlist {
        enrollment_id: EnrollmentId,
        class_id: ClassId,
    },
    Promoted {
        enrollment_id: EnrollmentId,
        class_id: ClassId,
        student_id: StudentId,
    },
    Confirmed {
        enrollment_id: EnrollmentId,
        class_id: ClassId,
    },
    Cancelled {
        enrollment_id: EnrollmentId,
        class_id: ClassId,
        actor: UserId,
    },
    Blocked {
        class_id: ClassId,
        student_id: StudentId,
        actor: UserId,
    },
    Unblocked {
        class_id: ClassId,
        student_id: StudentId,
        actor: UserId,
    },
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes every event to the `audit` tracing target.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "audit", "{json}"),
            Err(_) => info!(target: "audit", ?event),
        }
    }
}

/// Keeps events in memory; handy for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}
