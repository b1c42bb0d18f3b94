//! Crate-wide error types.
//!
//! Every expected outcome of an engine operation (full class, blocked student,
//! schedule collision, ...) is a typed variant of [`EngineError`] so callers can
//! render an actionable message. Only [`EngineError::Store`] wraps genuinely
//! unexpected failures of the backing store.

use serde::Serialize;
use thiserror::Error;

use crate::model::{ClassId, EnrollmentId, EnrollmentStatus, LifecycleStatus, StudentId};

/// What a [`EngineError::NotFound`] was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Class,
    Student,
    Enrollment,
    Block,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Class => "class",
            EntityKind::Student => "student",
            EntityKind::Enrollment => "enrollment",
            EntityKind::Block => "block",
        };
        f.write_str(name)
    }
}

/// Which shared resource two colliding classes have in common.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Teacher,
    Room,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::Teacher => f.write_str("teacher"),
            ConflictKind::Room => f.write_str("room"),
        }
    }
}

/// Failures raised by a [`crate::persistence::StoreTx`] implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store could not obtain its write lock in time.
    #[error("store is busy")]
    Busy,

    /// A write would break a uniqueness or check constraint.
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match value {
            rusqlite::Error::SqliteFailure(ref err, _)
                if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                StoreError::Busy
            }
            rusqlite::Error::SqliteFailure(ref err, ref message)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(message.clone().unwrap_or_else(|| err.to_string()))
            }
            other => StoreError::Sqlite(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: i64 },

    #[error("schedule conflict: {kind} is already booked by class {class_id} ('{class_name}')")]
    ScheduleConflict {
        class_id: ClassId,
        class_name: String,
        kind: ConflictKind,
    },

    #[error("class {class_id} ('{class_name}') is full")]
    CapacityExceeded { class_id: ClassId, class_name: String },

    #[error("class {class_id} ('{class_name}') still has open seats")]
    ClassNotFull { class_id: ClassId, class_name: String },

    #[error("class {class_id} is not open for enrollment (status: {status})")]
    ClassNotPublished {
        class_id: ClassId,
        status: LifecycleStatus,
    },

    #[error("student {student_id} already holds enrollment {existing} in class {class_id}")]
    DuplicateEnrollment {
        student_id: StudentId,
        class_id: ClassId,
        existing: EnrollmentId,
    },

    #[error("student {student_id} is blocked from class {class_id}")]
    StudentBlocked { student_id: StudentId, class_id: ClassId },

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("invalid class: {0}")]
    InvalidClass(String),

    #[error("{operation} could not complete after {attempts} attempt(s), please try again")]
    ConcurrencyConflict {
        operation: &'static str,
        attempts: u32,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn not_found(kind: EntityKind, id: i64) -> Self {
        EngineError::NotFound { kind, id }
    }

    pub fn enrollment_transition(from: EnrollmentStatus, to: EnrollmentStatus) -> Self {
        EngineError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn lifecycle_transition(from: LifecycleStatus, to: LifecycleStatus) -> Self {
        EngineError::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Whether running the whole operation again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::ConcurrencyConflict { .. } | EngineError::Store(StoreError::Busy)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
