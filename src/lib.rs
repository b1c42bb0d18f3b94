pub mod actor;
pub mod audit;
pub mod calendar;
pub mod capacity;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod enrollment;
pub mod errors;
pub mod locks;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod schedule_index;
pub mod waitlist;

pub use actor::Actor;
pub use audit::{AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use calendar::{DaySet, TimeBlock};
pub use config::{ConfigError, EngineConfig};
pub use conflict::{ConflictDetector, ConflictPair};
pub use engine::{BlockOutcome, ClassAudit, Engine};
pub use enrollment::CancelOutcome;
pub use errors::{ConflictKind, EngineError, EntityKind, StoreError};
pub use model::{
    Block, ClassId, ClassSection, ClassSpec, Enrollment, EnrollmentId, EnrollmentStatus,
    LifecycleStatus, ScheduleSlot, Student, StudentId,
};
#[cfg(feature = "sqlite")]
pub use persistence::SqliteStore;
pub use persistence::{EngineStore, MemoryStore, StoreTx};
pub use schedule_index::ScheduleIndex;
