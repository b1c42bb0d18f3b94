//! Public entry point of the scheduling and enrollment engine.
//!
//! Every state-changing operation runs through [`Engine::run_exclusive`]:
//! per-class lock, one store transaction, bounded retry on transient
//! failures, then audit events once the transaction has committed. Class
//! writes additionally hold the schedule lock so two concurrent writes cannot
//! both pass the conflict check. Lock order is always schedule, then class.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::actor::Actor;
use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::capacity::CapacityLedger;
use crate::config::EngineConfig;
use crate::conflict::{ConflictDetector, ConflictPair};
use crate::enrollment::{CancelOutcome, EnrollmentStateMachine};
use crate::errors::{EngineError, EntityKind, Result};
use crate::locks::{KeyedLocks, LockTimeout};
use crate::model::{
    Block, ClassId, ClassSection, ClassSpec, Enrollment, EnrollmentId, EnrollmentStatus,
    LifecycleStatus, Student, StudentId, UserId,
};
use crate::persistence::{EngineStore, StoreTx};
use crate::schedule_index::ScheduleIndex;
use crate::waitlist::WaitlistQueue;

/// Result of [`Engine::block_student`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockOutcome {
    pub block: Block,
    /// Set when an active enrollment had to be force-cancelled.
    pub cancelled: Option<CancelOutcome>,
}

/// Recomputed view of a class's derived state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassAudit {
    pub class_id: ClassId,
    pub capacity: u32,
    pub seats_taken: u32,
    /// Enrollments in `pending` or `confirmed`.
    pub seat_holders: u32,
    /// Waitlist positions in ascending order.
    pub waitlist_positions: Vec<u32>,
    /// Rows whose `waitlist_position` disagrees with their status.
    pub misplaced_positions: usize,
}

impl ClassAudit {
    pub fn seats_consistent(&self) -> bool {
        self.seats_taken == self.seat_holders && self.seats_taken <= self.capacity
    }

    pub fn waitlist_contiguous(&self) -> bool {
        self.misplaced_positions == 0
            && self
                .waitlist_positions
                .iter()
                .copied()
                .eq(1..=self.waitlist_positions.len() as u32)
    }

    pub fn is_consistent(&self) -> bool {
        self.seats_consistent() && self.waitlist_contiguous()
    }
}

/// Committed value plus the audit events it produced.
type Committed<T> = (T, Vec<AuditEvent>);

pub struct Engine<S: EngineStore> {
    store: S,
    config: EngineConfig,
    class_locks: KeyedLocks<ClassId>,
    schedule_lock: Mutex<()>,
    audit: Arc<dyn AuditSink>,
}

impl<S: EngineStore> Engine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            class_locks: KeyedLocks::new(),
            schedule_lock: Mutex::new(()),
            audit: Arc::new(TracingAuditSink),
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Students
    // ------------------------------------------------------------------

    pub fn register_student(&self, guardian_id: UserId, name: &str) -> Result<Student> {
        let student = self
            .store
            .transaction(|tx| Ok::<_, EngineError>(tx.insert_student(guardian_id, name)?))?;
        debug!(student_id = student.id, guardian_id, "student registered");
        Ok(student)
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    /// Create a class (`exclude_self_id == None`) or update the class with that id.
    ///
    /// Either way the schedule is checked against every other non-cancelled
    /// class first; a collision rejects the write.
    pub fn create_or_update_class(
        &self,
        actor: &Actor,
        spec: &ClassSpec,
        exclude_self_id: Option<ClassId>,
    ) -> Result<ClassSection> {
        validate_spec(spec)?;
        if !actor.may_schedule_for(spec.teacher_id) {
            return Err(EngineError::NotAuthorized(format!(
                "user {} may not schedule classes for teacher {}",
                actor.user_id, spec.teacher_id
            )));
        }

        let _schedule = self.acquire_schedule_lock("create_or_update_class")?;
        match exclude_self_id {
            None => self.create_class_locked(actor, spec),
            Some(class_id) => {
                self.run_exclusive(class_id, "update_class", |tx| {
                    let now = Utc::now();
                    let mut class = load_class(tx, class_id)?;
                    if !actor.may_manage_class(&class) {
                        return Err(not_class_manager(actor, class_id));
                    }
                    if !class.status.occupies_schedule() {
                        return Err(EngineError::InvalidClass(format!(
                            "class {class_id} is {} and can no longer be edited",
                            class.status
                        )));
                    }
                    if spec.capacity < class.seats_taken {
                        return Err(EngineError::InvalidClass(format!(
                            "capacity {} is below the {} seats already taken",
                            spec.capacity, class.seats_taken
                        )));
                    }

                    let index = ScheduleIndex::from_classes(&tx.list_classes()?);
                    ConflictDetector::check(&index, spec, Some(class_id))?;

                    class.apply_spec(spec);
                    tx.update_class(&class)?;

                    let mut events = vec![AuditEvent::ClassUpdated {
                        class_id,
                        actor: actor.user_id,
                    }];
                    // Raised capacity goes straight to the waitlist.
                    if class.status == LifecycleStatus::Published {
                        let mut queue = WaitlistQueue::new(&mut *tx);
                        while let Some(promoted) = queue.promote_head(&mut class, now)? {
                            events.push(promoted_event(&promoted));
                        }
                    }
                    Ok((class, events))
                })
            }
        }
    }

    pub fn create_class(&self, actor: &Actor, spec: &ClassSpec) -> Result<ClassSection> {
        self.create_or_update_class(actor, spec, None)
    }

    pub fn update_class(
        &self,
        actor: &Actor,
        class_id: ClassId,
        spec: &ClassSpec,
    ) -> Result<ClassSection> {
        self.create_or_update_class(actor, spec, Some(class_id))
    }

    fn create_class_locked(&self, actor: &Actor, spec: &ClassSpec) -> Result<ClassSection> {
        let class = self.with_retries("create_class", || {
            self.store.transaction(|tx| {
                let index = ScheduleIndex::from_classes(&tx.list_classes()?);
                ConflictDetector::check(&index, spec, None)?;
                Ok(tx.insert_class(spec)?)
            })
        })?;
        info!(
            class_id = class.id,
            teacher_id = class.teacher_id,
            days = %class.slot.days,
            block = %class.slot.block,
            "class created"
        );
        self.audit.record(AuditEvent::ClassCreated {
            class_id: class.id,
            actor: actor.user_id,
        });
        Ok(class)
    }

    /// Move a class through its lifecycle.
    ///
    /// Cancelling a class cancels every non-cancelled enrollment in it and
    /// promotes nobody. Completing a class keeps its seats and cancels the
    /// waitlist.
    pub fn set_class_status(
        &self,
        actor: &Actor,
        class_id: ClassId,
        status: LifecycleStatus,
    ) -> Result<ClassSection> {
        let _schedule = self.acquire_schedule_lock("set_class_status")?;
        self.run_exclusive(class_id, "set_class_status", |tx| {
            let now = Utc::now();
            let mut class = load_class(tx, class_id)?;
            if !actor.may_manage_class(&class) {
                return Err(not_class_manager(actor, class_id));
            }
            if class.status == status {
                return Ok((class, Vec::new()));
            }
            if !class.status.can_transition_to(status) {
                return Err(EngineError::lifecycle_transition(class.status, status));
            }
            if status == LifecycleStatus::Published {
                let index = ScheduleIndex::from_classes(&tx.list_classes()?);
                let spec = ClassSpec::new(
                    class.name.clone(),
                    class.teacher_id,
                    class.location.clone(),
                    class.capacity,
                    class.slot.clone(),
                );
                ConflictDetector::check(&index, &spec, Some(class_id))?;
            }

            // Cancelling drops every live row; completing only drops the waitlist.
            let closes = |e: &Enrollment| match status {
                LifecycleStatus::Cancelled => e.status.is_active(),
                LifecycleStatus::Completed => e.status == EnrollmentStatus::Waitlisted,
                _ => false,
            };
            let mut events = Vec::new();
            for mut enrollment in tx.list_class_enrollments(class_id)? {
                if !closes(&enrollment) {
                    continue;
                }
                EnrollmentStateMachine::apply(&mut enrollment, EnrollmentStatus::Cancelled, now)?;
                tx.update_enrollment(&enrollment)?;
                events.push(AuditEvent::Cancelled {
                    enrollment_id: enrollment.id,
                    class_id,
                    actor: actor.user_id,
                });
            }
            if status == LifecycleStatus::Cancelled {
                class.seats_taken = 0;
            }

            class.status = status;
            tx.update_class(&class)?;
            info!(class_id, status = %status, "class status changed");
            events.push(AuditEvent::ClassStatusChanged {
                class_id,
                actor: actor.user_id,
                status,
            });
            Ok((class, events))
        })
    }

    pub fn publish_class(&self, actor: &Actor, class_id: ClassId) -> Result<ClassSection> {
        self.set_class_status(actor, class_id, LifecycleStatus::Published)
    }

    /// Hard-delete a class that was never published.
    pub fn delete_draft_class(&self, actor: &Actor, class_id: ClassId) -> Result<()> {
        self.run_exclusive(class_id, "delete_draft_class", |tx| {
            let class = load_class(tx, class_id)?;
            if !actor.may_manage_class(&class) {
                return Err(not_class_manager(actor, class_id));
            }
            if class.status != LifecycleStatus::Draft {
                return Err(EngineError::InvalidClass(format!(
                    "class {class_id} is {} and cannot be deleted",
                    class.status
                )));
            }
            tx.delete_class(class_id)?;
            Ok((
                (),
                vec![AuditEvent::ClassDeleted {
                    class_id,
                    actor: actor.user_id,
                }],
            ))
        })
    }

    // ------------------------------------------------------------------
    // Enrollment
    // ------------------------------------------------------------------

    /// Admit a student into a pending seat.
    ///
    /// A full class yields [`EngineError::CapacityExceeded`]; joining the
    /// waitlist is always an explicit second call.
    pub fn enroll(
        &self,
        actor: &Actor,
        student_id: StudentId,
        class_id: ClassId,
    ) -> Result<Enrollment> {
        self.run_exclusive(class_id, "enroll", |tx| {
            let now = Utc::now();
            let mut class = load_published_class(tx, class_id)?;
            check_student_access(tx, actor, student_id)?;
            let enrollment =
                EnrollmentStateMachine::new(&mut *tx).admit(&mut class, student_id, now)?;
            let event = AuditEvent::Enrolled {
                enrollment_id: enrollment.id,
                class_id,
                student_id,
                actor: actor.user_id,
            };
            Ok((enrollment, vec![event]))
        })
    }

    /// Put a student at the tail of a full class's waitlist.
    ///
    /// The returned enrollment carries the assigned `waitlist_position`.
    pub fn join_waitlist(
        &self,
        actor: &Actor,
        student_id: StudentId,
        class_id: ClassId,
    ) -> Result<Enrollment> {
        self.run_exclusive(class_id, "join_waitlist", |tx| {
            let now = Utc::now();
            let class = load_published_class(tx, class_id)?;
            check_student_access(tx, actor, student_id)?;
            let enrollment = WaitlistQueue::new(&mut *tx).join(&class, student_id, now)?;
            let event = AuditEvent::Waitlisted {
                enrollment_id: enrollment.id,
                class_id,
                student_id,
                position: enrollment.waitlist_position.unwrap_or_default(),
            };
            Ok((enrollment, vec![event]))
        })
    }

    /// Remove a waitlisted enrollment entirely and close the gap it leaves.
    pub fn leave_waitlist(&self, actor: &Actor, enrollment_id: EnrollmentId) -> Result<()> {
        let class_id = self.class_of(enrollment_id)?;
        self.run_exclusive(class_id, "leave_waitlist", |tx| {
            let enrollment = load_enrollment(tx, enrollment_id)?;
            check_student_access(tx, actor, enrollment.student_id)?;
            WaitlistQueue::new(&mut *tx).leave(&enrollment, Utc::now())?;
            let event = AuditEvent::LeftWaitlist {
                enrollment_id,
                class_id,
            };
            Ok(((), vec![event]))
        })
    }

    /// Cancel an enrollment; a freed seat is handed to the waitlist head in
    /// the same transaction.
    pub fn cancel(&self, actor: &Actor, enrollment_id: EnrollmentId) -> Result<CancelOutcome> {
        let class_id = self.class_of(enrollment_id)?;
        self.run_exclusive(class_id, "cancel", |tx| {
            let enrollment = load_enrollment(tx, enrollment_id)?;
            check_student_access(tx, actor, enrollment.student_id)?;
            let outcome = EnrollmentStateMachine::new(&mut *tx).cancel(enrollment, Utc::now())?;
            let events = cancel_events(&outcome, actor);
            Ok((outcome, events))
        })
    }

    /// Payment completed: pending becomes confirmed. Repeat calls are no-ops.
    pub fn on_payment_confirmed(&self, enrollment_id: EnrollmentId) -> Result<Enrollment> {
        let class_id = self.class_of(enrollment_id)?;
        self.run_exclusive(class_id, "on_payment_confirmed", |tx| {
            let mut enrollment = load_enrollment(tx, enrollment_id)?;
            let changed = EnrollmentStateMachine::new(&mut *tx).confirm(&mut enrollment, Utc::now())?;
            let events = if changed {
                vec![AuditEvent::Confirmed {
                    enrollment_id,
                    class_id,
                }]
            } else {
                debug!(enrollment_id, "payment confirmation already applied");
                Vec::new()
            };
            Ok((enrollment, events))
        })
    }

    /// Payment refunded: same as a cancellation by the system, including
    /// promotion. A refund for an already-cancelled enrollment is a no-op.
    pub fn on_payment_refunded(&self, enrollment_id: EnrollmentId) -> Result<CancelOutcome> {
        let class_id = self.class_of(enrollment_id)?;
        let system = Actor::system();
        self.run_exclusive(class_id, "on_payment_refunded", |tx| {
            let enrollment = load_enrollment(tx, enrollment_id)?;
            if enrollment.status == EnrollmentStatus::Cancelled {
                debug!(enrollment_id, "refund for already-cancelled enrollment ignored");
                let outcome = CancelOutcome {
                    cancelled: enrollment,
                    released_seat: false,
                    promoted: None,
                };
                return Ok((outcome, Vec::new()));
            }
            let outcome = EnrollmentStateMachine::new(&mut *tx).cancel(enrollment, Utc::now())?;
            let events = cancel_events(&outcome, &system);
            Ok((outcome, events))
        })
    }

    /// Promote the waitlist head if a seat is free.
    pub fn promote_waitlist(&self, class_id: ClassId) -> Result<Option<Enrollment>> {
        self.run_exclusive(class_id, "promote_waitlist", |tx| {
            let mut class = load_class(tx, class_id)?;
            if class.status != LifecycleStatus::Published {
                return Ok((None, Vec::new()));
            }
            let promoted = WaitlistQueue::new(&mut *tx).promote_head(&mut class, Utc::now())?;
            let events = promoted.iter().map(promoted_event).collect();
            Ok((promoted, events))
        })
    }

    // ------------------------------------------------------------------
    // Blocklist
    // ------------------------------------------------------------------

    /// Block a student from a class, force-cancelling any active enrollment
    /// for the pair (seat release and promotion included).
    pub fn block_student(
        &self,
        actor: &Actor,
        class_id: ClassId,
        student_id: StudentId,
        reason: &str,
    ) -> Result<BlockOutcome> {
        self.run_exclusive(class_id, "block_student", |tx| {
            let now = Utc::now();
            let class = load_class(tx, class_id)?;
            if !actor.may_manage_class(&class) {
                return Err(not_class_manager(actor, class_id));
            }
            if tx.get_student(student_id)?.is_none() {
                return Err(EngineError::not_found(EntityKind::Student, student_id));
            }
            if let Some(existing) = tx.get_block(class_id, student_id)? {
                return Ok((
                    BlockOutcome {
                        block: existing,
                        cancelled: None,
                    },
                    Vec::new(),
                ));
            }

            let block = Block {
                class_id,
                student_id,
                reason: reason.to_string(),
                created_by: actor.user_id,
                created_at: now,
            };
            tx.insert_block(&block)?;
            let mut events = vec![AuditEvent::Blocked {
                class_id,
                student_id,
                actor: actor.user_id,
            }];

            let cancelled = match tx.find_active_enrollment(student_id, class_id)? {
                Some(enrollment) => {
                    let outcome = EnrollmentStateMachine::new(&mut *tx).cancel(enrollment, now)?;
                    events.extend(cancel_events(&outcome, actor));
                    Some(outcome)
                }
                None => None,
            };
            info!(class_id, student_id, force_cancelled = cancelled.is_some(), "student blocked");
            Ok((BlockOutcome { block, cancelled }, events))
        })
    }

    pub fn unblock_student(
        &self,
        actor: &Actor,
        class_id: ClassId,
        student_id: StudentId,
    ) -> Result<bool> {
        self.run_exclusive(class_id, "unblock_student", |tx| {
            let class = load_class(tx, class_id)?;
            if !actor.may_manage_class(&class) {
                return Err(not_class_manager(actor, class_id));
            }
            let removed = tx.delete_block(class_id, student_id)?;
            let events = if removed {
                vec![AuditEvent::Unblocked {
                    class_id,
                    student_id,
                    actor: actor.user_id,
                }]
            } else {
                Vec::new()
            };
            Ok((removed, events))
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn class(&self, class_id: ClassId) -> Result<ClassSection> {
        self.store.transaction(|tx| load_class(tx, class_id))
    }

    pub fn classes(&self) -> Result<Vec<ClassSection>> {
        self.store.transaction(|tx| Ok(tx.list_classes()?))
    }

    pub fn enrollment(&self, enrollment_id: EnrollmentId) -> Result<Enrollment> {
        self.store.transaction(|tx| load_enrollment(tx, enrollment_id))
    }

    pub fn enrollments_for_class(&self, class_id: ClassId) -> Result<Vec<Enrollment>> {
        self.store
            .transaction(|tx| Ok(tx.list_class_enrollments(class_id)?))
    }

    /// Waitlisted enrollments in promotion order.
    pub fn waitlist(&self, class_id: ClassId) -> Result<Vec<Enrollment>> {
        self.store.transaction(|tx| Ok(tx.list_waitlist(class_id)?))
    }

    pub fn blocks(&self, class_id: ClassId) -> Result<Vec<Block>> {
        self.store.transaction(|tx| Ok(tx.list_blocks(class_id)?))
    }

    /// Ids of every draft/published class in `classes` that collides with another.
    pub fn detect_all_conflicts(classes: &[ClassSection]) -> BTreeSet<ClassId> {
        ConflictDetector::detect_all_conflicts(classes)
    }

    /// Colliding pairs across the whole stored catalog.
    pub fn catalog_conflicts(&self) -> Result<Vec<ConflictPair>> {
        let classes = self.classes()?;
        Ok(ConflictDetector::conflict_pairs(&classes))
    }

    /// Recompute seat and waitlist state for a class from its enrollment rows.
    pub fn verify_class(&self, class_id: ClassId) -> Result<ClassAudit> {
        self.store.transaction(|tx| {
            let class = load_class(tx, class_id)?;
            let seat_holders = CapacityLedger::new(&mut *tx).seat_holders(class_id)?;
            let waitlist_positions = {
                let mut positions = WaitlistQueue::new(&mut *tx).positions(class_id)?;
                positions.sort_unstable();
                positions
            };
            let misplaced_positions = tx
                .list_class_enrollments(class_id)?
                .iter()
                .filter(|e| {
                    (e.status == EnrollmentStatus::Waitlisted) != e.waitlist_position.is_some()
                })
                .count();
            Ok(ClassAudit {
                class_id,
                capacity: class.capacity,
                seats_taken: class.seats_taken,
                seat_holders,
                waitlist_positions,
                misplaced_positions,
            })
        })
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn class_of(&self, enrollment_id: EnrollmentId) -> Result<ClassId> {
        Ok(self.enrollment(enrollment_id)?.class_id)
    }

    fn acquire_schedule_lock(
        &self,
        operation: &'static str,
    ) -> Result<parking_lot::MutexGuard<'_, ()>> {
        self.schedule_lock
            .try_lock_for(self.config.lock_timeout())
            .ok_or(EngineError::ConcurrencyConflict {
                operation,
                attempts: 1,
            })
    }

    /// Run `op` as one transaction under the lock for `class_id`.
    fn run_exclusive<T, F>(&self, class_id: ClassId, operation: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut(&mut dyn StoreTx) -> Result<Committed<T>>,
    {
        let timeout = self.config.lock_timeout();
        let (value, events) = self.with_retries(operation, || {
            match self
                .class_locks
                .with_lock(&class_id, timeout, || self.store.transaction(|tx| op(tx)))
            {
                Ok(result) => result,
                Err(LockTimeout) => {
                    warn!(class_id, operation, "timed out waiting for class lock");
                    Err(EngineError::ConcurrencyConflict {
                        operation,
                        attempts: 1,
                    })
                }
            }
        })?;
        for event in events {
            self.audit.record(event);
        }
        Ok(value)
    }

    /// Retry retryable failures a bounded number of times.
    fn with_retries<T, F>(&self, operation: &'static str, mut attempt_once: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let max_attempts = self.config.concurrency.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match attempt_once() {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(operation, attempt, error = %err, "transient failure, retrying");
                    std::thread::sleep(self.config.retry_backoff());
                }
                Err(err) if err.is_retryable() => {
                    warn!(operation, attempt, error = %err, "giving up after retries");
                    return Err(EngineError::ConcurrencyConflict {
                        operation,
                        attempts: attempt,
                    });
                }
                other => return other,
            }
        }
    }
}

fn validate_spec(spec: &ClassSpec) -> Result<()> {
    if spec.name.trim().is_empty() {
        return Err(EngineError::InvalidClass("name must not be empty".into()));
    }
    if spec.capacity < 1 {
        return Err(EngineError::InvalidClass(format!(
            "class '{}' capacity must be >= 1 (got {})",
            spec.name, spec.capacity
        )));
    }
    if spec.slot.days.is_empty() {
        return Err(EngineError::InvalidClass(format!(
            "class '{}' must meet on at least one day",
            spec.name
        )));
    }
    if spec.slot.block.is_empty() {
        return Err(EngineError::InvalidClass(format!(
            "class '{}' requires a time block",
            spec.name
        )));
    }
    if spec.slot.start_date > spec.slot.end_date {
        return Err(EngineError::InvalidClass(format!(
            "class '{}' starts {} after it ends {}",
            spec.name, spec.slot.start_date, spec.slot.end_date
        )));
    }
    Ok(())
}

fn load_class(tx: &mut dyn StoreTx, class_id: ClassId) -> Result<ClassSection> {
    tx.get_class(class_id)?
        .ok_or_else(|| EngineError::not_found(EntityKind::Class, class_id))
}

fn load_published_class(tx: &mut dyn StoreTx, class_id: ClassId) -> Result<ClassSection> {
    let class = load_class(tx, class_id)?;
    if class.status != LifecycleStatus::Published {
        return Err(EngineError::ClassNotPublished {
            class_id,
            status: class.status,
        });
    }
    Ok(class)
}

fn load_enrollment(tx: &mut dyn StoreTx, enrollment_id: EnrollmentId) -> Result<Enrollment> {
    tx.get_enrollment(enrollment_id)?
        .ok_or_else(|| EngineError::not_found(EntityKind::Enrollment, enrollment_id))
}

fn check_student_access(tx: &mut dyn StoreTx, actor: &Actor, student_id: StudentId) -> Result<()> {
    let student = tx
        .get_student(student_id)?
        .ok_or_else(|| EngineError::not_found(EntityKind::Student, student_id))?;
    if !actor.may_act_for(&student) {
        return Err(EngineError::NotAuthorized(format!(
            "user {} may not act for student {student_id}",
            actor.user_id
        )));
    }
    Ok(())
}

fn not_class_manager(actor: &Actor, class_id: ClassId) -> EngineError {
    EngineError::NotAuthorized(format!(
        "user {} may not manage class {class_id}",
        actor.user_id
    ))
}

fn promoted_event(enrollment: &Enrollment) -> AuditEvent {
    AuditEvent::Promoted {
        enrollment_id: enrollment.id,
        class_id: enrollment.class_id,
        student_id: enrollment.student_id,
    }
}

fn cancel_events(outcome: &CancelOutcome, actor: &Actor) -> Vec<AuditEvent> {
    let mut events = vec![AuditEvent::Cancelled {
        enrollment_id: outcome.cancelled.id,
        class_id: outcome.cancelled.class_id,
        actor: actor.user_id,
    }];
    events.extend(outcome.promoted.iter().map(promoted_event));
    events
}
