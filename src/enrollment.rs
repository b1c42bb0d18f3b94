//! Per-(student, class) enrollment state machine.
//!
//! Legal moves:
//!
//! ```text
//! pending    -> confirmed   (payment completed)
//! pending    -> cancelled
//! confirmed  -> cancelled
//! waitlisted -> pending     (promotion only)
//! waitlisted -> cancelled
//! ```
//!
//! `cancelled` is terminal. Nothing moves back into `waitlisted`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::capacity::{CapacityLedger, Reservation};
use crate::errors::{EngineError, EntityKind, Result};
use crate::model::{
    ClassSection, Enrollment, EnrollmentStatus, LifecycleStatus, NewEnrollment, StudentId,
};
use crate::persistence::StoreTx;
use crate::waitlist::WaitlistQueue;

/// What a cancellation did, including the hand-off to the waitlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelOutcome {
    pub cancelled: Enrollment,
    pub released_seat: bool,
    pub promoted: Option<Enrollment>,
}

pub struct EnrollmentStateMachine<'a> {
    tx: &'a mut dyn StoreTx,
}

impl<'a> EnrollmentStateMachine<'a> {
    pub fn new(tx: &'a mut dyn StoreTx) -> Self {
        Self { tx }
    }

    pub fn is_legal(from: EnrollmentStatus, to: EnrollmentStatus) -> bool {
        use EnrollmentStatus::*;
        matches!(
            (from, to),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Waitlisted, Pending)
                | (Waitlisted, Cancelled)
        )
    }

    /// Move `enrollment` to `to`, keeping `waitlist_position` in step with the
    /// status. Does not touch the store.
    pub fn apply(
        enrollment: &mut Enrollment,
        to: EnrollmentStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !Self::is_legal(enrollment.status, to) {
            return Err(EngineError::enrollment_transition(enrollment.status, to));
        }
        enrollment.status = to;
        enrollment.waitlist_position = None;
        enrollment.updated_at = now;
        Ok(())
    }

    /// Admit a student into a pending seat. Never waitlists implicitly.
    pub fn admit(
        &mut self,
        class: &mut ClassSection,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> Result<Enrollment> {
        if self.tx.get_block(class.id, student_id)?.is_some() {
            return Err(EngineError::StudentBlocked {
                student_id,
                class_id: class.id,
            });
        }
        if let Some(existing) = self.tx.find_active_enrollment(student_id, class.id)? {
            return Err(EngineError::DuplicateEnrollment {
                student_id,
                class_id: class.id,
                existing: existing.id,
            });
        }
        if CapacityLedger::new(&mut *self.tx).try_reserve_seat(class)? == Reservation::Full {
            return Err(EngineError::CapacityExceeded {
                class_id: class.id,
                class_name: class.name.clone(),
            });
        }

        let enrollment = self.tx.insert_enrollment(&NewEnrollment {
            student_id,
            class_id: class.id,
            status: EnrollmentStatus::Pending,
            waitlist_position: None,
            created_at: now,
        })?;
        info!(
            class_id = class.id,
            student_id,
            enrollment_id = enrollment.id,
            seats_taken = class.seats_taken,
            "enrollment admitted as pending"
        );
        Ok(enrollment)
    }

    /// Pending to confirmed. Confirming twice is a no-op and returns `false`.
    pub fn confirm(&mut self, enrollment: &mut Enrollment, now: DateTime<Utc>) -> Result<bool> {
        if enrollment.status == EnrollmentStatus::Confirmed {
            return Ok(false);
        }
        Self::apply(enrollment, EnrollmentStatus::Confirmed, now)?;
        self.tx.update_enrollment(enrollment)?;
        info!(
            class_id = enrollment.class_id,
            enrollment_id = enrollment.id,
            "enrollment confirmed"
        );
        Ok(true)
    }

    /// Cancel an enrollment. A released seat is handed straight to the head
    /// of the waitlist in the same transaction.
    pub fn cancel(&mut self, mut enrollment: Enrollment, now: DateTime<Utc>) -> Result<CancelOutcome> {
        let prior = enrollment.status;
        let prior_position = enrollment.waitlist_position;
        Self::apply(&mut enrollment, EnrollmentStatus::Cancelled, now)?;
        self.tx.update_enrollment(&enrollment)?;

        let mut outcome = CancelOutcome {
            cancelled: enrollment.clone(),
            released_seat: false,
            promoted: None,
        };

        if prior.holds_seat() {
            let mut class = self
                .tx
                .get_class(enrollment.class_id)?
                .ok_or_else(|| EngineError::not_found(EntityKind::Class, enrollment.class_id))?;
            CapacityLedger::new(&mut *self.tx).release_seat(&mut class)?;
            outcome.released_seat = true;
            // Only a class still open for enrollment hands seats to its waitlist.
            if class.status == LifecycleStatus::Published {
                outcome.promoted =
                    WaitlistQueue::new(&mut *self.tx).promote_head(&mut class, now)?;
            }
        } else if let Some(position) = prior_position {
            WaitlistQueue::new(&mut *self.tx).close_gap(enrollment.class_id, position, now)?;
        }

        info!(
            class_id = enrollment.class_id,
            enrollment_id = enrollment.id,
            prior = %prior,
            released_seat = outcome.released_seat,
            promoted = ?outcome.promoted.as_ref().map(|e| e.id),
            "enrollment cancelled"
        );
        Ok(outcome)
    }
}
