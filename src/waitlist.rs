//! Per-class FIFO waitlist.
//!
//! Positions for a class always form `1..=N`. Every removal closes the gap it
//! leaves by shifting later entries down by one.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::capacity::{CapacityLedger, Reservation};
use crate::enrollment::EnrollmentStateMachine;
use crate::errors::{EngineError, Result, StoreResult};
use crate::model::{
    ClassId, ClassSection, Enrollment, EnrollmentStatus, NewEnrollment, StudentId,
};
use crate::persistence::StoreTx;

pub struct WaitlistQueue<'a> {
    tx: &'a mut dyn StoreTx,
}

impl<'a> WaitlistQueue<'a> {
    pub fn new(tx: &'a mut dyn StoreTx) -> Self {
        Self { tx }
    }

    /// Append a student at the tail. Only allowed while the class is full.
    pub fn join(
        &mut self,
        class: &ClassSection,
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
        if !class.is_full() {
            return Err(EngineError::ClassNotFull {
                class_id: class.id,
                class_name: class.name.clone(),
            });
        }

        let position = self.tail_position(class.id)? + 1;
        let enrollment = self.tx.insert_enrollment(&NewEnrollment {
            student_id,
            class_id: class.id,
            status: EnrollmentStatus::Waitlisted,
            waitlist_position: Some(position),
            created_at: now,
        })?;
        info!(
            class_id = class.id,
            student_id,
            enrollment_id = enrollment.id,
            position,
            "joined waitlist"
        );
        Ok(enrollment)
    }

    /// Delete a waitlisted row and close the gap behind it.
    pub fn leave(&mut self, enrollment: &Enrollment, now: DateTime<Utc>) -> Result<()> {
        let Some(position) = Self::waitlisted_position(enrollment) else {
            return Err(EngineError::enrollment_transition(
                enrollment.status,
                EnrollmentStatus::Cancelled,
            ));
        };
        self.tx.delete_enrollment(enrollment.id)?;
        self.close_gap(enrollment.class_id, position, now)?;
        info!(
            class_id = enrollment.class_id,
            enrollment_id = enrollment.id,
            position,
            "left waitlist"
        );
        Ok(())
    }

    /// Move the lowest-position entry into a pending seat, if a seat is free.
    ///
    /// `Ok(None)` covers both "no free seat" and "nobody waiting".
    pub fn promote_head(
        &mut self,
        class: &mut ClassSection,
        now: DateTime<Utc>,
    ) -> Result<Option<Enrollment>> {
        if class.is_full() {
            return Ok(None);
        }
        let Some(mut head) = self.tx.list_waitlist(class.id)?.into_iter().next() else {
            return Ok(None);
        };
        let Some(position) = Self::waitlisted_position(&head) else {
            return Ok(None);
        };

        if CapacityLedger::new(&mut *self.tx).try_reserve_seat(class)? == Reservation::Full {
            return Ok(None);
        }
        EnrollmentStateMachine::apply(&mut head, EnrollmentStatus::Pending, now)?;
        self.tx.update_enrollment(&head)?;
        self.close_gap(class.id, position, now)?;

        info!(
            class_id = class.id,
            student_id = head.student_id,
            enrollment_id = head.id,
            "promoted from waitlist"
        );
        Ok(Some(head))
    }

    /// Shift every entry behind `removed` down by one.
    pub fn close_gap(
        &mut self,
        class_id: ClassId,
        removed: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let behind: Vec<Enrollment> = self
            .tx
            .list_waitlist(class_id)?
            .into_iter()
            .filter(|e| e.waitlist_position.is_some_and(|p| p > removed))
            .collect();
        for mut entry in behind {
            entry.waitlist_position = entry.waitlist_position.map(|p| p - 1);
            entry.updated_at = now;
            self.tx.update_enrollment(&entry)?;
        }
        debug!(class_id, removed, "waitlist reindexed");
        Ok(())
    }

    pub fn positions(&mut self, class_id: ClassId) -> StoreResult<Vec<u32>> {
        Ok(self
            .tx
            .list_waitlist(class_id)?
            .into_iter()
            .filter_map(|e| e.waitlist_position)
            .collect())
    }

    fn tail_position(&mut self, class_id: ClassId) -> StoreResult<u32> {
        Ok(self.positions(class_id)?.into_iter().max().unwrap_or(0))
    }

    fn waitlisted_position(enrollment: &Enrollment) -> Option<u32> {
        match enrollment.status {
            EnrollmentStatus::Waitlisted => enrollment.waitlist_position,
            _ => None,
        }
    }
}
