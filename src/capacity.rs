//! Seat accounting for a class.
//!
//! `seats_taken` is derived from the enrollment rows, so every change goes
//! through the same transaction as the enrollment write that justifies it.

use tracing::debug;

use crate::errors::{StoreError, StoreResult};
use crate::model::{ClassId, ClassSection};
use crate::persistence::StoreTx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Reserved,
    Full,
}

pub struct CapacityLedger<'a> {
    tx: &'a mut dyn StoreTx,
}

impl<'a> CapacityLedger<'a> {
    pub fn new(tx: &'a mut dyn StoreTx) -> Self {
        Self { tx }
    }

    /// Take one seat if one is free. The caller must write the enrollment row
    /// backing the seat in the same transaction.
    pub fn try_reserve_seat(&mut self, class: &mut ClassSection) -> StoreResult<Reservation> {
        if class.is_full() {
            debug!(class_id = class.id, capacity = class.capacity, "no seat available");
            return Ok(Reservation::Full);
        }
        class.seats_taken += 1;
        self.tx.update_class(class)?;
        debug!(
            class_id = class.id,
            seats_taken = class.seats_taken,
            capacity = class.capacity,
            "seat reserved"
        );
        Ok(Reservation::Reserved)
    }

    pub fn release_seat(&mut self, class: &mut ClassSection) -> StoreResult<()> {
        if class.seats_taken == 0 {
            return Err(StoreError::Corrupt(format!(
                "class {} released a seat it never reserved",
                class.id
            )));
        }
        class.seats_taken -= 1;
        self.tx.update_class(class)?;
        debug!(
            class_id = class.id,
            seats_taken = class.seats_taken,
            "seat released"
        );
        Ok(())
    }

    /// Count the enrollments that actually hold a seat.
    pub fn seat_holders(&mut self, class_id: ClassId) -> StoreResult<u32> {
        let held = self
            .tx
            .list_class_enrollments(class_id)?
            .iter()
            .filter(|e| e.status.holds_seat())
            .count();
        Ok(held as u32)
    }
}
