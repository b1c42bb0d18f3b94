//! Transactional storage seam for classes, students, enrollments and blocks.
//!
//! The engine never talks to a database directly. It asks an [`EngineStore`]
//! for one transaction per operation and performs row-level reads and writes
//! through [`StoreTx`]. A closure that returns `Err` rolls the whole
//! transaction back, which is what keeps `seats_taken` and the enrollment
//! rows that back it in lockstep.

use crate::errors::{StoreError, StoreResult};
use crate::model::{
    Block, ClassId, ClassSection, ClassSpec, Enrollment, EnrollmentId, EnrollmentStatus,
    NewEnrollment, Student, StudentId, UserId,
};

pub trait StoreTx {
    fn insert_class(&mut self, spec: &ClassSpec) -> StoreResult<ClassSection>;
    fn get_class(&mut self, id: ClassId) -> StoreResult<Option<ClassSection>>;
    fn update_class(&mut self, class: &ClassSection) -> StoreResult<()>;
    fn delete_class(&mut self, id: ClassId) -> StoreResult<bool>;
    fn list_classes(&mut self) -> StoreResult<Vec<ClassSection>>;

    fn insert_student(&mut self, guardian_id: UserId, name: &str) -> StoreResult<Student>;
    fn get_student(&mut self, id: StudentId) -> StoreResult<Option<Student>>;

    fn insert_enrollment(&mut self, row: &NewEnrollment) -> StoreResult<Enrollment>;
    fn get_enrollment(&mut self, id: EnrollmentId) -> StoreResult<Option<Enrollment>>;
    fn update_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()>;
    fn delete_enrollment(&mut self, id: EnrollmentId) -> StoreResult<bool>;
    /// All enrollments for a class ordered by id.
    fn list_class_enrollments(&mut self, class_id: ClassId) -> StoreResult<Vec<Enrollment>>;

    fn get_block(&mut self, class_id: ClassId, student_id: StudentId)
    -> StoreResult<Option<Block>>;
    fn insert_block(&mut self, block: &Block) -> StoreResult<()>;
    fn delete_block(&mut self, class_id: ClassId, student_id: StudentId) -> StoreResult<bool>;
    fn list_blocks(&mut self, class_id: ClassId) -> StoreResult<Vec<Block>>;

    /// The single non-cancelled enrollment for a pair, if any.
    fn find_active_enrollment(
        &mut self,
        student_id: StudentId,
        class_id: ClassId,
    ) -> StoreResult<Option<Enrollment>> {
        Ok(self
            .list_class_enrollments(class_id)?
            .into_iter()
            .find(|e| e.student_id == student_id && e.status.is_active()))
    }

    /// Waitlisted enrollments for a class in position order.
    fn list_waitlist(&mut self, class_id: ClassId) -> StoreResult<Vec<Enrollment>> {
        let mut waitlisted: Vec<Enrollment> = self
            .list_class_enrollments(class_id)?
            .into_iter()
            .filter(|e| e.status == EnrollmentStatus::Waitlisted)
            .collect();
        waitlisted.sort_by_key(|e| e.waitlist_position);
        Ok(waitlisted)
    }
}

pub trait EngineStore: Send + Sync {
    /// Run `f` as one atomic unit: commit on `Ok`, roll back on `Err`.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>;
}

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
