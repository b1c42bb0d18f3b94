use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::{EngineStore, StoreTx};
use crate::errors::{StoreError, StoreResult};
use crate::model::{
    Block, ClassId, ClassSection, ClassSpec, Enrollment, EnrollmentId, LifecycleStatus,
    NewEnrollment, Student, StudentId, UserId,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    classes: BTreeMap<ClassId, ClassSection>,
    students: BTreeMap<StudentId, Student>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    blocks: BTreeMap<(ClassId, StudentId), Block>,
    next_class_id: ClassId,
    next_student_id: StudentId,
    next_enrollment_id: EnrollmentId,
}

impl Tables {
    fn check_class(class: &ClassSection) -> StoreResult<()> {
        if class.capacity < 1 {
            return Err(StoreError::Constraint(format!(
                "class {} capacity must be >= 1",
                class.id
            )));
        }
        if class.seats_taken > class.capacity {
            return Err(StoreError::Constraint(format!(
                "class {} seats_taken {} exceeds capacity {}",
                class.id, class.seats_taken, class.capacity
            )));
        }
        Ok(())
    }

    fn check_unique_active(&self, candidate: &Enrollment) -> StoreResult<()> {
        if !candidate.status.is_active() {
            return Ok(());
        }
        let clash = self.enrollments.values().any(|e| {
            e.id != candidate.id
                && e.class_id == candidate.class_id
                && e.student_id == candidate.student_id
                && e.status.is_active()
        });
        if clash {
            return Err(StoreError::Constraint(format!(
                "student {} already has an active enrollment in class {}",
                candidate.student_id, candidate.class_id
            )));
        }
        Ok(())
    }
}

/// In-process store. A transaction works on a copy of the tables and swaps
/// it in on commit, so a failed operation leaves no trace.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EngineStore for MemoryStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
    {
        let mut committed = self.tables.lock();
        let mut tx = MemoryTx {
            tables: committed.clone(),
        };
        let value = f(&mut tx)?;
        *committed = tx.tables;
        Ok(value)
    }
}

struct MemoryTx {
    tables: Tables,
}

impl StoreTx for MemoryTx {
    fn insert_class(&mut self, spec: &ClassSpec) -> StoreResult<ClassSection> {
        self.tables.next_class_id += 1;
        let class = ClassSection {
            id: self.tables.next_class_id,
            name: spec.name.clone(),
            teacher_id: spec.teacher_id,
            location: spec.location.clone(),
            capacity: spec.capacity,
            seats_taken: 0,
            slot: spec.slot.clone(),
            status: LifecycleStatus::Draft,
        };
        Tables::check_class(&class)?;
        self.tables.classes.insert(class.id, class.clone());
        Ok(class)
    }

    fn get_class(&mut self, id: ClassId) -> StoreResult<Option<ClassSection>> {
        Ok(self.tables.classes.get(&id).cloned())
    }

    fn update_class(&mut self, class: &ClassSection) -> StoreResult<()> {
        Tables::check_class(class)?;
        match self.tables.classes.get_mut(&class.id) {
            Some(existing) => {
                *existing = class.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!(
                "update of missing class {}",
                class.id
            ))),
        }
    }

    fn delete_class(&mut self, id: ClassId) -> StoreResult<bool> {
        if self.tables.enrollments.values().any(|e| e.class_id == id) {
            return Err(StoreError::Constraint(format!(
                "class {id} still has enrollments"
            )));
        }
        self.tables.blocks.retain(|(class_id, _), _| *class_id != id);
        Ok(self.tables.classes.remove(&id).is_some())
    }

    fn list_classes(&mut self) -> StoreResult<Vec<ClassSection>> {
        Ok(self.tables.classes.values().cloned().collect())
    }

    fn insert_student(&mut self, guardian_id: UserId, name: &str) -> StoreResult<Student> {
        self.tables.next_student_id += 1;
        let student = Student {
            id: self.tables.next_student_id,
            guardian_id,
            name: name.to_string(),
        };
        self.tables.students.insert(student.id, student.clone());
        Ok(student)
    }

    fn get_student(&mut self, id: StudentId) -> StoreResult<Option<Student>> {
        Ok(self.tables.students.get(&id).cloned())
    }

    fn insert_enrollment(&mut self, row: &NewEnrollment) -> StoreResult<Enrollment> {
        let enrollment = Enrollment {
            id: self.tables.next_enrollment_id + 1,
            student_id: row.student_id,
            class_id: row.class_id,
            status: row.status,
            waitlist_position: row.waitlist_position,
            created_at: row.created_at,
            updated_at: row.created_at,
        };
        self.tables.check_unique_active(&enrollment)?;
        self.tables.next_enrollment_id = enrollment.id;
        self.tables
            .enrollments
            .insert(enrollment.id, enrollment.clone());
        Ok(enrollment)
    }

    fn get_enrollment(&mut self, id: EnrollmentId) -> StoreResult<Option<Enrollment>> {
        Ok(self.tables.enrollments.get(&id).cloned())
    }

    fn update_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()> {
        self.tables.check_unique_active(enrollment)?;
        match self.tables.enrollments.get_mut(&enrollment.id) {
            Some(existing) => {
                *existing = enrollment.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!(
                "update of missing enrollment {}",
                enrollment.id
            ))),
        }
    }

    fn delete_enrollment(&mut self, id: EnrollmentId) -> StoreResult<bool> {
        Ok(self.tables.enrollments.remove(&id).is_some())
    }

    fn list_class_enrollments(&mut self, class_id: ClassId) -> StoreResult<Vec<Enrollment>> {
        Ok(self
            .tables
            .enrollments
            .values()
            .filter(|e| e.class_id == class_id)
            .cloned()
            .collect())
    }

    fn get_block(
        &mut self,
        class_id: ClassId,
        student_id: StudentId,
    ) -> StoreResult<Option<Block>> {
        Ok(self.tables.blocks.get(&(class_id, student_id)).cloned())
    }

    fn insert_block(&mut self, block: &Block) -> StoreResult<()> {
        let key = (block.class_id, block.student_id);
        if self.tables.blocks.contains_key(&key) {
            return Err(StoreError::Constraint(format!(
                "student {} is already blocked from class {}",
                block.student_id, block.class_id
            )));
        }
        self.tables.blocks.insert(key, block.clone());
        Ok(())
    }

    fn delete_block(&mut self, class_id: ClassId, student_id: StudentId) -> StoreResult<bool> {
        Ok(self.tables.blocks.remove(&(class_id, student_id)).is_some())
    }

    fn list_blocks(&mut self, class_id: ClassId) -> StoreResult<Vec<Block>> {
        Ok(self
            .tables
            .blocks
            .values()
            .filter(|b| b.class_id == class_id)
            .cloned()
            .collect())
    }
}
