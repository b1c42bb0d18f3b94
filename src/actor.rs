//! The already-authorized caller of an engine operation.
//!
//! Role resolution happens outside the engine. What reaches the core is a
//! small set of capabilities, so operations ask "may this actor touch this
//! class / this student" instead of branching on role names.

use crate::model::{ClassSection, Student, TeacherId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    /// May mutate any class, not only ones it teaches.
    pub manage_any_class: bool,
    /// May act on behalf of any student, not only its own family members.
    pub act_for_any_student: bool,
}

impl Actor {
    /// A parent acting for the students they are guardian of.
    pub fn guardian(user_id: UserId) -> Self {
        Self {
            user_id,
            manage_any_class: false,
            act_for_any_student: false,
        }
    }

    /// A teacher managing the classes they own.
    pub fn teacher(teacher_id: TeacherId) -> Self {
        Self::guardian(teacher_id)
    }

    pub fn scheduler(user_id: UserId) -> Self {
        Self {
            user_id,
            manage_any_class: true,
            act_for_any_student: false,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            manage_any_class: true,
            act_for_any_student: true,
        }
    }

    /// The engine itself, e.g. when driven by the payment event source.
    pub fn system() -> Self {
        Self::admin(0)
    }

    pub fn may_manage_class(&self, class: &ClassSection) -> bool {
        self.manage_any_class || class.teacher_id == self.user_id
    }

    pub fn may_schedule_for(&self, teacher_id: TeacherId) -> bool {
        self.manage_any_class || teacher_id == self.user_id
    }

    pub fn may_act_for(&self, student: &Student) -> bool {
        self.act_for_any_student || student.guardian_id == self.user_id
    }
}
