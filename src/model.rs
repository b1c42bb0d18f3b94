use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::calendar::{DaySet, TimeBlock, date_ranges_overlap};

pub type ClassId = i64;
pub type StudentId = i64;
pub type EnrollmentId = i64;
pub type TeacherId = i64;
pub type UserId = i64;

/// When and on which days a class meets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub days: DaySet,
    pub block: TimeBlock,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ScheduleSlot {
    pub fn new(
        days: DaySet,
        block: impl Into<TimeBlock>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            days,
            block: block.into(),
            start_date,
            end_date,
        }
    }

    pub fn overlaps_dates(&self, other: &ScheduleSlot) -> bool {
        date_ranges_overlap(self.start_date, self.end_date, other.start_date, other.end_date)
    }

    /// Date range, then shared day, then identical block.
    pub fn collides_with(&self, other: &ScheduleSlot) -> bool {
        self.overlaps_dates(other) && self.days.intersects(&other.days) && self.block == other.block
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Draft => "draft",
            LifecycleStatus::Published => "published",
            LifecycleStatus::Cancelled => "cancelled",
            LifecycleStatus::Completed => "completed",
        }
    }

    /// Whether a class in this state holds its teacher and room.
    pub fn occupies_schedule(&self) -> bool {
        !matches!(self, LifecycleStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: LifecycleStatus) -> bool {
        use LifecycleStatus::*;
        matches!(
            (self, next),
            (Draft, Published) | (Draft, Cancelled) | (Published, Cancelled) | (Published, Completed)
        )
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(LifecycleStatus::Draft),
            "published" => Ok(LifecycleStatus::Published),
            "cancelled" => Ok(LifecycleStatus::Cancelled),
            "completed" => Ok(LifecycleStatus::Completed),
            other => Err(format!("unknown lifecycle status '{other}'")),
        }
    }
}

/// Caller-supplied description of a class to create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub name: String,
    pub teacher_id: TeacherId,
    /// Room or location. Empty means unassigned and never collides.
    #[serde(default)]
    pub location: String,
    pub capacity: u32,
    pub slot: ScheduleSlot,
}

impl ClassSpec {
    pub fn new(
        name: impl Into<String>,
        teacher_id: TeacherId,
        location: impl Into<String>,
        capacity: u32,
        slot: ScheduleSlot,
    ) -> Self {
        Self {
            name: name.into(),
            teacher_id,
            location: location.into(),
            capacity,
            slot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSection {
    pub id: ClassId,
    pub name: String,
    pub teacher_id: TeacherId,
    pub location: String,
    pub capacity: u32,
    pub seats_taken: u32,
    pub slot: ScheduleSlot,
    pub status: LifecycleStatus,
}

impl ClassSection {
    pub fn is_full(&self) -> bool {
        self.seats_taken >= self.capacity
    }

    pub fn open_seats(&self) -> u32 {
        self.capacity.saturating_sub(self.seats_taken)
    }

    pub fn apply_spec(&mut self, spec: &ClassSpec) {
        self.name = spec.name.clone();
        self.teacher_id = spec.teacher_id;
        self.location = spec.location.clone();
        self.capacity = spec.capacity;
        self.slot = spec.slot.clone();
    }

    /// Rooms compare trimmed and case-insensitively.
    pub fn room_key(&self) -> Option<String> {
        room_key(&self.location)
    }
}

pub(crate) fn room_key(location: &str) -> Option<String> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// A family member who can be enrolled, owned by a guardian account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub guardian_id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Confirmed,
    Waitlisted,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Confirmed => "confirmed",
            EnrollmentStatus::Waitlisted => "waitlisted",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }

    /// Pending and confirmed enrollments are backed by a seat.
    pub fn holds_seat(&self) -> bool {
        matches!(self, EnrollmentStatus::Pending | EnrollmentStatus::Confirmed)
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, EnrollmentStatus::Cancelled)
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(EnrollmentStatus::Pending),
            "confirmed" => Ok(EnrollmentStatus::Confirmed),
            "waitlisted" => Ok(EnrollmentStatus::Waitlisted),
            "cancelled" => Ok(EnrollmentStatus::Cancelled),
            other => Err(format!("unknown enrollment status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub class_id: ClassId,
    pub status: EnrollmentStatus,
    /// Present iff `status == Waitlisted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waitlist_position: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row data for an enrollment the store has not yet assigned an id to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub student_id: StudentId,
    pub class_id: ClassId,
    pub status: EnrollmentStatus,
    pub waitlist_position: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// A standing prohibition on one student enrolling in one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub class_id: ClassId,
    pub student_id: StudentId,
    pub reason: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}
