//! Occupied recurring slots per teacher and per room.
//!
//! Slots are bucketed by `(resource, weekday, block)`, so a lookup only ever
//! compares classes that already share a day and a block. The date-range test
//! is then applied to the (small) bucket.

use chrono::Weekday;
use std::collections::HashMap;

use crate::calendar::{TimeBlock, date_ranges_overlap};
use crate::errors::ConflictKind;
use crate::model::{ClassId, ClassSection, ScheduleSlot, TeacherId, room_key};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Resource {
    Teacher(TeacherId),
    Room(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    resource: Resource,
    day: Weekday,
    block: TimeBlock,
}

#[derive(Debug, Clone)]
struct Occupant {
    class_id: ClassId,
    class_name: String,
    start_date: chrono::NaiveDate,
    end_date: chrono::NaiveDate,
}

/// A class that already holds a slot the candidate wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub class_id: ClassId,
    pub class_name: String,
    pub kind: ConflictKind,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleIndex {
    buckets: HashMap<SlotKey, Vec<Occupant>>,
}

impl ScheduleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every class that still occupies its slot (anything not cancelled).
    pub fn from_classes<'a, I>(classes: I) -> Self
    where
        I: IntoIterator<Item = &'a ClassSection>,
    {
        let mut index = Self::new();
        for class in classes {
            index.insert(class);
        }
        index
    }

    pub fn insert(&mut self, class: &ClassSection) {
        if !class.status.occupies_schedule() {
            return;
        }
        for key in Self::keys_for(class.teacher_id, &class.location, &class.slot) {
            self.buckets.entry(key).or_default().push(Occupant {
                class_id: class.id,
                class_name: class.name.clone(),
                start_date: class.slot.start_date,
                end_date: class.slot.end_date,
            });
        }
    }

    /// Find a class that would collide with `slot` for `teacher_id` or `location`.
    ///
    /// Teacher collisions are reported ahead of room collisions; within one
    /// kind the lowest class id wins so the answer is deterministic.
    pub fn check_conflict(
        &self,
        teacher_id: TeacherId,
        location: &str,
        slot: &ScheduleSlot,
        exclude: Option<ClassId>,
    ) -> Option<Conflict> {
        let mut best: Option<Conflict> = None;

        for key in Self::keys_for(teacher_id, location, slot) {
            let Some(occupants) = self.buckets.get(&key) else {
                continue;
            };
            let kind = match key.resource {
                Resource::Teacher(_) => ConflictKind::Teacher,
                Resource::Room(_) => ConflictKind::Room,
            };
            for occupant in occupants {
                if Some(occupant.class_id) == exclude {
                    continue;
                }
                if !date_ranges_overlap(
                    slot.start_date,
                    slot.end_date,
                    occupant.start_date,
                    occupant.end_date,
                ) {
                    continue;
                }
                let candidate = Conflict {
                    class_id: occupant.class_id,
                    class_name: occupant.class_name.clone(),
                    kind,
                };
                let better = match &best {
                    None => true,
                    Some(current) => (kind, occupant.class_id) < (current.kind, current.class_id),
                };
                if better {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn keys_for(teacher_id: TeacherId, location: &str, slot: &ScheduleSlot) -> Vec<SlotKey> {
        let room = room_key(location);
        let mut keys = Vec::with_capacity(slot.days.len() * 2);
        for day in slot.days.iter() {
            keys.push(SlotKey {
                resource: Resource::Teacher(teacher_id),
                day,
                block: slot.block.clone(),
            });
            if let Some(room) = &room {
                keys.push(SlotKey {
                    resource: Resource::Room(room.clone()),
                    day,
                    block: slot.block.clone(),
                });
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::DaySet;
    use crate::model::LifecycleStatus;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn class(id: ClassId, teacher: TeacherId, room: &str, days: &str, block: &str) -> ClassSection {
        ClassSection {
            id,
            name: format!("class-{id}"),
            teacher_id: teacher,
            location: room.to_string(),
            capacity: 10,
            seats_taken: 0,
            slot: ScheduleSlot::new(
                days.parse::<DaySet>().unwrap(),
                block,
                d(2026, 3, 1),
                d(2026, 5, 31),
            ),
            status: LifecycleStatus::Published,
        }
    }

    #[test]
    fn cancelled_classes_are_not_indexed() {
        let mut cancelled = class(1, 7, "A", "Tue", "B1");
        cancelled.status = LifecycleStatus::Cancelled;
        let index = ScheduleIndex::from_classes([&cancelled]);
        let candidate = class(2, 7, "A", "Tue", "B1");
        assert_eq!(
            index.check_conflict(candidate.teacher_id, &candidate.location, &candidate.slot, None),
            None
        );
    }

    #[test]
    fn teacher_conflict_wins_over_room_conflict() {
        let room_only = class(1, 8, "Studio", "Tue", "B1");
        let teacher_only = class(2, 7, "Hall", "Tue", "B1");
        let index = ScheduleIndex::from_classes([&room_only, &teacher_only]);

        let candidate = class(3, 7, "studio ", "Tue", "B1");
        let conflict = index
            .check_conflict(candidate.teacher_id, &candidate.location, &candidate.slot, None)
            .unwrap();
        assert_eq!(conflict.class_id, 2);
        assert_eq!(conflict.kind, ConflictKind::Teacher);
    }

    #[test]
    fn excluded_class_does_not_conflict_with_itself() {
        let a = class(1, 7, "A", "Tue/Thu", "B1");
        let index = ScheduleIndex::from_classes([&a]);
        assert_eq!(index.check_conflict(7, "A", &a.slot, Some(1)), None);
        assert!(index.check_conflict(7, "A", &a.slot, None).is_some());
    }
}
