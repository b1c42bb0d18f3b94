//! Schedule conflict detection for single writes and for whole calendars.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::errors::{ConflictKind, EngineError, Result};
use crate::model::{ClassId, ClassSection, ClassSpec, LifecycleStatus};
use crate::schedule_index::{Conflict, ScheduleIndex};

/// One colliding pair, `first < second`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ConflictPair {
    pub first: ClassId,
    pub second: ClassId,
    pub kind: ConflictKind,
}

pub struct ConflictDetector;

impl ConflictDetector {
    /// Validate a create (`exclude == None`) or update of a single class.
    pub fn check(index: &ScheduleIndex, spec: &ClassSpec, exclude: Option<ClassId>) -> Result<()> {
        match index.check_conflict(spec.teacher_id, &spec.location, &spec.slot, exclude) {
            Some(Conflict {
                class_id,
                class_name,
                kind,
            }) => Err(EngineError::ScheduleConflict {
                class_id,
                class_name,
                kind,
            }),
            None => Ok(()),
        }
    }

    /// Pairwise test of two classes; `None` when they can coexist.
    pub fn pair_conflict(a: &ClassSection, b: &ClassSection) -> Option<ConflictKind> {
        if a.id == b.id || !a.slot.collides_with(&b.slot) {
            return None;
        }
        if a.teacher_id == b.teacher_id {
            return Some(ConflictKind::Teacher);
        }
        match (a.room_key(), b.room_key()) {
            (Some(ra), Some(rb)) if ra == rb => Some(ConflictKind::Room),
            _ => None,
        }
    }

    /// Every colliding pair among the draft and published classes.
    pub fn conflict_pairs(classes: &[ClassSection]) -> Vec<ConflictPair> {
        let candidates: Vec<&ClassSection> = classes
            .iter()
            .filter(|c| matches!(c.status, LifecycleStatus::Draft | LifecycleStatus::Published))
            .collect();

        let mut pairs: Vec<ConflictPair> = (0..candidates.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                let a = candidates[i];
                candidates[i + 1..].iter().filter_map(move |b| {
                    Self::pair_conflict(a, b).map(|kind| ConflictPair {
                        first: a.id.min(b.id),
                        second: a.id.max(b.id),
                        kind,
                    })
                })
            })
            .collect();
        pairs.sort();
        pairs
    }

    /// Ids of every class participating in at least one conflict.
    pub fn detect_all_conflicts(classes: &[ClassSection]) -> BTreeSet<ClassId> {
        Self::conflict_pairs(classes)
            .into_iter()
            .flat_map(|pair| [pair.first, pair.second])
            .collect()
    }
}
