mod common;

use class_engine::{ClassSpec, ConflictKind, EngineError, LifecycleStatus};
use common::*;

#[test]
fn overlapping_range_for_same_teacher_names_existing_class() {
    let engine = engine();
    let a = engine
        .create_class(
            &admin(),
            &spec("Class A", TEACHER, "Room 1", 1, slot("Tuesday", "Block-1", d(2026, 3, 1), d(2026, 5, 31))),
        )
        .unwrap();

    let err = engine
        .create_class(
            &admin(),
            &spec("Class B", TEACHER, "Room 9", 1, slot("Tuesday", "Block-1", d(2026, 4, 1), d(2026, 4, 30))),
        )
        .unwrap_err();

    match err {
        EngineError::ScheduleConflict {
            class_id,
            class_name,
            kind,
        } => {
            assert_eq!(class_id, a.id);
            assert_eq!(class_name, "Class A");
            assert_eq!(kind, ConflictKind::Teacher);
        }
        other => panic!("expected schedule conflict, got {other:?}"),
    }
    assert_eq!(engine.classes().unwrap().len(), 1);
}

#[test]
fn shared_room_conflicts_across_teachers() {
    let engine = engine();
    engine
        .create_class(&admin(), &spec("Chess", 1, "Room 4", 10, term_slot("Mon/Wed", "B2")))
        .unwrap();

    let err = engine
        .create_class(&admin(), &spec("Art", 2, "  room 4 ", 10, term_slot("Wednesday", "B2")))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::ScheduleConflict {
            kind: ConflictKind::Room,
            ..
        }
    ));
}

#[test]
fn no_conflict_when_any_dimension_differs() {
    let engine = engine();
    engine
        .create_class(&admin(), &spec("Base", TEACHER, "Room 1", 5, term_slot("Tuesday", "B1")))
        .unwrap();

    // different block
    engine
        .create_class(&admin(), &spec("Block", TEACHER, "Room 1", 5, term_slot("Tuesday", "B2")))
        .unwrap();
    // different day
    engine
        .create_class(&admin(), &spec("Day", TEACHER, "Room 1", 5, term_slot("Thursday", "B1")))
        .unwrap();
    // adjacent but disjoint date range
    engine
        .create_class(
            &admin(),
            &spec("Summer", TEACHER, "Room 1", 5, slot("Tuesday", "B1", d(2026, 6, 1), d(2026, 8, 31))),
        )
        .unwrap();
    // different teacher and room
    engine
        .create_class(&admin(), &spec("Elsewhere", 99, "Room 2", 5, term_slot("Tuesday", "B1")))
        .unwrap();

    assert_eq!(engine.classes().unwrap().len(), 5);
    assert!(engine.catalog_conflicts().unwrap().is_empty());
}

#[test]
fn ranges_touching_on_one_day_overlap() {
    let engine = engine();
    engine
        .create_class(
            &admin(),
            &spec("Spring", TEACHER, "", 5, slot("Friday", "B3", d(2026, 1, 1), d(2026, 3, 1))),
        )
        .unwrap();
    let err = engine
        .create_class(
            &admin(),
            &spec("Late", TEACHER, "", 5, slot("Friday", "B3", d(2026, 3, 1), d(2026, 4, 1))),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::ScheduleConflict { .. }));
}

#[test]
fn updating_a_class_does_not_conflict_with_itself() {
    let engine = engine();
    let class = engine
        .create_class(&admin(), &spec("Robotics", TEACHER, "Lab", 8, term_slot("Tue/Thu", "B1")))
        .unwrap();

    let updated = engine
        .update_class(
            &admin(),
            class.id,
            &spec("Robotics II", TEACHER, "Lab", 12, term_slot("Tue/Thu", "B1")),
        )
        .unwrap();
    assert_eq!(updated.name, "Robotics II");
    assert_eq!(updated.capacity, 12);
}

#[test]
fn update_into_an_occupied_slot_is_rejected() {
    let engine = engine();
    let first = engine
        .create_class(&admin(), &spec("First", TEACHER, "A", 5, term_slot("Monday", "B1")))
        .unwrap();
    let second = engine
        .create_class(&admin(), &spec("Second", TEACHER, "B", 5, term_slot("Monday", "B2")))
        .unwrap();

    let err = engine
        .update_class(&admin(), second.id, &spec("Second", TEACHER, "B", 5, term_slot("Monday", "B1")))
        .unwrap_err();
    match err {
        EngineError::ScheduleConflict { class_id, .. } => assert_eq!(class_id, first.id),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(engine.class(second.id).unwrap().slot.block.as_str(), "B2");
}

#[test]
fn cancelled_classes_release_their_slot() {
    let engine = engine();
    let old = engine
        .create_class(&admin(), &spec("Old", TEACHER, "A", 5, term_slot("Monday", "B1")))
        .unwrap();
    engine
        .set_class_status(&admin(), old.id, LifecycleStatus::Cancelled)
        .unwrap();

    engine
        .create_class(&admin(), &spec("New", TEACHER, "A", 5, term_slot("Monday", "B1")))
        .unwrap();
}

#[test]
fn batch_scan_reports_both_members_of_each_pair() {
    let engine = engine();
    let a = engine
        .create_class(&admin(), &spec("A", 1, "R1", 5, term_slot("Monday", "B1")))
        .unwrap();
    let b = engine
        .create_class(&admin(), &spec("B", 2, "R2", 5, term_slot("Monday", "B1")))
        .unwrap();
    let c = engine
        .create_class(&admin(), &spec("C", 3, "R3", 5, term_slot("Monday", "B1")))
        .unwrap();

    // Imported calendars are not guaranteed to be conflict-free.
    let mut classes = engine.classes().unwrap();
    classes[1].teacher_id = a.teacher_id;
    classes[2].location = "r1".into();

    let ids = class_engine::Engine::<class_engine::MemoryStore>::detect_all_conflicts(&classes);
    assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![a.id, b.id, c.id]);

    classes[2].status = LifecycleStatus::Completed;
    let ids = class_engine::ConflictDetector::detect_all_conflicts(&classes);
    assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![a.id, b.id]);
}

#[test]
fn invalid_specs_are_rejected_before_any_write() {
    let engine = engine();
    let cases = [
        spec("", TEACHER, "A", 5, term_slot("Monday", "B1")),
        spec("Zero", TEACHER, "A", 0, term_slot("Monday", "B1")),
        spec("NoBlock", TEACHER, "A", 5, term_slot("Monday", "  ")),
        spec("Backwards", TEACHER, "A", 5, slot("Monday", "B1", d(2026, 5, 1), d(2026, 4, 1))),
    ];
    for case in cases {
        let err = engine.create_class(&admin(), &case).unwrap_err();
        assert!(matches!(err, EngineError::InvalidClass(_)), "{case:?} gave {err:?}");
    }
    assert!(engine.classes().unwrap().is_empty());
}

#[test]
fn blank_block_from_json_is_rejected() {
    let engine = engine();
    let mut raw =
        serde_json::to_value(spec("Blank", TEACHER, "A", 5, term_slot("Monday", "B1"))).unwrap();
    raw["slot"]["block"] = serde_json::json!(" \t ");
    let decoded: ClassSpec = serde_json::from_value(raw).unwrap();
    assert!(decoded.slot.block.is_empty());

    let err = engine.create_class(&admin(), &decoded).unwrap_err();
    assert!(matches!(err, EngineError::InvalidClass(_)), "got {err:?}");
    assert!(engine.classes().unwrap().is_empty());
}

#[test]
fn teachers_may_only_schedule_for_themselves() {
    let engine = engine();
    let teacher = class_engine::Actor::teacher(TEACHER);
    engine
        .create_class(&teacher, &spec("Mine", TEACHER, "A", 5, term_slot("Monday", "B1")))
        .unwrap();
    let err = engine
        .create_class(&teacher, &spec("Theirs", 8, "B", 5, term_slot("Monday", "B2")))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAuthorized(_)));
}
