mod common;

use class_engine::{EngineError, EnrollmentStatus};
use common::*;

fn positions(engine: &class_engine::Engine<class_engine::MemoryStore>, class_id: i64) -> Vec<(i64, u32)> {
    engine
        .waitlist(class_id)
        .unwrap()
        .into_iter()
        .map(|e| (e.student_id, e.waitlist_position.unwrap()))
        .collect()
}

#[test]
fn joining_an_open_class_is_rejected() {
    let engine = engine();
    let class = published_class(&engine, "Open", 2, "B1");
    let kids = students(&engine, 1);

    let err = engine.join_waitlist(&guardian(), kids[0].id, class.id).unwrap_err();
    assert!(matches!(err, EngineError::ClassNotFull { .. }));
}

#[test]
fn positions_are_assigned_at_the_tail() {
    let engine = engine();
    let class = published_class(&engine, "Full", 1, "B1");
    let kids = students(&engine, 4);
    engine.enroll(&guardian(), kids[0].id, class.id).unwrap();

    for (i, kid) in kids[1..].iter().enumerate() {
        let entry = engine.join_waitlist(&guardian(), kid.id, class.id).unwrap();
        assert_eq!(entry.waitlist_position, Some(i as u32 + 1));
    }

    let err = engine.join_waitlist(&guardian(), kids[2].id, class.id).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateEnrollment { .. }));
    let err = engine.join_waitlist(&guardian(), kids[0].id, class.id).unwrap_err();
    assert!(matches!(err, EngineError::DuplicateEnrollment { .. }));
}

#[test]
fn leaving_deletes_the_row_and_closes_the_gap() {
    let engine = engine();
    let class = published_class(&engine, "Full", 1, "B1");
    let kids = students(&engine, 4);
    engine.enroll(&guardian(), kids[0].id, class.id).unwrap();
    let entries: Vec<_> = kids[1..]
        .iter()
        .map(|kid| engine.join_waitlist(&guardian(), kid.id, class.id).unwrap())
        .collect();

    engine.leave_waitlist(&guardian(), entries[0].id).unwrap();
    assert_eq!(positions(&engine, class.id), vec![(kids[2].id, 1), (kids[3].id, 2)]);
    assert!(matches!(
        engine.enrollment(entries[0].id).unwrap_err(),
        EngineError::NotFound { .. }
    ));
    assert_consistent(&engine, class.id);
}

#[test]
fn leaving_from_a_seat_is_an_invalid_transition() {
    let engine = engine();
    let class = published_class(&engine, "Full", 1, "B1");
    let kids = students(&engine, 1);
    let seated = engine.enroll(&guardian(), kids[0].id, class.id).unwrap();

    let err = engine.leave_waitlist(&guardian(), seated.id).unwrap_err();
    assert!(matches!(err, EngineError::InvalidStateTransition { .. }));
    assert_eq!(
        engine.enrollment(seated.id).unwrap().status,
        EnrollmentStatus::Pending
    );
}

#[test]
fn cancelling_a_waitlisted_entry_keeps_the_row_and_reindexes() {
    let engine = engine();
    let class = published_class(&engine, "Full", 1, "B1");
    let kids = students(&engine, 4);
    engine.enroll(&guardian(), kids[0].id, class.id).unwrap();
    let entries: Vec<_> = kids[1..]
        .iter()
        .map(|kid| engine.join_waitlist(&guardian(), kid.id, class.id).unwrap())
        .collect();

    let outcome = engine.cancel(&guardian(), entries[1].id).unwrap();
    assert!(!outcome.released_seat);
    assert!(outcome.promoted.is_none());
    assert_eq!(outcome.cancelled.waitlist_position, None);
    assert_eq!(positions(&engine, class.id), vec![(kids[1].id, 1), (kids[3].id, 2)]);
    assert_eq!(engine.class(class.id).unwrap().seats_taken, 1);
    assert_consistent(&engine, class.id);
}

#[test]
fn promotion_is_strict_fifo_and_shifts_everyone_down() {
    let engine = engine();
    let class = published_class(&engine, "Full", 2, "B1");
    let kids = students(&engine, 5);
    let seated: Vec<_> = kids[..2]
        .iter()
        .map(|kid| engine.enroll(&guardian(), kid.id, class.id).unwrap())
        .collect();
    engine.on_payment_confirmed(seated[0].id).unwrap();
    for kid in &kids[2..] {
        engine.join_waitlist(&guardian(), kid.id, class.id).unwrap();
    }

    let outcome = engine.cancel(&guardian(), seated[0].id).unwrap();
    assert_eq!(outcome.promoted.unwrap().student_id, kids[2].id);
    assert_eq!(positions(&engine, class.id), vec![(kids[3].id, 1), (kids[4].id, 2)]);

    let outcome = engine.cancel(&guardian(), seated[1].id).unwrap();
    assert_eq!(outcome.promoted.unwrap().student_id, kids[3].id);
    assert_eq!(positions(&engine, class.id), vec![(kids[4].id, 1)]);
    assert_consistent(&engine, class.id);
}

#[test]
fn explicit_promotion_without_a_free_seat_is_a_no_op() {
    let engine = engine();
    let class = published_class(&engine, "Full", 1, "B1");
    let kids = students(&engine, 2);
    engine.enroll(&guardian(), kids[0].id, class.id).unwrap();
    engine.join_waitlist(&guardian(), kids[1].id, class.id).unwrap();

    assert_eq!(engine.promote_waitlist(class.id).unwrap(), None);

    let empty = published_class(&engine, "Empty", 3, "B2");
    assert_eq!(engine.promote_waitlist(empty.id).unwrap(), None);
}

#[test]
fn blocked_students_cannot_join() {
    let engine = engine();
    let class = published_class(&engine, "Full", 1, "B1");
    let kids = students(&engine, 2);
    engine.enroll(&guardian(), kids[0].id, class.id).unwrap();
    engine.block_student(&admin(), class.id, kids[1].id, "late fees").unwrap();

    let err = engine.join_waitlist(&guardian(), kids[1].id, class.id).unwrap_err();
    assert!(matches!(err, EngineError::StudentBlocked { .. }));
}

#[test]
fn blocking_a_waitlisted_student_reindexes_the_queue() {
    let engine = engine();
    let class = published_class(&engine, "Full", 1, "B1");
    let kids = students(&engine, 4);
    engine.enroll(&guardian(), kids[0].id, class.id).unwrap();
    for kid in &kids[1..] {
        engine.join_waitlist(&guardian(), kid.id, class.id).unwrap();
    }

    let outcome = engine.block_student(&admin(), class.id, kids[1].id, "").unwrap();
    let cancelled = outcome.cancelled.unwrap();
    assert!(!cancelled.released_seat);
    assert_eq!(positions(&engine, class.id), vec![(kids[2].id, 1), (kids[3].id, 2)]);
    assert_consistent(&engine, class.id);
}
