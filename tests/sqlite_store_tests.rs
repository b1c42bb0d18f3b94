#![cfg(feature = "sqlite")]

mod common;

use std::sync::Barrier;
use std::thread;

use class_engine::model::NewEnrollment;
use class_engine::{
    Engine, EngineConfig, EngineError, EngineStore, EnrollmentStatus, LifecycleStatus,
    SqliteStore, StoreError,
};
use chrono::Utc;
use common::*;
use tempfile::NamedTempFile;

fn open(path: &std::path::Path) -> Engine<SqliteStore> {
    Engine::new(SqliteStore::new(path).expect("open store"), EngineConfig::default())
}

#[test]
fn state_survives_reopening_the_database() {
    let file = NamedTempFile::new().unwrap();
    let (class_id, waiting_id) = {
        let engine = open(file.path());
        let class = published_class(&engine, "Ceramics", 1, "B1");
        let kids = students(&engine, 2);
        let seated = engine.enroll(&guardian(), kids[0].id, class.id).unwrap();
        engine.on_payment_confirmed(seated.id).unwrap();
        let waiting = engine.join_waitlist(&guardian(), kids[1].id, class.id).unwrap();
        engine.block_student(&admin(), class.id, kids[0].id, "moved away").unwrap();
        (class.id, waiting.id)
    };

    let engine = open(file.path());
    let class = engine.class(class_id).unwrap();
    assert_eq!(class.name, "Ceramics");
    assert_eq!(class.status, LifecycleStatus::Published);
    assert_eq!(class.slot.days.to_string(), "Tue");
    assert_eq!(class.slot.start_date, d(2026, 3, 1));
    assert_eq!(class.seats_taken, 1);

    let promoted = engine.enrollment(waiting_id).unwrap();
    assert_eq!(promoted.status, EnrollmentStatus::Pending);
    assert_eq!(promoted.waitlist_position, None);

    let blocks = engine.blocks(class_id).unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].reason, "moved away");
    assert_consistent(&engine, class_id);
}

#[test]
fn schema_rejects_a_second_active_row_for_a_pair() {
    let store = SqliteStore::in_memory().unwrap();
    let engine = Engine::new(store, EngineConfig::default());
    let class = published_class(&engine, "Guard", 5, "B1");
    let kids = students(&engine, 1);
    engine.enroll(&guardian(), kids[0].id, class.id).unwrap();

    let row = NewEnrollment {
        student_id: kids[0].id,
        class_id: class.id,
        status: EnrollmentStatus::Confirmed,
        waitlist_position: None,
        created_at: Utc::now(),
    };
    let result: Result<_, StoreError> = engine.store().transaction(|tx| tx.insert_enrollment(&row));
    assert!(matches!(result, Err(StoreError::Constraint(_))));
}

#[test]
fn failed_operations_roll_back_every_write() {
    let engine = Engine::new(SqliteStore::in_memory().unwrap(), EngineConfig::default());
    let class = published_class(&engine, "Atomic", 2, "B1");

    let result: Result<(), EngineError> = engine.store().transaction(|tx| {
        let mut class = tx.get_class(class.id)?.unwrap();
        class.seats_taken = 2;
        tx.update_class(&class)?;
        Err(EngineError::InvalidClass("abort".into()))
    });
    assert!(result.is_err());
    assert_eq!(engine.class(class.id).unwrap().seats_taken, 0);
}

#[test]
fn two_engines_on_one_file_still_sell_the_last_seat_once() {
    let file = NamedTempFile::new().unwrap();
    let setup = open(file.path());
    let class = published_class(&setup, "Shared", 1, "B1");
    let kids = students(&setup, 2);

    let engines = [open(file.path()), open(file.path())];
    let barrier = Barrier::new(2);
    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = engines
            .iter()
            .zip(&kids)
            .map(|(engine, kid)| {
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    engine.enroll(&guardian(), kid.id, class.id)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(EngineError::CapacityExceeded { .. }))));
    assert_eq!(setup.class(class.id).unwrap().seats_taken, 1);
    assert_consistent(&setup, class.id);
}

#[test]
fn draft_classes_can_be_deleted_with_their_blocks() {
    let engine = Engine::new(SqliteStore::in_memory().unwrap(), EngineConfig::default());
    let draft = engine
        .create_class(&admin(), &spec("Draft", TEACHER, "A", 3, term_slot("Mon/Wed", "B1")))
        .unwrap();
    let kids = students(&engine, 1);
    engine.block_student(&admin(), draft.id, kids[0].id, "").unwrap();

    engine.delete_draft_class(&admin(), draft.id).unwrap();
    assert!(engine.classes().unwrap().is_empty());
    assert!(engine.blocks(draft.id).unwrap().is_empty());
}
