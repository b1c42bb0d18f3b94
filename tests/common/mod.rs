#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use class_engine::{
    Actor, ClassSection, ClassSpec, DaySet, Engine, EngineConfig, EngineStore, MemoryAuditSink,
    MemoryStore, ScheduleSlot, Student,
};

pub const GUARDIAN: i64 = 500;
pub const TEACHER: i64 = 7;

pub fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn slot(days: &str, block: &str, start: NaiveDate, end: NaiveDate) -> ScheduleSlot {
    ScheduleSlot::new(days.parse::<DaySet>().unwrap(), block, start, end)
}

/// Fall term, 2026-03-01 through 2026-05-31.
pub fn term_slot(days: &str, block: &str) -> ScheduleSlot {
    slot(days, block, d(2026, 3, 1), d(2026, 5, 31))
}

pub fn spec(name: &str, teacher_id: i64, room: &str, capacity: u32, slot: ScheduleSlot) -> ClassSpec {
    ClassSpec::new(name, teacher_id, room, capacity, slot)
}

pub fn admin() -> Actor {
    Actor::admin(1)
}

pub fn engine() -> Engine<MemoryStore> {
    Engine::new(MemoryStore::new(), EngineConfig::default())
}

pub fn engine_with_audit() -> (Engine<MemoryStore>, Arc<MemoryAuditSink>) {
    let sink = Arc::new(MemoryAuditSink::new());
    let engine = engine().with_audit_sink(sink.clone());
    (engine, sink)
}

/// Create and publish a class in its own block so fixtures never collide.
pub fn published_class<S: EngineStore>(
    engine: &Engine<S>,
    name: &str,
    capacity: u32,
    block: &str,
) -> ClassSection {
    let created = engine
        .create_class(&admin(), &spec(name, TEACHER, "Room 1", capacity, term_slot("Tuesday", block)))
        .expect("create class");
    engine.publish_class(&admin(), created.id).expect("publish class")
}

pub fn students<S: EngineStore>(engine: &Engine<S>, count: usize) -> Vec<Student> {
    (0..count)
        .map(|i| {
            engine
                .register_student(GUARDIAN, &format!("Student {i}"))
                .expect("register student")
        })
        .collect()
}

pub fn guardian() -> Actor {
    Actor::guardian(GUARDIAN)
}

pub fn assert_consistent<S: EngineStore>(engine: &Engine<S>, class_id: i64) {
    let audit = engine.verify_class(class_id).expect("verify class");
    assert!(audit.is_consistent(), "class {class_id} inconsistent: {audit:?}");
}
