use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use std::path::Path;
use std::time::Duration;

use super::{EngineStore, StoreTx};
use crate::calendar::{DaySet, TimeBlock};
use crate::errors::{StoreError, StoreResult};
use crate::model::{
    Block, ClassId, ClassSection, ClassSpec, Enrollment, EnrollmentId, LifecycleStatus,
    NewEnrollment, ScheduleSlot, Student, StudentId, UserId,
};

const CLASS_COLUMNS: &str = "id, name, teacher_id, location, capacity, seats_taken, days_json, \
     time_block, start_date, end_date, status";
const ENROLLMENT_COLUMNS: &str =
    "id, student_id, class_id, status, waitlist_position, created_at, updated_at";
const BLOCK_COLUMNS: &str = "class_id, student_id, reason, created_by, created_at";

pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::with_busy_timeout(path, Duration::from_millis(5000))
    }

    pub fn with_busy_timeout<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> StoreResult<Self> {
        let connection = Connection::open(path)?;
        connection.busy_timeout(busy_timeout)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> StoreResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> StoreResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS classes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                teacher_id INTEGER NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                capacity INTEGER NOT NULL CHECK (capacity >= 1),
                seats_taken INTEGER NOT NULL DEFAULT 0
                    CHECK (seats_taken >= 0 AND seats_taken <= capacity),
                days_json TEXT NOT NULL,
                time_block TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                status TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS students (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guardian_id INTEGER NOT NULL,
                name TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS enrollments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id INTEGER NOT NULL REFERENCES students(id),
                class_id INTEGER NOT NULL REFERENCES classes(id),
                status TEXT NOT NULL,
                waitlist_position INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK ((status = 'waitlisted') = (waitlist_position IS NOT NULL))
            );
            CREATE UNIQUE INDEX IF NOT EXISTS enrollments_active_pair
                ON enrollments (student_id, class_id) WHERE status <> 'cancelled';
            CREATE INDEX IF NOT EXISTS enrollments_by_class ON enrollments (class_id);
            CREATE TABLE IF NOT EXISTS blocks (
                class_id INTEGER NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
                student_id INTEGER NOT NULL,
                reason TEXT NOT NULL,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (class_id, student_id)
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }
}

impl EngineStore for SqliteStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
    {
        let mut conn = self.connection.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let mut sql_tx = SqliteTx { tx };
        let value = f(&mut sql_tx)?;
        sql_tx.tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }
}

struct SqliteTx<'conn> {
    tx: Transaction<'conn>,
}

fn corrupt(msg: impl Into<String>) -> StoreError {
    StoreError::Corrupt(msg.into())
}

fn to_u32(value: i64, column: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| corrupt(format!("{column} out of range: {value}")))
}

struct RawClass {
    id: ClassId,
    name: String,
    teacher_id: i64,
    location: String,
    capacity: i64,
    seats_taken: i64,
    days_json: String,
    time_block: String,
    start_date: String,
    end_date: String,
    status: String,
}

impl RawClass {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            teacher_id: row.get(2)?,
            location: row.get(3)?,
            capacity: row.get(4)?,
            seats_taken: row.get(5)?,
            days_json: row.get(6)?,
            time_block: row.get(7)?,
            start_date: row.get(8)?,
            end_date: row.get(9)?,
            status: row.get(10)?,
        })
    }

    fn decode(self) -> StoreResult<ClassSection> {
        let days: DaySet = serde_json::from_str(&self.days_json)?;
        let parse_date = |raw: &str| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| corrupt(format!("class {} has bad date '{raw}': {e}", self.id)))
        };
        Ok(ClassSection {
            id: self.id,
            name: self.name.clone(),
            teacher_id: self.teacher_id,
            location: self.location.clone(),
            capacity: to_u32(self.capacity, "capacity")?,
            seats_taken: to_u32(self.seats_taken, "seats_taken")?,
            slot: ScheduleSlot {
                days,
                block: TimeBlock::new(self.time_block.as_str()),
                start_date: parse_date(&self.start_date)?,
                end_date: parse_date(&self.end_date)?,
            },
            status: self.status.parse::<LifecycleStatus>().map_err(corrupt)?,
        })
    }
}

struct RawEnrollment {
    id: EnrollmentId,
    student_id: StudentId,
    class_id: ClassId,
    status: String,
    waitlist_position: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl RawEnrollment {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            class_id: row.get(2)?,
            status: row.get(3)?,
            waitlist_position: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn decode(self) -> StoreResult<Enrollment> {
        Ok(Enrollment {
            id: self.id,
            student_id: self.student_id,
            class_id: self.class_id,
            status: self.status.parse().map_err(corrupt)?,
            waitlist_position: self
                .waitlist_position
                .map(|p| to_u32(p, "waitlist_position"))
                .transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct RawBlock {
    class_id: ClassId,
    student_id: StudentId,
    reason: String,
    created_by: UserId,
    created_at: String,
}

impl RawBlock {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            class_id: row.get(0)?,
            student_id: row.get(1)?,
            reason: row.get(2)?,
            created_by: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn decode(self) -> StoreResult<Block> {
        Ok(Block {
            class_id: self.class_id,
            student_id: self.student_id,
            created_at: parse_timestamp(&self.created_at)?,
            reason: self.reason,
            created_by: self.created_by,
        })
    }
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("bad timestamp '{raw}': {e}")))
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl SqliteTx<'_> {
    fn query_enrollments(&self, sql: &str, class_id: ClassId) -> StoreResult<Vec<Enrollment>> {
        let mut stmt = self.tx.prepare(sql)?;
        let rows = stmt.query_map(params![class_id], RawEnrollment::from_row)?;
        let mut out = Vec::new();
        for raw in rows {
            out.push(raw?.decode()?);
        }
        Ok(out)
    }
}

impl StoreTx for SqliteTx<'_> {
    fn insert_class(&mut self, spec: &ClassSpec) -> StoreResult<ClassSection> {
        self.tx.execute(
            "INSERT INTO classes (name, teacher_id, location, capacity, seats_taken, days_json, \
             time_block, start_date, end_date, status) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8, ?9)",
            params![
                spec.name,
                spec.teacher_id,
                spec.location,
                spec.capacity,
                serde_json::to_string(&spec.slot.days)?,
                spec.slot.block.as_str(),
                format_date(spec.slot.start_date),
                format_date(spec.slot.end_date),
                LifecycleStatus::Draft.as_str(),
            ],
        )?;
        let id = self.tx.last_insert_rowid();
        self.get_class(id)?
            .ok_or_else(|| corrupt(format!("class {id} vanished after insert")))
    }

    fn get_class(&mut self, id: ClassId) -> StoreResult<Option<ClassSection>> {
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = ?1");
        let raw = self
            .tx
            .query_row(&sql, params![id], RawClass::from_row)
            .optional()?;
        raw.map(RawClass::decode).transpose()
    }

    fn update_class(&mut self, class: &ClassSection) -> StoreResult<()> {
        let changed = self.tx.execute(
            "UPDATE classes SET name = ?2, teacher_id = ?3, location = ?4, capacity = ?5, \
             seats_taken = ?6, days_json = ?7, time_block = ?8, start_date = ?9, end_date = ?10, \
             status = ?11 WHERE id = ?1",
            params![
                class.id,
                class.name,
                class.teacher_id,
                class.location,
                class.capacity,
                class.seats_taken,
                serde_json::to_string(&class.slot.days)?,
                class.slot.block.as_str(),
                format_date(class.slot.start_date),
                format_date(class.slot.end_date),
                class.status.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(corrupt(format!("update of missing class {}", class.id)));
        }
        Ok(())
    }

    fn delete_class(&mut self, id: ClassId) -> StoreResult<bool> {
        let removed = self
            .tx
            .execute("DELETE FROM classes WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn list_classes(&mut self) -> StoreResult<Vec<ClassSection>> {
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes ORDER BY id ASC");
        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt.query_map([], RawClass::from_row)?;
        let mut classes = Vec::new();
        for raw in rows {
            classes.push(raw?.decode()?);
        }
        Ok(classes)
    }

    fn insert_student(&mut self, guardian_id: UserId, name: &str) -> StoreResult<Student> {
        self.tx.execute(
            "INSERT INTO students (guardian_id, name) VALUES (?1, ?2)",
            params![guardian_id, name],
        )?;
        Ok(Student {
            id: self.tx.last_insert_rowid(),
            guardian_id,
            name: name.to_string(),
        })
    }

    fn get_student(&mut self, id: StudentId) -> StoreResult<Option<Student>> {
        let student = self
            .tx
            .query_row(
                "SELECT id, guardian_id, name FROM students WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Student {
                        id: row.get(0)?,
                        guardian_id: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(student)
    }

    fn insert_enrollment(&mut self, row: &NewEnrollment) -> StoreResult<Enrollment> {
        let created_at = row.created_at.to_rfc3339();
        self.tx.execute(
            "INSERT INTO enrollments (student_id, class_id, status, waitlist_position, \
             created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                row.student_id,
                row.class_id,
                row.status.as_str(),
                row.waitlist_position,
                created_at,
            ],
        )?;
        let id = self.tx.last_insert_rowid();
        self.get_enrollment(id)?
            .ok_or_else(|| corrupt(format!("enrollment {id} vanished after insert")))
    }

    fn get_enrollment(&mut self, id: EnrollmentId) -> StoreResult<Option<Enrollment>> {
        let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?1");
        let raw = self
            .tx
            .query_row(&sql, params![id], RawEnrollment::from_row)
            .optional()?;
        raw.map(RawEnrollment::decode).transpose()
    }

    fn update_enrollment(&mut self, enrollment: &Enrollment) -> StoreResult<()> {
        let changed = self.tx.execute(
            "UPDATE enrollments SET status = ?2, waitlist_position = ?3, updated_at = ?4 \
             WHERE id = ?1",
            params![
                enrollment.id,
                enrollment.status.as_str(),
                enrollment.waitlist_position,
                enrollment.updated_at.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(corrupt(format!(
                "update of missing enrollment {}",
                enrollment.id
            )));
        }
        Ok(())
    }

    fn delete_enrollment(&mut self, id: EnrollmentId) -> StoreResult<bool> {
        let removed = self
            .tx
            .execute("DELETE FROM enrollments WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn list_class_enrollments(&mut self, class_id: ClassId) -> StoreResult<Vec<Enrollment>> {
        let sql =
            format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE class_id = ?1 ORDER BY id");
        self.query_enrollments(&sql, class_id)
    }

    fn list_waitlist(&mut self, class_id: ClassId) -> StoreResult<Vec<Enrollment>> {
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments \
             WHERE class_id = ?1 AND status = 'waitlisted' ORDER BY waitlist_position"
        );
        self.query_enrollments(&sql, class_id)
    }

    fn get_block(
        &mut self,
        class_id: ClassId,
        student_id: StudentId,
    ) -> StoreResult<Option<Block>> {
        let raw = self
            .tx
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE class_id = ?1 AND student_id = ?2"),
                params![class_id, student_id],
                RawBlock::from_row,
            )
            .optional()?;
        raw.map(RawBlock::decode).transpose()
    }

    fn insert_block(&mut self, block: &Block) -> StoreResult<()> {
        self.tx.execute(
            "INSERT INTO blocks (class_id, student_id, reason, created_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                block.class_id,
                block.student_id,
                block.reason,
                block.created_by,
                block.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete_block(&mut self, class_id: ClassId, student_id: StudentId) -> StoreResult<bool> {
        let removed = self.tx.execute(
            "DELETE FROM blocks WHERE class_id = ?1 AND student_id = ?2",
            params![class_id, student_id],
        )?;
        Ok(removed > 0)
    }

    fn list_blocks(&mut self, class_id: ClassId) -> StoreResult<Vec<Block>> {
        let sql = format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE class_id = ?1 ORDER BY student_id");
        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt.query_map(params![class_id], RawBlock::from_row)?;
        let mut blocks = Vec::new();
        for raw in rows {
            blocks.push(raw?.decode()?);
        }
        Ok(blocks)
    }
}
