//! Per-key mutual exclusion with bounded waiting.
//!
//! Capacity reservation and waitlist position assignment both read an
//! aggregate (seat count, max position) and write based on it, so each class
//! gets its own lock. Locks for different classes never wait on each other.
//!
//! This does not make the stores concurrent. `MemoryStore` and `SqliteStore`
//! each hold one mutex around a whole transaction, so operations on
//! different classes still commit one after another.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

/// Returned when a lock could not be acquired within the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeout;

#[derive(Debug, Default)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<T, F>(&self, key: &K, timeout: Duration, f: F) -> Result<T, LockTimeout>
    where
        F: FnOnce() -> T,
    {
        let slot = {
            let mut slots = self.slots.lock();
            slots.entry(key.clone()).or_default().clone()
        };

        let result = match slot.try_lock_for(timeout) {
            Some(_guard) => {
                trace!(?key, "lock acquired");
                Ok(f())
            }
            None => Err(LockTimeout),
        };

        self.release_slot(key, slot);
        result
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.slots.lock().len()
    }

    fn release_slot(&self, key: &K, slot: Arc<Mutex<()>>) {
        let mut slots = self.slots.lock();
        drop(slot);
        // Only the table's own handle left: nobody holds or waits on it.
        if let Some(existing) = slots.get(key) {
            if Arc::strong_count(existing) == 1 {
                slots.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn same_key_is_serialized() {
        let locks: KeyedLocks<i64> = KeyedLocks::new();
        let inside = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    locks
                        .with_lock(&1, Duration::from_secs(5), || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(2));
                            inside.fetch_sub(1, Ordering::SeqCst);
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.tracked(), 0);
    }

    #[test]
    fn times_out_while_held() {
        let locks: KeyedLocks<i64> = KeyedLocks::new();
        let outcome = locks.with_lock(&1, Duration::from_secs(1), || {
            std::thread::scope(|scope| {
                scope
                    .spawn(|| locks.with_lock(&1, Duration::from_millis(20), || ()))
                    .join()
                    .unwrap()
            })
        });
        assert_eq!(outcome, Ok(Err(LockTimeout)));
    }

    #[test]
    fn different_keys_do_not_block() {
        let locks: KeyedLocks<i64> = KeyedLocks::new();
        let outcome = locks.with_lock(&1, Duration::from_secs(1), || {
            locks.with_lock(&2, Duration::from_millis(20), || 42)
        });
        assert_eq!(outcome, Ok(Ok(42)));
    }
}
