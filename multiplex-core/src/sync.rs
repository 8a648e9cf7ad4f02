//! Mutex-guarded numeric cell with locked and unlocked arithmetic.
//!
//! Ported from the Go source's `Int64ThreadSafe`/`Uint64ThreadSafe`, which
//! were two near-identical hand-written copies of the same cell over
//! different integer widths. Generalized here into one generic `SyncCell<T>`.

use std::ops::{Add, Div, Mul, Sub};
use std::sync::{Mutex, MutexGuard};

/// A mutex-guarded numeric cell.
///
/// `*_no_lock` variants assume the caller already holds the lock (obtained
/// via [`SyncCell::lock`]) and operate directly on the guard. They exist to
/// let callers perform a compound read-compare-and-act sequence atomically,
/// as the worker-pool resize protocol does.
pub struct SyncCell<T> {
    value: Mutex<T>,
}

impl<T> SyncCell<T>
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<Output = T> + Div<Output = T>,
{
    pub fn new(initial: T) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }

    pub fn value(&self) -> T {
        *self.value.lock().unwrap()
    }

    pub fn set(&self, v: T) {
        *self.value.lock().unwrap() = v;
    }

    pub fn add(&self, n: T) {
        let mut guard = self.value.lock().unwrap();
        *guard = *guard + n;
    }

    pub fn sub(&self, n: T) {
        let mut guard = self.value.lock().unwrap();
        *guard = *guard - n;
    }

    pub fn mul(&self, n: T) {
        let mut guard = self.value.lock().unwrap();
        *guard = *guard * n;
    }

    pub fn div(&self, n: T) {
        let mut guard = self.value.lock().unwrap();
        *guard = *guard / n;
    }

    /// Acquires the lock explicitly, returning a guard the caller can pass
    /// to the `*_no_lock` methods. Dropping the guard releases the lock.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.value.lock().unwrap()
    }

    pub fn value_no_lock(guard: &MutexGuard<'_, T>) -> T {
        **guard
    }

    pub fn set_no_lock(guard: &mut MutexGuard<'_, T>, v: T) {
        **guard = v;
    }

    pub fn add_no_lock(guard: &mut MutexGuard<'_, T>, n: T) {
        **guard = **guard + n;
    }

    pub fn sub_no_lock(guard: &mut MutexGuard<'_, T>, n: T) {
        **guard = **guard - n;
    }

    pub fn mul_no_lock(guard: &mut MutexGuard<'_, T>, n: T) {
        **guard = **guard * n;
    }

    pub fn div_no_lock(guard: &mut MutexGuard<'_, T>, n: T) {
        **guard = **guard / n;
    }
}

pub type Int64Cell = SyncCell<i64>;
pub type Uint64Cell = SyncCell<u64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_arithmetic_roundtrips() {
        let cell = Uint64Cell::new(10);
        cell.add(5);
        cell.sub(3);
        cell.mul(2);
        cell.div(4);
        assert_eq!(cell.value(), 6);
    }

    #[test]
    fn compound_lock_sequence() {
        let cell = Uint64Cell::new(0);
        {
            let mut guard = cell.lock();
            assert_eq!(Uint64Cell::value_no_lock(&guard), 0);
            Uint64Cell::add_no_lock(&mut guard, 4);
        }
        assert_eq!(cell.value(), 4);
    }

    #[test]
    fn concurrent_adds_accumulate_exactly() {
        use std::sync::Arc;
        use std::thread;

        let cell = Arc::new(Uint64Cell::new(0));
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.add(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cell.value(), 100_000);
    }
}
