//! Lock-free accumulator optimized for a fast `Inc`/`Dec`/`Add`/`Sub` path.
//!
//! Ported from `diag.Counter` (T-Force GoLib): values that are exact
//! integers take an integer atomic fast path (`val_int`); everything else
//! CAS-loops on an `f64` bit pattern (`val_bits`). `set` is deliberately
//! **not** linearizable with concurrent `add`/`value` — it CAS-loops
//! `val_bits` to `v - val_int`, which is a snapshot-then-install of two
//! independently-read atomics, not one atomic operation. This is the same
//! trade-off the original makes and is preserved here for Inc-heavy
//! workloads where that imprecision is acceptable.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

pub struct Counter {
    val_bits: AtomicU64,
    val_int: AtomicI64,
}

impl Counter {
    pub fn new(init: f64) -> Self {
        let c = Self {
            val_bits: AtomicU64::new(0.0f64.to_bits()),
            val_int: AtomicI64::new(0),
        };
        c.add(init);
        c
    }

    pub fn add(&self, v: f64) {
        let as_int = v as i64;
        if as_int as f64 == v {
            self.val_int.fetch_add(as_int, Ordering::SeqCst);
            return;
        }
        let _ = self
            .val_bits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
                Some((f64::from_bits(bits) + v).to_bits())
            });
    }

    pub fn sub(&self, v: f64) {
        self.add(-v);
    }

    pub fn inc(&self) {
        self.add(1.0);
    }

    pub fn dec(&self) {
        self.add(-1.0);
    }

    /// Not linearizable with concurrent `add`/`value` (see module docs).
    pub fn set(&self, v: f64) {
        let _ = self
            .val_bits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |_| {
                let ival = self.val_int.load(Ordering::SeqCst);
                Some((v - ival as f64).to_bits())
            });
    }

    pub fn value(&self) -> f64 {
        let fval = f64::from_bits(self.val_bits.load(Ordering::SeqCst));
        let ival = self.val_int.load(Ordering::SeqCst);
        fval + ival as f64
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_fast_path() {
        let c = Counter::new(0.0);
        c.add(5.0);
        c.sub(2.0);
        assert_eq!(c.value(), 3.0);
    }

    #[test]
    fn fractional_path() {
        let c = Counter::new(0.0);
        c.add(1.5);
        c.add(2.25);
        assert_eq!(c.value(), 3.75);
    }

    #[test]
    fn concurrent_inc_dec_add_sub_balance() {
        use std::sync::Arc;
        use std::thread;

        let c = Arc::new(Counter::new(0.0));
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let c = c.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        c.inc();
                        c.dec();
                        c.add(1.0);
                        c.sub(1.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.value(), 0.0);
    }

    #[test]
    fn set_after_add_settles_to_the_requested_value() {
        // Sequentially (no concurrent writer), `set` still nets out to `v`:
        // val_bits is installed as `v - val_int`, so value() = v. The
        // trade-off documented on `set` only bites when an `add` lands
        // concurrently between set's read of val_int and its CAS.
        let c = Counter::new(0.0);
        c.add(10.0);
        c.set(100.0);
        assert_eq!(c.value(), 100.0);
    }
}
