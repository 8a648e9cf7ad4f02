//! Lock-free floating-point gauge.
//!
//! Ported from `diag.Gauge` (T-Force GoLib), which stores a single `float64`
//! bit pattern and CAS-loops on every write. Optimized for a fast `set`; for
//! Inc-heavy workloads prefer [`crate::diag::counter::Counter`].

use std::sync::atomic::{AtomicU64, Ordering};

pub struct Gauge {
    val_bits: AtomicU64,
}

impl Gauge {
    pub fn new(init: f64) -> Self {
        Self {
            val_bits: AtomicU64::new(init.to_bits()),
        }
    }

    pub fn set(&self, v: f64) {
        self.val_bits.store(v.to_bits(), Ordering::SeqCst);
    }

    pub fn add(&self, v: f64) {
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

    pub fn value(&self) -> f64 {
        f64::from_bits(self.val_bits.load(Ordering::SeqCst))
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_value_roundtrip() {
        let g = Gauge::new(1.5);
        assert_eq!(g.value(), 1.5);
        g.set(42.0);
        assert_eq!(g.value(), 42.0);
    }

    #[test]
    fn add_sub_inc_dec() {
        let g = Gauge::new(0.0);
        g.add(3.5);
        g.sub(1.0);
        g.inc();
        g.dec();
        assert_eq!(g.value(), 2.5);
    }

    #[test]
    fn concurrent_inc_dec_balance() {
        use std::sync::Arc;
        use std::thread;

        let g = Arc::new(Gauge::new(0.0));
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let g = g.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        g.inc();
                        g.dec();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(g.value(), 0.0);
    }
}
