//! Thin wrapper over a creation timestamp. Ported from `diag.Timer`.

use std::time::{Duration, Instant};

pub struct Timer {
    created: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.created.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_grows() {
        let t = Timer::new();
        std::thread::sleep(Duration::from_millis(5));
        assert!(t.elapsed() >= Duration::from_millis(5));
    }
}
