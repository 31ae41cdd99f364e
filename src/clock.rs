use std::time::Instant;

/// Monotonic source of seconds elapsed since the scene started.
pub trait Clock {
    fn elapsed_seconds(&self) -> f32;
}

/// Wall clock started at construction; never reset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn elapsed_seconds(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

/// Clock advanced by hand, for headless runs and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualClock {
    elapsed: f32,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward; negative steps are ignored.
    pub fn advance(&mut self, seconds: f32) {
        self.elapsed += seconds.max(0.0);
    }

    pub fn set(&mut self, seconds: f32) {
        self.elapsed = self.elapsed.max(seconds);
    }
}

impl Clock for ManualClock {
    fn elapsed_seconds(&self) -> f32 {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_never_goes_backwards() {
        let mut clock = ManualClock::new();
        clock.advance(1.5);
        clock.advance(-1.0);
        clock.set(0.5);
        assert_eq!(clock.elapsed_seconds(), 1.5);
        clock.set(2.0);
        assert_eq!(clock.elapsed_seconds(), 2.0);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::start();
        let first = clock.elapsed_seconds();
        let second = clock.elapsed_seconds();
        assert!(second >= first);
    }
}
