//! Contention windows for the discovery and join phases
//!
//! Before every discovery or join attempt the device listens for a fixed
//! channel-check window. A busy medium widens the contention window the
//! next backoff delay is drawn from; a clear check narrows it again.

use rand::Rng;

/// Channel-check window ahead of a discovery scan
pub const DISCOVERY_CHECK_MS: u32 = 10_000;

/// Discovery contention window bounds
pub const DISCOVERY_BACKOFF_MIN_MS: u32 = 10_000;
pub const DISCOVERY_BACKOFF_MAX_MS: u32 = 100_000;

/// Channel-check window ahead of a join attempt
pub const JOIN_CHECK_MS: u32 = 2_000;

/// Join contention window bounds
pub const JOIN_BACKOFF_MIN_MS: u32 = 500;
pub const JOIN_BACKOFF_MAX_MS: u32 = 1_000;

/// Randomized exponential backoff window.
///
/// Delays are drawn uniformly from `[min, current]`. The current bound
/// doubles (capped at `max`) after a busy channel check and halves
/// (floored at `min`) after a clear one, so the window never leaves
/// `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentionWindow {
    min: u32,
    max: u32,
    current: u32,
}

impl ContentionWindow {
    pub fn new(min: u32, max: u32) -> Self {
        Self {
            min,
            max,
            current: min,
        }
    }

    pub fn discovery() -> Self {
        Self::new(DISCOVERY_BACKOFF_MIN_MS, DISCOVERY_BACKOFF_MAX_MS)
    }

    pub fn join() -> Self {
        Self::new(JOIN_BACKOFF_MIN_MS, JOIN_BACKOFF_MAX_MS)
    }

    /// Upper bound delays are currently drawn against
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Draw a backoff delay from the current window
    pub fn delay<R: Rng>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.min..=self.current)
    }

    /// Busy medium observed during the check window
    pub fn widen(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.max);
    }

    /// Clear check
    pub fn narrow(&mut self) {
        self.current = (self.current / 2).max(self.min);
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_widening_is_monotonic_and_capped() {
        let mut window = ContentionWindow::discovery();
        let mut previous = window.current();
        for _ in 0..16 {
            window.widen();
            assert!(window.current() >= previous);
            assert!(window.current() <= DISCOVERY_BACKOFF_MAX_MS);
            previous = window.current();
        }
        assert_eq!(window.current(), DISCOVERY_BACKOFF_MAX_MS);
    }

    #[test]
    fn test_narrowing_is_monotonic_and_floored() {
        let mut window = ContentionWindow::discovery();
        for _ in 0..8 {
            window.widen();
        }
        let mut previous = window.current();
        for _ in 0..16 {
            window.narrow();
            assert!(window.current() <= previous);
            assert!(window.current() >= DISCOVERY_BACKOFF_MIN_MS);
            previous = window.current();
        }
        assert_eq!(window.current(), DISCOVERY_BACKOFF_MIN_MS);
    }

    #[test]
    fn test_delay_stays_inside_window() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut window = ContentionWindow::join();
        window.widen();
        for _ in 0..200 {
            let delay = window.delay(&mut rng);
            assert!(delay >= JOIN_BACKOFF_MIN_MS);
            assert!(delay <= window.current());
        }
    }

    #[test]
    fn test_join_window_bounds() {
        let mut window = ContentionWindow::join();
        assert_eq!(window.current(), JOIN_BACKOFF_MIN_MS);
        window.widen();
        assert_eq!(window.current(), JOIN_BACKOFF_MAX_MS);
        window.narrow();
        assert_eq!(window.current(), JOIN_BACKOFF_MIN_MS);
    }

    #[test]
    fn test_reset_restores_minimum() {
        let mut window = ContentionWindow::discovery();
        window.widen();
        window.widen();
        window.reset();
        assert_eq!(window.current(), DISCOVERY_BACKOFF_MIN_MS);
    }
}
