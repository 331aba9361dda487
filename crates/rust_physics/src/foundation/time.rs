//! Time measurement for step statistics

use std::time::{Duration, Instant};

/// Simple stopwatch for measuring elapsed wall-clock time
#[derive(Debug)]
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a new stopwatch and start it immediately
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start the stopwatch
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Stop the stopwatch and accumulate elapsed time
    pub fn stop(&mut self) -> Duration {
        if let Some(start) = self.start_time.take() {
            self.elapsed += start.elapsed();
        }
        self.elapsed
    }
}

/// Counters gathered while running one `PhysicsWorld::step` call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepStats {
    /// Fixed substeps executed
    pub substeps: u32,
    /// Whole substeps discarded because `max_sub_steps` was reached
    pub dropped_substeps: u32,
    /// Broad-phase pairs that passed filtering (summed over substeps)
    pub candidate_pairs: usize,
    /// Contact points produced by the narrow-phase (summed over substeps)
    pub contacts: usize,
    /// Wall-clock time spent inside `step`
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwatch_accumulates() {
        let mut stopwatch = Stopwatch::start_new();
        let first = stopwatch.stop();
        stopwatch.start();
        let second = stopwatch.stop();

        assert!(second >= first);
        // stopping a stopped watch adds nothing
        assert_eq!(stopwatch.stop(), second);
    }
}
