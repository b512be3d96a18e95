use std::time::Duration;

/// A fixed delay between consecutive attempts. It never runs out by itself, use
/// [`Iterator::take`] to bound it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    duration: Duration,
}

impl Interval {
    pub fn from_millis(millis: u64) -> Self {
        Self {
            duration: Duration::from_millis(millis),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl From<Duration> for Interval {
    fn from(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Iterator for Interval {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.duration)
    }
}
