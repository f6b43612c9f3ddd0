//! Single-slot, last-write-wins reading shared between the acquisition thread
//! and the sampler.
//!
//! There is no queue: the sampler always wants the newest value, so a slow
//! consumer simply skips intermediate frames instead of building a backlog.
//! The lock is held only for the copy of two `f64`s, never across parsing or
//! serial I/O.

use super::frame::Reading;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Slot {
    value: Mutex<Reading>,
    writes: AtomicU64,
}

/// Handle to the shared latest reading. Cloning shares the same slot.
///
/// Before the first write, [`read`](Self::read) returns
/// `Reading { angle_deg: 0.0, pressure_bar: 0.0 }`.
#[derive(Debug, Clone, Default)]
pub struct LatestReading(Arc<Slot>);

impl LatestReading {
    /// Create an empty slot holding the default reading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the slot. Single producer by construction.
    pub fn write(&self, reading: Reading) {
        *self.0.value.lock() = reading;
        self.0.writes.fetch_add(1, Ordering::Release);
    }

    /// Copy out the most recent reading.
    pub fn read(&self) -> Reading {
        *self.0.value.lock()
    }

    /// Number of writes so far. An unchanged value between two ticks means
    /// the link produced nothing new.
    pub fn sequence(&self) -> u64 {
        self.0.writes.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn default_reading_before_first_write() {
        let latest = LatestReading::new();
        assert_eq!(latest.read(), Reading::new(0.0, 0.0));
        assert_eq!(latest.sequence(), 0);
    }

    #[test]
    fn last_write_wins() {
        let latest = LatestReading::new();
        latest.write(Reading::new(1.0, 2.0));
        latest.write(Reading::new(3.0, 4.0));
        assert_eq!(latest.read(), Reading::new(3.0, 4.0));
        assert_eq!(latest.sequence(), 2);
    }

    #[test]
    fn clones_share_the_slot() {
        let writer = LatestReading::new();
        let reader = writer.clone();
        writer.write(Reading::new(7.5, 1.5));
        assert_eq!(reader.read(), Reading::new(7.5, 1.5));
        assert_eq!(reader.sequence(), 1);
    }

    #[test]
    fn reader_never_observes_torn_pairs() {
        let writer = LatestReading::new();
        let reader = writer.clone();

        let producer = thread::spawn(move || {
            for i in 0..10_000 {
                let v = f64::from(i);
                writer.write(Reading::new(v, -v));
            }
        });

        for _ in 0..10_000 {
            let r = reader.read();
            assert_eq!(r.angle_deg, -r.pressure_bar);
        }
        producer.join().unwrap();
        assert_eq!(reader.read(), Reading::new(9_999.0, -9_999.0));
    }
}
