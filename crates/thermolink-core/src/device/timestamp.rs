//! Microsecond timestamp over a free-running tick counter.

/// Free-running hardware tick counter.
pub trait Clock {
    fn ticks(&self) -> u64;

    fn ticks_per_microsecond(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn ticks(&self) -> u64 {
        (**self).ticks()
    }

    fn ticks_per_microsecond(&self) -> u64 {
        (**self).ticks_per_microsecond()
    }
}

/// Host-adjustable timestamp: `offset + ticks / ticks_per_microsecond`.
pub struct Timestamp<K> {
    clock: K,
    offset: u64,
}

impl<K: Clock> Timestamp<K> {
    pub fn new(clock: K) -> Self {
        Self { clock, offset: 0 }
    }

    /// Current timestamp in microseconds.
    pub fn get(&self) -> u64 {
        self.at_ticks(self.clock.ticks())
    }

    /// Moves the timestamp so that it reads `timestamp` now.
    pub fn set(&mut self, timestamp: u64) {
        let now = self.get();
        self.offset = self.offset.wrapping_add(timestamp.wrapping_sub(now));
    }

    /// Converts a raw tick count into a timestamp.
    pub fn at_ticks(&self, ticks: u64) -> u64 {
        let per_microsecond = self.clock.ticks_per_microsecond().max(1);
        self.offset.wrapping_add(ticks / per_microsecond)
    }

    /// Microseconds since the clock started, ignoring the offset.
    pub fn uptime(&self) -> u64 {
        self.clock.ticks() / self.clock.ticks_per_microsecond().max(1)
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }
}
