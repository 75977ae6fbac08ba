//! Tick clock
//!
//! Emulates the sequencer timer interrupt against the sample clock: the song
//! rate (ticks per second) rarely divides the sample rate, so the remainder
//! is carried from tick to tick and the long-run tick rate is exact.

/// Sample-driven tick timer
#[derive(Debug, Clone)]
pub struct TickClock {
    sample_rate: u32,
    rate: u32,
    /// Total samples clocked
    sample_count: u64,
    /// Total ticks fired
    tick_count: u64,
    /// Samples until the next tick
    samples_until_tick: u32,
    /// Fractional carry in 1/rate samples
    remainder: u32,
}

impl TickClock {
    /// Create a clock for `rate` ticks per second
    pub fn new(sample_rate: u32, rate: u8) -> Self {
        let mut clock = TickClock {
            sample_rate: sample_rate.max(1),
            rate: rate.max(1) as u32,
            sample_count: 0,
            tick_count: 0,
            samples_until_tick: 0,
            remainder: 0,
        };
        clock.samples_until_tick = clock.next_period();
        clock
    }

    fn next_period(&mut self) -> u32 {
        let total = self.sample_rate + self.remainder;
        self.remainder = total % self.rate;
        (total / self.rate).max(1)
    }

    /// Clock the timer by one sample
    /// Returns true if a tick should occur
    pub fn clock(&mut self) -> bool {
        self.advance(1)
    }

    /// Clock the timer by up to `samples` samples
    ///
    /// Never steps past a tick boundary: callers use
    /// [`samples_until_tick`](Self::samples_until_tick) to size chunks.
    pub fn advance(&mut self, samples: u32) -> bool {
        let samples = samples.min(self.samples_until_tick);
        self.sample_count += samples as u64;
        self.samples_until_tick -= samples;

        if self.samples_until_tick == 0 {
            self.tick_count += 1;
            self.samples_until_tick = self.next_period();
            true
        } else {
            false
        }
    }

    /// Samples until the next tick
    pub fn samples_until_tick(&self) -> u32 {
        self.samples_until_tick
    }

    /// Total ticks fired
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Total samples clocked
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Ticks per second
    pub fn rate(&self) -> u8 {
        self.rate as u8
    }

    /// Change the tick rate; takes effect from the next tick
    pub fn set_rate(&mut self, rate: u8) {
        let rate = rate.max(1) as u32;
        if rate != self.rate {
            self.rate = rate;
            self.remainder = 0;
        }
    }

    /// Reset counters and restart the current period
    pub fn reset(&mut self) {
        self.sample_count = 0;
        self.tick_count = 0;
        self.remainder = 0;
        self.samples_until_tick = self.next_period();
    }

    /// Get elapsed time in seconds
    pub fn elapsed_seconds(&self) -> f64 {
        self.sample_count as f64 / self.sample_rate as f64
    }
}
