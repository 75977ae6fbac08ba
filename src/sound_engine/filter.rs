//! State-variable filter
//!
//! Chamberlin topology in integer arithmetic. The cutoff/resonance
//! parameters are mapped to coefficients only when they change; the
//! per-sample path is three multiplies and a tap selection.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

/// Largest cutoff value (11-bit)
pub const MAX_CUTOFF: u16 = 0x7FF;
/// Largest resonance value
pub const MAX_RESONANCE: u8 = 0xFF;

const CUTOFF_SHIFT: u32 = 12;
const Q_SHIFT: u32 = 8;
const STATE_LIMIT: i32 = 1 << 20;

/// Output tap(s) of the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive, ToPrimitive)]
pub enum FilterType {
    /// Low-pass
    #[default]
    LowPass = 0,
    /// High-pass
    HighPass = 1,
    /// Band-pass
    BandPass = 2,
    /// Low + high (notch)
    LowHigh = 3,
    /// High + band
    HighBand = 4,
    /// Low + band
    LowBand = 5,
    /// All three taps
    LowHighBand = 6,
}

impl FilterType {
    /// Decode a stored filter type, falling back to low-pass
    pub fn from_raw(value: u8) -> Self {
        FilterType::from_u8(value).unwrap_or_default()
    }
}

/// Filter coefficients and running state of one voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    cutoff: u16,
    resonance: u8,
    /// Selected output tap
    pub filter_type: FilterType,
    f: i32,
    q: i32,
    low: i32,
    high: i32,
    band: i32,
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter {
    /// Wide-open low-pass with no resonance
    pub fn new() -> Self {
        let mut filter = Self {
            cutoff: 0,
            resonance: 0,
            filter_type: FilterType::LowPass,
            f: 0,
            q: 0,
            low: 0,
            high: 0,
            band: 0,
        };
        filter.set_coefficients(MAX_CUTOFF, 0);
        filter
    }

    /// Current cutoff (0..=[`MAX_CUTOFF`])
    pub fn cutoff(&self) -> u16 {
        self.cutoff
    }

    /// Current resonance
    pub fn resonance(&self) -> u8 {
        self.resonance
    }

    /// Update cutoff and resonance, recomputing the derived coefficients
    ///
    /// The cutoff is clamped to its 11-bit range. Nothing is recomputed when
    /// both values are unchanged.
    pub fn set_coefficients(&mut self, cutoff: u16, resonance: u8) {
        let cutoff = cutoff.min(MAX_CUTOFF);
        if cutoff == self.cutoff && resonance == self.resonance && self.q != 0 {
            return;
        }
        self.cutoff = cutoff;
        self.resonance = resonance;
        let c = cutoff as i32;
        self.f = (c * c) >> 11;
        self.q = (1 << Q_SHIFT) - resonance as i32;
    }

    /// Clear the running state (low/high/band accumulators)
    pub fn reset(&mut self) {
        self.low = 0;
        self.high = 0;
        self.band = 0;
    }

    /// Filter one sample and return the selected tap
    #[inline]
    pub fn process(&mut self, input: i32) -> i32 {
        self.band = clamp_state(self.band + ((self.f * self.high) >> CUTOFF_SHIFT));
        self.low = clamp_state(self.low + ((self.f * self.band) >> CUTOFF_SHIFT));
        self.high = clamp_state(input - self.low - ((self.q * self.band) >> Q_SHIFT));

        match self.filter_type {
            FilterType::LowPass => self.low,
            FilterType::HighPass => self.high,
            FilterType::BandPass => self.band,
            FilterType::LowHigh => self.low + self.high,
            FilterType::HighBand => self.high + self.band,
            FilterType::LowBand => self.low + self.band,
            FilterType::LowHighBand => self.low + self.high + self.band,
        }
    }
}

#[inline]
fn clamp_state(value: i32) -> i32 {
    value.clamp(-STATE_LIMIT, STATE_LIMIT)
}
