//! Sound engine
//!
//! A small fixed bank of synthesised voices. Each voice chains
//! oscillator -> envelope -> ring modulation / hard sync -> filter, and the
//! buffer filler sums all voices into unsigned 16-bit PCM.
//!
//! The engine only ever reads its own state while filling; the sequencer
//! mutates that state between fills through the channel accessors.

pub mod adsr;
pub mod filter;
pub mod oscillator;
pub mod tables;

use bitflags::bitflags;

pub use adsr::{Adsr, AdsrState, MAX_ADSR, MAX_ADSR_VOLUME};
pub use filter::{Filter, FilterType, MAX_CUTOFF};
pub use oscillator::{Oscillator, Waveform, ACC_BITS, WAVE_AMP};

/// Number of voices
pub const NUM_CHANNELS: usize = 4;
/// Marker for "no source channel" in ring-mod / hard-sync routing
pub const NO_SOURCE: u8 = 0xFF;
/// Centre value of an output sample
pub const OUTPUT_CENTER: u16 = 0x8000;

const WAVE_CENTER: i32 = (WAVE_AMP / 2) as i32;
const OUTPUT_SHIFT: u32 = 2;

bitflags! {
    /// Per-voice routing and gate flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChannelFlags: u8 {
        /// Route the voice through its filter
        const FILTER = 0x01;
        /// Voice is sounding
        const GATE = 0x02;
        /// Multiply with the ring-mod source's raw output
        const RING_MOD = 0x04;
        /// Reset phase when the hard-sync source wraps
        const HARD_SYNC = 0x08;
        /// Reset phase on every note trigger
        const KEY_SYNC = 0x10;
    }
}

/// Which half of the circular audio buffer to fill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferHalf {
    /// Samples `0..len/2`
    First,
    /// Samples `len/2..len`
    Second,
}

/// One oscillator + envelope + filter voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundEngineChannel {
    /// Phase accumulator and waveform
    pub osc: Oscillator,
    /// Envelope
    pub adsr: Adsr,
    /// Filter
    pub filter: Filter,
    /// Routing and gate flags
    pub flags: ChannelFlags,
    /// Ring-mod source channel ([`NO_SOURCE`] when unused)
    pub ring_mod: u8,
    /// Hard-sync source channel ([`NO_SOURCE`] when unused)
    pub hard_sync: u8,
    /// Frequency in 1/1024 Hz
    pub frequency: u32,
    /// Raw oscillator output of the most recent sample
    pub output: u32,
}

impl Default for SoundEngineChannel {
    fn default() -> Self {
        Self {
            osc: Oscillator::new(),
            adsr: Adsr::default(),
            filter: Filter::new(),
            flags: ChannelFlags::empty(),
            ring_mod: NO_SOURCE,
            hard_sync: NO_SOURCE,
            frequency: 0,
            output: 0,
        }
    }
}

impl SoundEngineChannel {
    /// True when the voice contributes to the mix
    #[inline]
    pub fn is_active(&self) -> bool {
        self.frequency > 0 && self.flags.contains(ChannelFlags::GATE)
    }

    /// Silence the voice and close its gate
    pub fn silence(&mut self) {
        self.flags.remove(ChannelFlags::GATE);
        self.adsr.kill();
        self.adsr.volume = 0;
        self.output = 0;
        self.osc.wrapped = false;
    }
}

/// The sound chip
#[derive(Debug, Clone)]
pub struct SoundEngine {
    sample_rate: u32,
    /// Voices
    pub channel: [SoundEngineChannel; NUM_CHANNELS],
    /// Circular DMA buffer (even length)
    audio_buffer: Vec<u16>,
    /// Global output scale (0..=[`MAX_ADSR_VOLUME`])
    pub master_volume: u8,
}

impl SoundEngine {
    /// Create an engine with a fixed sample rate and circular buffer size
    ///
    /// Odd buffer sizes are rounded up so the buffer splits into two equal
    /// halves.
    pub fn new(sample_rate: u32, audio_buffer_size: usize) -> Self {
        let size = (audio_buffer_size.max(2) + 1) & !1;
        Self {
            sample_rate: sample_rate.max(1),
            channel: [SoundEngineChannel::default(); NUM_CHANNELS],
            audio_buffer: vec![OUTPUT_CENTER; size],
            master_volume: MAX_ADSR_VOLUME,
        }
    }

    /// Output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The whole circular buffer
    pub fn audio_buffer(&self) -> &[u16] {
        &self.audio_buffer
    }

    /// Set a voice's frequency (1/1024 Hz) and recompute its phase step
    pub fn set_channel_frequency(&mut self, channel: usize, frequency: u32) {
        let sample_rate = self.sample_rate;
        if let Some(ch) = self.channel.get_mut(channel) {
            ch.frequency = frequency;
            ch.osc.frequency_step = Oscillator::step_for(frequency, sample_rate);
        }
    }

    /// Open or close a voice's gate
    ///
    /// Opening restarts the envelope from the attack stage; closing moves it
    /// into release. The gate flag itself clears once release reaches zero.
    pub fn enable_gate(&mut self, channel: usize, enable: bool) {
        let sample_rate = self.sample_rate;
        if let Some(ch) = self.channel.get_mut(channel) {
            if enable {
                ch.flags.insert(ChannelFlags::GATE);
                ch.adsr.trigger(sample_rate);
                if ch.flags.contains(ChannelFlags::KEY_SYNC) {
                    ch.osc.reset_phase();
                }
            } else {
                ch.adsr.release(sample_rate);
            }
        }
    }

    /// Silence every voice immediately
    pub fn silence_all(&mut self) {
        for ch in self.channel.iter_mut() {
            ch.silence();
        }
    }

    /// Fill one half of the internal circular buffer and return it
    pub fn fill_half(&mut self, half: BufferHalf) -> &[u16] {
        let mid = self.audio_buffer.len() / 2;
        let mut buffer = std::mem::take(&mut self.audio_buffer);
        let range = match half {
            BufferHalf::First => 0..mid,
            BufferHalf::Second => mid..buffer.len(),
        };
        self.fill(&mut buffer[range.clone()]);
        self.audio_buffer = buffer;
        &self.audio_buffer[range]
    }

    /// Render `out.len()` unsigned samples
    ///
    /// Output depends only on the engine state, so two engines driven with
    /// identical parameter changes produce identical buffers.
    pub fn fill(&mut self, out: &mut [u16]) {
        let sample_rate = self.sample_rate;
        let master = self.master_volume.min(MAX_ADSR_VOLUME) as i32;

        for sample in out.iter_mut() {
            let mut acc: i32 = 0;

            for i in 0..NUM_CHANNELS {
                if !self.channel[i].is_active() {
                    continue;
                }

                let sync_source = self.channel[i].hard_sync;
                let ring_source = self.channel[i].ring_mod;
                let synced = self.channel[i].flags.contains(ChannelFlags::HARD_SYNC)
                    && self.source_wrapped(i, sync_source);
                let ring = if self.channel[i].flags.contains(ChannelFlags::RING_MOD) {
                    self.source_output(i, ring_source)
                } else {
                    None
                };

                let ch = &mut self.channel[i];
                ch.osc.advance();
                if synced {
                    ch.osc.accumulator = 0;
                }
                ch.output = ch.osc.output();

                let mut value = ch.output as i32 - WAVE_CENTER;
                if let Some(carrier) = ring {
                    value = (value * (carrier as i32 - WAVE_CENTER)) / WAVE_CENTER;
                }

                if !ch.adsr.advance(sample_rate) {
                    ch.flags.remove(ChannelFlags::GATE);
                }
                value = ch.adsr.apply(value);

                if ch.flags.contains(ChannelFlags::FILTER) {
                    value = ch.filter.process(value);
                }

                acc += value;
            }

            let scaled = ((acc * master) / MAX_ADSR_VOLUME as i32) << OUTPUT_SHIFT;
            *sample = (scaled + OUTPUT_CENTER as i32).clamp(0, u16::MAX as i32) as u16;
        }
    }

    // An inactive source never wraps and reads as 0; its oscillator state
    // is left over from the last sample it played.
    fn source_wrapped(&self, channel: usize, source: u8) -> bool {
        let source = source as usize;
        source != channel
            && self
                .channel
                .get(source)
                .map(|src| src.is_active() && src.osc.wrapped)
                .unwrap_or(false)
    }

    fn source_output(&self, channel: usize, source: u8) -> Option<u32> {
        let source = source as usize;
        if source == channel {
            return None;
        }
        self.channel
            .get(source)
            .map(|src| if src.is_active() { src.output } else { 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_pulse(frequency_hz: u32) -> SoundEngine {
        let mut engine = SoundEngine::new(44_100, 512);
        let ch = &mut engine.channel[0];
        ch.osc.waveform = Waveform::PULSE;
        ch.osc.pulse_width = 0x800;
        ch.adsr.a = 0;
        ch.adsr.d = 0;
        ch.adsr.s = 0xFF;
        ch.adsr.volume = MAX_ADSR_VOLUME;
        engine.set_channel_frequency(0, frequency_hz * 1024);
        engine.enable_gate(0, true);
        engine
    }

    #[test]
    fn test_buffer_size_is_even() {
        let engine = SoundEngine::new(44_100, 1001);
        assert_eq!(engine.audio_buffer().len() % 2, 0);
    }

    #[test]
    fn test_silent_engine_outputs_center() {
        let mut engine = SoundEngine::new(44_100, 64);
        let half = engine.fill_half(BufferHalf::First);
        assert_eq!(half.len(), 32);
        assert!(half.iter().all(|&s| s == OUTPUT_CENTER));
    }

    #[test]
    fn test_pulse_alternates_between_two_levels() {
        let mut engine = engine_with_pulse(440);
        let mut out = vec![0u16; 4410];
        engine.fill(&mut out);

        let settled = &out[8..];
        let max = *settled.iter().max().unwrap();
        let min = *settled.iter().min().unwrap();
        assert!(settled.iter().all(|&s| s == max || s == min));
        assert!(max > OUTPUT_CENTER && min < OUTPUT_CENTER);

        let high = settled.iter().filter(|&&s| s == max).count() as f64;
        let duty = high / settled.len() as f64;
        approx::assert_abs_diff_eq!(duty, 0.5, epsilon = 0.01);
    }

    #[test]
    fn test_fill_is_deterministic() {
        let mut a = engine_with_pulse(300);
        let mut b = engine_with_pulse(300);
        for engine in [&mut a, &mut b] {
            engine.channel[0].osc.waveform = Waveform::NOISE | Waveform::SAW;
            engine.channel[0].flags.insert(ChannelFlags::FILTER);
            engine.channel[0].filter.set_coefficients(0x300, 0x40);
        }
        let ha = a.fill_half(BufferHalf::First).to_vec();
        let hb = b.fill_half(BufferHalf::First).to_vec();
        assert_eq!(ha, hb);
        assert_eq!(
            a.fill_half(BufferHalf::Second),
            b.fill_half(BufferHalf::Second)
        );
    }

    #[test]
    fn test_hard_sync_resets_slave_phase() {
        let mut engine = engine_with_pulse(1000);
        engine.channel[1] = engine.channel[0];
        engine.set_channel_frequency(1, 1730 * 1024);
        engine.channel[1].flags.insert(ChannelFlags::HARD_SYNC);
        engine.channel[1].hard_sync = 0;

        let mut out = [0u16; 1];
        for _ in 0..2000 {
            engine.fill(&mut out);
            if engine.channel[0].osc.wrapped {
                assert_eq!(engine.channel[1].osc.accumulator, 0);
            }
        }
    }

    #[test]
    fn test_hard_sync_ignores_silenced_master() {
        let mut engine = engine_with_pulse(1000);
        engine.channel[1] = engine.channel[0];
        engine.channel[1].osc.waveform = Waveform::SAW;
        engine.set_channel_frequency(1, 1730 * 1024);
        engine.channel[1].flags.insert(ChannelFlags::HARD_SYNC);
        engine.channel[1].hard_sync = 0;

        let mut out = [0u16; 1];
        while !engine.channel[0].osc.wrapped {
            engine.fill(&mut out);
        }
        engine.channel[0].silence();

        let mut phases = Vec::new();
        for _ in 0..200 {
            engine.fill(&mut out);
            phases.push(engine.channel[1].osc.accumulator);
        }
        assert!(phases.iter().any(|&p| p != 0));
        assert!(phases.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_ring_mod_ignores_stale_source_output() {
        let mut released = engine_with_pulse(1000);
        released.channel[1] = released.channel[0];
        released.channel[1].osc.waveform = Waveform::SAW;
        released.set_channel_frequency(1, 1730 * 1024);
        released.channel[1].flags.insert(ChannelFlags::RING_MOD);
        released.channel[1].ring_mod = 0;

        let mut out = vec![0u16; 64];
        released.fill(&mut out);
        released.channel[0].adsr.r = 0;
        released.enable_gate(0, false);
        let mut one = [0u16; 1];
        for _ in 0..200_000 {
            if !released.channel[0].is_active() {
                break;
            }
            released.fill(&mut one);
        }
        assert!(!released.channel[0].is_active());

        let mut silenced = released.clone();
        silenced.channel[0].silence();

        let mut a = vec![0u16; 256];
        let mut b = vec![0u16; 256];
        released.fill(&mut a);
        silenced.fill(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_released_voice_closes_gate() {
        let mut engine = engine_with_pulse(440);
        let mut out = vec![0u16; 64];
        engine.fill(&mut out);
        engine.enable_gate(0, false);
        engine.fill(&mut out);
        assert!(!engine.channel[0].flags.contains(ChannelFlags::GATE));
        assert_eq!(engine.channel[0].adsr.state, AdsrState::Done);
    }

    #[test]
    fn test_master_volume_scales_output() {
        let mut loud = engine_with_pulse(440);
        let mut quiet = engine_with_pulse(440);
        quiet.master_volume = MAX_ADSR_VOLUME / 2;
        let mut a = vec![0u16; 256];
        let mut b = vec![0u16; 256];
        loud.fill(&mut a);
        quiet.fill(&mut b);
        let swing = |buf: &[u16]| {
            buf.iter().map(|&s| (s as i32 - OUTPUT_CENTER as i32).abs()).max().unwrap()
        };
        assert!(swing(&b) < swing(&a));
    }
}
