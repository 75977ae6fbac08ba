//! Instrument micro-program interpreter
//!
//! A program is 16 slots of 16-bit words. Slots hold either an effect
//! command (routed through the effect interpreter with tick-0 semantics) or
//! one of the control markers below. Bit 15 of an effect slot is the
//! "unite" bit: the next slot runs in the same pass.
//!
//! Each pass is a bounded state machine. `LOOP_BEGIN` and `JUMP` do not
//! consume the pass; a `JUMP` or `LOOP_END` reached twice within one pass
//! ends the pass instead of looping forever.

use super::TrackerEngine;
use crate::sound_engine::SoundEngine;

/// Program length
pub const PROGRAM_SLOTS: usize = 16;

/// Unite bit: execute the following slot in the same pass
pub const PROGRAM_UNITE: u16 = 0x8000;
/// Loop start marker
pub const PROGRAM_LOOP_BEGIN: u16 = 0x7D00;
/// Loop end marker, low byte = repeat count
pub const PROGRAM_LOOP_END: u16 = 0x7E00;
/// Jump marker, low byte = destination slot
pub const PROGRAM_JUMP: u16 = 0x7F00;
/// Empty slot
pub const PROGRAM_NOP: u16 = 0x7FFE;
/// Stop the program
pub const PROGRAM_END: u16 = 0x7FFF;

const MAX_STEPS_PER_PASS: usize = PROGRAM_SLOTS * 4;

/// Decoded program slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStep {
    /// Effect command and whether the next slot runs in the same pass
    Effect {
        /// 15-bit command word
        command: u16,
        /// Unite bit
        unite: bool,
    },
    /// Loop start marker
    LoopBegin,
    /// Loop end with repeat count
    LoopEnd(u8),
    /// Jump to a slot
    Jump(u8),
    /// Do nothing for one pass
    Nop,
    /// Stop the program
    End,
}

impl ProgramStep {
    /// Decode a raw slot
    pub fn decode(slot: u16) -> Self {
        let word = slot & !PROGRAM_UNITE;
        match word {
            PROGRAM_END => ProgramStep::End,
            PROGRAM_NOP => ProgramStep::Nop,
            PROGRAM_LOOP_BEGIN => ProgramStep::LoopBegin,
            _ => match word & 0xFF00 {
                PROGRAM_LOOP_END => ProgramStep::LoopEnd(word as u8),
                PROGRAM_JUMP => ProgramStep::Jump(word as u8),
                _ => ProgramStep::Effect {
                    command: word,
                    unite: slot & PROGRAM_UNITE != 0,
                },
            },
        }
    }

    /// Encode back into a slot word
    pub fn encode(self) -> u16 {
        match self {
            ProgramStep::Effect { command, unite } => {
                (command & !PROGRAM_UNITE) | if unite { PROGRAM_UNITE } else { 0 }
            }
            ProgramStep::LoopBegin => PROGRAM_LOOP_BEGIN,
            ProgramStep::LoopEnd(count) => PROGRAM_LOOP_END | count as u16,
            ProgramStep::Jump(slot) => PROGRAM_JUMP | slot as u16,
            ProgramStep::Nop => PROGRAM_NOP,
            ProgramStep::End => PROGRAM_END,
        }
    }
}

impl TrackerEngine {
    /// Run the channel's program if its period has elapsed
    pub(crate) fn run_program(&mut self, engine: &mut SoundEngine, channel: usize) {
        let (program, due) = {
            let ch = &mut self.channel[channel];
            let Some(instrument) = ch.instrument.as_ref() else {
                return;
            };
            if !ch.program_running {
                return;
            }
            let due = ch.program_tick == 0;
            ch.program_tick += 1;
            if ch.program_tick >= ch.program_period.max(1) {
                ch.program_tick = 0;
            }
            (instrument.program, due)
        };
        if !due {
            return;
        }

        let mut visited: u16 = 0;
        for _ in 0..MAX_STEPS_PER_PASS {
            let pc = self.channel[channel].program_counter as usize;
            let Some(&slot) = program.get(pc) else {
                self.channel[channel].program_running = false;
                return;
            };

            match ProgramStep::decode(slot) {
                ProgramStep::End => {
                    self.channel[channel].program_running = false;
                    return;
                }
                ProgramStep::Nop => {
                    self.channel[channel].program_counter += 1;
                    return;
                }
                ProgramStep::LoopBegin => {
                    self.channel[channel].program_counter += 1;
                }
                ProgramStep::Jump(target) => {
                    if visited & (1 << pc) != 0 {
                        return;
                    }
                    visited |= 1 << pc;
                    self.channel[channel].program_counter = target.min(PROGRAM_SLOTS as u8 - 1);
                }
                ProgramStep::LoopEnd(count) => {
                    if visited & (1 << pc) != 0 {
                        return;
                    }
                    visited |= 1 << pc;

                    let ch = &mut self.channel[channel];
                    if ch.program_loop == 0 {
                        ch.program_loop = count.saturating_add(1);
                    }
                    ch.program_loop -= 1;
                    ch.program_counter = if ch.program_loop > 0 {
                        loop_begin(&program, pc)
                    } else {
                        pc as u8 + 1
                    };
                }
                ProgramStep::Effect { command, unite } => {
                    self.channel[channel].program_counter += 1;
                    self.do_command(engine, channel, command, 0, true);
                    if !unite {
                        return;
                    }
                }
            }
        }
    }
}

/// Slot after the nearest `LOOP_BEGIN` before `pc`, or slot 0
fn loop_begin(program: &[u16; PROGRAM_SLOTS], pc: usize) -> u8 {
    program[..pc]
        .iter()
        .rposition(|&slot| ProgramStep::decode(slot) == ProgramStep::LoopBegin)
        .map(|begin| begin as u8 + 1)
        .unwrap_or(0)
}
