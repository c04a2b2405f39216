//! Simulated engine
//!
//! A [`RegisterPort`] that models the IP's host-visible behaviour well
//! enough to run the driver without hardware:
//!
//! - edge-triggered strobes on the FIFO and engine control registers,
//! - a bounded input FIFO with a FULL flag and overflow counting,
//! - an output FIFO with a VALID flag,
//! - the sticky EOV flag,
//! - block selection and the BRAM image of every PE block, updated by the
//!   `MV_SELECT` / `MV_WRITE` words the driver emits.
//!
//! The PE array itself is not simulated. Tests queue output words and raise
//! EOV directly to play the part of a finished kernel.

use crate::fixed::sign_extend;
use crate::port::RegisterPort;
use imagine_chip::params::{BRAM_ROWS, MAX_BLOCKS};
use imagine_chip::regs::{self, engine_ctrl, engine_status, fifo_ctrl, fifo_status, REG_COUNT};
use imagine_chip::{EngineParams, InstructionKind, InstructionWord, OutputWord};
use std::collections::VecDeque;
use tracing::trace;

/// Input FIFO depth of the reference build.
pub const DEFAULT_INPUT_DEPTH: usize = 1024;

/// One register access, as recorded by the bus log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// Register read and the value returned.
    Read(usize, u32),
    /// Register write.
    Write(usize, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    None,
    All,
    Column(u8),
}

/// Register-level model of the IMAGine IP.
#[derive(Debug)]
pub struct SimulatedEngine {
    params: EngineParams,
    latched: [u32; REG_COUNT],
    input: VecDeque<InstructionWord>,
    input_depth: usize,
    auto_execute: bool,
    forced_full_polls: u64,
    output: VecDeque<OutputWord>,
    eov: bool,
    selection: Selection,
    bram: Vec<u16>,
    executed: Vec<InstructionWord>,
    overflows: usize,
    underflows: usize,
    write_strobes: usize,
    read_strobes: usize,
    bus_log: Option<Vec<BusEvent>>,
}

impl SimulatedEngine {
    /// Engine that executes every word as soon as it is strobed in.
    pub fn new(params: EngineParams) -> Self {
        Self {
            params,
            latched: [0; REG_COUNT],
            input: VecDeque::new(),
            input_depth: DEFAULT_INPUT_DEPTH,
            auto_execute: true,
            forced_full_polls: 0,
            output: VecDeque::new(),
            eov: false,
            selection: Selection::None,
            bram: vec![0; MAX_BLOCKS * BRAM_ROWS],
            executed: Vec::new(),
            overflows: 0,
            underflows: 0,
            write_strobes: 0,
            read_strobes: 0,
            bus_log: None,
        }
    }

    /// Hold words in the input FIFO until [`step`](Self::step) is called.
    #[must_use]
    pub fn with_manual_execute(mut self) -> Self {
        self.auto_execute = false;
        self
    }

    /// Set the input FIFO depth.
    #[must_use]
    pub fn with_input_depth(mut self, depth: usize) -> Self {
        self.input_depth = depth;
        self
    }

    /// Record every register access.
    #[must_use]
    pub fn with_bus_log(mut self) -> Self {
        self.bus_log = Some(Vec::new());
        self
    }

    /// Engine geometry.
    pub const fn params(&self) -> &EngineParams {
        &self.params
    }

    // ── Test hooks ───────────────────────────────────────────────────────────

    /// Report FIFO-in full for the next `polls` status reads.
    pub fn hold_input_full(&mut self, polls: u64) {
        self.forced_full_polls = polls;
    }

    /// Queue an output word as if the array had produced it.
    pub fn push_output(&mut self, value: i16, attrib: u8) {
        self.output.push_back(OutputWord::new(value, attrib));
    }

    /// Raise the sticky end-of-vector flag.
    pub fn raise_eov(&mut self) {
        self.eov = true;
    }

    /// Fill every BRAM row with `pattern`, standing in for stale contents.
    pub fn fill_bram(&mut self, pattern: u16) {
        self.bram.fill(pattern);
    }

    /// Execute up to `n` pending input words. Returns how many ran.
    pub fn step(&mut self, n: usize) -> usize {
        let mut ran = 0;
        while ran < n {
            let Some(word) = self.input.pop_front() else {
                break;
            };
            self.execute(word);
            ran += 1;
        }
        ran
    }

    /// Execute every pending input word.
    pub fn drain_input(&mut self) -> usize {
        self.step(usize::MAX)
    }

    // ── Inspection ───────────────────────────────────────────────────────────

    /// Words executed so far, in order.
    pub fn executed(&self) -> &[InstructionWord] {
        &self.executed
    }

    /// Words waiting in the input FIFO.
    pub fn pending(&self) -> usize {
        self.input.len()
    }

    /// Write strobes that arrived while the input FIFO was full.
    pub const fn overflows(&self) -> usize {
        self.overflows
    }

    /// Read strobes that arrived while the output FIFO was empty.
    pub const fn underflows(&self) -> usize {
        self.underflows
    }

    /// Rising edges seen on the FIFO-in write strobe.
    pub const fn write_strobes(&self) -> usize {
        self.write_strobes
    }

    /// Rising edges seen on the FIFO-out read strobe.
    pub const fn read_strobes(&self) -> usize {
        self.read_strobes
    }

    /// Current EOV flag.
    pub const fn eov(&self) -> bool {
        self.eov
    }

    /// Recorded register accesses (empty unless built with the bus log).
    pub fn bus_log(&self) -> &[BusEvent] {
        self.bus_log.as_deref().unwrap_or_default()
    }

    /// One BRAM row of one block.
    pub fn bram_row(&self, block: u8, addr: u16) -> u16 {
        self.bram[usize::from(block) * BRAM_ROWS + usize::from(addr) % BRAM_ROWS]
    }

    /// Read back `len` lanes of a vector register from the BRAM image.
    ///
    /// Each lane is sign-extended from `reg_width` bits. Returns `None` for
    /// a register without a BRAM image.
    pub fn register_lanes(&self, register: usize, len: usize) -> Option<Vec<i16>> {
        let base = self.params.register_base(register)?;
        let lanes = self.params.lanes_per_block();
        let width = self.params.reg_width();
        let lanes_out = (0..len)
            .map(|i| {
                // Vector lengths are bounded by MAX_BLOCKS * lanes
                #[allow(clippy::cast_possible_truncation)]
                let block = (i / lanes) as u8;
                let lane = i % lanes;
                let bits = (0..width).fold(0u16, |acc, b| {
                    // b < 16
                    #[allow(clippy::cast_possible_truncation)]
                    let row = self.bram_row(block, base + b as u16);
                    acc | (((row >> lane) & 1) << b)
                });
                sign_extend(bits, width)
            })
            .collect();
        Some(lanes_out)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn input_full(&self) -> bool {
        self.forced_full_polls > 0 || self.input.len() >= self.input_depth
    }

    fn execute(&mut self, word: InstructionWord) {
        trace!("sim exec {word}");
        match word.kind() {
            InstructionKind::SelectAll => self.selection = Selection::All,
            InstructionKind::SelectColumn(block) => self.selection = Selection::Column(block),
            InstructionKind::Write { addr, data } => {
                let addr = usize::from(addr);
                match self.selection {
                    Selection::All => {
                        for block in 0..MAX_BLOCKS {
                            self.bram[block * BRAM_ROWS + addr] = data;
                        }
                    }
                    Selection::Column(block) => {
                        self.bram[usize::from(block) * BRAM_ROWS + addr] = data;
                    }
                    Selection::None => {}
                }
            }
            InstructionKind::Nop | InstructionKind::VvSync | InstructionKind::Other { .. } => {}
        }
        self.executed.push(word);
    }

    fn on_fifo_ctrl(&mut self, value: u32) {
        let rising = value & !self.latched[regs::FIFO_CTRL];
        if rising & fifo_ctrl::RESET != 0 {
            self.input.clear();
            self.output.clear();
        }
        if rising & fifo_ctrl::FINP_WR != 0 {
            self.write_strobes += 1;
            if self.input_full() {
                self.overflows += 1;
            } else {
                let word = InstructionWord::from_raw(self.latched[regs::FINP_DATA]);
                if self.auto_execute {
                    self.execute(word);
                } else {
                    self.input.push_back(word);
                }
            }
        }
        if rising & fifo_ctrl::FOUT_RD != 0 {
            self.read_strobes += 1;
            if self.output.pop_front().is_none() {
                self.underflows += 1;
            }
        }
    }

    fn on_engine_ctrl(&mut self, value: u32) {
        let rising = value & !self.latched[regs::ENGINE_CTRL];
        if rising & engine_ctrl::CLEAR_EOV != 0 {
            self.eov = false;
        }
    }

    fn log(&mut self, event: BusEvent) {
        if let Some(log) = self.bus_log.as_mut() {
            log.push(event);
        }
    }
}

impl RegisterPort for SimulatedEngine {
    fn read(&mut self, index: usize) -> u32 {
        assert!(index < REG_COUNT, "Register index {index} out of range");
        let value = match index {
            regs::FOUT_DATA => self.output.front().map_or(0, |w| w.raw()),
            regs::FIFO_STATUS => {
                let mut status = 0;
                if self.input_full() {
                    status |= fifo_status::FINP_FULL;
                }
                if !self.output.is_empty() {
                    status |= fifo_status::FOUT_VALID;
                }
                self.forced_full_polls = self.forced_full_polls.saturating_sub(1);
                status
            }
            regs::ENGINE_STATUS => {
                if self.eov {
                    engine_status::EOV
                } else {
                    0
                }
            }
            _ => self.latched[index],
        };
        self.log(BusEvent::Read(index, value));
        value
    }

    fn write(&mut self, index: usize, value: u32) {
        assert!(index < REG_COUNT, "Register index {index} out of range");
        self.log(BusEvent::Write(index, value));
        match index {
            regs::FIFO_CTRL => self.on_fifo_ctrl(value),
            regs::ENGINE_CTRL => self.on_engine_ctrl(value),
            _ => {}
        }
        self.latched[index] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(sim: &mut SimulatedEngine, reg: usize, bit: u32) {
        let v = sim.read(reg);
        sim.write(reg, v | bit);
        sim.write(reg, v & !bit);
    }

    #[test]
    fn write_strobe_latches_data() {
        let mut sim = SimulatedEngine::new(EngineParams::default()).with_manual_execute();
        sim.write(regs::FINP_DATA, 0x1800_0001);
        pulse(&mut sim, regs::FIFO_CTRL, fifo_ctrl::FINP_WR);
        assert_eq!(sim.pending(), 1);
        assert_eq!(sim.write_strobes(), 1);
        assert_eq!(sim.step(1), 1);
        assert_eq!(sim.executed()[0].raw(), 0x1800_0001);
    }

    #[test]
    fn level_high_is_not_an_edge() {
        let mut sim = SimulatedEngine::new(EngineParams::default()).with_manual_execute();
        sim.write(regs::FIFO_CTRL, fifo_ctrl::FINP_WR);
        sim.write(regs::FIFO_CTRL, fifo_ctrl::FINP_WR);
        assert_eq!(sim.write_strobes(), 1);
    }

    #[test]
    fn full_fifo_drops_words() {
        let mut sim = SimulatedEngine::new(EngineParams::default())
            .with_manual_execute()
            .with_input_depth(1);
        pulse(&mut sim, regs::FIFO_CTRL, fifo_ctrl::FINP_WR);
        pulse(&mut sim, regs::FIFO_CTRL, fifo_ctrl::FINP_WR);
        assert_eq!(sim.pending(), 1);
        assert_eq!(sim.overflows(), 1);
        assert_ne!(sim.read(regs::FIFO_STATUS) & fifo_status::FINP_FULL, 0);
    }

    #[test]
    fn output_fifo_and_valid_flag() {
        let mut sim = SimulatedEngine::new(EngineParams::default());
        assert_eq!(sim.read(regs::FIFO_STATUS) & fifo_status::FOUT_VALID, 0);
        sim.push_output(-3, 7);
        assert_ne!(sim.read(regs::FIFO_STATUS) & fifo_status::FOUT_VALID, 0);
        assert_eq!(sim.read(regs::FOUT_DATA), OutputWord::new(-3, 7).raw());
        pulse(&mut sim, regs::FIFO_CTRL, fifo_ctrl::FOUT_RD);
        assert_eq!(sim.read(regs::FIFO_STATUS) & fifo_status::FOUT_VALID, 0);
        assert_eq!(sim.underflows(), 0);
    }

    #[test]
    fn eov_is_sticky_until_cleared() {
        let mut sim = SimulatedEngine::new(EngineParams::default());
        sim.raise_eov();
        assert_eq!(sim.read(regs::ENGINE_STATUS), engine_status::EOV);
        assert_eq!(sim.read(regs::ENGINE_STATUS), engine_status::EOV);
        pulse(&mut sim, regs::ENGINE_CTRL, engine_ctrl::CLEAR_EOV);
        assert_eq!(sim.read(regs::ENGINE_STATUS), 0);
    }

    #[test]
    fn select_then_write_updates_bram() {
        let mut sim = SimulatedEngine::new(EngineParams::default());
        sim.execute(InstructionWord::select_all());
        sim.execute(InstructionWord::mem_write(5, 0xAAAA));
        sim.execute(InstructionWord::select_column(2));
        sim.execute(InstructionWord::mem_write(5, 0x0001));
        assert_eq!(sim.bram_row(0, 5), 0xAAAA);
        assert_eq!(sim.bram_row(255, 5), 0xAAAA);
        assert_eq!(sim.bram_row(2, 5), 0x0001);
    }

    #[test]
    fn eov_raised_and_acknowledged() {
        let mut sim = SimulatedEngine::new(EngineParams::default());
        assert!(!sim.eov());
        sim.raise_eov();
        assert!(sim.eov());
        assert_eq!(sim.read(regs::ENGINE_STATUS), engine_status::EOV);
        pulse(&mut sim, regs::ENGINE_CTRL, engine_ctrl::CLEAR_EOV);
        assert!(!sim.eov());
        assert_eq!(sim.read(regs::ENGINE_STATUS), 0);
    }

    #[test]
    fn lanes_follow_engine_geometry() {
        let params = EngineParams::new(8, 8).unwrap();
        let mut sim = SimulatedEngine::new(params);
        assert_eq!(sim.params(), &params);
        // Register 1 starts at row 8; lane 0 all ones, lane 1 = 0x7F
        for b in 0..8u16 {
            let row = if b == 7 { 0b01 } else { 0b11 };
            sim.execute(InstructionWord::select_column(0));
            sim.execute(InstructionWord::mem_write(8 + b, row));
        }
        assert_eq!(sim.register_lanes(1, 2), Some(vec![-1, 127]));
        assert_eq!(sim.register_lanes(128, 1), None);
    }

    #[test]
    fn fifo_reset_clears_queues() {
        let mut sim = SimulatedEngine::new(EngineParams::default()).with_manual_execute();
        pulse(&mut sim, regs::FIFO_CTRL, fifo_ctrl::FINP_WR);
        sim.push_output(1, 0);
        pulse(&mut sim, regs::FIFO_CTRL, fifo_ctrl::RESET);
        assert_eq!(sim.pending(), 0);
        assert_eq!(sim.read(regs::FIFO_STATUS), 0);
    }
}
