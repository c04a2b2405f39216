//! FIFO transport
//!
//! The only path between host and engine. Instructions go in through
//! FIFO-in one word at a time; results come back through FIFO-out. Both
//! directions are strobed by pulsing a bit of the FIFO control register.
//!
//! # Ordering
//!
//! Words reach the engine in exactly the order [`FifoTransport::push_instruction`]
//! is called. Nothing is buffered or reordered on the host side.
//!
//! # End of vector
//!
//! EOV is sticky. The transport never clears it on its own: call
//! [`FifoTransport::clear_end_of_vector`] before pushing a kernel, or the
//! next completion check sees the previous pass.

use crate::error::Result;
use crate::fixed;
use crate::port::RegisterPort;
use crate::wait::{poll_until, PollConfig, Spin, WaitStrategy};
use imagine_chip::regs::{self, engine_ctrl, engine_status, fifo_ctrl, fifo_status};
use imagine_chip::{InstructionWord, OutputWord, Program};
use tracing::{debug, trace, warn};

/// One popped result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    /// A word was available.
    Valid {
        /// Signed fixed-point sample.
        value: i16,
        /// Attribute byte.
        attrib: u8,
    },
    /// FIFO-out was empty.
    Empty,
}

impl Sample {
    /// True for [`Sample::Valid`].
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Sample value, if any.
    pub const fn value(&self) -> Option<i16> {
        match self {
            Self::Valid { value, .. } => Some(*value),
            Self::Empty => None,
        }
    }
}

impl From<OutputWord> for Sample {
    fn from(word: OutputWord) -> Self {
        Self::Valid {
            value: word.value(),
            attrib: word.attrib(),
        }
    }
}

/// Handle owning the engine's register port.
#[derive(Debug)]
pub struct FifoTransport<P: RegisterPort> {
    port: P,
    poll: PollConfig,
    wait: Box<dyn WaitStrategy>,
    pushed: u64,
}

impl<P: RegisterPort> FifoTransport<P> {
    /// Transport that spins without bound on FIFO-full and EOV.
    pub fn new(port: P) -> Self {
        Self {
            port,
            poll: PollConfig::unbounded(),
            wait: Box::new(Spin),
            pushed: 0,
        }
    }

    /// Bound every status wait.
    #[must_use]
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Replace the wait strategy used between status reads.
    #[must_use]
    pub fn with_wait(mut self, wait: impl WaitStrategy + 'static) -> Self {
        self.wait = Box::new(wait);
        self
    }

    /// Poll bounds in effect.
    pub const fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Underlying port.
    pub const fn port(&self) -> &P {
        &self.port
    }

    /// Underlying port, mutably.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Give the port back.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Instruction words pushed through this handle.
    pub const fn instructions_pushed(&self) -> u64 {
        self.pushed
    }

    /// Push one instruction word, waiting while FIFO-in is full.
    ///
    /// With the default unbounded poll this can block forever if the
    /// engine never drains.
    ///
    /// # Errors
    ///
    /// Returns [`Timeout`](crate::ImagineError::Timeout) if a poll bound is
    /// configured and FIFO-in stays full. Nothing is written in that case.
    pub fn push_instruction(&mut self, word: InstructionWord) -> Result<()> {
        let port = &mut self.port;
        let mut warned = false;
        let waited = poll_until(&mut *self.wait, &self.poll, "FIFO-in space", || {
            let full = port.read(regs::FIFO_STATUS) & fifo_status::FINP_FULL != 0;
            if full && !warned {
                warn!("FIFO-in full, waiting");
                warned = true;
            }
            !full
        })?;
        if waited > 0 {
            debug!("FIFO-in drained after {waited} polls");
        }

        trace!("push {word}");
        self.port.write(regs::FINP_DATA, word.raw());
        self.pulse(regs::FIFO_CTRL, fifo_ctrl::FINP_WR);
        self.pushed += 1;
        Ok(())
    }

    /// Push a sequence of words in order. Returns how many were pushed.
    ///
    /// # Errors
    ///
    /// Stops at the first word that times out; earlier words are already in
    /// the engine.
    pub fn push_all(&mut self, words: impl IntoIterator<Item = InstructionWord>) -> Result<usize> {
        let mut count = 0;
        for word in words {
            self.push_instruction(word)?;
            count += 1;
        }
        Ok(count)
    }

    /// Push every word of a program, in order.
    ///
    /// # Errors
    ///
    /// Same as [`push_instruction`](Self::push_instruction).
    pub fn push_program(&mut self, program: &Program) -> Result<()> {
        debug!(
            "Pushing program '{}' ({} words)",
            program.name(),
            program.len()
        );
        self.push_all(program.words().iter().copied())?;
        Ok(())
    }

    /// Pop one result. Never blocks.
    ///
    /// Returns [`Sample::Empty`] without touching the read strobe when
    /// FIFO-out has nothing valid.
    pub fn pop_sample(&mut self) -> Sample {
        if self.port.read(regs::FIFO_STATUS) & fifo_status::FOUT_VALID == 0 {
            return Sample::Empty;
        }
        let word = OutputWord::from_raw(self.port.read(regs::FOUT_DATA));
        self.pulse(regs::FIFO_CTRL, fifo_ctrl::FOUT_RD);
        trace!("pop {:#010x}", word.raw());
        word.into()
    }

    /// Pop results until FIFO-out runs dry or `max` samples are collected.
    pub fn pop_vector(&mut self, max: usize) -> Vec<i16> {
        let mut out = Vec::new();
        while out.len() < max {
            match self.pop_sample() {
                Sample::Valid { value, .. } => out.push(value),
                Sample::Empty => break,
            }
        }
        debug!("Popped {} samples", out.len());
        out
    }

    /// [`pop_vector`](Self::pop_vector), scaled by `frac_width` fraction bits.
    pub fn pop_vector_f32(&mut self, max: usize, frac_width: u32) -> Vec<f32> {
        self.pop_vector(max)
            .into_iter()
            .map(|v| fixed::from_fixed(v, frac_width))
            .collect()
    }

    /// Read the sticky EOV flag.
    pub fn is_end_of_vector(&mut self) -> bool {
        self.port.read(regs::ENGINE_STATUS) & engine_status::EOV != 0
    }

    /// Acknowledge EOV.
    pub fn clear_end_of_vector(&mut self) {
        self.pulse(regs::ENGINE_CTRL, engine_ctrl::CLEAR_EOV);
    }

    /// Wait until EOV is set.
    ///
    /// # Errors
    ///
    /// Returns [`Timeout`](crate::ImagineError::Timeout) if a poll bound is
    /// configured and EOV does not rise.
    pub fn poll_until_complete(&mut self) -> Result<()> {
        let port = &mut self.port;
        let waited = poll_until(&mut *self.wait, &self.poll, "end of vector", || {
            port.read(regs::ENGINE_STATUS) & engine_status::EOV != 0
        })?;
        debug!("EOV after {waited} polls");
        Ok(())
    }

    /// Empty both FIFOs.
    pub fn reset_fifos(&mut self) {
        debug!("Resetting FIFOs");
        self.pulse(regs::FIFO_CTRL, fifo_ctrl::RESET);
    }

    /// Set then clear one bit, keeping the rest of the register.
    fn pulse(&mut self, reg: usize, bit: u32) {
        let ctrl = self.port.read(reg);
        self.port.write(reg, ctrl | bit);
        self.port.write(reg, ctrl & !bit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{BusEvent, SimulatedEngine};
    use crate::ImagineError;
    use imagine_chip::{EngineParams, ProgramConfig};

    fn sim() -> SimulatedEngine {
        SimulatedEngine::new(EngineParams::default())
    }

    #[test]
    fn push_writes_data_then_pulses() {
        let mut t = FifoTransport::new(sim().with_bus_log());
        t.push_instruction(InstructionWord::select_column(1)).unwrap();
        let writes: Vec<_> = t
            .port()
            .bus_log()
            .iter()
            .filter_map(|e| match *e {
                BusEvent::Write(r, v) => Some((r, v)),
                BusEvent::Read(..) => None,
            })
            .collect();
        assert_eq!(
            writes,
            vec![
                (regs::FINP_DATA, 0x1800_0001),
                (regs::FIFO_CTRL, fifo_ctrl::FINP_WR),
                (regs::FIFO_CTRL, 0),
            ]
        );
        assert_eq!(t.instructions_pushed(), 1);
    }

    #[test]
    fn push_waits_while_full() {
        let mut engine = sim().with_bus_log();
        engine.hold_input_full(3);
        let mut t = FifoTransport::new(engine);
        t.push_instruction(InstructionWord::nop()).unwrap();

        let log = t.port().bus_log();
        let status_reads = log
            .iter()
            .take_while(|e| !matches!(e, BusEvent::Write(..)))
            .filter(|e| matches!(e, BusEvent::Read(r, _) if *r == regs::FIFO_STATUS))
            .count();
        assert_eq!(status_reads, 4);
        assert_eq!(t.port().overflows(), 0);
        assert_eq!(t.port().write_strobes(), 1);
    }

    #[test]
    fn bounded_push_times_out_without_strobe() {
        let mut engine = sim();
        engine.hold_input_full(u64::MAX);
        let mut t = FifoTransport::new(engine).with_poll(PollConfig::unbounded().with_max_attempts(10));
        let err = t.push_instruction(InstructionWord::nop()).unwrap_err();
        assert!(matches!(err, ImagineError::Timeout { attempts: 10, .. }));
        assert_eq!(t.port().write_strobes(), 0);
        assert_eq!(t.instructions_pushed(), 0);
    }

    #[test]
    fn pop_empty_does_not_strobe() {
        let mut t = FifoTransport::new(sim());
        assert_eq!(t.pop_sample(), Sample::Empty);
        assert_eq!(t.port().read_strobes(), 0);
    }

    #[test]
    fn pop_decodes_and_strobes() {
        let mut engine = sim();
        engine.push_output(-1234, 0x5A);
        let mut t = FifoTransport::new(engine);
        assert_eq!(
            t.pop_sample(),
            Sample::Valid {
                value: -1234,
                attrib: 0x5A
            }
        );
        assert_eq!(t.port().read_strobes(), 1);
        assert_eq!(t.pop_sample(), Sample::Empty);
    }

    #[test]
    fn pop_vector_stops_at_first_empty() {
        let mut engine = sim();
        for v in [1, 2, 3] {
            engine.push_output(v, 0);
        }
        let mut t = FifoTransport::new(engine);
        assert_eq!(t.pop_vector(10), vec![1, 2, 3]);
        assert!(t.pop_vector(10).is_empty());
    }

    #[test]
    fn pop_vector_respects_max() {
        let mut engine = sim();
        for v in 0..5 {
            engine.push_output(v, 0);
        }
        let mut t = FifoTransport::new(engine);
        assert_eq!(t.pop_vector(2), vec![0, 1]);
        assert_eq!(t.pop_vector(10), vec![2, 3, 4]);
    }

    #[test]
    fn pop_vector_f32_scales() {
        let mut engine = sim();
        engine.push_output(384, 0);
        engine.push_output(-128, 0);
        let mut t = FifoTransport::new(engine);
        assert_eq!(t.pop_vector_f32(4, 8), vec![1.5, -0.5]);
    }

    #[test]
    fn eov_needs_explicit_clear() {
        let mut engine = sim();
        engine.raise_eov();
        let mut t = FifoTransport::new(engine);
        assert!(t.is_end_of_vector());
        assert!(t.is_end_of_vector());
        t.clear_end_of_vector();
        assert!(!t.is_end_of_vector());
    }

    #[test]
    fn poll_until_complete_bounded() {
        let mut t =
            FifoTransport::new(sim()).with_poll(PollConfig::unbounded().with_max_attempts(3));
        assert!(matches!(
            t.poll_until_complete(),
            Err(ImagineError::Timeout {
                waiting_for: "end of vector",
                ..
            })
        ));
        t.port_mut().raise_eov();
        t.poll_until_complete().unwrap();
    }

    #[test]
    fn program_words_arrive_in_order() {
        let raw = [0x4400_0000, 0x2000_0000, 0x0C3C_0080, 0x0000_0000, 0x4800_0000];
        let program = Program::from_raw_words("k", &raw, ProgramConfig::default());
        let mut t = FifoTransport::new(sim());
        t.push_program(&program).unwrap();
        let executed: Vec<u32> = t.port().executed().iter().map(|w| w.raw()).collect();
        assert_eq!(executed, raw);
    }

    #[test]
    fn reset_keeps_other_control_bits() {
        let mut engine = sim().with_bus_log();
        engine.write(regs::FIFO_CTRL, 0x8000_0000);
        let mut t = FifoTransport::new(engine);
        t.reset_fifos();
        let last: Vec<_> = t.port().bus_log().iter().rev().take(2).copied().collect();
        assert_eq!(
            last,
            vec![
                BusEvent::Write(regs::FIFO_CTRL, 0x8000_0000),
                BusEvent::Write(regs::FIFO_CTRL, 0x8000_0000 | fifo_ctrl::RESET),
            ]
        );
    }

    #[test]
    fn sample_accessors() {
        let valid = Sample::from(OutputWord::new(-7, 3));
        assert!(valid.is_valid());
        assert_eq!(valid.value(), Some(-7));
        assert!(!Sample::Empty.is_valid());
        assert_eq!(Sample::Empty.value(), None);
    }

    #[test]
    fn poll_config_defaults_to_unbounded() {
        let t = FifoTransport::new(sim());
        assert!(t.poll_config().is_unbounded());

        let bounded = t.with_poll(PollConfig::unbounded().with_max_attempts(5));
        assert_eq!(bounded.poll_config().max_attempts, Some(5));
        assert!(!bounded.poll_config().is_unbounded());
    }

    #[test]
    fn port_survives_the_transport() {
        let mut t = FifoTransport::new(sim());
        t.push_all([InstructionWord::nop(), InstructionWord::vv_sync()])
            .unwrap();
        let engine = t.into_port();
        assert_eq!(engine.executed().len(), 2);
        assert_eq!(engine.write_strobes(), 2);
    }
}
