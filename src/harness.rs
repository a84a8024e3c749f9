//! The clocked driver loop.
//!
//! Each iteration runs, in order: reset milestones, the transport pin
//! exchange (once active), trace and coverage capture, then one clock edge
//! and model evaluation. Termination is checked only between iterations.

use crate::capture::{CoverageSink, TraceSink};
use crate::clock::{SimClock, Timing};
use crate::config::AddressConfig;
use crate::error::Result;
use crate::jtag::{JtagStatus, Transport};
use crate::model::{Model, PinSnapshot};

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ModelFinished,
    TransportDisconnected,
    TransportError,
    TimeLimit,
}

impl Termination {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ModelFinished => "model finished",
            Self::TransportDisconnected => "jtag_vpi client disconnected",
            Self::TransportError => "jtag_vpi error encountered",
            Self::TimeLimit => "time limit reached",
        }
    }
}

/// Result of a single loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Finished,
    Disconnected,
    ProtocolError,
    TimeLimit,
}

impl StepOutcome {
    pub fn termination(self) -> Option<Termination> {
        match self {
            Self::Continue => None,
            Self::Finished => Some(Termination::ModelFinished),
            Self::Disconnected => Some(Termination::TransportDisconnected),
            Self::ProtocolError => Some(Termination::TransportError),
            Self::TimeLimit => Some(Termination::TimeLimit),
        }
    }
}

impl From<Termination> for StepOutcome {
    fn from(termination: Termination) -> Self {
        match termination {
            Termination::ModelFinished => Self::Finished,
            Termination::TransportDisconnected => Self::Disconnected,
            Termination::TransportError => Self::ProtocolError,
            Termination::TimeLimit => Self::TimeLimit,
        }
    }
}

/// Terminal flag. Set at most once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunState {
    termination: Option<Termination>,
}

impl RunState {
    pub fn finish(&mut self, cause: Termination) {
        if self.termination.is_none() {
            self.termination = Some(cause);
        }
    }

    pub fn is_done(&self) -> bool {
        self.termination.is_some()
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub termination: Termination,
    pub final_time: u64,
    pub iterations: u64,
    pub exchanges: u64,
}

pub struct Harness<'a, M: Model> {
    model: M,
    clock: SimClock,
    timing: Timing,
    transport: Transport,
    trace: Option<Box<dyn TraceSink + 'a>>,
    coverage: Option<Box<dyn CoverageSink + 'a>>,
    max_time: Option<u64>,
    state: RunState,
    reset: bool,
    jtag_trst_n: bool,
    iterations: u64,
    exchanges: u64,
}

impl<'a, M: Model> Harness<'a, M> {
    /// Wrap a model with reset asserted and the clock at its time-zero level.
    /// Fails without touching the model if `timing` has a zero step or
    /// tick divisor.
    pub fn new(mut model: M, timing: Timing) -> Result<Self> {
        timing.validate()?;
        let clock = SimClock::new(timing.step)?;
        model.set_clock(clock.level());
        model.set_reset(true);
        model.set_jtag_trst_n(false);

        Ok(Self {
            model,
            clock,
            timing,
            transport: Transport::Disabled,
            trace: None,
            coverage: None,
            max_time: None,
            state: RunState::default(),
            reset: true,
            jtag_trst_n: false,
            iterations: 0,
            exchanges: 0,
        })
    }

    pub fn with_addresses(mut self, addresses: &AddressConfig) -> Self {
        self.model.set_addresses(addresses);
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_trace(mut self, trace: Box<dyn TraceSink + 'a>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_coverage(mut self, coverage: Box<dyn CoverageSink + 'a>) -> Self {
        self.coverage = Some(coverage);
        self
    }

    pub fn with_max_time(mut self, max_time: Option<u64>) -> Self {
        self.max_time = max_time;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn reset_asserted(&self) -> bool {
        self.reset
    }

    pub fn jtag_trst_n(&self) -> bool {
        self.jtag_trst_n
    }

    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Pin levels as they stand before this iteration's clock edge.
    pub fn snapshot(&self) -> PinSnapshot {
        PinSnapshot {
            clock: self.clock.level(),
            reset: self.reset,
            jtag_trst_n: self.jtag_trst_n,
            jtag: self.model.jtag_pins(),
        }
    }

    /// Run one iteration. Once the run has ended this returns the recorded
    /// outcome without touching the model.
    pub fn step(&mut self) -> StepOutcome {
        if let Some(termination) = self.state.termination() {
            return termination.into();
        }

        let now = self.clock.time();

        if self.reset && now >= self.timing.reset_release {
            println!("Releasing reset");
            self.reset = false;
            self.model.set_reset(false);
        }

        if !self.jtag_trst_n && now >= self.timing.jtag_trst_release {
            println!("Releasing jtag_trst_n");
            self.jtag_trst_n = true;
            self.model.set_jtag_trst_n(true);
        }

        let mut outcome = StepOutcome::Continue;

        if self.transport.is_active() && now > self.timing.jtag_activation {
            self.exchanges += 1;
            let tick = now / self.timing.jtag_tick_divisor;
            match self.transport.exchange(tick, &mut self.model) {
                JtagStatus::Success => {}
                JtagStatus::ClientDisconnected => outcome = StepOutcome::Disconnected,
                JtagStatus::Error => outcome = StepOutcome::ProtocolError,
            }
        }

        self.capture(now);

        let level = self.clock.tick();
        self.model.set_clock(level);
        self.model.eval();
        self.iterations += 1;

        if outcome == StepOutcome::Continue {
            if self.model.finished() {
                outcome = StepOutcome::Finished;
            } else if self.max_time.is_some_and(|max| self.clock.time() >= max) {
                outcome = StepOutcome::TimeLimit;
            }
        }

        if let Some(termination) = outcome.termination() {
            if termination != Termination::ModelFinished {
                println!("Ending simulation. Reason: {}.", termination.reason());
            }
            self.state.finish(termination);
        }

        outcome
    }

    fn capture(&mut self, now: u64) {
        let pins = self.snapshot();

        if let Some(trace) = self.trace.as_mut() {
            if let Err(e) = trace.dump(now, &pins) {
                log::warn!("trace dump failed at time {}, tracing stopped: {}", now, e);
                self.trace = None;
            }
        }

        if let Some(coverage) = self.coverage.as_mut() {
            coverage.sample(&pins);
        }
    }

    /// Loop until a termination condition fires, then flush the trace and
    /// write coverage.
    pub fn run(&mut self) -> RunReport {
        while !self.state.is_done() {
            if self.model.finished() {
                self.state.finish(Termination::ModelFinished);
                break;
            }
            self.step();
        }

        if let Err(e) = self.shutdown() {
            log::error!("{}", e);
        }

        RunReport {
            termination: self.state.termination().unwrap_or(Termination::ModelFinished),
            final_time: self.clock.time(),
            iterations: self.iterations,
            exchanges: self.exchanges,
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        let traced = match self.trace.take() {
            Some(mut trace) => trace.close(),
            None => Ok(()),
        };
        let covered = match self.coverage.take() {
            Some(mut coverage) => coverage.write(),
            None => Ok(()),
        };
        traced.and(covered)
    }
}
