pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod harness;
pub mod jtag;
pub mod model;
pub mod symbols;
#[cfg(feature = "verilator")]
pub mod verilated;

pub use capture::{CoverageSink, PinTrace, ToggleCoverage, TraceSink};
pub use clock::{SimClock, Timing};
pub use config::{AddressConfig, HarnessArgs, COVERAGE_FILE, DEFAULT_MAILBOX, TRACE_FILE};
pub use error::HarnessError;
pub use harness::{Harness, RunReport, RunState, StepOutcome, Termination};
pub use jtag::{
    BitbangServer, JtagServer, JtagStatus, Transport, JTAG_LOOPBACK_ONLY, JTAG_SERVER_PORT,
};
pub use model::{JtagPins, Model, PinSnapshot};
pub use symbols::SymbolTable;
#[cfg(feature = "verilator")]
pub use verilated::*;
