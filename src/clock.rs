//! Virtual time base.

use crate::error::{HarnessError, Result};

/// Time constants for the clocked loop. All values are in virtual time
/// units; one `step` is half a clock period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub step: u64,
    pub reset_release: u64,
    pub jtag_trst_release: u64,
    /// Pin exchange runs only when time is strictly greater than this.
    pub jtag_activation: u64,
    /// Virtual time per transport tick.
    pub jtag_tick_divisor: u64,
}

impl Timing {
    /// Reject values the loop divides by.
    pub fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(HarnessError::InvalidTiming("step"));
        }
        if self.jtag_tick_divisor == 0 {
            return Err(HarnessError::InvalidTiming("jtag_tick_divisor"));
        }
        Ok(())
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            step: 10,
            reset_release: 100,
            jtag_trst_release: 200,
            jtag_activation: 300,
            jtag_tick_divisor: 20,
        }
    }
}

/// Monotonic virtual time and the clock level derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimClock {
    time: u64,
    step: u64,
}

impl SimClock {
    pub fn new(step: u64) -> Result<Self> {
        if step == 0 {
            return Err(HarnessError::InvalidTiming("step"));
        }
        Ok(Self { time: 0, step })
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    /// Clock level for the current time: low on even half periods.
    pub fn level(&self) -> bool {
        (self.time / self.step) % 2 == 1
    }

    /// Advance one half period and return the new clock level.
    pub fn tick(&mut self) -> bool {
        self.time += self.step;
        self.level()
    }
}
