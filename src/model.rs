//! Interface to the hardware model under test.

use crate::config::AddressConfig;

/// JTAG pin levels as seen at the model boundary. The transport drives
/// `tck`, `tms` and `tdi`; `tdo` comes from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JtagPins {
    pub tck: bool,
    pub tms: bool,
    pub tdi: bool,
    pub tdo: bool,
}

/// A stepped model exposing the testbench pins.
pub trait Model {
    fn set_clock(&mut self, level: bool);
    fn set_reset(&mut self, asserted: bool);
    fn set_jtag_trst_n(&mut self, level: bool);

    /// Current JTAG inputs together with the model's `tdo`.
    fn jtag_pins(&self) -> JtagPins;
    /// Drive `tck`, `tms` and `tdi`. `tdo` is ignored.
    fn drive_jtag(&mut self, pins: &JtagPins);

    fn set_addresses(&mut self, addresses: &AddressConfig);

    /// Evaluate the model for the current inputs.
    fn eval(&mut self);

    /// True once the design has requested the end of simulation.
    fn finished(&self) -> bool;
}

/// Pin snapshot used by the trace and coverage sinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinSnapshot {
    pub clock: bool,
    pub reset: bool,
    pub jtag_trst_n: bool,
    pub jtag: JtagPins,
}

impl PinSnapshot {
    pub const NAMES: [&'static str; 7] = [
        "core_clk",
        "rst",
        "i_jtag_trst_n",
        "i_jtag_tck",
        "i_jtag_tms",
        "i_jtag_tdi",
        "o_jtag_tdo",
    ];

    /// Pin levels in the order of [`PinSnapshot::NAMES`].
    pub fn levels(&self) -> [bool; 7] {
        [
            self.clock,
            self.reset,
            self.jtag_trst_n,
            self.jtag.tck,
            self.jtag.tms,
            self.jtag.tdi,
            self.jtag.tdo,
        ]
    }
}
