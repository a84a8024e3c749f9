//! Verilator-backed `tb_top` model.
//!
//! `tb_top.sv` wraps the core and exposes the testbench pins plus an
//! `o_finished` flag raised when the design calls `$finish`.

use camino::Utf8Path;
use eyre::Result;
use marlin::{
    verilator::{vcd::Vcd, VerilatedModelConfig, VerilatorRuntime, VerilatorRuntimeOptions},
    verilog::prelude::*,
};
use std::io;

use crate::capture::TraceSink;
use crate::config::AddressConfig;
use crate::model::{JtagPins, Model, PinSnapshot};

#[verilog(src = "tb_top.sv", name = "tb_top")]
pub struct TbTop;

pub fn create_tb_runtime() -> Result<VerilatorRuntime> {
    let include_paths = [Utf8Path::new("rtl"), Utf8Path::new(".")];
    let src_files = [Utf8Path::new("tb_top.sv")];

    VerilatorRuntime::new(
        Utf8Path::new("artifacts"),
        &src_files,
        &include_paths,
        [],
        VerilatorRuntimeOptions::default_logging(),
    )
    .map_err(|e| eyre::eyre!("Failed to create runtime: {}", e))
}

pub fn create_tb_model(runtime: &VerilatorRuntime, enable_tracing: bool) -> Result<TbTop<'_>> {
    runtime
        .create_model::<TbTop>(&VerilatedModelConfig {
            enable_tracing,
            ..Default::default()
        })
        .map_err(|e| eyre::eyre!("Failed to create tb_top model: {:?}", e))
}

impl Model for TbTop<'_> {
    fn set_clock(&mut self, level: bool) {
        self.core_clk = level as u8;
    }

    fn set_reset(&mut self, asserted: bool) {
        self.rst = asserted as u8;
    }

    fn set_jtag_trst_n(&mut self, level: bool) {
        self.i_jtag_trst_n = level as u8;
    }

    fn jtag_pins(&self) -> JtagPins {
        JtagPins {
            tck: self.i_jtag_tck != 0,
            tms: self.i_jtag_tms != 0,
            tdi: self.i_jtag_tdi != 0,
            tdo: self.o_jtag_tdo != 0,
        }
    }

    fn drive_jtag(&mut self, pins: &JtagPins) {
        self.i_jtag_tck = pins.tck as u8;
        self.i_jtag_tms = pins.tms as u8;
        self.i_jtag_tdi = pins.tdi as u8;
    }

    // The model ports are 32 bits wide.
    fn set_addresses(&mut self, addresses: &AddressConfig) {
        self.mem_signature_begin = addresses.signature_begin as u32;
        self.mem_signature_end = addresses.signature_end as u32;
        self.mem_mailbox = addresses.mailbox as u32;
    }

    fn eval(&mut self) {
        TbTop::eval(self);
    }

    fn finished(&self) -> bool {
        self.o_finished != 0
    }
}

/// Full-design waveform from Verilator's own tracer.
pub struct ModelTrace<'ctx> {
    vcd: Vcd<'ctx>,
}

impl<'ctx> ModelTrace<'ctx> {
    pub fn open(top: &mut TbTop<'ctx>, path: &Utf8Path) -> Self {
        Self {
            vcd: top.open_vcd(path),
        }
    }
}

impl TraceSink for ModelTrace<'_> {
    fn dump(&mut self, time: u64, _pins: &PinSnapshot) -> io::Result<()> {
        self.vcd.dump(time);
        Ok(())
    }

    // The VCD is flushed and closed when dropped.
    fn close(&mut self) -> crate::error::Result<()> {
        Ok(())
    }
}
