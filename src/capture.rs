//! Waveform and coverage capture.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use vcd::{IdCode, TimescaleUnit, Value};

use crate::error::{HarnessError, Result};
use crate::model::PinSnapshot;

/// Receives one dump per loop iteration and is closed once at the end.
pub trait TraceSink {
    fn dump(&mut self, time: u64, pins: &PinSnapshot) -> io::Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Observes pins every iteration and writes its results once at the end.
pub trait CoverageSink {
    fn sample(&mut self, pins: &PinSnapshot);
    fn write(&mut self) -> Result<()>;
}

/// VCD of the pins the harness drives and reads.
pub struct PinTrace {
    path: Utf8PathBuf,
    writer: vcd::Writer<BufWriter<File>>,
    ids: Vec<IdCode>,
    last: Option<[bool; 7]>,
}

impl PinTrace {
    pub fn create(path: &Utf8Path) -> Result<Self> {
        let artifact = |source| HarnessError::Artifact {
            path: path.to_owned(),
            source,
        };

        let file = File::create(path).map_err(artifact)?;
        let mut writer = vcd::Writer::new(BufWriter::new(file));
        let ids = Self::header(&mut writer).map_err(artifact)?;

        log::debug!("tracing pins to {}", path);
        Ok(Self {
            path: path.to_owned(),
            writer,
            ids,
            last: None,
        })
    }

    fn header(writer: &mut vcd::Writer<BufWriter<File>>) -> io::Result<Vec<IdCode>> {
        writer.timescale(1, TimescaleUnit::PS)?;
        writer.add_module("tb_top")?;
        let ids = PinSnapshot::NAMES
            .iter()
            .map(|name| writer.add_wire(1, name))
            .collect::<io::Result<Vec<_>>>()?;
        writer.upscope()?;
        writer.enddefinitions()?;
        Ok(ids)
    }
}

impl TraceSink for PinTrace {
    fn dump(&mut self, time: u64, pins: &PinSnapshot) -> io::Result<()> {
        let levels = pins.levels();
        if self.last == Some(levels) {
            return Ok(());
        }

        self.writer.timestamp(time)?;
        for (i, (&id, &level)) in self.ids.iter().zip(levels.iter()).enumerate() {
            if self.last.map_or(true, |last| last[i] != level) {
                let value = if level { Value::V1 } else { Value::V0 };
                self.writer.change_scalar(id, value)?;
            }
        }
        self.last = Some(levels);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush().map_err(|source| HarnessError::Artifact {
            path: self.path.clone(),
            source,
        })
    }
}

/// Rising and falling transition counts per pin.
#[derive(Debug, Clone)]
pub struct ToggleCoverage {
    path: Utf8PathBuf,
    last: Option<[bool; 7]>,
    rises: [u64; 7],
    falls: [u64; 7],
}

impl ToggleCoverage {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: None,
            rises: [0; 7],
            falls: [0; 7],
        }
    }

    pub fn rises(&self, pin: &str) -> Option<u64> {
        Self::index(pin).map(|i| self.rises[i])
    }

    pub fn falls(&self, pin: &str) -> Option<u64> {
        Self::index(pin).map(|i| self.falls[i])
    }

    fn index(pin: &str) -> Option<usize> {
        PinSnapshot::NAMES.iter().position(|name| *name == pin)
    }

    /// Coverage file contents in Verilator's `SystemC::Coverage-3` layout.
    pub fn render(&self) -> String {
        let mut out = String::from("# SystemC::Coverage-3\n");
        for (i, name) in PinSnapshot::NAMES.iter().enumerate() {
            for (edge, count) in [("0:1", self.rises[i]), ("1:0", self.falls[i])] {
                out.push_str(&format!(
                    concat!(
                        "C '\x01t\x02toggle\x01page\x02v_toggle/tb_top",
                        "\x01o\x02{}:{}\x01h\x02tb_top' {}\n",
                    ),
                    name, edge, count
                ));
            }
        }
        out
    }
}

impl CoverageSink for ToggleCoverage {
    fn sample(&mut self, pins: &PinSnapshot) {
        let levels = pins.levels();
        if let Some(last) = self.last {
            for (i, (&was, &now)) in last.iter().zip(levels.iter()).enumerate() {
                match (was, now) {
                    (false, true) => self.rises[i] += 1,
                    (true, false) => self.falls[i] += 1,
                    _ => {}
                }
            }
        }
        self.last = Some(levels);
    }

    fn write(&mut self) -> Result<()> {
        fs::write(&self.path, self.render()).map_err(|source| HarnessError::Artifact {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clocked(clock: bool) -> PinSnapshot {
        PinSnapshot {
            clock,
            ..Default::default()
        }
    }

    #[test]
    fn test_toggle_counts() {
        let mut cov = ToggleCoverage::new("coverage.dat");
        for level in [false, true, false, true, true] {
            cov.sample(&clocked(level));
        }
        assert_eq!(cov.rises("core_clk"), Some(2));
        assert_eq!(cov.falls("core_clk"), Some(1));
        assert_eq!(cov.rises("rst"), Some(0));
        assert_eq!(cov.rises("nope"), None);
    }

    #[test]
    fn test_render_layout() {
        let mut cov = ToggleCoverage::new("coverage.dat");
        cov.sample(&clocked(false));
        cov.sample(&clocked(true));
        let text = cov.render();
        assert!(text.starts_with("# SystemC::Coverage-3\n"));
        assert!(text.contains("core_clk:0:1\x01h\x02tb_top' 1\n"));
        assert_eq!(text.lines().count(), 1 + 2 * PinSnapshot::NAMES.len());
    }

    #[test]
    fn test_pin_trace_writes_vcd() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("sim.vcd")).unwrap();

        let mut trace = PinTrace::create(&path).unwrap();
        trace.dump(0, &clocked(false)).unwrap();
        trace.dump(10, &clocked(true)).unwrap();
        trace.dump(20, &clocked(true)).unwrap();
        trace.close().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("$enddefinitions"));
        assert!(text.contains("core_clk"));
        assert!(text.contains("#10"));
        assert!(!text.contains("#20"));
    }
}
