//! Command line handling and memory address resolution.
//!
//! The harness shares argv with the model runtime, so unknown options and
//! plus-args are passed through untouched instead of rejected.

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser};
use std::fmt;

use crate::error::Result;
use crate::symbols::{parse_hex_lenient, SymbolTable};

pub const DEFAULT_MAILBOX: u64 = 0xD058_0000;

pub const TRACE_FILE: &str = "sim.vcd";
pub const COVERAGE_FILE: &str = "coverage.dat";

const JTAG_ENABLE_PLUSARG: &str = "+jtag_vpi_enable=";

/// Options recognised by the harness, with the number of operands each takes.
const KNOWN_OPTIONS: &[(&str, usize)] = &[
    ("--symbols", 1),
    ("--mem-signature", 2),
    ("--mailbox-addr", 1),
    ("--mailbox-sym", 1),
    ("--max-time", 1),
    ("--trace", 0),
    ("--coverage", 0),
];

#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(
    name = "tb-sim",
    about = "Clocked testbench driver for a Verilated core",
    args_override_self = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct HarnessArgs {
    /// Symbol dump used to find `begin_signature` / `end_signature`.
    #[arg(
        long = "symbols",
        value_name = "PATH",
        action = ArgAction::Append,
        allow_hyphen_values = true
    )]
    pub symbols: Vec<Utf8PathBuf>,

    /// Explicit signature range as two hex addresses. Every occurrence adds
    /// a pair; the last pair is the one used.
    #[arg(
        long = "mem-signature",
        num_args = 2,
        value_names = ["BEGIN", "END"],
        action = ArgAction::Append,
        allow_hyphen_values = true
    )]
    pub mem_signature: Vec<String>,

    /// Explicit mailbox address in hex.
    #[arg(long = "mailbox-addr", value_name = "HEX", allow_hyphen_values = true)]
    pub mailbox_addr: Option<String>,

    /// Symbol whose address becomes the mailbox.
    #[arg(long = "mailbox-sym", value_name = "NAME", allow_hyphen_values = true)]
    pub mailbox_sym: Option<String>,

    /// Stop once virtual time reaches this value.
    #[arg(long = "max-time", value_name = "TIME", allow_hyphen_values = true)]
    pub max_time: Option<String>,

    /// Dump a waveform to `sim.vcd`.
    #[arg(long)]
    pub trace: bool,

    /// Write coverage data to `coverage.dat`.
    #[arg(long)]
    pub coverage: bool,

    /// Arguments the harness does not recognise, in order.
    #[arg(skip)]
    pub passthrough: Vec<String>,

    /// Every argument after the program name, recognised or not.
    #[arg(skip)]
    pub argv: Vec<String>,
}

impl HarnessArgs {
    /// Parse a full argv (program name first).
    pub fn from_argv<I, S>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv.next().unwrap_or_else(|| "tb-sim".to_string());
        let argv: Vec<String> = argv.collect();
        let (known, passthrough) = split_args(argv.iter().cloned());

        let mut args = Self::try_parse_from(std::iter::once(program).chain(known))?;
        args.passthrough = passthrough;
        args.argv = argv;
        Ok(args)
    }

    /// First argument starting with `prefix`, as Verilator's
    /// `commandArgsPlusMatch` does. Operands of harness options are searched
    /// too, since the model runtime sees the whole command line.
    pub fn plusarg_match(&self, prefix: &str) -> Option<&str> {
        self.argv
            .iter()
            .find(|arg| arg.starts_with(prefix))
            .map(String::as_str)
    }

    pub fn jtag_enabled(&self) -> bool {
        self.plusarg_match(JTAG_ENABLE_PLUSARG).is_some()
    }

    /// Plus-args meant for the model runtime.
    pub fn plusargs(&self) -> impl Iterator<Item = &str> {
        self.passthrough
            .iter()
            .filter(|arg| arg.starts_with('+'))
            .map(String::as_str)
    }

    /// The `--max-time` value, if it parses as a decimal time.
    pub fn max_time(&self) -> Option<u64> {
        let raw = self.max_time.as_deref()?;
        match raw.parse() {
            Ok(time) => Some(time),
            Err(_) => {
                log::warn!("ignoring --max-time {}: not a decimal time", raw);
                None
            }
        }
    }
}

/// Separate recognised options from everything else. A recognised option
/// without enough operands after it is dropped together with whatever
/// operands it did have.
pub fn split_args<I>(args: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    let mut known = Vec::new();
    let mut passthrough = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match KNOWN_OPTIONS.iter().find(|(name, _)| name == arg) {
            Some(&(_, arity)) if i + arity < args.len() => {
                known.extend(args[i..=i + arity].iter().cloned());
                i += arity + 1;
                continue;
            }
            Some(&(name, _)) => {
                log::warn!("ignoring {} without its operands", name);
                break;
            }
            None => passthrough.push(arg.clone()),
        }
        i += 1;
    }

    (known, passthrough)
}

/// The three addresses handed to the model before simulation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressConfig {
    pub signature_begin: u64,
    pub signature_end: u64,
    pub mailbox: u64,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            signature_begin: 0,
            signature_end: 0,
            mailbox: DEFAULT_MAILBOX,
        }
    }
}

impl fmt::Display for AddressConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "mem_signature_begin = {:08X}", self.signature_begin)?;
        writeln!(f, "mem_signature_end   = {:08X}", self.signature_end)?;
        write!(f, "mem_mailbox         = {:08X}", self.mailbox)
    }
}

impl AddressConfig {
    /// Apply overrides in fixed precedence: symbol file, explicit signature
    /// range, explicit mailbox address, mailbox symbol. Position on the
    /// command line does not matter.
    pub fn resolve(args: &HarnessArgs) -> Result<Self> {
        let tables = args
            .symbols
            .iter()
            .map(|path| SymbolTable::load(path))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::resolve_with(args, &tables))
    }

    /// Resolution against already loaded tables, one per `--symbols` in
    /// command line order. Mailbox symbols are looked up in the last one.
    pub fn resolve_with(args: &HarnessArgs, tables: &[SymbolTable]) -> Self {
        let mut config = Self::default();

        for table in tables {
            if let Some((begin, end)) = table.signature_bounds() {
                config.signature_begin = begin;
                config.signature_end = end;
            }
        }

        if let [.., begin, end] = args.mem_signature.as_slice() {
            config.signature_begin = parse_hex_lenient(begin);
            config.signature_end = parse_hex_lenient(end);
        }

        if let Some(addr) = &args.mailbox_addr {
            config.mailbox = parse_hex_lenient(addr);
        }

        if let Some(name) = &args.mailbox_sym {
            match tables.last().and_then(|table| table.get(name)) {
                Some(addr) => config.mailbox = addr,
                None => log::warn!(
                    "mailbox symbol '{}' not found, keeping {:08X}",
                    name,
                    config.mailbox
                ),
            }
        }

        log::info!("{:?}", config);
        config
    }
}
