use camino::Utf8PathBuf;
use std::io;
use std::net::SocketAddr;

/// Unrecoverable harness failures. Anything that reaches `main` as one of
/// these ends the process with a non-zero status.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Error loading symbols from '{path}'")]
    SymbolFile {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not initialize jtag_vpi server on {addr}")]
    TransportInit {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to write artifact '{path}'")]
    Artifact {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid timing: {0} must be non-zero")]
    InvalidTiming(&'static str),

    #[error("invalid command line: {0}")]
    Cli(#[from] clap::Error),
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
