//! Debug transport bridging.
//!
//! The harness only ever sees a [`JtagStatus`] per exchange. What travels
//! on the socket is the server's business.

use std::future::Future;
use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::{Builder, Runtime};
use tokio::time::timeout;

use crate::error::{HarnessError, Result};
use crate::model::{JtagPins, Model};

pub const JTAG_SERVER_PORT: u16 = 5555;
pub const JTAG_LOOPBACK_ONLY: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JtagStatus {
    Success,
    ClientDisconnected,
    Error,
}

/// A transport server exchanging pin levels once per call.
pub trait JtagServer {
    /// Drive `tck`/`tms`/`tdi` in `pins` and sample `tdo` from it. `tick`
    /// is the transport's notion of time and only ever increases.
    fn do_jtag(&mut self, tick: u64, pins: &mut JtagPins) -> JtagStatus;
}

/// Either no transport at all, or one that is live for the whole run.
pub enum Transport {
    Disabled,
    Active(Box<dyn JtagServer>),
}

impl Transport {
    pub fn active(server: impl JtagServer + 'static) -> Self {
        Self::Active(Box::new(server))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// One pin exchange between the server and the model.
    pub fn exchange<M: Model + ?Sized>(&mut self, tick: u64, model: &mut M) -> JtagStatus {
        match self {
            Self::Disabled => JtagStatus::Success,
            Self::Active(server) => {
                let mut pins = model.jtag_pins();
                let status = server.do_jtag(tick, &mut pins);
                model.drive_jtag(&pins);
                status
            }
        }
    }
}

/// TCP server speaking OpenOCD's remote-bitbang commands, one command per
/// transport tick.
///
/// This is not the jtag_vpi wire protocol, even though `+jtag_vpi_enable`
/// turns it on. Point OpenOCD at it with `adapter driver remote_bitbang`.
/// A jtag_vpi client opens with a zero command byte, which this server
/// reports as [`JtagStatus::Error`].
pub struct BitbangServer {
    runtime: Runtime,
    listener: TcpListener,
    client: Option<TcpStream>,
    last_tick: Option<u64>,
    poll: Duration,
}

impl BitbangServer {
    pub fn bind(port: u16, loopback_only: bool) -> Result<Self> {
        let ip = if loopback_only {
            Ipv4Addr::LOCALHOST
        } else {
            Ipv4Addr::UNSPECIFIED
        };
        let addr = SocketAddr::from((ip, port));
        let init = |source| HarnessError::TransportInit { addr, source };

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(init)?;
        let listener = runtime.block_on(TcpListener::bind(addr)).map_err(init)?;

        log::info!("jtag server listening on {}", addr);
        Ok(Self {
            runtime,
            listener,
            client: None,
            last_tick: None,
            poll: Duration::ZERO,
        })
    }

    /// How long one exchange may wait for a client or a command. Zero, the
    /// default, never blocks: each exchange turns the I/O driver once.
    pub fn with_poll_timeout(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll
    }

    fn try_accept(&mut self) {
        match poll_for(&self.runtime, self.poll, self.listener.accept()) {
            Some(Ok((stream, peer))) => {
                if let Err(e) = stream.set_nodelay(true) {
                    log::debug!("set_nodelay failed: {}", e);
                }
                log::info!("jtag client connected from {}", peer);
                self.client = Some(stream);
            }
            Some(Err(e)) => log::warn!("jtag accept failed: {}", e),
            None => {}
        }
    }

    fn read_command(&mut self) -> io::Result<Option<u8>> {
        let Self {
            runtime,
            client,
            poll,
            ..
        } = self;
        let Some(stream) = client.as_mut() else {
            return Ok(None);
        };

        let mut byte = [0u8; 1];
        match poll_for(runtime, *poll, stream.read(&mut byte)) {
            None => Ok(None),
            Some(Ok(0)) => Err(ErrorKind::UnexpectedEof.into()),
            Some(Ok(_)) => Ok(Some(byte[0])),
            Some(Err(e)) => Err(e),
        }
    }

    fn send_tdo(&mut self, tdo: bool) -> io::Result<()> {
        let Self {
            runtime, client, ..
        } = self;
        match client.as_mut() {
            Some(stream) => {
                let reply = if tdo { b'1' } else { b'0' };
                runtime.block_on(stream.write_all(&[reply]))
            }
            None => Ok(()),
        }
    }

    fn command(&mut self, cmd: u8, pins: &mut JtagPins) -> JtagStatus {
        match cmd {
            b'0'..=b'7' => {
                let bits = cmd - b'0';
                pins.tck = bits & 0b100 != 0;
                pins.tms = bits & 0b010 != 0;
                pins.tdi = bits & 0b001 != 0;
                JtagStatus::Success
            }
            b'R' => match self.send_tdo(pins.tdo) {
                Ok(()) => JtagStatus::Success,
                Err(e) => io_status(&e),
            },
            b'Q' => JtagStatus::ClientDisconnected,
            b'B' | b'b' | b'r'..=b'u' | b'\r' | b'\n' => JtagStatus::Success,
            0 => {
                log::warn!("jtag client sent a jtag_vpi frame; this server speaks remote_bitbang");
                JtagStatus::Error
            }
            other => {
                log::warn!("unexpected jtag command byte {:#04x}", other);
                JtagStatus::Error
            }
        }
    }
}

impl JtagServer for BitbangServer {
    fn do_jtag(&mut self, tick: u64, pins: &mut JtagPins) -> JtagStatus {
        if self.last_tick == Some(tick) {
            return JtagStatus::Success;
        }
        self.last_tick = Some(tick);

        if self.client.is_none() {
            self.try_accept();
            return JtagStatus::Success;
        }

        match self.read_command() {
            Ok(Some(cmd)) => self.command(cmd, pins),
            Ok(None) => JtagStatus::Success,
            Err(e) => io_status(&e),
        }
    }
}

/// Run `fut` until it completes or `wait` elapses. A zero `wait` gives the
/// runtime one pass over ready I/O and returns `None` if that was not enough.
fn poll_for<F: Future>(runtime: &Runtime, wait: Duration, fut: F) -> Option<F::Output> {
    runtime.block_on(async {
        if wait.is_zero() {
            tokio::select! {
                biased;
                out = fut => Some(out),
                _ = tokio::task::yield_now() => None,
            }
        } else {
            timeout(wait, fut).await.ok()
        }
    })
}

fn io_status(e: &io::Error) -> JtagStatus {
    match e.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => JtagStatus::ClientDisconnected,
        _ => {
            log::warn!("jtag transport error: {}", e);
            JtagStatus::Error
        }
    }
}
