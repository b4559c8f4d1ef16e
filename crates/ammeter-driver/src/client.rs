//! Unified TCP client.
//!
//! One connection per measurement: connect, write the command bytes, read a
//! single reply chunk of at most [`MAX_REPLY_BYTES`], close. Every failure is
//! classified into an [`ErrorKind`] and returned as a failed [`Measurement`].

use crate::instrument::{parse_reply, AmmeterKind};
use ammeter_core::{Ammeter, ErrorKind, Measurement};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Default deadline for one whole exchange: connect, write and reply wait
/// together.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Largest reply read from an instrument.
pub const MAX_REPLY_BYTES: usize = 1024;

/// Client for one instrument.
#[derive(Debug, Clone)]
pub struct AmmeterClient {
    kind: AmmeterKind,
    instrument_id: String,
    host: String,
    port: u16,
    command: String,
    timeout: Duration,
}

impl AmmeterClient {
    /// Client with the kind's defaults: `localhost`, default port, canonical
    /// command, [`DEFAULT_TIMEOUT`].
    pub fn new(kind: AmmeterKind) -> Self {
        Self {
            kind,
            instrument_id: kind.as_str().to_string(),
            host: "localhost".to_string(),
            port: kind.default_port(),
            command: kind.canonical_command().to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the command bytes sent per request.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Override the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the instrument id stamped on measurements.
    pub fn with_instrument_id(mut self, id: impl Into<String>) -> Self {
        self.instrument_id = id.into();
        self
    }

    /// Instrument family.
    pub fn kind(&self) -> AmmeterKind {
        self.kind
    }

    /// `host:port` this client talks to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Command sent per request.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Timeout for each phase.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Take a single measurement outside of any sampling run and log it.
    pub async fn measure_once(&self) -> Measurement {
        let m = self.measure(0).await;
        match m.value() {
            Some(value) => info!(
                instrument_id = %self.instrument_id,
                address = %self.address(),
                current_a = value,
                latency_ms = m.latency().as_secs_f64() * 1000.0,
                "Received current measurement"
            ),
            None => warn!(
                instrument_id = %self.instrument_id,
                address = %self.address(),
                error_kind = ?m.error_kind(),
                "Measurement failed"
            ),
        }
        m
    }

    async fn exchange(&self) -> Result<f64, ErrorKind> {
        let addr = self.address();
        let now = Instant::now();
        // An unrepresentable timeout means "wait as long as tokio can".
        let deadline = now
            .checked_add(self.timeout)
            .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30));

        let mut stream = match timeout_at(deadline, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(address = %addr, error = %e, "Connect failed");
                return Err(ErrorKind::ConnectionError);
            }
            Err(_) => {
                debug!(address = %addr, "Connect timed out");
                return Err(ErrorKind::ConnectionError);
            }
        };
        // Best effort; the exchange works without it.
        let _ = stream.set_nodelay(true);

        match timeout_at(deadline, stream.write_all(self.command.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(address = %addr, error = %e, "Write failed");
                return Err(ErrorKind::ConnectionError);
            }
            Err(_) => return Err(ErrorKind::Timeout),
        }

        let mut buf = [0u8; MAX_REPLY_BYTES];
        let n = match timeout_at(deadline, stream.read(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                debug!(address = %addr, error = %e, "Read failed");
                return Err(ErrorKind::ConnectionError);
            }
            Err(_) => return Err(ErrorKind::Timeout),
        };

        let reply = &buf[..n];
        parse_reply(reply).ok_or_else(|| {
            debug!(
                address = %addr,
                reply = %String::from_utf8_lossy(reply),
                "Reply is not a reading"
            );
            ErrorKind::NoData
        })
    }
}

#[async_trait]
impl Ammeter for AmmeterClient {
    fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    async fn measure(&self, sequence_index: u64) -> Measurement {
        let started = Instant::now();
        let outcome = self.exchange().await;
        let latency = started.elapsed();

        match outcome {
            Ok(value) => Measurement::success(&self.instrument_id, sequence_index, value, latency),
            Err(kind) => {
                debug!(
                    instrument_id = %self.instrument_id,
                    sequence_index,
                    error_kind = %kind,
                    "Measurement failed"
                );
                Measurement::failure(&self.instrument_id, sequence_index, kind, latency)
            }
        }
    }
}
