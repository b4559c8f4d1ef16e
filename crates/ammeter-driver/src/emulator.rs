//! In-process instrument emulators.
//!
//! Each [`EmulatorServer`] listens on TCP, reads one request of at most 1024
//! bytes per connection, and answers with a bare decimal current in amperes.
//! Unknown commands get [`UNSUPPORTED_REPLY`]. Test behaviours reproduce the
//! misbehaving instruments the client has to classify.

use crate::instrument::{AmmeterKind, UNSUPPORTED_REPLY};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpSocket, TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const REQUEST_BYTES: usize = 1024;
const LISTEN_BACKLOG: u32 = 128;

/// How an emulator answers a request.
#[derive(Debug, Clone, PartialEq)]
pub enum EmulatorBehavior {
    /// Simulated reading from the instrument's physical model.
    Normal,
    /// Always the same reading.
    Fixed(f64),
    /// Always the given text, whatever it is.
    Garbage(String),
    /// Accept the request and never reply.
    Hang,
    /// Close the connection without replying.
    Empty,
}

/// Seeded reading generator shared by the connection tasks of one server.
struct ReadingModel {
    kind: AmmeterKind,
    rng: Mutex<ChaCha8Rng>,
}

impl ReadingModel {
    fn new(kind: AmmeterKind, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            kind,
            rng: Mutex::new(rng),
        }
    }

    fn next_current(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        simulate_current(self.kind, &mut *rng)
    }
}

/// One simulated current reading for `kind`, in amperes.
///
/// - Greenlee: Ohm's law on a random voltage across a random resistance
/// - Entes: Hall-sensor field divided by the sensor sensitivity
/// - Circutor: ten voltage samples integrated over a random time step
pub fn simulate_current<R: Rng + ?Sized>(kind: AmmeterKind, rng: &mut R) -> f64 {
    match kind {
        AmmeterKind::Greenlee => {
            let voltage = rng.gen_range(1.0..10.0);
            let resistance = rng.gen_range(10.0..100.0);
            voltage / resistance
        }
        AmmeterKind::Entes => {
            let field_mt = rng.gen_range(0.01..0.1);
            let sensitivity = rng.gen_range(0.1..1.0);
            field_mt / sensitivity
        }
        AmmeterKind::Circutor => {
            let time_step = rng.gen_range(0.001..0.01);
            (0..10).map(|_| rng.gen_range(0.1..1.0) * time_step).sum()
        }
    }
}

/// A running emulator. Stops when dropped.
pub struct EmulatorServer {
    kind: AmmeterKind,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl EmulatorServer {
    /// Bind `addr` and start serving in the background.
    ///
    /// Port 0 picks a free port; see [`local_addr`](Self::local_addr).
    pub async fn spawn(
        kind: AmmeterKind,
        addr: impl ToSocketAddrs,
        behavior: EmulatorBehavior,
        seed: Option<u64>,
    ) -> io::Result<Self> {
        let bind_addr = lookup_host(addr).await?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
        })?;

        let socket = if bind_addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        // Quick restarts on the fixed ports.
        socket.set_reuseaddr(true)?;
        socket.bind(bind_addr)?;
        let listener = socket.listen(LISTEN_BACKLOG)?;
        let local_addr = listener.local_addr()?;

        info!(kind = %kind, address = %local_addr, behavior = ?behavior, "Emulator listening");

        let model = Arc::new(ReadingModel::new(kind, seed));
        let behavior = Arc::new(behavior);

        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((socket, peer)) => {
                        let model = Arc::clone(&model);
                        let behavior = Arc::clone(&behavior);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(socket, &model, &behavior).await {
                                debug!(kind = %model.kind, peer = %peer, error = %e, "Connection error");
                            }
                        });
                    }
                    Err(e) => warn!(kind = %kind, error = %e, "Accept error"),
                }
            }
        });

        Ok(Self {
            kind,
            local_addr,
            task,
        })
    }

    /// Instrument family served.
    pub fn kind(&self) -> AmmeterKind {
        self.kind
    }

    /// Bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }
}

impl Drop for EmulatorServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for EmulatorServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmulatorServer")
            .field("kind", &self.kind)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    model: &ReadingModel,
    behavior: &EmulatorBehavior,
) -> io::Result<()> {
    let mut buf = [0u8; REQUEST_BYTES];
    let n = socket.read(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }

    let reply = match behavior {
        EmulatorBehavior::Empty => return Ok(()),
        EmulatorBehavior::Hang => {
            // Hold the connection until the client gives up.
            while socket.read(&mut buf).await? > 0 {}
            return Ok(());
        }
        EmulatorBehavior::Garbage(text) => text.clone(),
        EmulatorBehavior::Fixed(_) | EmulatorBehavior::Normal => {
            let command = String::from_utf8_lossy(&buf[..n]);
            if !model.kind.accepts(&command) {
                debug!(kind = %model.kind, command = %command, "Unsupported command");
                UNSUPPORTED_REPLY.to_string()
            } else if let EmulatorBehavior::Fixed(value) = behavior {
                value.to_string()
            } else {
                model.next_current().to_string()
            }
        }
    };

    socket.write_all(reply.as_bytes()).await?;
    socket.shutdown().await
}
