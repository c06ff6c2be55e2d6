//! IngestActor - Receives sensor datagrams and drives them through the pipeline
//!
//! ## Message Flow
//!
//! ```text
//! recv_from ─► decode + enrich ─► Pipeline::deliver (persist, then broadcast)
//!     ↑                                    │
//!     │                    ok: yield   err/panic: log, backoff
//!     └────────────────────────────────────┘
//!
//! Commands (GetStats, Shutdown) are served between datagrams.
//! ```
//!
//! A failed iteration never ends the loop. Only a failed bind does, and that
//! is reported to the caller of [`IngestHandle::spawn`] without touching any
//! other component.

use std::any::Any;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::FutureExt;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::UdpConfig;
use crate::pipeline::Pipeline;
use crate::reading::{Origin, decode, ingestion_time};

use super::messages::{IngestCommand, IngestStats};

/// Largest datagram read in one go; longer packets are truncated
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Ingestion loop failures
#[derive(Debug)]
pub enum IngestError {
    /// The socket could not be bound; the loop never starts
    Bind { addr: SocketAddr, source: io::Error },

    /// Receiving from the socket failed
    Receive(io::Error),

    /// Processing a datagram panicked
    Panicked(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Bind { addr, source } => {
                write!(f, "Failed to bind datagram socket on {addr}: {source}")
            }
            IngestError::Receive(e) => write!(f, "Failed to receive datagram: {e}"),
            IngestError::Panicked(msg) => write!(f, "Datagram processing panicked: {msg}"),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Bind { source, .. } => Some(source),
            IngestError::Receive(e) => Some(e),
            IngestError::Panicked(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub bind_addr: SocketAddr,

    /// Pause after an iteration that failed
    pub error_backoff: Duration,

    pub buffer_size: usize,
}

impl IngestConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            error_backoff: Duration::from_secs(1),
            buffer_size: RECV_BUFFER_SIZE,
        }
    }

    pub fn with_backoff(mut self, error_backoff: Duration) -> Self {
        self.error_backoff = error_backoff;
        self
    }
}

impl From<&UdpConfig> for IngestConfig {
    fn from(config: &UdpConfig) -> Self {
        IngestConfig::new(config.bind_addr()).with_backoff(config.error_backoff())
    }
}

/// Bind a non-blocking UDP socket with address reuse enabled
fn bind_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Actor owning the datagram socket
pub struct IngestActor {
    socket: UdpSocket,
    local_addr: SocketAddr,
    pipeline: Pipeline,
    command_rx: mpsc::Receiver<IngestCommand>,
    buf: Vec<u8>,
    error_backoff: Duration,
    stats: IngestStats,
}

impl IngestActor {
    pub fn new(
        socket: UdpSocket,
        config: &IngestConfig,
        pipeline: Pipeline,
        command_rx: mpsc::Receiver<IngestCommand>,
    ) -> io::Result<Self> {
        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            pipeline,
            command_rx,
            buf: vec![0u8; config.buffer_size.max(1)],
            error_backoff: config.error_backoff,
            stats: IngestStats::default(),
        })
    }

    /// Run the actor's main loop
    ///
    /// Runs until a Shutdown command arrives or every handle is dropped.
    #[instrument(skip(self), fields(addr = %self.local_addr))]
    pub async fn run(mut self) {
        info!("listening for sensor datagrams");

        let ack = loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(IngestCommand::GetStats { respond_to }) => {
                            let _ = respond_to.send(self.stats.clone());
                        }
                        Some(IngestCommand::Shutdown { respond_to }) => {
                            debug!("received shutdown command");
                            break respond_to;
                        }
                        None => {
                            warn!("command channel closed, shutting down");
                            break None;
                        }
                    }
                }

                received = self.socket.recv_from(&mut self.buf) => {
                    let outcome = match received {
                        Ok((len, sender)) => self.handle_datagram(len, sender).await,
                        Err(e) => Err(IngestError::Receive(e)),
                    };

                    match outcome {
                        Ok(()) => tokio::task::yield_now().await,
                        Err(e) => {
                            self.stats.iteration_errors += 1;
                            error!("ingestion iteration failed: {e}");
                            tokio::time::sleep(self.error_backoff).await;
                        }
                    }
                }
            }
        };

        let stats = self.stats.clone();
        drop(self);
        info!(
            "ingestion stopped after {} packets ({} persisted)",
            stats.packets_received, stats.persisted
        );

        if let Some(respond_to) = ack {
            let _ = respond_to.send(stats);
        }
    }

    /// Decode one datagram and deliver it
    ///
    /// A panic anywhere in persistence or broadcast is caught here and
    /// returned as an ordinary iteration error.
    async fn handle_datagram(&mut self, len: usize, sender: SocketAddr) -> Result<(), IngestError> {
        self.stats.packets_received += 1;
        self.stats.last_packet_at = Some(ingestion_time());
        trace!("received {len} bytes from {sender}");

        let decoded = decode(&self.buf[..len]);
        if decoded.is_structured() {
            self.stats.structured += 1;
        } else {
            self.stats.unstructured += 1;
            debug!("datagram from {sender} is not structured, keeping raw text");
        }
        let reading = decoded.into_reading(Origin::Network(sender), ingestion_time());

        let delivery = AssertUnwindSafe(self.pipeline.deliver(reading))
            .catch_unwind()
            .await
            .map_err(|panic| IngestError::Panicked(panic_message(panic.as_ref())))?;

        if delivery.persisted() {
            self.stats.persisted += 1;
        } else {
            self.stats.persist_failures += 1;
        }

        Ok(())
    }
}

/// Handle for controlling an IngestActor
///
/// Cloneable; the loop keeps running while any handle is alive.
#[derive(Debug, Clone)]
pub struct IngestHandle {
    sender: mpsc::Sender<IngestCommand>,
    local_addr: SocketAddr,
}

impl IngestHandle {
    /// Bind the socket and spawn the loop
    ///
    /// Must be called inside a tokio runtime. A bind failure is returned and
    /// nothing is spawned.
    pub fn spawn(config: IngestConfig, pipeline: Pipeline) -> Result<Self, IngestError> {
        let bind_error = |source| IngestError::Bind {
            addr: config.bind_addr,
            source,
        };

        let socket = bind_socket(config.bind_addr).map_err(bind_error)?;

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = IngestActor::new(socket, &config, pipeline, cmd_rx).map_err(bind_error)?;
        let local_addr = actor.local_addr;

        tokio::spawn(actor.run());

        Ok(Self {
            sender: cmd_tx,
            local_addr,
        })
    }

    /// Address the socket is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn stats(&self) -> Result<IngestStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(IngestCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive stats")
    }

    /// Stop the loop and wait until the socket is released
    pub async fn shutdown(&self) -> Result<IngestStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(IngestCommand::Shutdown {
                respond_to: Some(tx),
            })
            .await
            .context("failed to send Shutdown command")?;

        rx.await.context("failed to receive final stats")
    }
}
