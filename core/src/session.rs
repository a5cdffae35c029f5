//! Session lifecycle: connect, authenticate, join, and run the two loops
//!
//! The controller owns the only public lifecycle in the crate. `start`
//! opens the transport, spawns the read loop, the writer pump, and the
//! protocol processor, then queues the `PASS`/`NICK`/`JOIN` handshake.
//! `stop` is idempotent and unblocks both loops promptly even when the
//! queue stays empty or the socket is quiet.

use crate::message::{channel_target, command};
use crate::queue::{IngestProducer, IngestQueue};
use crate::transport::{Transport, TransportReader, TransportWriter};
use crate::{Config, EmoteCounter, Error, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Session lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet started
    Created,
    /// Transport open attempted or in progress
    Connecting,
    /// Handshake sent, loops running
    Active,
    /// Stopped; terminal
    Closed,
}

/// Controls one chat session
pub struct SessionController {
    host: String,
    port: u16,
    // Session identity; immutable after construction
    channel: String,
    nickname: String,
    token: String,
    /// Counters handed to the processor at start
    counters: Option<Vec<EmoteCounter>>,
    state: SessionState,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionController {
    /// Create an idle session from configuration and the tracked counters
    pub fn new(config: &Config, counters: Vec<EmoteCounter>) -> Self {
        Self {
            host: config.connection.host.clone(),
            port: config.connection.port,
            channel: config.session.channel.clone(),
            nickname: config.session.nickname.clone(),
            token: config.session.token.clone(),
            counters: Some(counters),
            state: SessionState::Created,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Open the transport, spawn the loops, and send the handshake
    ///
    /// On connect failure the session stays in `Connecting`, no loops are
    /// spawned, and the error is returned to the caller.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Created {
            return Err(Error::Generic("session already started".to_string()));
        }
        self.state = SessionState::Connecting;

        let transport = Transport::connect(&self.host, self.port).await?;
        let (reader, writer) = transport.into_split();

        let (producer, consumer) = IngestQueue::new();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        self.tasks
            .push(tokio::spawn(read_loop(reader, producer, self.cancel.clone())));
        self.tasks.push(tokio::spawn(write_loop(
            writer,
            outbound_rx,
            self.cancel.clone(),
        )));

        let channel = channel_target(&self.channel);
        let counters = self.counters.take().unwrap_or_default();
        let processor =
            crate::ProtocolProcessor::new(channel.clone(), counters, outbound.clone());
        self.tasks
            .push(tokio::spawn(processor.run(consumer, self.cancel.clone())));

        // Handshake, each line flushed by the writer pump before the next.
        // The outbound channel is FIFO, so order is preserved even though
        // the processor already holds a sender.
        for line in [
            command::pass(&self.token),
            command::nick(&self.nickname),
            command::join(&channel),
        ] {
            outbound
                .send(line)
                .map_err(|_| Error::Write("connection writer is gone".to_string()))?;
        }

        info!("session active on {}", channel);
        self.state = SessionState::Active;
        Ok(())
    }

    /// Wait until the session ends: server-side close, a fatal transport
    /// error, or `stop`
    pub async fn wait(&self) {
        self.cancel.cancelled().await;
    }

    /// Stop the session
    ///
    /// Idempotent. Cancellation unblocks a processor parked on an empty
    /// queue and a read loop parked on a quiet socket; both tasks are
    /// awaited so nothing leaks.
    pub async fn stop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("session task panicked: {}", e);
            }
        }
        self.state = SessionState::Closed;
        info!("session closed");
    }

    /// Handle for requesting shutdown from another task
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Read loop: sole producer into the ingest queue
///
/// Ends on end-of-stream, read error, or cancellation; any exit cancels
/// the session token so the other loops wind down too. That is how a
/// dropped connection (the fate of an unanswered PING) terminates the
/// session.
async fn read_loop(
    mut reader: TransportReader,
    producer: IngestProducer,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = reader.read_line() => match result {
                Ok(Some(line)) => {
                    if producer.push(line).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("connection closed by server");
                    break;
                }
                Err(e) => {
                    error!("read failed: {}", e);
                    break;
                }
            },
        }
    }
    cancel.cancel();
    debug!("read loop over");
}

/// Writer pump: sole owner of the transport write half
///
/// Drains the outbound channel in FIFO order, flushing each line. A write
/// error ends the pump and cancels the session.
async fn write_loop(
    mut writer: TransportWriter,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = outbound.recv() => match line {
                Some(line) => {
                    if let Err(e) = writer.send_line(&line).await {
                        error!("write failed: {}", e);
                        break;
                    }
                }
                None => break,
            },
        }
    }
    let _ = writer.shutdown().await;
    cancel.cancel();
    debug!("write loop over");
}
