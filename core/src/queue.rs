//! Inbound line queue decoupling the read loop from processing
//!
//! The read loop is the sole producer and the protocol processor the sole
//! consumer. The queue preserves arrival order end-to-end and never drops
//! or duplicates a line; a consumer parked on an empty queue wakes on the
//! next push.

use tokio::sync::mpsc;

/// One raw line read from the transport, terminator stripped
pub type RawLine = String;

/// FIFO queue of inbound lines
pub struct IngestQueue;

impl IngestQueue {
    /// Create the producer/consumer pair for one session
    pub fn new() -> (IngestProducer, IngestConsumer) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (IngestProducer { sender }, IngestConsumer { receiver })
    }
}

/// Producer half, owned by the read loop
pub struct IngestProducer {
    sender: mpsc::UnboundedSender<RawLine>,
}

impl IngestProducer {
    /// Append a line to the queue, waking the consumer if it is parked
    ///
    /// Fails only when the consumer has gone away.
    pub fn push(&self, line: RawLine) -> crate::Result<()> {
        self.sender
            .send(line)
            .map_err(|_| crate::Error::Generic("ingest queue consumer is gone".to_string()))
    }
}

/// Consumer half, owned by the processor loop
pub struct IngestConsumer {
    receiver: mpsc::UnboundedReceiver<RawLine>,
}

impl IngestConsumer {
    /// Remove and return the front line, waiting while the queue is empty
    ///
    /// Returns `None` once the producer has been dropped and the queue is
    /// drained; that is the end-of-stream signal for the processor.
    pub async fn pop(&mut self) -> Option<RawLine> {
        self.receiver.recv().await
    }
}
