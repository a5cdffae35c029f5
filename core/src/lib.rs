//! Twitch emote counting bot core
//!
//! Connects to Twitch chat over its line-oriented IRC interface, joins a
//! channel, and counts whole-word occurrences of configured emote tokens
//! in chat, answering the `!emotecount <token>` chat command with the
//! running count.

pub mod config;
pub mod emote;
pub mod error;
pub mod message;
pub mod processor;
pub mod queue;
pub mod session;
pub mod transport;

pub use config::{Config, ConnectionConfig, SessionConfig};
pub use emote::{EmoteCallback, EmoteCounter, EmoteEvent, EmoteEventKind};
pub use error::{Error, Result};
pub use message::ServerLine;
pub use processor::ProtocolProcessor;
pub use queue::{IngestConsumer, IngestProducer, IngestQueue, RawLine};
pub use session::{SessionController, SessionState};
pub use transport::{Transport, TransportReader, TransportWriter};

/// Re-exports for convenience
pub use tracing::{debug, error, info, warn};
