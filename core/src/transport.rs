//! TCP transport with line-based reads and CRLF-framed writes

use crate::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// An open connection to the chat server
pub struct Transport {
    stream: TcpStream,
}

impl Transport {
    /// Connect to the chat server
    ///
    /// DNS failure, refusal, and timeouts all surface as
    /// `Error::Connection`.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            Error::Connection(format!("failed to connect to {}:{}: {}", host, port, e))
        })?;
        tracing::info!("connected to {}:{}", host, port);
        Ok(Self { stream })
    }

    /// Split into independent read and write halves
    ///
    /// Reads and writes share the connection but buffer independently, so
    /// the two halves can live on different tasks.
    pub fn into_split(self) -> (TransportReader, TransportWriter) {
        let (read_half, write_half) = self.stream.into_split();
        (
            TransportReader {
                reader: BufReader::new(read_half),
                line: String::new(),
            },
            TransportWriter { writer: write_half },
        )
    }
}

/// Read half: blocking line-at-a-time reads
pub struct TransportReader {
    reader: BufReader<OwnedReadHalf>,
    line: String,
}

impl TransportReader {
    /// Read the next line, waiting until a full terminator-delimited line
    /// arrives
    ///
    /// Returns `Ok(None)` at end-of-stream. The returned line has its
    /// CR/LF terminator stripped.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        self.line.clear();
        let bytes = self.reader.read_line(&mut self.line).await?;
        if bytes == 0 {
            return Ok(None);
        }
        Ok(Some(
            self.line.trim_end_matches(['\r', '\n']).to_string(),
        ))
    }
}

/// Write half: CRLF-framed, flushed-per-line writes
pub struct TransportWriter {
    writer: OwnedWriteHalf,
}

impl TransportWriter {
    /// Send one protocol line
    ///
    /// Appends the CRLF terminator and flushes before returning, so
    /// command sequences reach the server in send order.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Write(format!("failed to send line: {}", e)))?;
        self.writer
            .write_all(b"\r\n")
            .await
            .map_err(|e| Error::Write(format!("failed to send line terminator: {}", e)))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::Write(format!("failed to flush: {}", e)))?;
        Ok(())
    }

    /// Shut down the write side of the connection
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| Error::Write(format!("failed to shut down connection: {}", e)))
    }
}
