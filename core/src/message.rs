//! Twitch IRC line classification and outgoing command framing
//!
//! Twitch chat speaks a line-oriented subset of the IRC protocol. Inbound
//! lines are classified into the three shapes the bot cares about: PING
//! keep-alives, PRIVMSG chat messages, and everything else. Outgoing
//! commands are built as plain text lines; the transport appends the CRLF
//! terminator.

/// Literal command token opening a keep-alive line
pub const PING_COMMAND: &str = "PING";

/// Literal marker token identifying a chat message line
pub const PRIVMSG_COMMAND: &str = "PRIVMSG";

/// One inbound server line, classified
///
/// Classification priority follows the protocol: a line starting with
/// `PING` is always a keep-alive, regardless of what else it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Keep-alive. `rest` is the exact remainder of the line after the
    /// `PING` token, preserved byte-for-byte for the PONG reply.
    Ping { rest: String },
    /// Chat message. `body` is everything after the first colon following
    /// the PRIVMSG marker.
    PrivMsg { body: String },
    /// Any other server line (notices, numerics); surfaced for diagnostics
    Other(String),
}

impl ServerLine {
    /// Classify a raw inbound line
    ///
    /// A line carrying the PRIVMSG marker but no colon after it is
    /// malformed and yields a `MessageParse` error; callers skip it.
    pub fn classify(line: &str) -> crate::Result<Self> {
        if let Some(rest) = line.strip_prefix(PING_COMMAND) {
            return Ok(ServerLine::Ping {
                rest: rest.to_string(),
            });
        }

        match line.find(PRIVMSG_COMMAND) {
            Some(pos) => {
                let after_marker = &line[pos + PRIVMSG_COMMAND.len()..];
                match after_marker.find(':') {
                    Some(colon) => Ok(ServerLine::PrivMsg {
                        body: after_marker[colon + 1..].to_string(),
                    }),
                    None => Err(crate::Error::MessageParse(format!(
                        "PRIVMSG line without message body: {}",
                        line
                    ))),
                }
            }
            None => Ok(ServerLine::Other(line.to_string())),
        }
    }
}

/// Normalize a channel name into a JOIN/PRIVMSG target (`#name`)
pub fn channel_target(name: &str) -> String {
    if name.starts_with('#') {
        name.to_string()
    } else {
        format!("#{}", name)
    }
}

/// Outgoing command constructors
///
/// Lines are returned without the CRLF terminator; `TransportWriter`
/// appends it on send.
pub mod command {
    /// `PASS <token>` - authenticate with the oauth token
    pub fn pass(token: &str) -> String {
        format!("PASS {}", token)
    }

    /// `NICK <nickname>` - identify the account
    pub fn nick(nickname: &str) -> String {
        format!("NICK {}", nickname)
    }

    /// `JOIN #<channel>` - join the chat channel
    pub fn join(channel: &str) -> String {
        format!("JOIN {}", channel)
    }

    /// `PONG<rest>` - keep-alive reply echoing the PING remainder verbatim
    pub fn pong(rest: &str) -> String {
        format!("PONG{}", rest)
    }

    /// `PRIVMSG #<channel> :<text>` - a chat message to the channel
    pub fn privmsg(channel: &str, text: &str) -> String {
        format!("PRIVMSG {} :{}", channel, text)
    }
}
