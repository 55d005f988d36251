//! Error types shared by the data sources and the sync engine.
//!
//! Only [`FetchError`] ever reaches the screen.  [`ChannelError`] is absorbed
//! by the push channel manager, which degrades to polling and reconnects.

use thiserror::Error;

/// A failed pull of the cards endpoint.
///
/// The `Display` output is what the status bar shows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be sent or the body could not be received.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("Failed to fetch cards: HTTP {0}")]
    Http(u16),

    /// The body was not the JSON we expect.
    #[error("Malformed cards response: {0}")]
    Parse(String),
}

/// A failure of the server-push transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("could not connect: {0}")]
    Connect(String),

    #[error("event stream refused with HTTP {0}")]
    Status(u16),

    #[error("event stream broke: {0}")]
    Transport(String),

    #[error("event stream closed by server")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
