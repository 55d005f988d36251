//! Data source abstraction layer.
//!
//! Two traits, one per direction the backend talks to us:
//!
//! * [`CardSource`] pulls a whole [`Snapshot`] on demand.
//! * [`PushSource`] opens the long-lived event stream that tells us *when*
//!   to pull.
//!
//! The HTTP implementations live in [`http`] and [`events`]; the sync engine
//! only ever sees the traits, which is what lets its tests swap in
//! in-memory sources.

mod card;
mod events;
mod http;
mod sse;

pub use card::{ArticleSummary, PersonCard, Snapshot, MAX_ARTICLES_PER_CARD};
pub use events::HttpPushSource;
pub use http::HttpCardSource;
pub use sse::ServerEvent;

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::error::{ChannelError, FetchError};

pub type FetchFuture = BoxFuture<'static, Result<Snapshot, FetchError>>;

/// Something that can produce a complete snapshot of cards.
///
/// The returned future is `'static` so the sync engine can spawn it and keep
/// several in flight at once.
pub trait CardSource: Send + Sync {
    /// Label used in log lines.
    fn name(&self) -> &str;

    /// Pull one snapshot.  No retries: the caller's timers provide those.
    fn fetch(&self) -> FetchFuture;
}

/// What a live connection yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// The server accepted the subscription.  Always the first item of a
    /// healthy stream.
    Opened,
    Message(ServerEvent),
}

/// A live connection.  The connection is over when the stream yields an
/// error or ends; both count as a transport failure.
pub type EventStream = BoxStream<'static, Result<PushEvent, ChannelError>>;

pub trait PushSource: Send + Sync {
    /// Open a new connection.  Nothing happens on the wire until the stream
    /// is first polled.
    fn subscribe(&self) -> EventStream;
}
