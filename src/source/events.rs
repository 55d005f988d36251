//! Push transport for the backend's `GET /events` server-sent event stream.

use std::time::Duration;

use futures::{future, stream, StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use super::sse::SseDecoder;
use super::{EventStream, PushEvent, PushSource};
use crate::error::ChannelError;

pub struct HttpPushSource {
    client: reqwest::Client,
    url: String,
}

impl HttpPushSource {
    /// Only the connect phase is bounded: the stream itself stays open for
    /// as long as the server keeps it.
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl PushSource for HttpPushSource {
    fn subscribe(&self) -> EventStream {
        let request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        let connect = async move {
            let response = request
                .send()
                .await
                .map_err(|e| ChannelError::Connect(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ChannelError::Status(status.as_u16()));
            }

            let mut decoder = SseDecoder::new();
            let messages = response
                .bytes_stream()
                .map_err(|e| ChannelError::Transport(e.to_string()))
                .map_ok(move |chunk| {
                    stream::iter(
                        decoder
                            .feed(&chunk)
                            .into_iter()
                            .map(|event| Ok::<_, ChannelError>(PushEvent::Message(event))),
                    )
                })
                .try_flatten();

            Ok(stream::once(future::ready(Ok::<_, ChannelError>(PushEvent::Opened))).chain(messages))
        };

        stream::once(connect).try_flatten().boxed()
    }
}
