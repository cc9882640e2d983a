//! Channel to the remote assistant.
//!
//! `Connector::connect` returns immediately; the outcome of the connection
//! attempt, every received frame and the final disconnect are posted to the
//! session's [`EventQueue`]. Sends are fire-and-forget.

use crate::error::{AssistantError, AssistantResult};
use crate::events::{EventQueue, TransportEvent};
use crate::protocol::OutboundFrame;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

pub trait Channel: Send {
    fn send(&self, frame: &OutboundFrame) -> AssistantResult<()>;
    fn close(&mut self);
}

pub trait Connector: Send {
    fn connect(&mut self, url: &Url, events: EventQueue) -> Box<dyn Channel>;
}

/// WebSocket connector. Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&mut self, url: &Url, events: EventQueue) -> Box<dyn Channel> {
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(url.to_string(), outbox_rx, events));
        Box::new(WsChannel {
            outbox: Some(outbox_tx),
        })
    }
}

struct WsChannel {
    outbox: Option<mpsc::UnboundedSender<Message>>,
}

impl Channel for WsChannel {
    fn send(&self, frame: &OutboundFrame) -> AssistantResult<()> {
        let outbox = self.outbox.as_ref().ok_or(AssistantError::ChannelClosed)?;
        let json = frame.to_json()?;
        outbox
            .send(Message::Text(json.into()))
            .map_err(|_| AssistantError::ChannelClosed)
    }

    fn close(&mut self) {
        // Dropping the sender makes the socket task send a close frame and exit.
        self.outbox.take();
    }
}

async fn run_socket(
    url: String,
    mut outbox: mpsc::UnboundedReceiver<Message>,
    events: EventQueue,
) {
    debug!("connecting to assistant at {}", url);
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(err) => {
            warn!("assistant connection failed: {}", err);
            events.transport(TransportEvent::Closed {
                reason: Some(err.to_string()),
            });
            return;
        }
    };
    info!("assistant channel open");
    events.transport(TransportEvent::Opened);

    let (mut sink, mut source) = stream.split();
    let reason = loop {
        tokio::select! {
            outgoing = outbox.recv() => match outgoing {
                Some(message) => {
                    if let Err(err) = sink.send(message).await {
                        break Some(err.to_string());
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break None;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    events.transport(TransportEvent::Frame(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(_))) | None => break None,
                Some(Ok(other)) => debug!("ignoring non-text frame ({} bytes)", other.len()),
                Some(Err(err)) => break Some(err.to_string()),
            },
        }
    };

    match &reason {
        Some(reason) => warn!("assistant channel dropped: {}", reason),
        None => info!("assistant channel closed"),
    }
    events.transport(TransportEvent::Closed { reason });
}
