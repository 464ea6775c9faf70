//! Per-match event fan-out over WebSockets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::ws::{Message, WebSocket};
use drones_game::{EventPublisher, MatchEvent, MatchId, PublishError};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Frames buffered per match before slow subscribers start lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Registry of one broadcast channel per match.
///
/// Channels are created when the first client joins and dropped when the
/// last one leaves, or once a publish finds nobody listening.
#[derive(Debug, Clone, Default)]
pub struct EventHub {
    channels: Arc<Mutex<HashMap<MatchId, broadcast::Sender<String>>>>,
}

impl EventHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<MatchId, broadcast::Sender<String>>> {
        // The map holds only senders, so a poisoned guard is still consistent.
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribes to every frame published for `match_id` from now on.
    #[instrument(skip(self))]
    pub fn subscribe(&self, match_id: MatchId) -> broadcast::Receiver<String> {
        let mut channels = self.channels();
        let sender = channels
            .entry(match_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        let receiver = sender.subscribe();
        debug!(subscribers = sender.receiver_count(), "Subscribed to match");
        receiver
    }

    /// Drops the channel for `match_id` if no receiver is left on it.
    ///
    /// Call only after the caller's own receiver has been dropped.
    #[instrument(skip(self))]
    pub fn unsubscribe(&self, match_id: MatchId) {
        let mut channels = self.channels();
        if channels
            .get(&match_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&match_id);
            debug!("Last subscriber left, channel dropped");
        }
    }

    /// Live subscribers for a match.
    pub fn subscriber_count(&self, match_id: MatchId) -> usize {
        self.channels()
            .get(&match_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Matches that currently have a channel.
    pub fn channel_count(&self) -> usize {
        self.channels().len()
    }
}

/// Wire form of an event pushed to subscribers.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventFrame<'a> {
    match_id: MatchId,
    #[serde(flatten)]
    event: &'a MatchEvent,
}

/// Encodes `event` as the JSON frame clients receive.
pub fn encode_frame(match_id: MatchId, event: &MatchEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(&EventFrame { match_id, event })
}

impl EventPublisher for EventHub {
    fn publish(&self, match_id: MatchId, event: MatchEvent) -> Result<(), PublishError> {
        let frame = encode_frame(match_id, &event)
            .map_err(|e| PublishError::new(match_id, format!("Cannot encode event: {}", e)))?;

        let mut channels = self.channels();
        let Some(sender) = channels.get(&match_id) else {
            debug!(match_id, event = event.name(), "No channel for match");
            return Ok(());
        };

        match sender.send(frame) {
            Ok(delivered) => {
                debug!(match_id, event = event.name(), delivered, "Event broadcast");
            }
            Err(_) => {
                debug!(match_id, "Channel has no subscribers, dropping it");
                channels.remove(&match_id);
            }
        }
        Ok(())
    }
}

/// Messages a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    #[serde(rename = "joinGame")]
    JoinGame {
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    #[serde(rename = "leaveGame")]
    LeaveGame {
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
}

/// Acknowledgements sent back to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerReply {
    #[serde(rename = "joined")]
    Joined {
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    #[serde(rename = "left")]
    Left {
        #[serde(rename = "matchId")]
        match_id: MatchId,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Drives one client connection until it closes.
///
/// Each joined match gets a forwarding task; leaving a match or closing the
/// socket aborts it, which drops the broadcast receiver.
#[instrument(skip_all)]
pub async fn serve_socket(socket: WebSocket, hub: EventHub) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let write_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut joined: HashMap<MatchId, JoinHandle<()>> = HashMap::new();
    info!("Client connected");

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(ClientMessage::JoinGame { match_id }) => {
                    if !joined.contains_key(&match_id) {
                        let receiver = hub.subscribe(match_id);
                        joined.insert(match_id, forward(receiver, tx.clone(), match_id));
                    }
                    info!(match_id, "Client joined match");
                    reply(&tx, &ServerReply::Joined { match_id });
                }
                Ok(ClientMessage::LeaveGame { match_id }) => {
                    if let Some(task) = joined.remove(&match_id) {
                        stop_forwarding(task).await;
                        hub.unsubscribe(match_id);
                    }
                    info!(match_id, "Client left match");
                    reply(&tx, &ServerReply::Left { match_id });
                }
                Err(err) => {
                    warn!(%err, "Invalid client message");
                    reply(
                        &tx,
                        &ServerReply::Error {
                            message: format!("Invalid message: {}", err),
                        },
                    );
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    for (match_id, task) in joined.drain() {
        stop_forwarding(task).await;
        hub.unsubscribe(match_id);
    }
    write_task.abort();
    info!("Client disconnected");
}

fn forward(
    mut receiver: broadcast::Receiver<String>,
    tx: mpsc::UnboundedSender<Message>,
    match_id: MatchId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(frame) => {
                    if tx.send(Message::Text(frame.into())).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(match_id, skipped, "Subscriber lagged, frames dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Aborts a forwarding task and waits until its receiver is dropped.
async fn stop_forwarding(task: JoinHandle<()>) {
    task.abort();
    // Cancellation is the expected outcome.
    let _ = task.await;
}

fn reply(tx: &mpsc::UnboundedSender<Message>, reply: &ServerReply) {
    if let Ok(payload) = serde_json::to_string(reply) {
        let _ = tx.send(Message::Text(payload.into()));
    }
}
