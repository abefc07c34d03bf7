use super::state::HttpServerState;
use crate::bus::{ChannelObserver, LiveEvent, Observer};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

pub async fn device_updates(
    ws: WebSocketUpgrade,
    Path(device_id): Path<String>,
    State(state): State<HttpServerState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, device_id, state))
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &LiveEvent,
) -> Result<(), axum::Error> {
    match event.to_json() {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(err) => {
            warn!("Failed to serialize live event: {}", err);
            Ok(())
        }
    }
}

/// Forwards device events until either side goes away.
///
/// A heartbeat is sent whenever nothing else was sent for a whole window.
async fn handle_socket(socket: WebSocket, device_id: String, state: HttpServerState) {
    let (observer, mut events) = ChannelObserver::new(state.observer_buffer);
    let observer_id = observer.id();
    state.fanout.register(&device_id, Arc::new(observer));
    debug!("WebSocket connected for device {}", device_id);

    let (mut sender, mut receiver) = socket.split();
    let window = state.ws_heartbeat;
    let mut heartbeat = interval_at(Instant::now() + window, window);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = events.recv() => {
                // The registry dropped this observer, the client has to reconnect.
                let Some(event) = event else { break };
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
                heartbeat.reset();
            }
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) if text.as_str().trim() == "ping" => {
                    if sender.send(Message::Text("pong".into())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = heartbeat.tick() => {
                if send_event(&mut sender, &LiveEvent::Heartbeat).await.is_err() {
                    break;
                }
            }
        }
    }

    state.fanout.unregister(&device_id, observer_id);
    debug!("WebSocket disconnected for device {}", device_id);
}
