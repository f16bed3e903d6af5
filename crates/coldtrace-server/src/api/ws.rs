//! Live reading feed over WebSocket.
//!
//! Every reading published after the client connects arrives as one JSON
//! text message. Nothing is replayed on connect. Client frames other than
//! Close are ignored.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::state::SharedState;

/// Upgrade to a live reading feed.
#[utoipa::path(
    get,
    path = "/api/ws",
    tag = "readings",
    operation_id = "liveFeed",
    summary = "Subscribe to live readings",
    description = "WebSocket upgrade. Each reading ingested after the connection opens \
        is sent as one JSON text message with the same shape as `POST /api/readings` \
        returns. A client that falls behind is disconnected.",
    responses(
        (status = 101, description = "Switching to the WebSocket protocol")
    )
)]
pub async fn live_feed(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    ws.on_upgrade(move |socket| stream_readings(socket, state))
}

async fn stream_readings(socket: WebSocket, state: SharedState) {
    let hub = state.pipeline().hub();
    let send_timeout = state.send_timeout();
    let mut subscription = hub.subscribe();
    let subscriber_id = subscription.id();
    let (mut sink, mut stream) = socket.split();

    info!(%subscriber_id, "Live feed client connected");

    loop {
        tokio::select! {
            reading = subscription.recv() => {
                let Some(reading) = reading else {
                    debug!(%subscriber_id, "Subscription closed by hub");
                    break;
                };

                let json = match serde_json::to_string(&*reading) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(%subscriber_id, error = %e, "Failed to serialize reading");
                        continue;
                    }
                };

                match tokio::time::timeout(send_timeout, sink.send(Message::Text(json.into()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(%subscriber_id, error = %e, "Live feed write failed");
                        break;
                    }
                    Err(_) => {
                        warn!(
                            %subscriber_id,
                            timeout_ms = send_timeout.as_millis(),
                            "Live feed write timed out"
                        );
                        break;
                    }
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%subscriber_id, error = %e, "Live feed read failed");
                        break;
                    }
                }
            }
        }
    }

    hub.unsubscribe(subscriber_id);
    info!(%subscriber_id, "Live feed client disconnected");
}
