//! WebSocket endpoint bridging the subscription hub to clients.
//!
//! One connection subscribes to exactly one order. The hub pushes typed
//! messages into an unbounded channel; this layer serializes them onto the
//! socket, so a slow client only ever backs up its own channel.

use crate::api::AppState;
use crate::error::ApiError;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use common::{ClientMessage, StreamMessage};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// WebSocket upgrade handler.
/// GET /ws/orders/{id}
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    // Unknown orders are rejected before the upgrade.
    match state.store.find(&id) {
        Ok(order) => ws
            .on_upgrade(move |socket| handle_socket(socket, state, order.id, order.status.is_terminal()))
            .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Run one subscriber connection until the hub closes it or the client
/// disconnects.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, order_id: String, terminal: bool) {
    let mut handle = state.hub.register(&order_id);
    let sub_id = handle.id;

    counter!("gateway_ws_connections_total").increment(1);
    gauge!("gateway_ws_active_connections").set(state.hub.active_subscribers() as f64);
    info!("Subscriber {} connected for order {}", sub_id, order_id);

    // Transitions already happened; the update log is the replay path.
    if terminal {
        state.hub.close_order(&order_id, "order already terminal");
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut ping_interval = interval(Duration::from_secs(30));
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            // Outbound: hub messages for this order.
            outbound = handle.rx.recv() => {
                match outbound {
                    Some(msg) => {
                        let closing = matches!(msg, StreamMessage::Closing { .. });
                        match serde_json::to_string(&msg) {
                            Ok(json) => {
                                if ws_tx.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Failed to serialize stream message: {}", e);
                            }
                        }
                        if closing {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Inbound: client keepalives and disconnects.
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ClientMessage::Ping) = serde_json::from_str(&text) {
                            let pong = serde_json::to_string(&StreamMessage::pong())
                                .unwrap_or_else(|_| r#"{"type":"pong"}"#.to_string());
                            if ws_tx.send(Message::Text(pong.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if ws_tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("WebSocket error for subscriber {}: {:?}", sub_id, e);
                        break;
                    }
                }
            }

            // Server-side keepalive.
            _ = ping_interval.tick() => {
                if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // A disconnect only removes this sink; processing is unaffected.
    state.hub.unregister(&order_id, &sub_id);
    let _ = ws_tx.close().await;

    counter!("gateway_ws_disconnections_total").increment(1);
    gauge!("gateway_ws_active_connections").set(state.hub.active_subscribers() as f64);
    info!("Subscriber {} disconnected from order {}", sub_id, order_id);
}
