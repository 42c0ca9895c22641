// ---------------------------------------------------------------------------
// handlers/streaming.rs — WebSocket push of host stats
// ---------------------------------------------------------------------------

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{RawQuery, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// GET /ws — pushes `{type: "stats", ...}` frames on every monitor tick.
/// The upgrade rejection is deferred so unauthenticated callers get 401
/// rather than an upgrade error.
pub async fn ws_stats(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    // Validate auth for WebSocket connections via query param
    if !crate::auth::validate_ws_token(query.as_deref().unwrap_or(""), state.auth_secret.as_deref()) {
        return (axum::http::StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_ws(socket, state)).into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut frames = state.stats_tx.subscribe();
    tracing::debug!("ws: stats subscriber connected");

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Ok(json) => {
                        if sender.send(WsMessage::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("ws: subscriber lagged, skipped {} frames", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = sender.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {} // clients have nothing to say on this channel
                }
            }
        }
    }

    tracing::debug!("ws: stats subscriber disconnected");
}
