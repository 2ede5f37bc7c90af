//! `GET /ws/{campaign_id}?token=<jwt>` (§4.6/§6/C9). A `select!` loop over
//! the hub's mpsc receiver and the client socket, with JSON text-frame
//! ping/pong for keepalive.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::middleware::verify_ws_token;
use crate::state::ApiState;

const CLOSE_INVALID_TOKEN: u16 = 4001;
const CLOSE_INVALID_CAMPAIGN: u16 = 4002;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    Path(campaign_id): Path<Uuid>,
    Query(query): Query<WsQuery>,
) -> Response {
    let user = match verify_ws_token(&state.cache, &state.jwt, &state.db, &query.token).await {
        Some(user) => user,
        None => {
            return ws
                .on_upgrade(move |socket| close_with_code(socket, CLOSE_INVALID_TOKEN))
                .into_response();
        }
    };

    match flashbid_db::campaigns::find_by_id(&state.db.pool, campaign_id).await {
        Ok(Some(_)) => {}
        _ => {
            return ws
                .on_upgrade(move |socket| close_with_code(socket, CLOSE_INVALID_CAMPAIGN))
                .into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, campaign_id, user.user_id))
}

async fn close_with_code(mut socket: WebSocket, code: u16) {
    let _ = socket
        .send(Message::Close(Some(axum::extract::ws::CloseFrame {
            code,
            reason: "".into(),
        })))
        .await;
}

async fn handle_socket(mut socket: WebSocket, state: ApiState, campaign_id: Uuid, user_id: Uuid) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    if let Some(previous) = state.hub.connect(campaign_id, user_id, tx) {
        drop(previous);
    }

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if text == "ping" {
                            let _ = socket.send(Message::Text("pong".to_string())).await;
                        } else if let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) {
                            if json.get("type").and_then(|t| t.as_str()) == Some("ping") {
                                let _ = socket.send(Message::Text("pong".to_string())).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%campaign_id, %user_id, error = %e, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    state.hub.disconnect(campaign_id, user_id);
    info!(%campaign_id, %user_id, "websocket session ended");
}
