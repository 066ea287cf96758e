use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect};
use futures_util::{SinkExt, StreamExt};
use inkroom_shared::{
    decode_message, encode_message, is_valid_session_id, ClientMessage, ServerMessage,
};
use tokio::sync::mpsc;

use crate::logic::apply_client_message;
use crate::registry::short_id;
use crate::state::AppState;

pub async fn ping_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn root_handler() -> impl IntoResponse {
    Redirect::to(&format!("/s/{}", short_id()))
}

pub async fn session_handler(
    Path(session_id): Path<String>,
    axum::Extension(index_file): axum::Extension<PathBuf>,
) -> impl IntoResponse {
    if !is_valid_session_id(&session_id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    match tokio::fs::read_to_string(index_file).await {
        Ok(contents) => Html(contents).into_response(),
        Err(error) => {
            log::error!("index read failed error={error}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn parse_frame(client_id: &str, message: Message) -> Option<ClientMessage> {
    match message {
        Message::Binary(data) => match decode_message::<ClientMessage>(&data) {
            Ok(message) => Some(message),
            Err(error) => {
                log::warn!(
                    "WS bad binary frame conn={client_id} bytes={} error={error}",
                    data.len()
                );
                None
            }
        },
        Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => Some(message),
            Err(error) => {
                let snippet: String = text.chars().take(200).collect();
                log::warn!("WS bad text frame conn={client_id} error={error} payload={snippet:?}");
                None
            }
        },
        _ => None,
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let mut client_id = {
        let mut registry = state.registry.write().await;
        let id = registry.connect(tx);
        log::info!(
            "WS connected conn={id} connections={} sessions={}",
            registry.connection_count(),
            registry.session_count()
        );
        id
    };

    // Cleared before each ping; a missing answer by the next tick closes
    // the socket.
    let alive = Arc::new(AtomicBool::new(true));
    let ping_interval = state.ping_interval;
    let mut send_task = {
        let alive = alive.clone();
        let conn = client_id.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ping_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    message = rx.recv() => {
                        let Some(message) = message else {
                            break;
                        };
                        match encode_message(&message) {
                            Ok(payload) => {
                                if socket_sender.send(Message::Binary(payload)).await.is_err() {
                                    break;
                                }
                            }
                            Err(error) => log::error!(
                                "WS encode failed kind={} error={error}",
                                message.kind()
                            ),
                        }
                    }
                    _ = ticker.tick() => {
                        if !alive.swap(false, Ordering::Relaxed) {
                            log::info!("WS ping timeout conn={conn}");
                            break;
                        }
                        if socket_sender.send(Message::Ping(Vec::new())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            let _ = socket_sender.close().await;
        })
    };

    let mut close_frame = None;
    loop {
        let frame = tokio::select! {
            frame = socket_receiver.next() => frame,
            _ = &mut send_task => break,
        };
        let Some(Ok(message)) = frame else {
            break;
        };
        alive.store(true, Ordering::Relaxed);
        if let Message::Close(frame) = message {
            close_frame = frame;
            break;
        }
        let Some(client_message) = parse_frame(&client_id, message) else {
            continue;
        };
        log::debug!("WS recv conn={client_id} kind={}", client_message.kind());
        let mut registry = state.registry.write().await;
        if let Some(adopted) = apply_client_message(&mut registry, &client_id, client_message) {
            client_id = adopted;
        }
    }

    state.registry.write().await.disconnect(&client_id);
    if let Some(frame) = &close_frame {
        log::info!(
            "WS close frame conn={client_id} code={:?} reason={:?}",
            frame.code,
            frame.reason
        );
    }
    send_task.abort();
}
