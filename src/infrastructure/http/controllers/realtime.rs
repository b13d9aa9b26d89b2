use crate::domain::entities::MessageAuthor;
use crate::infrastructure::http::middleware::{ApiError, AppState};
use crate::infrastructure::providers::connection_manager::ClientEvent;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub conversation_id: Option<String>,
    pub agent_id: Option<String>,
}

/// Inbound frames, tagged by `event`.
#[derive(Debug, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum InboundEvent {
    SendMessage {
        conversation_id: String,
        by: MessageAuthor,
        content: String,
        #[serde(default)]
        agent_id: Option<String>,
    },
    Typing {
        conversation_id: String,
        user_id: String,
    },
    Subscribe {
        conversation_id: String,
    },
    Unsubscribe {
        conversation_id: String,
    },
    /// Agent signs in on this connection and becomes available.
    Login {
        user_id: String,
    },
    /// Agent signs out and stops receiving automatic assignments.
    Logout {
        user_id: String,
    },
}

/// GET /ws?conversationId=..&agentId=.. - Realtime channel
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: AppState, params: ConnectParams) {
    let client_id = uuid::Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::channel::<ClientEvent>(state.client_channel_capacity);

    state
        .connection_manager
        .add_connection(&client_id, params.agent_id.clone(), tx.clone())
        .await;
    if let Some(conversation_id) = &params.conversation_id {
        state
            .connection_manager
            .subscribe(&client_id, conversation_id)
            .await;
    }

    tracing::info!(
        client_id = %client_id,
        agent_id = ?params.agent_id,
        "Realtime client connected"
    );

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to serialize {} event: {}", event.name(), e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_client_id = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            match frame {
                Message::Text(text) => {
                    if let Err(e) = handle_inbound(&recv_state, &recv_client_id, &text).await {
                        let reply = ClientEvent::Error {
                            message: e.to_string(),
                            code: e.code().to_string(),
                        };
                        if let Err(e) = tx.try_send(reply) {
                            tracing::debug!(
                                "Dropped error reply for client {}: {}",
                                recv_client_id,
                                e
                            );
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.connection_manager.remove_connection(&client_id).await;
    tracing::info!(client_id = %client_id, "Realtime client disconnected");
}

/// Applies one inbound frame on behalf of `client_id`. Errors are sent back
/// to the client as an `error` event by the socket loop.
pub async fn handle_inbound(
    state: &AppState,
    client_id: &str,
    text: &str,
) -> Result<(), ApiError> {
    let event: InboundEvent = serde_json::from_str(text)
        .map_err(|e| ApiError::Validation(format!("Malformed event: {}", e)))?;

    match event {
        InboundEvent::SendMessage {
            conversation_id,
            by,
            content,
            agent_id,
        } => {
            if by == MessageAuthor::System {
                return Err(ApiError::Validation(
                    "System messages cannot be posted by clients".to_string(),
                ));
            }
            if content.trim().is_empty() {
                return Err(ApiError::Validation("content is required".to_string()));
            }
            state
                .conversation_service
                .post_message(&conversation_id, by, content, agent_id)
                .await?;
        }
        InboundEvent::Typing {
            conversation_id,
            user_id,
        } => {
            state
                .conversation_service
                .notify_typing(&conversation_id, &user_id)
                .await?;
        }
        InboundEvent::Subscribe { conversation_id } => {
            state
                .connection_manager
                .subscribe(client_id, &conversation_id)
                .await;
        }
        InboundEvent::Unsubscribe { conversation_id } => {
            state
                .connection_manager
                .unsubscribe(client_id, &conversation_id)
                .await;
        }
        InboundEvent::Login { user_id } => {
            state
                .availability_service
                .set_availability(&user_id, true)
                .await?;
            state
                .connection_manager
                .set_agent(client_id, Some(user_id.clone()))
                .await;
            tracing::info!(client_id = %client_id, agent_id = %user_id, "Agent logged in");
        }
        InboundEvent::Logout { user_id } => {
            state.connection_manager.set_agent(client_id, None).await;
            state
                .availability_service
                .set_availability(&user_id, false)
                .await?;
            tracing::info!(client_id = %client_id, agent_id = %user_id, "Agent logged out");
        }
    }

    Ok(())
}
