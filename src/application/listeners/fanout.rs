use crate::domain::ports::conversation_repository::ConversationRepository;
use crate::infrastructure::providers::connection_manager::{ClientEvent, ConnectionManager};
use crate::shared::events::{EventBus, SystemEvent};
use std::sync::Arc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Maps committed domain events to client events and routes them.
#[derive(Clone)]
pub struct FanoutRouter {
    connection_manager: Arc<dyn ConnectionManager>,
    conversation_repo: Arc<dyn ConversationRepository>,
}

impl FanoutRouter {
    pub fn new(
        connection_manager: Arc<dyn ConnectionManager>,
        conversation_repo: Arc<dyn ConversationRepository>,
    ) -> Self {
        Self {
            connection_manager,
            conversation_repo,
        }
    }

    pub async fn route(&self, event: SystemEvent) {
        match event {
            SystemEvent::ConversationAssigned {
                conversation_id,
                agent_id,
                origin,
                ..
            } => {
                tracing::debug!(
                    "Fan-out: conversation {} assigned to {} ({})",
                    conversation_id,
                    agent_id,
                    origin.as_str()
                );
                self.connection_manager
                    .send_to_conversation(
                        &conversation_id,
                        Some(&agent_id),
                        ClientEvent::ConversationAssigned {
                            conversation_id: conversation_id.clone(),
                            agent_id: agent_id.clone(),
                        },
                    )
                    .await;
            }
            SystemEvent::MessageCreated { message } => {
                let agent_id = self.assigned_agent(&message.conversation_id).await;
                let conversation_id = message.conversation_id.clone();
                self.connection_manager
                    .send_to_conversation(
                        &conversation_id,
                        agent_id.as_deref(),
                        ClientEvent::Message(message.clone()),
                    )
                    .await;
                self.connection_manager
                    .send_to_conversation(
                        &conversation_id,
                        agent_id.as_deref(),
                        ClientEvent::LastMessage(message),
                    )
                    .await;
            }
            SystemEvent::ConversationFinished {
                conversation_id,
                agent_id,
                closing_reason,
                finished_at,
            } => {
                self.connection_manager
                    .send_to_conversation(
                        &conversation_id,
                        agent_id.as_deref(),
                        ClientEvent::ConversationFinished {
                            conversation_id: conversation_id.clone(),
                            closing_reason,
                            finished_at,
                        },
                    )
                    .await;
            }
            SystemEvent::ConversationRated {
                conversation_id,
                agent_id,
                rate,
                ..
            } => {
                self.connection_manager
                    .send_to_conversation(
                        &conversation_id,
                        agent_id.as_deref(),
                        ClientEvent::ConversationRated {
                            conversation_id: conversation_id.clone(),
                            rate,
                        },
                    )
                    .await;
            }
            SystemEvent::QueueDepthChanged { count, .. } => {
                self.connection_manager
                    .broadcast_all(ClientEvent::QueueDepth { count })
                    .await;
            }
            SystemEvent::Typing {
                conversation_id,
                user_id,
            } => {
                let agent_id = self.assigned_agent(&conversation_id).await;
                self.connection_manager
                    .send_to_conversation(
                        &conversation_id,
                        agent_id.as_deref(),
                        ClientEvent::IsTyping {
                            conversation_id: conversation_id.clone(),
                            user_id,
                        },
                    )
                    .await;
            }
            SystemEvent::ConversationCreated {
                conversation_id,
                consumer_id,
                status,
                ..
            } => {
                tracing::debug!(
                    "Fan-out: conversation {} created by {} as {}",
                    conversation_id,
                    consumer_id,
                    status
                );
            }
            SystemEvent::AgentAvailabilityChanged {
                agent_id,
                available,
                ..
            } => {
                tracing::debug!(
                    "Fan-out: agent {} availability is now {}",
                    agent_id,
                    available
                );
            }
        }
    }

    async fn assigned_agent(&self, conversation_id: &str) -> Option<String> {
        match self.conversation_repo.get_conversation_by_id(conversation_id).await {
            Ok(Some(conversation)) => conversation.agent_id,
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(
                    "Fan-out could not resolve agent for {}: {}",
                    conversation_id,
                    e
                );
                None
            }
        }
    }
}

pub async fn run_fanout_listener(
    event_bus: Arc<dyn EventBus>,
    router: FanoutRouter,
    shutdown: CancellationToken,
) {
    tracing::info!("Fan-out listener started");

    let mut receiver = event_bus.subscribe();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = receiver.next() => match next {
                Some(Ok(event)) => router.route(event).await,
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    metrics::counter!("deskqueue_fanout_dropped_total").increment(skipped);
                    tracing::warn!("Fan-out listener lagged, {} events skipped", skipped);
                }
                None => break,
            },
        }
    }

    tracing::info!("Fan-out listener stopped");
}
