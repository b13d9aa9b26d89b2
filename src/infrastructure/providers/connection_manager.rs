use crate::domain::entities::ConversationMessage;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::{error::TrySendError, Sender};
use tokio::sync::Mutex;

/// Event pushed to a realtime client, serialized as
/// `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    ConversationAssigned {
        conversation_id: String,
        agent_id: String,
    },
    Message(ConversationMessage),
    /// Same payload as `Message`, consumed by conversation-list previews.
    LastMessage(ConversationMessage),
    ConversationFinished {
        conversation_id: String,
        closing_reason: String,
        finished_at: String,
    },
    ConversationRated {
        conversation_id: String,
        rate: u8,
    },
    QueueDepth {
        count: i64,
    },
    IsTyping {
        conversation_id: String,
        user_id: String,
    },
    Error {
        message: String,
        code: String,
    },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::ConversationAssigned { .. } => "conversationAssigned",
            ClientEvent::Message(_) => "message",
            ClientEvent::LastMessage(_) => "lastMessage",
            ClientEvent::ConversationFinished { .. } => "conversationFinished",
            ClientEvent::ConversationRated { .. } => "conversationRated",
            ClientEvent::QueueDepth { .. } => "queueDepth",
            ClientEvent::IsTyping { .. } => "isTyping",
            ClientEvent::Error { .. } => "error",
        }
    }
}

/// Trait for managing realtime connections and delivering client events.
///
/// Delivery is best-effort: a full or closed client channel drops the event
/// for that client only.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Register a client. `agent_id` is set when the client is an agent.
    async fn add_connection(
        &self,
        client_id: &str,
        agent_id: Option<String>,
        sender: Sender<ClientEvent>,
    );

    async fn remove_connection(&self, client_id: &str);

    /// Binds an already registered client to an agent, or unbinds it with
    /// `None`. Agent-addressed events follow the binding.
    async fn set_agent(&self, client_id: &str, agent_id: Option<String>);

    async fn subscribe(&self, client_id: &str, conversation_id: &str);

    async fn unsubscribe(&self, client_id: &str, conversation_id: &str);

    /// Deliver to subscribers of the conversation and to connections of
    /// `agent_id`. Returns how many clients received the event.
    async fn send_to_conversation(
        &self,
        conversation_id: &str,
        agent_id: Option<&str>,
        event: ClientEvent,
    ) -> usize;

    async fn broadcast_all(&self, event: ClientEvent) -> usize;

    async fn is_connected(&self, client_id: &str) -> bool;
}

struct ClientConnection {
    agent_id: Option<String>,
    subscriptions: HashSet<String>,
    sender: Sender<ClientEvent>,
}

/// In-memory registry keyed by client id.
pub struct InMemoryConnectionManager {
    connections: Arc<Mutex<HashMap<String, ClientConnection>>>,
}

impl InMemoryConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Sends to every connection matching `filter`, pruning closed ones.
    async fn deliver<F>(&self, event: &ClientEvent, filter: F) -> usize
    where
        F: Fn(&ClientConnection) -> bool + Send,
    {
        let mut connections = self.connections.lock().await;
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (client_id, connection) in connections.iter() {
            if !filter(connection) {
                continue;
            }
            match connection.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    metrics::counter!("deskqueue_fanout_dropped_total").increment(1);
                    tracing::warn!(
                        "Client {} is not keeping up, dropped {} event",
                        client_id,
                        event.name()
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    metrics::counter!("deskqueue_fanout_dropped_total").increment(1);
                    closed.push(client_id.clone());
                }
            }
        }

        for client_id in closed {
            tracing::debug!("Pruning closed client {}", client_id);
            connections.remove(&client_id);
        }

        delivered
    }
}

impl Default for InMemoryConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionManager for InMemoryConnectionManager {
    async fn add_connection(
        &self,
        client_id: &str,
        agent_id: Option<String>,
        sender: Sender<ClientEvent>,
    ) {
        let mut connections = self.connections.lock().await;
        connections.insert(
            client_id.to_string(),
            ClientConnection {
                agent_id,
                subscriptions: HashSet::new(),
                sender,
            },
        );
    }

    async fn remove_connection(&self, client_id: &str) {
        let mut connections = self.connections.lock().await;
        connections.remove(client_id);
    }

    async fn set_agent(&self, client_id: &str, agent_id: Option<String>) {
        let mut connections = self.connections.lock().await;
        match connections.get_mut(client_id) {
            Some(connection) => connection.agent_id = agent_id,
            None => tracing::debug!("set_agent for unknown client {}", client_id),
        }
    }

    async fn subscribe(&self, client_id: &str, conversation_id: &str) {
        let mut connections = self.connections.lock().await;
        if let Some(connection) = connections.get_mut(client_id) {
            connection.subscriptions.insert(conversation_id.to_string());
        }
    }

    async fn unsubscribe(&self, client_id: &str, conversation_id: &str) {
        let mut connections = self.connections.lock().await;
        if let Some(connection) = connections.get_mut(client_id) {
            connection.subscriptions.remove(conversation_id);
        }
    }

    async fn send_to_conversation(
        &self,
        conversation_id: &str,
        agent_id: Option<&str>,
        event: ClientEvent,
    ) -> usize {
        self.deliver(&event, |connection| {
            connection.subscriptions.contains(conversation_id)
                || (agent_id.is_some() && connection.agent_id.as_deref() == agent_id)
        })
        .await
    }

    async fn broadcast_all(&self, event: ClientEvent) -> usize {
        self.deliver(&event, |_| true).await
    }

    async fn is_connected(&self, client_id: &str) -> bool {
        let connections = self.connections.lock().await;
        connections.contains_key(client_id)
    }
}

/// Records every event instead of sending it.
pub struct MockConnectionManager {
    sent: Arc<Mutex<Vec<(Option<String>, ClientEvent)>>>,
}

impl MockConnectionManager {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// `(conversation_id, event)` pairs; broadcasts have no conversation.
    pub async fn get_sent_events(&self) -> Vec<(Option<String>, ClientEvent)> {
        self.sent.lock().await.clone()
    }
}

impl Default for MockConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionManager for MockConnectionManager {
    async fn add_connection(
        &self,
        _client_id: &str,
        _agent_id: Option<String>,
        _sender: Sender<ClientEvent>,
    ) {
    }

    async fn remove_connection(&self, _client_id: &str) {}

    async fn set_agent(&self, _client_id: &str, _agent_id: Option<String>) {}

    async fn subscribe(&self, _client_id: &str, _conversation_id: &str) {}

    async fn unsubscribe(&self, _client_id: &str, _conversation_id: &str) {}

    async fn send_to_conversation(
        &self,
        conversation_id: &str,
        _agent_id: Option<&str>,
        event: ClientEvent,
    ) -> usize {
        self.sent
            .lock()
            .await
            .push((Some(conversation_id.to_string()), event));
        1
    }

    async fn broadcast_all(&self, event: ClientEvent) -> usize {
        self.sent.lock().await.push((None, event));
        1
    }

    async fn is_connected(&self, _client_id: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn assigned(conversation_id: &str, agent_id: &str) -> ClientEvent {
        ClientEvent::ConversationAssigned {
            conversation_id: conversation_id.to_string(),
            agent_id: agent_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_and_remove_connection() {
        let manager = InMemoryConnectionManager::new();
        let (tx, _rx) = mpsc::channel(10);

        manager.add_connection("client1", None, tx).await;
        assert!(manager.is_connected("client1").await);
        assert!(!manager.is_connected("client2").await);

        manager.remove_connection("client1").await;
        assert!(!manager.is_connected("client1").await);
    }

    #[tokio::test]
    async fn test_conversation_events_reach_subscribers_and_agent() {
        let manager = InMemoryConnectionManager::new();
        let (consumer_tx, mut consumer_rx) = mpsc::channel(10);
        let (agent_tx, mut agent_rx) = mpsc::channel(10);
        let (other_tx, mut other_rx) = mpsc::channel(10);

        manager.add_connection("consumer", None, consumer_tx).await;
        manager
            .add_connection("agent", Some("agent-1".to_string()), agent_tx)
            .await;
        manager
            .add_connection("other", Some("agent-2".to_string()), other_tx)
            .await;
        manager.subscribe("consumer", "conv-1").await;

        let delivered = manager
            .send_to_conversation("conv-1", Some("agent-1"), assigned("conv-1", "agent-1"))
            .await;

        assert_eq!(delivered, 2);
        assert_eq!(consumer_rx.recv().await.unwrap(), assigned("conv-1", "agent-1"));
        assert_eq!(agent_rx.recv().await.unwrap(), assigned("conv-1", "agent-1"));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_set_agent_rebinds_agent_delivery() {
        let manager = InMemoryConnectionManager::new();
        let (tx, mut rx) = mpsc::channel(10);
        manager.add_connection("client1", None, tx).await;

        let delivered = manager
            .send_to_conversation("conv-1", Some("agent-1"), assigned("conv-1", "agent-1"))
            .await;
        assert_eq!(delivered, 0);

        manager.set_agent("client1", Some("agent-1".to_string())).await;
        let delivered = manager
            .send_to_conversation("conv-1", Some("agent-1"), assigned("conv-1", "agent-1"))
            .await;
        assert_eq!(delivered, 1);
        assert_eq!(rx.recv().await.unwrap(), assigned("conv-1", "agent-1"));

        manager.set_agent("client1", None).await;
        let delivered = manager
            .send_to_conversation("conv-1", Some("agent-1"), assigned("conv-1", "agent-1"))
            .await;
        assert_eq!(delivered, 0);
        assert!(manager.is_connected("client1").await);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let manager = InMemoryConnectionManager::new();
        let (tx, mut rx) = mpsc::channel(10);

        manager.add_connection("client1", None, tx).await;
        manager.subscribe("client1", "conv-1").await;
        manager.unsubscribe("client1", "conv-1").await;

        let delivered = manager
            .send_to_conversation("conv-1", None, assigned("conv-1", "agent-1"))
            .await;
        assert_eq!(delivered, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let manager = InMemoryConnectionManager::new();
        let (tx1, mut rx1) = mpsc::channel(10);
        let (tx2, mut rx2) = mpsc::channel(10);

        manager.add_connection("client1", None, tx1).await;
        manager
            .add_connection("client2", Some("agent-1".to_string()), tx2)
            .await;

        let delivered = manager.broadcast_all(ClientEvent::QueueDepth { count: 4 }).await;
        assert_eq!(delivered, 2);
        assert_eq!(rx1.recv().await.unwrap(), ClientEvent::QueueDepth { count: 4 });
        assert_eq!(rx2.recv().await.unwrap(), ClientEvent::QueueDepth { count: 4 });
    }

    #[tokio::test]
    async fn test_full_channel_drops_without_blocking() {
        let manager = InMemoryConnectionManager::new();
        let (slow_tx, mut slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::channel(10);

        manager.add_connection("slow", None, slow_tx).await;
        manager.add_connection("fast", None, fast_tx).await;

        manager.broadcast_all(ClientEvent::QueueDepth { count: 1 }).await;
        let delivered = manager.broadcast_all(ClientEvent::QueueDepth { count: 2 }).await;

        assert_eq!(delivered, 1);
        assert_eq!(slow_rx.recv().await.unwrap(), ClientEvent::QueueDepth { count: 1 });
        assert!(slow_rx.try_recv().is_err());
        assert_eq!(fast_rx.recv().await.unwrap(), ClientEvent::QueueDepth { count: 1 });
        assert_eq!(fast_rx.recv().await.unwrap(), ClientEvent::QueueDepth { count: 2 });
        assert!(manager.is_connected("slow").await);
    }

    #[tokio::test]
    async fn test_closed_channel_is_pruned() {
        let manager = InMemoryConnectionManager::new();
        let (tx, rx) = mpsc::channel(10);
        manager.add_connection("gone", None, tx).await;
        drop(rx);

        let delivered = manager.broadcast_all(ClientEvent::QueueDepth { count: 0 }).await;
        assert_eq!(delivered, 0);
        assert!(!manager.is_connected("gone").await);
        assert_eq!(manager.connection_count().await, 0);
    }

    #[test]
    fn test_client_event_wire_format() {
        let json = serde_json::to_value(ClientEvent::IsTyping {
            conversation_id: "conv-1".to_string(),
            user_id: "u-1".to_string(),
        })
        .unwrap();

        assert_eq!(json["event"], "isTyping");
        assert_eq!(json["data"]["conversationId"], "conv-1");
        assert_eq!(json["data"]["userId"], "u-1");
    }

    #[tokio::test]
    async fn test_mock_records_events() {
        let manager = MockConnectionManager::new();
        manager
            .send_to_conversation("conv-1", Some("agent-1"), assigned("conv-1", "agent-1"))
            .await;
        manager.broadcast_all(ClientEvent::QueueDepth { count: 3 }).await;

        let sent = manager.get_sent_events().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0.as_deref(), Some("conv-1"));
        assert_eq!(sent[1], (None, ClientEvent::QueueDepth { count: 3 }));
    }
}
