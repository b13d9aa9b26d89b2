use crate::domain::entities::{ConversationMessage, ConversationStatus};
use crate::domain::errors::DomainResult;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

/// How a conversation came to be assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOrigin {
    /// Picked by the distribution scheduler.
    Scheduler,
    /// Explicit `assign` call.
    Manual,
    /// Agent supplied when the conversation was created.
    Creation,
}

impl AssignmentOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentOrigin::Scheduler => "scheduler",
            AssignmentOrigin::Manual => "manual",
            AssignmentOrigin::Creation => "creation",
        }
    }
}

/// Events published after a state change has been committed
#[derive(Debug, Clone)]
pub enum SystemEvent {
    ConversationCreated {
        conversation_id: String,
        consumer_id: String,
        status: ConversationStatus,
        timestamp: String, // ISO 8601
    },
    ConversationAssigned {
        conversation_id: String,
        agent_id: String,
        origin: AssignmentOrigin,
        timestamp: String, // ISO 8601
    },
    MessageCreated {
        message: ConversationMessage,
    },
    ConversationFinished {
        conversation_id: String,
        agent_id: Option<String>,
        closing_reason: String,
        finished_at: String, // ISO 8601
    },
    ConversationRated {
        conversation_id: String,
        agent_id: Option<String>,
        rate: u8,
        timestamp: String, // ISO 8601
    },
    QueueDepthChanged {
        count: i64,
        timestamp: String, // ISO 8601
    },
    AgentAvailabilityChanged {
        agent_id: String,
        available: bool,
        timestamp: String, // ISO 8601
    },
    Typing {
        conversation_id: String,
        user_id: String,
    },
}

impl SystemEvent {
    /// Conversation the event belongs to, if any.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            SystemEvent::ConversationCreated { conversation_id, .. }
            | SystemEvent::ConversationAssigned { conversation_id, .. }
            | SystemEvent::ConversationFinished { conversation_id, .. }
            | SystemEvent::ConversationRated { conversation_id, .. }
            | SystemEvent::Typing { conversation_id, .. } => Some(conversation_id),
            SystemEvent::MessageCreated { message } => Some(&message.conversation_id),
            SystemEvent::QueueDepthChanged { .. } | SystemEvent::AgentAvailabilityChanged { .. } => {
                None
            }
        }
    }
}

/// Event bus trait for publishing and subscribing to system events
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event to all subscribers
    fn publish(&self, event: SystemEvent) -> DomainResult<()>;

    /// Subscribe to events
    fn subscribe(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<SystemEvent, BroadcastStreamRecvError>> + Send>>;
}

/// Local in-memory implementation of EventBus
#[derive(Clone)]
pub struct LocalEventBus {
    tx: broadcast::Sender<SystemEvent>,
}

impl LocalEventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    fn publish(&self, event: SystemEvent) -> DomainResult<()> {
        // No subscribers is not an error: publishing never blocks a committed transition.
        if let Err(e) = self.tx.send(event) {
            tracing::debug!("No active subscribers for event: {}", e);
        }
        Ok(())
    }

    fn subscribe(
        &self,
    ) -> Pin<Box<dyn Stream<Item = Result<SystemEvent, BroadcastStreamRecvError>> + Send>> {
        let rx = self.tx.subscribe();
        Box::pin(BroadcastStream::new(rx))
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
