use crate::application::services::AssignmentService;
use crate::domain::entities::{
    sort_for_display, Conversation, ConversationMessage, ConversationStatus,
    ConversationWithMessages, CreateConversation, MessageAuthor, NewMessage, PageRequest,
    Paginated, PaginationMetadata, QueueDepthResponse,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{
    agent_repository::AgentRepository,
    conversation_repository::{ConversationRepository, FinishOutcome},
    message_repository::MessageRepository,
};
use crate::domain::services::validate_rating;
use crate::shared::events::{AssignmentOrigin, EventBus, SystemEvent};
use crate::shared::utils::now_rfc3339;
use std::sync::Arc;

/// Conversation lifecycle and messaging. Events are published only after the
/// store has committed.
#[derive(Clone)]
pub struct ConversationService {
    conversation_repo: Arc<dyn ConversationRepository>,
    message_repo: Arc<dyn MessageRepository>,
    agent_repo: Arc<dyn AgentRepository>,
    assignment_service: AssignmentService,
    event_bus: Arc<dyn EventBus>,
}

impl ConversationService {
    pub fn new(
        conversation_repo: Arc<dyn ConversationRepository>,
        message_repo: Arc<dyn MessageRepository>,
        agent_repo: Arc<dyn AgentRepository>,
        assignment_service: AssignmentService,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            conversation_repo,
            message_repo,
            agent_repo,
            assignment_service,
            event_bus,
        }
    }

    pub async fn create_conversation(
        &self,
        create: CreateConversation,
    ) -> DomainResult<Conversation> {
        let cap = self.assignment_service.capacity().cap();
        let (conversation, assignment) = self
            .conversation_repo
            .create_conversation(&create, cap)
            .await?;

        tracing::info!(
            conversation_id = %conversation.id,
            consumer_id = %conversation.consumer_id,
            status = %conversation.status,
            "Conversation created"
        );

        self.publish(SystemEvent::ConversationCreated {
            conversation_id: conversation.id.clone(),
            consumer_id: conversation.consumer_id.clone(),
            status: conversation.status,
            timestamp: conversation.created_at.clone(),
        });

        if let Some(commit) = &assignment {
            metrics::counter!("deskqueue_assignments_total", "path" => "manual").increment(1);
            self.assignment_service
                .publish_assignment(commit, AssignmentOrigin::Creation);
        }

        Ok(conversation)
    }

    pub async fn get_conversation(&self, id: &str) -> DomainResult<ConversationWithMessages> {
        let conversation = self.require_conversation(id).await?;
        let mut messages = self.message_repo.get_all_messages(id).await?;
        sort_for_display(&mut messages);

        Ok(ConversationWithMessages {
            conversation,
            messages,
        })
    }

    pub async fn list_conversations(
        &self,
        page: PageRequest,
    ) -> DomainResult<Paginated<Conversation>> {
        let (data, total) = self.conversation_repo.list_conversations(page).await?;
        Ok(Paginated {
            data,
            pagination: PaginationMetadata::new(page.page, page.limit, total),
        })
    }

    pub async fn list_agent_conversations(
        &self,
        agent_id: &str,
        status: Option<ConversationStatus>,
        page: PageRequest,
    ) -> DomainResult<Paginated<Conversation>> {
        if self.agent_repo.get_agent_by_id(agent_id).await?.is_none() {
            return Err(DomainError::NotFound(format!("Agent {} not found", agent_id)));
        }

        let (data, total) = self
            .conversation_repo
            .list_agent_conversations(agent_id, status, page)
            .await?;

        Ok(Paginated {
            data,
            pagination: PaginationMetadata::new(page.page, page.limit, total),
        })
    }

    /// One page of messages, newest page first, each page in display order.
    pub async fn list_messages(
        &self,
        conversation_id: &str,
        page: PageRequest,
    ) -> DomainResult<Paginated<ConversationMessage>> {
        self.require_conversation(conversation_id).await?;

        let (mut data, total) = self.message_repo.list_messages(conversation_id, page).await?;
        sort_for_display(&mut data);

        Ok(Paginated {
            data,
            pagination: PaginationMetadata::new(page.page, page.limit, total),
        })
    }

    /// Appends a message. Status is untouched; closed conversations still
    /// accept messages.
    pub async fn post_message(
        &self,
        conversation_id: &str,
        by: MessageAuthor,
        content: String,
        agent_id: Option<String>,
    ) -> DomainResult<ConversationMessage> {
        let agent_id = match by {
            MessageAuthor::User => agent_id,
            _ => None,
        };

        if let Some(agent_id) = &agent_id {
            if self.agent_repo.get_agent_by_id(agent_id).await?.is_none() {
                return Err(DomainError::NotFound(format!("Agent {} not found", agent_id)));
            }
        }

        let message = self
            .message_repo
            .add_message(&NewMessage {
                conversation_id: conversation_id.to_string(),
                agent_id,
                by,
                content,
            })
            .await?;

        tracing::debug!(
            conversation_id = %conversation_id,
            message_id = %message.id,
            by = %message.by,
            "Message stored"
        );

        self.publish(SystemEvent::MessageCreated {
            message: message.clone(),
        });

        Ok(message)
    }

    /// `Open -> Closed`. Finishing a closed conversation returns it unchanged.
    pub async fn finish_conversation(
        &self,
        conversation_id: &str,
        closing_reason: &str,
    ) -> DomainResult<Conversation> {
        match self
            .conversation_repo
            .finish_conversation(conversation_id, closing_reason)
            .await?
        {
            FinishOutcome::Finished(conversation) => {
                tracing::info!(
                    conversation_id = %conversation_id,
                    "Conversation finished: {}",
                    closing_reason
                );

                self.publish(SystemEvent::ConversationFinished {
                    conversation_id: conversation.id.clone(),
                    agent_id: conversation.agent_id.clone(),
                    closing_reason: closing_reason.to_string(),
                    finished_at: conversation
                        .finished_at
                        .clone()
                        .unwrap_or_else(now_rfc3339),
                });

                Ok(conversation)
            }
            FinishOutcome::AlreadyClosed(conversation) => {
                tracing::debug!(
                    conversation_id = %conversation_id,
                    "Conversation already closed, nothing to do"
                );
                Ok(conversation)
            }
        }
    }

    pub async fn rate_conversation(
        &self,
        conversation_id: &str,
        score: i64,
    ) -> DomainResult<Conversation> {
        let rate = validate_rating(score)?;
        let conversation = self
            .conversation_repo
            .rate_conversation(conversation_id, rate)
            .await?;

        tracing::info!(conversation_id = %conversation_id, rate = rate, "Conversation rated");

        self.publish(SystemEvent::ConversationRated {
            conversation_id: conversation.id.clone(),
            agent_id: conversation.agent_id.clone(),
            rate,
            timestamp: now_rfc3339(),
        });

        Ok(conversation)
    }

    pub async fn queue_depth(&self) -> DomainResult<QueueDepthResponse> {
        let pending_count = self.conversation_repo.count_pending_queue().await?;
        Ok(QueueDepthResponse { pending_count })
    }

    /// Relays a typing indicator. Nothing is stored.
    pub async fn notify_typing(&self, conversation_id: &str, user_id: &str) -> DomainResult<()> {
        self.require_conversation(conversation_id).await?;
        self.publish(SystemEvent::Typing {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.to_string(),
        });
        Ok(())
    }

    async fn require_conversation(&self, id: &str) -> DomainResult<Conversation> {
        self.conversation_repo
            .get_conversation_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Conversation {} not found", id)))
    }

    fn publish(&self, event: SystemEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            tracing::warn!("Failed to publish event: {}", e);
        }
    }
}
