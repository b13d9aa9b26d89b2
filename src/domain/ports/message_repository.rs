use crate::domain::entities::{ConversationMessage, NewMessage, PageRequest};
use crate::domain::errors::DomainResult;

#[async_trait::async_trait]
pub trait MessageRepository: Send + Sync {
    /// Appends a message. Fails with `NotFound` if the conversation is absent.
    async fn add_message(&self, message: &NewMessage) -> DomainResult<ConversationMessage>;

    /// Newest page first at the storage level; callers sort for display.
    async fn list_messages(
        &self,
        conversation_id: &str,
        page: PageRequest,
    ) -> DomainResult<(Vec<ConversationMessage>, i64)>;

    async fn get_all_messages(&self, conversation_id: &str)
        -> DomainResult<Vec<ConversationMessage>>;
}
