use crate::domain::entities::{
    Conversation, ConversationMessage, ConversationStatus, CreateConversation, PageRequest,
};
use crate::domain::errors::DomainResult;

/// Result of a committed `Pending -> Open` transition.
#[derive(Debug, Clone)]
pub struct AssignmentCommit {
    pub conversation: Conversation,
    /// System message announcing the agent, written in the same transaction.
    pub system_message: ConversationMessage,
}

#[derive(Debug, Clone)]
pub enum FinishOutcome {
    Finished(Conversation),
    /// Already closed before the call; nothing was written.
    AlreadyClosed(Conversation),
}

/// Transactional store for conversations. Every mutating method commits in
/// one transaction or leaves the record untouched.
#[async_trait::async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Inserts a conversation. When `create.agent_id` is set the conversation
    /// is assigned in the same transaction, subject to `capacity`.
    async fn create_conversation(
        &self,
        create: &CreateConversation,
        capacity: i64,
    ) -> DomainResult<(Conversation, Option<AssignmentCommit>)>;

    async fn get_conversation_by_id(&self, id: &str) -> DomainResult<Option<Conversation>>;

    async fn list_conversations(&self, page: PageRequest)
        -> DomainResult<(Vec<Conversation>, i64)>;

    async fn list_agent_conversations(
        &self,
        agent_id: &str,
        status: Option<ConversationStatus>,
        page: PageRequest,
    ) -> DomainResult<(Vec<Conversation>, i64)>;

    /// Pending conversations with no agent, oldest first.
    async fn get_pending_queue(&self) -> DomainResult<Vec<Conversation>>;

    async fn count_pending_queue(&self) -> DomainResult<i64>;

    /// `Pending -> Open`. Re-checks the agent's live open count against
    /// `capacity` inside the transaction.
    async fn assign_conversation(
        &self,
        conversation_id: &str,
        agent_id: &str,
        capacity: i64,
    ) -> DomainResult<AssignmentCommit>;

    /// `Open -> Closed`.
    async fn finish_conversation(
        &self,
        conversation_id: &str,
        closing_reason: &str,
    ) -> DomainResult<FinishOutcome>;

    async fn rate_conversation(&self, conversation_id: &str, rate: u8)
        -> DomainResult<Conversation>;
}
