use crate::domain::entities::{Agent, AgentLoad};
use crate::domain::errors::DomainResult;

#[async_trait::async_trait]
pub trait AgentRepository: Send + Sync {
    async fn create_agent(&self, agent: &Agent) -> DomainResult<()>;

    async fn get_agent_by_id(&self, id: &str) -> DomainResult<Option<Agent>>;

    /// Returns the updated agent, or `None` if it does not exist.
    async fn set_agent_availability(&self, id: &str, available: bool)
        -> DomainResult<Option<Agent>>;

    /// Open-conversation counts for every available agent, in one query.
    async fn get_available_agent_loads(&self) -> DomainResult<Vec<AgentLoad>>;

    async fn count_open_conversations(&self, agent_id: &str) -> DomainResult<i64>;
}
