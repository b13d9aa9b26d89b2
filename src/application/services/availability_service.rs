use crate::domain::entities::Agent;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::agent_repository::AgentRepository;
use crate::shared::events::{EventBus, SystemEvent};
use std::sync::Arc;

#[derive(Clone)]
pub struct AvailabilityService {
    agent_repo: Arc<dyn AgentRepository>,
    event_bus: Arc<dyn EventBus>,
}

impl AvailabilityService {
    pub fn new(agent_repo: Arc<dyn AgentRepository>, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            agent_repo,
            event_bus,
        }
    }

    /// Toggles eligibility for automatic assignment. Conversations the agent
    /// already holds stay where they are.
    pub async fn set_availability(&self, agent_id: &str, available: bool) -> DomainResult<Agent> {
        let agent = self
            .agent_repo
            .set_agent_availability(agent_id, available)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Agent {} not found", agent_id)))?;

        tracing::info!(
            agent_id = %agent_id,
            available = available,
            "Agent availability changed"
        );

        if let Err(e) = self.event_bus.publish(SystemEvent::AgentAvailabilityChanged {
            agent_id: agent.id.clone(),
            available,
            timestamp: agent.updated_at.clone(),
        }) {
            tracing::warn!("Failed to publish availability change: {}", e);
        }

        Ok(agent)
    }

    pub async fn get_agent(&self, agent_id: &str) -> DomainResult<Agent> {
        self.agent_repo
            .get_agent_by_id(agent_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Agent {} not found", agent_id)))
    }
}
