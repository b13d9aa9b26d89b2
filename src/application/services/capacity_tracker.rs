use crate::domain::errors::DomainResult;
use crate::domain::ports::agent_repository::AgentRepository;
use crate::domain::services::CapacitySnapshot;
use std::sync::Arc;

/// Loads per-agent open counts for the distribution pass.
#[derive(Clone)]
pub struct CapacityTracker {
    agent_repo: Arc<dyn AgentRepository>,
    cap: i64,
}

impl CapacityTracker {
    pub fn new(agent_repo: Arc<dyn AgentRepository>, cap: i64) -> Self {
        Self { agent_repo, cap }
    }

    pub fn cap(&self) -> i64 {
        self.cap
    }

    /// Snapshot of every available agent. Advisory only: the store re-checks
    /// the cap when it commits an assignment.
    pub async fn snapshot(&self) -> DomainResult<CapacitySnapshot> {
        let loads = self.agent_repo.get_available_agent_loads().await?;
        tracing::debug!(
            agents = loads.len(),
            cap = self.cap,
            "Loaded capacity snapshot"
        );
        Ok(CapacitySnapshot::new(self.cap, loads))
    }
}
