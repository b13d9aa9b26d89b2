use crate::domain::entities::AgentLoad;

pub const DEFAULT_AGENT_CAPACITY: i64 = 3;

/// In-memory view of agent loads for one distribution pass.
///
/// The snapshot only drives agent selection. It goes stale as soon as other
/// writers commit, so the store re-checks capacity when it writes.
#[derive(Debug, Clone)]
pub struct CapacitySnapshot {
    cap: i64,
    loads: Vec<AgentLoad>,
}

impl CapacitySnapshot {
    pub fn new(cap: i64, loads: Vec<AgentLoad>) -> Self {
        Self { cap, loads }
    }

    pub fn cap(&self) -> i64 {
        self.cap
    }

    pub fn has_capacity(&self) -> bool {
        self.loads.iter().any(|l| l.open_count < self.cap)
    }

    /// Free slots left across all agents in the snapshot.
    pub fn remaining_capacity(&self) -> i64 {
        self.loads
            .iter()
            .map(|l| (self.cap - l.open_count).max(0))
            .sum()
    }

    /// Least-loaded agent below the cap. Ties go to the lowest agent id so the
    /// choice never depends on the order rows came back in.
    pub fn pick_agent(&self) -> Option<&AgentLoad> {
        self.loads
            .iter()
            .filter(|l| l.open_count < self.cap)
            .min_by(|a, b| {
                a.open_count
                    .cmp(&b.open_count)
                    .then_with(|| a.agent_id.cmp(&b.agent_id))
            })
    }

    pub fn record_assignment(&mut self, agent_id: &str) {
        if let Some(load) = self.loads.iter_mut().find(|l| l.agent_id == agent_id) {
            load.open_count += 1;
        }
    }

    /// The store reported the agent at cap although the snapshot disagreed.
    pub fn mark_full(&mut self, agent_id: &str) {
        let cap = self.cap;
        if let Some(load) = self.loads.iter_mut().find(|l| l.agent_id == agent_id) {
            load.open_count = load.open_count.max(cap);
        }
    }

    pub fn open_count(&self, agent_id: &str) -> Option<i64> {
        self.loads
            .iter()
            .find(|l| l.agent_id == agent_id)
            .map(|l| l.open_count)
    }
}
