use crate::application::services::CapacityTracker;
use crate::domain::entities::Conversation;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::conversation_repository::{AssignmentCommit, ConversationRepository};
use crate::domain::services::CapacitySnapshot;
use crate::shared::events::{AssignmentOrigin, EventBus, SystemEvent};
use crate::shared::utils::now_rfc3339;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Why a conversation was left in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    NoAvailableAgent,
    /// Another writer assigned it first, or it is no longer pending.
    AlreadyAssigned,
    NotFound,
    StorageError,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoAvailableAgent => "no_available_agent",
            SkipReason::AlreadyAssigned => "already_assigned",
            SkipReason::NotFound => "not_found",
            SkipReason::StorageError => "storage_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned(String),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedPair {
    pub conversation_id: String,
    pub agent_id: String,
}

/// Summary of one distribution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionReport {
    pub assigned: Vec<AssignedPair>,
    pub skipped: usize,
    /// Pending conversations left after the pass.
    pub remaining: i64,
    pub cancelled: bool,
    /// Another pass held the guard; this one did nothing.
    pub already_running: bool,
}

/// Matches pending conversations to agents. Manual and automatic assignment
/// share the store's transactional primitive.
#[derive(Clone)]
pub struct AssignmentService {
    conversation_repo: Arc<dyn ConversationRepository>,
    capacity: CapacityTracker,
    event_bus: Arc<dyn EventBus>,
    pass_guard: Arc<Mutex<()>>,
}

impl AssignmentService {
    pub fn new(
        conversation_repo: Arc<dyn ConversationRepository>,
        capacity: CapacityTracker,
        event_bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            conversation_repo,
            capacity,
            event_bus,
            pass_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn capacity(&self) -> &CapacityTracker {
        &self.capacity
    }

    /// Manual assignment of a specific conversation to a specific agent.
    /// Availability is not checked; capacity is.
    #[tracing::instrument(skip(self), fields(operation = "assign"))]
    pub async fn assign(&self, conversation_id: &str, agent_id: &str) -> DomainResult<Conversation> {
        let commit = self
            .conversation_repo
            .assign_conversation(conversation_id, agent_id, self.capacity.cap())
            .await
            .map_err(|e| {
                record_rejection(&e);
                e
            })?;

        tracing::info!(
            "Conversation {} manually assigned to agent {}",
            conversation_id,
            agent_id
        );
        metrics::counter!("deskqueue_assignments_total", "path" => "manual").increment(1);

        self.publish_assignment(&commit, AssignmentOrigin::Manual);
        Ok(commit.conversation)
    }

    /// Picks the least-loaded available agent for one conversation.
    #[tracing::instrument(skip(self), fields(operation = "try_assign"))]
    pub async fn try_assign(&self, conversation_id: &str) -> DomainResult<AssignOutcome> {
        let mut snapshot = self.capacity.snapshot().await?;
        Ok(self.assign_from_snapshot(conversation_id, &mut snapshot).await)
    }

    async fn assign_from_snapshot(
        &self,
        conversation_id: &str,
        snapshot: &mut CapacitySnapshot,
    ) -> AssignOutcome {
        loop {
            let agent_id = match snapshot.pick_agent() {
                Some(load) => load.agent_id.clone(),
                None => return AssignOutcome::Skipped(SkipReason::NoAvailableAgent),
            };

            match self
                .conversation_repo
                .assign_conversation(conversation_id, &agent_id, snapshot.cap())
                .await
            {
                Ok(commit) => {
                    snapshot.record_assignment(&agent_id);
                    metrics::counter!("deskqueue_assignments_total", "path" => "auto")
                        .increment(1);
                    tracing::info!(
                        conversation_id = %conversation_id,
                        agent_id = %agent_id,
                        "Conversation assigned"
                    );
                    self.publish_assignment(&commit, AssignmentOrigin::Scheduler);
                    return AssignOutcome::Assigned(agent_id);
                }
                Err(err @ DomainError::CapacityExceeded(_)) => {
                    // Snapshot was stale; try the next candidate.
                    record_rejection(&err);
                    tracing::debug!(agent_id = %agent_id, "Agent full at commit time");
                    snapshot.mark_full(&agent_id);
                }
                Err(err @ (DomainError::Conflict(_) | DomainError::InvalidState(_))) => {
                    record_rejection(&err);
                    tracing::debug!(
                        conversation_id = %conversation_id,
                        "Conversation no longer pending: {}",
                        err
                    );
                    return AssignOutcome::Skipped(SkipReason::AlreadyAssigned);
                }
                Err(err @ DomainError::NotFound(_)) => {
                    record_rejection(&err);
                    tracing::warn!(conversation_id = %conversation_id, "Skipping: {}", err);
                    return AssignOutcome::Skipped(SkipReason::NotFound);
                }
                Err(err) => {
                    record_rejection(&err);
                    tracing::error!(
                        conversation_id = %conversation_id,
                        agent_id = %agent_id,
                        "Assignment failed, will retry next pass: {}",
                        err
                    );
                    return AssignOutcome::Skipped(SkipReason::StorageError);
                }
            }
        }
    }

    /// Walks the pending queue oldest first and assigns each conversation to
    /// the least-loaded agent with free capacity. Each assignment commits on
    /// its own; cancellation is checked between assignments.
    ///
    /// At most one pass runs at a time across all clones of the service. A
    /// call made while another pass holds the guard returns immediately with
    /// `already_running` set.
    #[tracing::instrument(skip(self, cancel), fields(operation = "distribution_pass"))]
    pub async fn run_distribution_pass(
        &self,
        cancel: &CancellationToken,
    ) -> DomainResult<DistributionReport> {
        let _running = match self.pass_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::info!("Distribution pass already running; skipping");
                metrics::counter!("deskqueue_distribution_passes_skipped_total").increment(1);
                return Ok(DistributionReport {
                    already_running: true,
                    ..Default::default()
                });
            }
        };

        let started = Instant::now();
        let mut report = DistributionReport::default();

        let queue = self.conversation_repo.get_pending_queue().await?;
        if !queue.is_empty() {
            let mut snapshot = self.capacity.snapshot().await?;
            tracing::debug!(
                pending = queue.len(),
                free_slots = snapshot.remaining_capacity(),
                "Starting distribution pass"
            );

            for conversation in &queue {
                if cancel.is_cancelled() {
                    tracing::info!("Distribution pass cancelled");
                    report.cancelled = true;
                    break;
                }

                if !snapshot.has_capacity() {
                    tracing::info!("No agent has free capacity; leaving the rest pending");
                    break;
                }

                match self.assign_from_snapshot(&conversation.id, &mut snapshot).await {
                    AssignOutcome::Assigned(agent_id) => report.assigned.push(AssignedPair {
                        conversation_id: conversation.id.clone(),
                        agent_id,
                    }),
                    AssignOutcome::Skipped(SkipReason::NoAvailableAgent) => break,
                    AssignOutcome::Skipped(reason) => {
                        tracing::debug!(
                            conversation_id = %conversation.id,
                            reason = reason.as_str(),
                            "Conversation skipped"
                        );
                        report.skipped += 1;
                    }
                }
            }
        }

        report.remaining = self.conversation_repo.count_pending_queue().await?;

        metrics::gauge!("deskqueue_queue_depth").set(report.remaining as f64);
        metrics::histogram!("deskqueue_distribution_pass_seconds")
            .record(started.elapsed().as_secs_f64());

        tracing::info!(
            assigned = report.assigned.len(),
            skipped = report.skipped,
            remaining = report.remaining,
            "Distribution pass complete"
        );

        self.publish_queue_depth(report.remaining);
        Ok(report)
    }

    /// Counts the queue and pushes the depth to every client.
    pub async fn broadcast_queue_depth(&self) -> DomainResult<i64> {
        let count = self.conversation_repo.count_pending_queue().await?;
        metrics::gauge!("deskqueue_queue_depth").set(count as f64);
        self.publish_queue_depth(count);
        Ok(count)
    }

    fn publish_queue_depth(&self, count: i64) {
        if let Err(e) = self.event_bus.publish(SystemEvent::QueueDepthChanged {
            count,
            timestamp: now_rfc3339(),
        }) {
            tracing::warn!("Failed to publish queue depth: {}", e);
        }
    }

    pub(crate) fn publish_assignment(&self, commit: &AssignmentCommit, origin: AssignmentOrigin) {
        let agent_id = commit.conversation.agent_id.clone().unwrap_or_default();
        let events = [
            SystemEvent::ConversationAssigned {
                conversation_id: commit.conversation.id.clone(),
                agent_id,
                origin,
                timestamp: commit
                    .conversation
                    .started_at
                    .clone()
                    .unwrap_or_else(now_rfc3339),
            },
            SystemEvent::MessageCreated {
                message: commit.system_message.clone(),
            },
        ];

        for event in events {
            if let Err(e) = self.event_bus.publish(event) {
                tracing::warn!(
                    "Failed to publish assignment event for {}: {}",
                    commit.conversation.id,
                    e
                );
            }
        }
    }
}

fn record_rejection(err: &DomainError) {
    let reason = match err {
        DomainError::CapacityExceeded(_) => "capacity_exceeded",
        DomainError::Conflict(_) | DomainError::InvalidState(_) => "conflict",
        DomainError::NotFound(_) => "not_found",
        DomainError::Validation(_) => "validation",
        DomainError::Internal(_) => "internal",
    };
    metrics::counter!("deskqueue_assignment_rejections_total", "reason" => reason).increment(1);
}
