use crate::application::listeners::{run_fanout_listener, FanoutRouter};
use crate::application::services::*;
use crate::config::Config;
use crate::domain::ports::agent_repository::AgentRepository;
use crate::domain::ports::conversation_repository::ConversationRepository;
use crate::domain::ports::message_repository::MessageRepository;
use crate::domain::ports::task_spawner::TaskSpawner;
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::persistence::Database;
use crate::infrastructure::providers::connection_manager::{
    ConnectionManager, InMemoryConnectionManager,
};
use crate::infrastructure::workers::{DistributionScheduler, SchedulerSettings};
use crate::shared::events::{EventBus, LocalEventBus};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Wires repositories, services and the connection registry. Spawns nothing.
pub fn build_app_state(db: Database, config: &Config) -> AppState {
    let conversation_repo = Arc::new(db.clone()) as Arc<dyn ConversationRepository>;
    let message_repo = Arc::new(db.clone()) as Arc<dyn MessageRepository>;
    let agent_repo = Arc::new(db) as Arc<dyn AgentRepository>;

    let event_bus = Arc::new(LocalEventBus::new(config.event_bus_capacity)) as Arc<dyn EventBus>;
    tracing::info!(
        "Event bus initialized with capacity {}",
        config.event_bus_capacity
    );

    let capacity_tracker = CapacityTracker::new(agent_repo.clone(), config.agent_capacity);
    let assignment_service = AssignmentService::new(
        conversation_repo.clone(),
        capacity_tracker,
        event_bus.clone(),
    );

    let conversation_service = ConversationService::new(
        conversation_repo,
        message_repo,
        agent_repo.clone(),
        assignment_service.clone(),
        event_bus.clone(),
    );

    let availability_service = AvailabilityService::new(agent_repo, event_bus.clone());

    let connection_manager =
        Arc::new(InMemoryConnectionManager::new()) as Arc<dyn ConnectionManager>;

    AppState {
        conversation_service,
        assignment_service,
        availability_service,
        connection_manager,
        event_bus,
        client_channel_capacity: config.client_channel_capacity,
    }
}

/// Starts the fan-out listener and, unless disabled, the distribution
/// scheduler. Both stop when `shutdown` is cancelled.
pub fn start_background_tasks(
    state: &AppState,
    db: &Database,
    config: &Config,
    spawner: &dyn TaskSpawner,
    shutdown: CancellationToken,
) {
    let router = FanoutRouter::new(
        state.connection_manager.clone(),
        Arc::new(db.clone()) as Arc<dyn ConversationRepository>,
    );
    spawner.spawn(Box::pin(run_fanout_listener(
        state.event_bus.clone(),
        router,
        shutdown.clone(),
    )));

    if config.scheduler_enabled {
        let scheduler = DistributionScheduler::new(
            state.assignment_service.clone(),
            SchedulerSettings {
                distribution_interval: config.distribution_interval,
                queue_depth_interval: config.queue_depth_interval,
            },
            shutdown,
        );
        spawner.spawn(Box::pin(scheduler.run()));
    } else {
        tracing::info!("Distribution scheduler disabled by configuration");
    }
}
