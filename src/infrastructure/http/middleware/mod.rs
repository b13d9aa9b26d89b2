pub mod error;
pub mod identity;

pub use error::{ApiError, ApiResult};
pub use identity::{require_agent, AuthenticatedAgent, AGENT_ID_HEADER};

use crate::application::services::{AssignmentService, AvailabilityService, ConversationService};
use crate::infrastructure::providers::connection_manager::ConnectionManager;
use crate::shared::events::EventBus;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub conversation_service: ConversationService,
    pub assignment_service: AssignmentService,
    pub availability_service: AvailabilityService,
    pub connection_manager: Arc<dyn ConnectionManager>,
    pub event_bus: Arc<dyn EventBus>,
    pub client_channel_capacity: usize,
}
