pub mod assignment_service;
pub mod availability_service;
pub mod capacity_tracker;
pub mod conversation_service;

pub use assignment_service::{
    AssignOutcome, AssignedPair, AssignmentService, DistributionReport, SkipReason,
};
pub use availability_service::AvailabilityService;
pub use capacity_tracker::CapacityTracker;
pub use conversation_service::ConversationService;
