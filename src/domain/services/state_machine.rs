use crate::domain::entities::{Conversation, ConversationStatus};
use crate::domain::errors::{DomainError, DomainResult};
use thiserror::Error;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ConversationStatus,
        to: ConversationStatus,
    },
}

impl From<TransitionError> for DomainError {
    fn from(err: TransitionError) -> Self {
        DomainError::InvalidState(err.to_string())
    }
}

/// Validates if a state transition is allowed.
///
/// The lifecycle is strictly forward: `Pending -> Open -> Closed`. `Closed`
/// is terminal and no transition leads back.
pub fn validate_transition(
    from: ConversationStatus,
    to: ConversationStatus,
) -> Result<(), TransitionError> {
    use ConversationStatus::*;

    match (from, to) {
        (Pending, Open) => Ok(()),
        (Open, Closed) => Ok(()),
        _ => Err(TransitionError::InvalidTransition { from, to }),
    }
}

/// An assignment may only target a conversation still waiting in the queue.
/// Anything else means another writer got there first.
pub fn check_assignable(conversation: &Conversation) -> DomainResult<()> {
    if conversation.status != ConversationStatus::Pending || conversation.agent_id.is_some() {
        return Err(DomainError::Conflict(format!(
            "Conversation {} is already {}",
            conversation.id, conversation.status
        )));
    }
    Ok(())
}

/// Outcome of checking whether a conversation can be finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishDecision {
    Proceed,
    AlreadyClosed,
}

pub fn check_finishable(conversation: &Conversation) -> DomainResult<FinishDecision> {
    match conversation.status {
        ConversationStatus::Closed => Ok(FinishDecision::AlreadyClosed),
        from => {
            validate_transition(from, ConversationStatus::Closed)?;
            Ok(FinishDecision::Proceed)
        }
    }
}

pub fn validate_rating(score: i64) -> DomainResult<u8> {
    if !(MIN_RATING..=MAX_RATING).contains(&score) {
        return Err(DomainError::Validation(format!(
            "Rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, score
        )));
    }
    Ok(score as u8)
}

/// Rating is only legal once the conversation is closed.
pub fn check_ratable(conversation: &Conversation) -> DomainResult<()> {
    if conversation.status != ConversationStatus::Closed {
        return Err(DomainError::InvalidState(format!(
            "Cannot rate conversation {} while it is {}",
            conversation.id, conversation.status
        )));
    }
    Ok(())
}
