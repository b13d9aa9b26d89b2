//! Request validation applied by handlers before calling into services.
//!
//! Each check is a small function returning `Result<(), ApiError>`; request
//! types combine them in their [`Validate`] impl.

use crate::domain::entities::{
    AddMessageRequest, AssignConversationRequest, CreateConversation, FinishConversationRequest,
    MessageAuthor, RateConversationRequest, UpdateAvailabilityRequest,
};
use crate::domain::services::{MAX_RATING, MIN_RATING};
use crate::infrastructure::http::middleware::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

pub const MAX_SUBJECT_LEN: usize = 255;
pub const MAX_CONTENT_LEN: usize = 10_000;
pub const MAX_REASON_LEN: usize = 1_000;

pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

pub fn require_non_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

pub fn require_max_len(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

pub fn require_range(field: &str, value: i64, min: i64, max: i64) -> Result<(), ApiError> {
    if value < min || value > max {
        return Err(ApiError::Validation(format!(
            "{} must be between {} and {}",
            field, min, max
        )));
    }
    Ok(())
}

pub fn require_id(field: &str, value: &str) -> Result<(), ApiError> {
    require_non_empty(field, value)?;
    require_max_len(field, value, 64)
}

impl Validate for CreateConversation {
    fn validate(&self) -> Result<(), ApiError> {
        require_non_empty("subject", &self.subject)?;
        require_max_len("subject", &self.subject, MAX_SUBJECT_LEN)?;
        require_id("consumerId", &self.consumer_id)?;
        if let Some(agent_id) = &self.agent_id {
            require_id("agentId", agent_id)?;
        }
        Ok(())
    }
}

impl Validate for AddMessageRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_id("conversationId", &self.conversation_id)?;
        require_non_empty("content", &self.content)?;
        require_max_len("content", &self.content, MAX_CONTENT_LEN)?;
        if self.by == MessageAuthor::System {
            return Err(ApiError::Validation(
                "System messages cannot be posted by clients".to_string(),
            ));
        }
        if let Some(agent_id) = &self.agent_id {
            require_id("agentId", agent_id)?;
        }
        Ok(())
    }
}

impl Validate for AssignConversationRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_id("conversationId", &self.conversation_id)?;
        require_id("agentId", &self.agent_id)
    }
}

impl Validate for FinishConversationRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_id("conversationId", &self.conversation_id)?;
        require_non_empty("closingReason", &self.closing_reason)?;
        require_max_len("closingReason", &self.closing_reason, MAX_REASON_LEN)
    }
}

impl Validate for RateConversationRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_id("conversationId", &self.conversation_id)?;
        require_range("rating", self.rating, MIN_RATING, MAX_RATING)
    }
}

impl Validate for UpdateAvailabilityRequest {
    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

/// JSON body extractor that reports malformed bodies and failed checks in
/// the standard error shape.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}
