use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::message::ConversationMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Pending,
    Open,
    Closed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Pending => "pending",
            ConversationStatus::Open => "open",
            ConversationStatus::Closed => "closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationStatus::Closed)
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown conversation status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ConversationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ConversationStatus::Pending),
            "open" => Ok(ConversationStatus::Open),
            "closed" => Ok(ConversationStatus::Closed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// Stored as TEXT; read through the Any driver
impl sqlx::Type<sqlx::Any> for ConversationStatus {
    fn type_info() -> sqlx::any::AnyTypeInfo {
        <String as sqlx::Type<sqlx::Any>>::type_info()
    }

    fn compatible(ty: &sqlx::any::AnyTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Any>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Any> for ConversationStatus {
    fn decode(value: sqlx::any::AnyValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Any>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub subject: String,
    pub consumer_id: String,
    pub agent_id: Option<String>,
    pub status: ConversationStatus,
    pub rate: Option<u8>,
    pub closing_reason: Option<String>,
    pub created_at: String, // RFC 3339
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

impl Conversation {
    /// Checks the record-level invariants tying status, agent, start time and
    /// rating together. Returns a description of the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.status {
            ConversationStatus::Pending => {
                if self.agent_id.is_some() {
                    return Err("pending conversation must not have an agent".to_string());
                }
                if self.started_at.is_some() {
                    return Err("pending conversation must not have started".to_string());
                }
            }
            ConversationStatus::Open | ConversationStatus::Closed => {
                if self.agent_id.is_none() {
                    return Err(format!("{} conversation must have an agent", self.status));
                }
            }
        }
        if self.rate.is_some() && self.status != ConversationStatus::Closed {
            return Err("only closed conversations can carry a rating".to_string());
        }
        Ok(())
    }
}

/// Input for opening a new conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversation {
    pub subject: String,
    pub consumer_id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// Request body for `POST /api/conversations/assign`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignConversationRequest {
    pub conversation_id: String,
    pub agent_id: String,
}

/// Request body for `PATCH /api/conversations/finish`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishConversationRequest {
    pub conversation_id: String,
    pub closing_reason: String,
}

/// Request body for `PATCH /api/conversations/rate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateConversationRequest {
    pub conversation_id: String,
    pub rating: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDepthResponse {
    pub pending_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationWithMessages {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<ConversationMessage>,
}
