use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who authored a message. `User` is an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageAuthor {
    Consumer,
    User,
    System,
}

impl MessageAuthor {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageAuthor::Consumer => "consumer",
            MessageAuthor::User => "user",
            MessageAuthor::System => "system",
        }
    }
}

impl fmt::Display for MessageAuthor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageAuthor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consumer" => Ok(MessageAuthor::Consumer),
            "user" => Ok(MessageAuthor::User),
            "system" => Ok(MessageAuthor::System),
            other => Err(format!("unknown message author: {}", other)),
        }
    }
}

impl sqlx::Type<sqlx::Any> for MessageAuthor {
    fn type_info() -> sqlx::any::AnyTypeInfo {
        <String as sqlx::Type<sqlx::Any>>::type_info()
    }

    fn compatible(ty: &sqlx::any::AnyTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Any>>::compatible(ty)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Any> for MessageAuthor {
    fn decode(value: sqlx::any::AnyValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Any>>::decode(value)?;
        Ok(s.parse::<MessageAuthor>()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: String,
    pub conversation_id: String,
    pub agent_id: Option<String>,
    pub by: MessageAuthor,
    pub content: String,
    pub created_at: String,
    /// Insertion order, used to break ties between equal timestamps.
    #[serde(skip)]
    pub seq: i64,
}

/// A message about to be stored.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub agent_id: Option<String>,
    pub by: MessageAuthor,
    pub content: String,
}

impl NewMessage {
    pub fn system(conversation_id: &str, agent_id: Option<String>, content: String) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            agent_id,
            by: MessageAuthor::System,
            content,
        }
    }
}

/// Request body for `POST /api/conversations/message` and the realtime
/// `sendMessage` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMessageRequest {
    pub conversation_id: String,
    pub by: MessageAuthor,
    pub content: String,
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// Text of the system message appended when an agent picks up a conversation.
pub fn assignment_announcement(username: &str) -> String {
    format!(
        "Agent {} has been assigned to your conversation and will be with you shortly.",
        username
    )
}

/// Orders messages for display: oldest first, insertion order on ties.
pub fn sort_for_display(messages: &mut [ConversationMessage]) {
    messages.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.seq.cmp(&b.seq))
    });
}
