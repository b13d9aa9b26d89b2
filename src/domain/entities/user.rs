use serde::{Deserialize, Serialize};

/// An internal user who answers conversations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub username: String,
    pub profile: String,
    pub available: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Agent {
    pub fn new(username: String) -> Self {
        let now = crate::shared::utils::now_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username,
            profile: "agent".to_string(),
            available: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// The external customer who opens conversations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Consumer {
    pub id: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub created_at: String,
}

impl Consumer {
    pub fn new(first_name: String, last_name: Option<String>, email: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            first_name,
            last_name,
            email,
            created_at: crate::shared::utils::now_rfc3339(),
        }
    }
}

/// One row of the capacity snapshot: an available agent and how many open
/// conversations it currently holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentLoad {
    pub agent_id: String,
    pub username: String,
    pub open_count: i64,
}

/// Request body for `PATCH /api/users/availability`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub available: bool,
}
