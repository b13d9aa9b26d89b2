use crate::domain::entities::Agent;
use crate::infrastructure::http::middleware::{ApiError, AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

pub const AGENT_ID_HEADER: &str = "x-agent-id";

/// The agent identified by the upstream gateway.
#[derive(Debug, Clone)]
pub struct AuthenticatedAgent {
    pub agent: Agent,
}

/// Resolves `X-Agent-Id` to an agent and stores it as a request extension.
pub async fn require_agent(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let agent_id = request
        .headers()
        .get(AGENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    let agent = state.availability_service.get_agent(&agent_id).await?;

    request
        .extensions_mut()
        .insert(AuthenticatedAgent { agent });

    Ok(next.run(request).await)
}
