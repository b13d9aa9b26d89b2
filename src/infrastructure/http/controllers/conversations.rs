use crate::application::services::DistributionReport;
use crate::domain::entities::*;
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState};
use crate::infrastructure::http::validation::ValidatedJson;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    fn to_page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentConversationParams {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// POST /api/conversations - Open a conversation, optionally with an agent
pub async fn create_conversation(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<CreateConversation>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    let conversation = state
        .conversation_service
        .create_conversation(request)
        .await?;

    Ok((StatusCode::CREATED, Json(conversation)))
}

/// POST /api/conversations/message - Append a message
pub async fn add_message(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<AddMessageRequest>,
) -> ApiResult<(StatusCode, Json<ConversationMessage>)> {
    let message = state
        .conversation_service
        .post_message(
            &request.conversation_id,
            request.by,
            request.content,
            request.agent_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/conversations/assign - Manually assign to an agent
pub async fn assign_conversation(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<AssignConversationRequest>,
) -> ApiResult<Json<Conversation>> {
    let conversation = state
        .assignment_service
        .assign(&request.conversation_id, &request.agent_id)
        .await?;

    Ok(Json(conversation))
}

/// PATCH /api/conversations/finish
pub async fn finish_conversation(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<FinishConversationRequest>,
) -> ApiResult<Json<Conversation>> {
    let conversation = state
        .conversation_service
        .finish_conversation(&request.conversation_id, &request.closing_reason)
        .await?;

    Ok(Json(conversation))
}

/// PATCH /api/conversations/rate
pub async fn rate_conversation(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RateConversationRequest>,
) -> ApiResult<Json<Conversation>> {
    let conversation = state
        .conversation_service
        .rate_conversation(&request.conversation_id, request.rating)
        .await?;

    Ok(Json(conversation))
}

/// GET /api/conversations/queue
pub async fn get_queue_depth(State(state): State<AppState>) -> ApiResult<Json<QueueDepthResponse>> {
    Ok(Json(state.conversation_service.queue_depth().await?))
}

/// GET /api/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Paginated<Conversation>>> {
    let page = state
        .conversation_service
        .list_conversations(params.to_page_request())
        .await?;

    Ok(Json(page))
}

/// GET /api/conversations/:id - Conversation with its messages
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConversationWithMessages>> {
    Ok(Json(state.conversation_service.get_conversation(&id).await?))
}

/// GET /api/conversations/:id/messages
pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Paginated<ConversationMessage>>> {
    let page = state
        .conversation_service
        .list_messages(&id, params.to_page_request())
        .await?;

    Ok(Json(page))
}

/// GET /api/agents/:id/conversations?status=open|closed
pub async fn list_agent_conversations(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(params): Query<AgentConversationParams>,
) -> ApiResult<Json<Paginated<Conversation>>> {
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ConversationStatus>)
        .transpose()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let page = state
        .conversation_service
        .list_agent_conversations(
            &agent_id,
            status,
            PageRequest::new(params.page, params.limit),
        )
        .await?;

    Ok(Json(page))
}

/// POST /api/conversations/distribute - Run a distribution pass now
pub async fn distribute(State(state): State<AppState>) -> ApiResult<Json<DistributionReport>> {
    let report = state
        .assignment_service
        .run_distribution_pass(&CancellationToken::new())
        .await?;

    Ok(Json(report))
}
