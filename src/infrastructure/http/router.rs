use crate::infrastructure::http::controllers::{availability, conversations, realtime};
use crate::infrastructure::http::middleware::{require_agent, AppState};
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    // Routes acting on behalf of the calling agent
    let agent_scoped = Router::new()
        .route(
            "/api/users/availability",
            patch(availability::update_availability),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_agent,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/conversations",
            get(conversations::list_conversations).post(conversations::create_conversation),
        )
        .route(
            "/api/conversations/message",
            post(conversations::add_message),
        )
        .route(
            "/api/conversations/assign",
            post(conversations::assign_conversation),
        )
        .route(
            "/api/conversations/finish",
            patch(conversations::finish_conversation),
        )
        .route(
            "/api/conversations/rate",
            patch(conversations::rate_conversation),
        )
        .route(
            "/api/conversations/queue",
            get(conversations::get_queue_depth),
        )
        .route(
            "/api/conversations/distribute",
            post(conversations::distribute),
        )
        .route(
            "/api/conversations/:id",
            get(conversations::get_conversation),
        )
        .route(
            "/api/conversations/:id/messages",
            get(conversations::list_messages),
        )
        .route(
            "/api/agents/:id/conversations",
            get(conversations::list_agent_conversations),
        )
        .route("/ws", get(realtime::websocket_handler))
        .merge(agent_scoped)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}
