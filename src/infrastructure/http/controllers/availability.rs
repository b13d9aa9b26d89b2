use crate::domain::entities::{Agent, UpdateAvailabilityRequest};
use crate::infrastructure::http::middleware::{ApiResult, AppState, AuthenticatedAgent};
use crate::infrastructure::http::validation::ValidatedJson;
use axum::{extract::State, Extension, Json};

/// PATCH /api/users/availability - The calling agent toggles its own availability
pub async fn update_availability(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedAgent>,
    ValidatedJson(request): ValidatedJson<UpdateAvailabilityRequest>,
) -> ApiResult<Json<Agent>> {
    let agent = state
        .availability_service
        .set_availability(&auth.agent.id, request.available)
        .await?;

    Ok(Json(agent))
}
