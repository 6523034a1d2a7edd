use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::applications::SubmitApplicationRequest,
    error::AppResult,
    models::FloristApplication,
    response::ApiResponse,
    services::application_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(submit_application))
}

#[utoipa::path(
    post,
    path = "/api/applications",
    request_body = SubmitApplicationRequest,
    responses(
        (status = 200, description = "Application received", body = ApiResponse<FloristApplication>),
        (status = 400, description = "Invalid application or reapply window not open"),
        (status = 409, description = "Application already pending or approved")
    ),
    tag = "Applications"
)]
pub async fn submit_application(
    State(state): State<AppState>,
    Json(payload): Json<SubmitApplicationRequest>,
) -> AppResult<Json<ApiResponse<FloristApplication>>> {
    let resp = application_service::submit_application(&state, payload).await?;
    Ok(Json(resp))
}
