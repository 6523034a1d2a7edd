use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::florists::{DeliveryQuote, DeliveryQuoteQuery, FloristList},
    error::AppResult,
    models::FloristProfile,
    response::ApiResponse,
    routes::params::FloristQuery,
    services::florist_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_florists))
        .route("/{id}", get(get_florist))
        .route("/{id}/delivery-quote", get(delivery_quote))
}

#[utoipa::path(
    get,
    path = "/api/florists",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search store name or suburb")
    ),
    responses(
        (status = 200, description = "List stores", body = ApiResponse<FloristList>)
    ),
    tag = "Florists"
)]
pub async fn list_florists(
    State(state): State<AppState>,
    Query(query): Query<FloristQuery>,
) -> AppResult<Json<ApiResponse<FloristList>>> {
    let resp = florist_service::list_florists(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/florists/{id}",
    params(
        ("id" = Uuid, Path, description = "Florist ID")
    ),
    responses(
        (status = 200, description = "Store detail", body = ApiResponse<FloristProfile>),
        (status = 404, description = "Not Found")
    ),
    tag = "Florists"
)]
pub async fn get_florist(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FloristProfile>>> {
    let resp = florist_service::get_florist(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/florists/{id}/delivery-quote",
    params(
        ("id" = Uuid, Path, description = "Florist ID"),
        ("latitude" = f64, Query, description = "Delivery latitude"),
        ("longitude" = f64, Query, description = "Delivery longitude")
    ),
    responses(
        (status = 200, description = "Driving distance and fee", body = ApiResponse<DeliveryQuote>),
        (status = 400, description = "Invalid coordinates or store does not deliver"),
        (status = 404, description = "Not Found"),
        (status = 503, description = "Routing is not configured")
    ),
    tag = "Florists"
)]
pub async fn delivery_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeliveryQuoteQuery>,
) -> AppResult<Json<ApiResponse<DeliveryQuote>>> {
    let resp = florist_service::delivery_quote(&state, id, query).await?;
    Ok(Json(resp))
}
