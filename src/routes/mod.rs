use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod applications;
pub mod auth;
pub mod cart;
pub mod doc;
pub mod florist;
pub mod florists;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod webhooks;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/products", products::router())
        .nest("/florists", florists::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::route())
        .nest("/payment-methods", orders::payment_methods_route())
        .nest("/florist", florist::router())
        .nest("/applications", applications::router())
        .nest("/admin", admin::router())
        .nest("/webhooks", webhooks::router())
}
