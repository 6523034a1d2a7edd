pub mod admin_service;
pub mod application_service;
pub mod auth_service;
pub mod cart_service;
pub mod florist_service;
pub mod fulfillment_service;
pub mod order_service;
pub mod product_service;
pub mod webhook_service;
