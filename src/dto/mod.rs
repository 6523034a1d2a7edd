pub mod admin;
pub mod applications;
pub mod auth;
pub mod cart;
pub mod florists;
pub mod orders;
pub mod products;
pub mod webhooks;
