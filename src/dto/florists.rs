use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    integrations::RouteEstimate,
    models::{DayHours, FloristProfile},
};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateFloristProfileRequest {
    pub store_name: Option<String>,
    pub about: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[schema(value_type = Option<std::collections::BTreeMap<String, DayHours>>)]
    pub operating_hours: Option<crate::models::OperatingHours>,
    pub delivery_enabled: Option<bool>,
    pub pickup_enabled: Option<bool>,
    pub delivery_radius_km: Option<f64>,
    pub delivery_fee: Option<i64>,
    pub minimum_order: Option<i64>,
    pub same_day_cutoff: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FloristList {
    pub items: Vec<FloristProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SetupProgress {
    pub store_details: bool,
    pub address: bool,
    pub operating_hours: bool,
    pub fulfillment_settings: bool,
    pub products: bool,
    pub completed_steps: u8,
    pub total_steps: u8,
    pub percent: u8,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeliveryQuoteQuery {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryQuote {
    pub route: RouteEstimate,
    pub delivery_radius_km: f64,
    pub within_radius: bool,
    pub delivery_fee: i64,
    pub minimum_order: i64,
}
