use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{FloristApplication, FloristProfile, Profile};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitApplicationRequest {
    pub email: String,
    pub full_name: String,
    pub business_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectApplicationRequest {
    pub reason: Option<String>,
    #[serde(default)]
    pub allow_reapply: bool,
    pub cooldown_days: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProvisionFloristRequest {
    pub email: String,
    pub full_name: Option<String>,
    pub store_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    /// Generated when omitted and sent in the welcome email.
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvisionedFlorist {
    pub profile: Profile,
    pub florist: FloristProfile,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplicationList {
    pub items: Vec<FloristApplication>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplicationDecision {
    pub application: FloristApplication,
    pub provisioned: Option<ProvisionedFlorist>,
}
