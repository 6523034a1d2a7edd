use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{
        audit_logs::Model as AuditLogModel, florist_applications::Model as ApplicationModel,
        florist_profiles::Model as FloristModel, order_items::Model as OrderItemModel,
        order_status_history::Model as HistoryModel, orders::Model as OrderModel,
        payment_methods::Model as PaymentMethodModel, products::Model as ProductModel,
        profiles::Model as ProfileModel,
    },
    error::AppError,
    order_status::{FulfillmentType, OrderStatus},
};

pub const ROLE_CUSTOMER: &str = "customer";
pub const ROLE_FLORIST: &str = "florist";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<ProfileModel> for Profile {
    fn from(model: ProfileModel) -> Self {
        Self {
            id: model.id,
            email: model.email,
            full_name: model.full_name,
            role: model.role,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DayHours {
    pub open: Option<String>,
    pub close: Option<String>,
    #[serde(default)]
    pub closed: bool,
}

/// Keyed by lowercase weekday name.
pub type OperatingHours = BTreeMap<String, DayHours>;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FloristProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub store_name: String,
    pub about: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[schema(value_type = Option<BTreeMap<String, DayHours>>)]
    pub operating_hours: Option<OperatingHours>,
    pub delivery_enabled: bool,
    pub pickup_enabled: bool,
    pub delivery_radius_km: f64,
    pub delivery_fee: i64,
    pub minimum_order: i64,
    pub same_day_cutoff: Option<String>,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FloristModel> for FloristProfile {
    fn from(model: FloristModel) -> Self {
        // Unreadable hours are surfaced as "not set" rather than failing the read.
        let operating_hours = model
            .operating_hours
            .and_then(|value| serde_json::from_value(value).ok());
        Self {
            id: model.id,
            user_id: model.user_id,
            store_name: model.store_name,
            about: model.about,
            phone: model.phone,
            website: model.website,
            address: model.address,
            suburb: model.suburb,
            state: model.state,
            postcode: model.postcode,
            latitude: model.latitude,
            longitude: model.longitude,
            operating_hours,
            delivery_enabled: model.delivery_enabled,
            pickup_enabled: model.pickup_enabled,
            delivery_radius_km: model.delivery_radius_km,
            delivery_fee: model.delivery_fee,
            minimum_order: model.minimum_order,
            same_day_cutoff: model.same_day_cutoff,
            logo_url: model.logo_url,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub florist_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub images: Vec<String>,
    pub category: Option<String>,
    pub occasions: Vec<String>,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductModel> for Product {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            florist_id: model.florist_id,
            title: model.title,
            description: model.description,
            price: model.price,
            images: string_list(model.images),
            category: model.category,
            occasions: string_list(model.occasions),
            in_stock: model.in_stock,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

fn string_list(value: serde_json::Value) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub florist_id: Uuid,
    pub status: OrderStatus,
    pub fulfillment_type: FulfillmentType,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub total_amount: i64,
    pub payment_status: String,
    pub recipient_name: String,
    pub recipient_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_latitude: Option<f64>,
    pub delivery_longitude: Option<f64>,
    pub delivery_distance_km: Option<f64>,
    pub delivery_date: Option<NaiveDate>,
    pub gift_message: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OrderModel> for Order {
    type Error = AppError;

    fn try_from(model: OrderModel) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            order_number: model.order_number,
            customer_id: model.customer_id,
            florist_id: model.florist_id,
            status: model
                .status
                .parse()
                .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?,
            fulfillment_type: model
                .fulfillment_type
                .parse()
                .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?,
            subtotal: model.subtotal,
            delivery_fee: model.delivery_fee,
            total_amount: model.total_amount,
            payment_status: model.payment_status,
            recipient_name: model.recipient_name,
            recipient_phone: model.recipient_phone,
            delivery_address: model.delivery_address,
            delivery_latitude: model.delivery_latitude,
            delivery_longitude: model.delivery_longitude,
            delivery_distance_km: model.delivery_distance_km,
            delivery_date: model.delivery_date,
            gift_message: model.gift_message,
            paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub title: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
}

impl From<OrderItemModel> for OrderItem {
    fn from(model: OrderItemModel) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            product_id: model.product_id,
            title: model.title,
            quantity: model.quantity,
            unit_price: model.unit_price,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub previous_status: Option<String>,
    pub status: String,
    pub note: Option<String>,
    pub changed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<HistoryModel> for StatusHistoryEntry {
    fn from(model: HistoryModel) -> Self {
        Self {
            id: model.id,
            previous_status: model.previous_status,
            status: model.status,
            note: model.note,
            changed_by: model.changed_by,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub exp_month: Option<i32>,
    pub exp_year: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentMethodModel> for PaymentMethod {
    fn from(model: PaymentMethodModel) -> Self {
        Self {
            id: model.id,
            brand: model.brand,
            last4: model.last4,
            exp_month: model.exp_month,
            exp_year: model.exp_year,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FloristApplication {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub business_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub allow_reapply: bool,
    pub reapply_after: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApplicationModel> for FloristApplication {
    fn from(model: ApplicationModel) -> Self {
        Self {
            id: model.id,
            email: model.email,
            full_name: model.full_name,
            business_name: model.business_name,
            phone: model.phone,
            address: model.address,
            website: model.website,
            status: model.status,
            rejection_reason: model.rejection_reason,
            allow_reapply: model.allow_reapply,
            reapply_after: model.reapply_after.map(|dt| dt.with_timezone(&Utc)),
            reviewed_by: model.reviewed_by,
            reviewed_at: model.reviewed_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLogModel> for AuditLog {
    fn from(model: AuditLogModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            action: model.action,
            resource: model.resource,
            metadata: model.metadata,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}
