//! Order lifecycle table.
//!
//! A static map of which status may follow which, plus the fulfillment-type
//! filter that keeps pickup orders out of delivery states and vice versa.
//! Every function here is pure; persistence of the status lives in the
//! order services.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    ReadyForDelivery,
    OutForDelivery,
    Delivered,
    ReadyForPickup,
    PickedUp,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    Delivery,
    Pickup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TransitionCheck {
    pub valid: bool,
    pub reason: Option<String>,
}

impl TransitionCheck {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::ReadyForDelivery,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::ReadyForPickup,
        OrderStatus::PickedUp,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    /// Statuses that may directly follow `self`, regardless of fulfillment type.
    pub fn allowed_next(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Preparing, Cancelled, Refunded],
            Preparing => &[ReadyForDelivery, ReadyForPickup, Cancelled, Refunded],
            ReadyForDelivery => &[OutForDelivery, Cancelled, Refunded],
            OutForDelivery => &[Delivered],
            ReadyForPickup => &[PickedUp, Cancelled, Refunded],
            Delivered | PickedUp | Cancelled | Refunded => &[],
        }
    }

    /// The fulfillment branch a status is confined to, if any.
    pub fn exclusive_to(self) -> Option<FulfillmentType> {
        match self {
            OrderStatus::ReadyForDelivery | OrderStatus::OutForDelivery | OrderStatus::Delivered => {
                Some(FulfillmentType::Delivery)
            }
            OrderStatus::ReadyForPickup | OrderStatus::PickedUp => Some(FulfillmentType::Pickup),
            _ => None,
        }
    }

    pub fn applies_to(self, fulfillment: FulfillmentType) -> bool {
        self.exclusive_to().is_none_or(|only| only == fulfillment)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::ReadyForDelivery => "ready_for_delivery",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::ReadyForPickup => "ready_for_pickup",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    /// Customer-facing wording used in notification emails.
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Preparing => "Being prepared",
            OrderStatus::ReadyForDelivery => "Ready for delivery",
            OrderStatus::OutForDelivery => "Out for delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::ReadyForPickup => "Ready for pickup",
            OrderStatus::PickedUp => "Picked up",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunded => "Refunded",
        }
    }
}

impl FulfillmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            FulfillmentType::Delivery => "delivery",
            FulfillmentType::Pickup => "pickup",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FulfillmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError {
                kind: "order status",
                value: s.to_string(),
            })
    }
}

impl FromStr for FulfillmentType {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery" => Ok(FulfillmentType::Delivery),
            "pickup" => Ok(FulfillmentType::Pickup),
            other => Err(ParseStatusError {
                kind: "fulfillment type",
                value: other.to_string(),
            }),
        }
    }
}

pub fn is_valid_status_transition(
    current: OrderStatus,
    next: OrderStatus,
    fulfillment: FulfillmentType,
) -> TransitionCheck {
    if !current.allowed_next().contains(&next) {
        return TransitionCheck::rejected(format!(
            "Cannot change status from {current} to {next}"
        ));
    }
    if !next.applies_to(fulfillment) {
        return TransitionCheck::rejected(format!(
            "Status {next} is not valid for {fulfillment} orders"
        ));
    }
    TransitionCheck::ok()
}

pub fn available_statuses(current: OrderStatus, fulfillment: FulfillmentType) -> Vec<OrderStatus> {
    current
        .allowed_next()
        .iter()
        .copied()
        .filter(|next| next.applies_to(fulfillment))
        .collect()
}

pub fn can_cancel_order(status: OrderStatus) -> bool {
    status.allowed_next().contains(&OrderStatus::Cancelled)
}

pub fn is_final_status(status: OrderStatus) -> bool {
    status.allowed_next().is_empty()
}

pub fn ready_status(fulfillment: FulfillmentType) -> OrderStatus {
    match fulfillment {
        FulfillmentType::Delivery => OrderStatus::ReadyForDelivery,
        FulfillmentType::Pickup => OrderStatus::ReadyForPickup,
    }
}

pub fn completed_status(fulfillment: FulfillmentType) -> OrderStatus {
    match fulfillment {
        FulfillmentType::Delivery => OrderStatus::Delivered,
        FulfillmentType::Pickup => OrderStatus::PickedUp,
    }
}
