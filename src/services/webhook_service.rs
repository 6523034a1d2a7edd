//! Payment provider callbacks. The raw body is verified before any parsing.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    dto::webhooks::WebhookAck,
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        payment_methods::{
            ActiveModel as PaymentMethodActive, Column as PaymentMethodCol, Entity as PaymentMethods,
        },
        payment_transactions::{
            ActiveModel as TransactionActive, Column as TransactionCol, Entity as PaymentTransactions,
        },
        profiles::{Column as ProfileCol, Entity as Profiles},
    },
    error::{AppError, AppResult},
    integrations::stripe::{PaymentIntentObject, PaymentMethodObject, StripeEvent, verify_signature},
    order_status::OrderStatus,
    services::order_service::{
        PAYMENT_FAILED, PAYMENT_PAID, PAYMENT_UNPAID, apply_status_change, notify_status_change,
    },
    state::AppState,
};

pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";
pub const EVENT_METHOD_ATTACHED: &str = "payment_method.attached";
pub const EVENT_METHOD_DETACHED: &str = "payment_method.detached";

const TX_SUCCEEDED: &str = "succeeded";
const TX_FAILED: &str = "failed";

pub fn parse_event(body: &[u8]) -> AppResult<StripeEvent> {
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid event payload: {e}")))
}

fn object<T: serde::de::DeserializeOwned>(event: &StripeEvent) -> AppResult<T> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        AppError::BadRequest(format!("unexpected {} payload: {e}", event.event_type))
    })
}

pub async fn handle_stripe_webhook(
    state: &AppState,
    body: &[u8],
    signature: Option<&str>,
) -> AppResult<WebhookAck> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or(AppError::ServiceUnavailable("webhook secret is not configured"))?;
    let signature =
        signature.ok_or_else(|| AppError::BadRequest("missing Stripe-Signature header".into()))?;
    verify_signature(body, signature, secret, Utc::now().timestamp()).map_err(|err| {
        tracing::warn!(error = %err, "rejected webhook signature");
        AppError::BadRequest(format!("Webhook signature verification failed: {err}"))
    })?;

    let event = parse_event(body)?;
    tracing::info!(event_id = %event.id, event_type = %event.event_type, "webhook received");

    let handled = process_event(state, &event).await.map_err(|err| match err {
        AppError::BadRequest(_) => err,
        other => {
            tracing::error!(error = %other, event_id = %event.id, "webhook processing failed");
            AppError::Internal(anyhow::anyhow!("webhook processing failed: {other}"))
        }
    })?;

    Ok(WebhookAck {
        received: true,
        event_type: event.event_type,
        handled,
    })
}

/// Apply a verified event. Returns whether the event type is one we act on.
pub async fn process_event(state: &AppState, event: &StripeEvent) -> AppResult<bool> {
    match event.event_type.as_str() {
        EVENT_PAYMENT_SUCCEEDED => {
            payment_succeeded(state, object(event)?).await?;
            Ok(true)
        }
        EVENT_PAYMENT_FAILED => {
            payment_failed(state, object(event)?).await?;
            Ok(true)
        }
        EVENT_METHOD_ATTACHED => {
            method_attached(state, object(event)?).await?;
            Ok(true)
        }
        EVENT_METHOD_DETACHED => {
            let method: PaymentMethodObject = object(event)?;
            let result = PaymentMethods::delete_many()
                .filter(PaymentMethodCol::StripePaymentMethodId.eq(method.id.as_str()))
                .exec(&state.orm)
                .await?;
            tracing::info!(payment_method = %method.id, removed = result.rows_affected, "payment method detached");
            Ok(true)
        }
        other => {
            tracing::debug!(event_type = other, "ignoring webhook event");
            Ok(false)
        }
    }
}

/// Payment status after a successful charge, or `None` when it must stay as is.
/// Paid and refunded orders are never rewritten.
pub fn status_after_success(current: &str) -> Option<&'static str> {
    match current {
        PAYMENT_UNPAID | PAYMENT_FAILED => Some(PAYMENT_PAID),
        _ => None,
    }
}

/// Payment status after a failed charge. Only unpaid orders move to failed.
pub fn status_after_failure(current: &str) -> Option<&'static str> {
    match current {
        PAYMENT_UNPAID => Some(PAYMENT_FAILED),
        _ => None,
    }
}

async fn record_transaction<C: ConnectionTrait>(
    conn: &C,
    intent: &PaymentIntentObject,
    order_id: Option<Uuid>,
    status: &str,
    failure_message: Option<String>,
) -> AppResult<()> {
    let existing = PaymentTransactions::find()
        .filter(TransactionCol::PaymentIntentId.eq(intent.id.as_str()))
        .one(conn)
        .await?;
    match existing {
        Some(tx) => {
            let mut active: TransactionActive = tx.into();
            active.status = Set(status.to_string());
            active.failure_message = Set(failure_message);
            active.updated_at = Set(Utc::now().into());
            active.update(conn).await?;
        }
        None => {
            TransactionActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                payment_intent_id: Set(intent.id.clone()),
                amount: Set(intent.amount),
                currency: Set(intent.currency.clone()),
                status: Set(status.to_string()),
                failure_message: Set(failure_message),
                created_at: NotSet,
                updated_at: NotSet,
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}

async fn find_intent_order<C: ConnectionTrait>(
    conn: &C,
    intent: &PaymentIntentObject,
) -> AppResult<Option<OrderModel>> {
    let finder = match intent.order_id() {
        Some(order_id) => Orders::find_by_id(order_id),
        None => Orders::find().filter(OrderCol::PaymentIntentId.eq(intent.id.as_str())),
    };
    Ok(finder.lock(LockType::Update).one(conn).await?)
}

async fn payment_succeeded(state: &AppState, intent: PaymentIntentObject) -> AppResult<()> {
    let txn = state.orm.begin().await?;
    let order = find_intent_order(&txn, &intent).await?;
    record_transaction(&txn, &intent, order.as_ref().map(|o| o.id), TX_SUCCEEDED, None).await?;

    let Some(order) = order else {
        txn.commit().await?;
        tracing::warn!(payment_intent = %intent.id, "payment succeeded for unknown order");
        return Ok(());
    };

    let order = if let Some(next) = status_after_success(&order.payment_status) {
        let mut active: OrderActive = order.into();
        active.payment_status = Set(next.to_string());
        active.payment_intent_id = Set(Some(intent.id.clone()));
        active.paid_at = Set(Some(Utc::now().into()));
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?
    } else {
        order
    };

    // Replayed events find the order already past pending.
    let confirmed = if order.status == OrderStatus::Pending.as_str() {
        Some(
            apply_status_change(
                &txn,
                order,
                OrderStatus::Confirmed,
                None,
                Some("Payment received".into()),
            )
            .await?,
        )
    } else {
        None
    };
    txn.commit().await?;

    if let Some(order) = confirmed {
        notify_status_change(state, &order, None).await;
    }
    Ok(())
}

async fn payment_failed(state: &AppState, intent: PaymentIntentObject) -> AppResult<()> {
    let message = intent
        .last_payment_error
        .as_ref()
        .and_then(|e| e.message.clone());

    let txn = state.orm.begin().await?;
    let order = find_intent_order(&txn, &intent).await?;
    record_transaction(&txn, &intent, order.as_ref().map(|o| o.id), TX_FAILED, message.clone()).await?;

    if let Some(order) = order {
        if let Some(next) = status_after_failure(&order.payment_status) {
            let order_id = order.id;
            let mut active: OrderActive = order.into();
            active.payment_status = Set(next.to_string());
            active.updated_at = Set(Utc::now().into());
            active.update(&txn).await?;
            tracing::info!(order_id = %order_id, reason = ?message, "payment failed");
        }
    }
    txn.commit().await?;
    Ok(())
}

async fn method_attached(state: &AppState, method: PaymentMethodObject) -> AppResult<()> {
    let Some(customer) = method.customer.as_deref() else {
        tracing::warn!(payment_method = %method.id, "attached payment method has no customer");
        return Ok(());
    };
    let Some(profile) = Profiles::find()
        .filter(ProfileCol::StripeCustomerId.eq(customer))
        .one(&state.orm)
        .await?
    else {
        tracing::warn!(customer, "no profile for Stripe customer");
        return Ok(());
    };

    let card = method.card.as_ref();
    let existing = PaymentMethods::find()
        .filter(PaymentMethodCol::StripePaymentMethodId.eq(method.id.as_str()))
        .one(&state.orm)
        .await?;
    let brand = card.and_then(|c| c.brand.clone());
    let last4 = card.and_then(|c| c.last4.clone());
    let exp_month = card.and_then(|c| c.exp_month);
    let exp_year = card.and_then(|c| c.exp_year);
    match existing {
        Some(saved) => {
            let mut active: PaymentMethodActive = saved.into();
            active.user_id = Set(profile.id);
            active.brand = Set(brand);
            active.last4 = Set(last4);
            active.exp_month = Set(exp_month);
            active.exp_year = Set(exp_year);
            active.update(&state.orm).await?;
        }
        None => {
            PaymentMethodActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(profile.id),
                stripe_payment_method_id: Set(method.id.clone()),
                brand: Set(brand),
                last4: Set(last4),
                exp_month: Set(exp_month),
                exp_year: Set(exp_year),
                created_at: NotSet,
            }
            .insert(&state.orm)
            .await?;
        }
    }

    tracing::info!(payment_method = %method.id, user_id = %profile.id, "payment method saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::order_service::PAYMENT_REFUNDED;

    #[test]
    fn parses_payment_intent_event() {
        let body = br#"{
            "id": "evt_123",
            "type": "payment_intent.succeeded",
            "data": {"object": {
                "id": "pi_123",
                "amount": 8500,
                "currency": "aud",
                "metadata": {"order_id": "67e55044-10b1-426f-9247-bb680e5fe0c8"}
            }}
        }"#;
        let event = parse_event(body).unwrap();
        assert_eq!(event.event_type, EVENT_PAYMENT_SUCCEEDED);
        let intent: PaymentIntentObject = object(&event).unwrap();
        assert_eq!(intent.amount, 8500);
        assert_eq!(
            intent.order_id(),
            Some(Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap())
        );
    }

    #[test]
    fn refunded_orders_keep_their_payment_status() {
        assert_eq!(status_after_success(PAYMENT_UNPAID), Some(PAYMENT_PAID));
        assert_eq!(status_after_success(PAYMENT_FAILED), Some(PAYMENT_PAID));
        assert_eq!(status_after_success(PAYMENT_PAID), None);
        assert_eq!(status_after_success(PAYMENT_REFUNDED), None);

        assert_eq!(status_after_failure(PAYMENT_UNPAID), Some(PAYMENT_FAILED));
        assert_eq!(status_after_failure(PAYMENT_PAID), None);
        assert_eq!(status_after_failure(PAYMENT_REFUNDED), None);
    }

    #[test]
    fn malformed_payloads_are_bad_requests() {
        assert!(matches!(parse_event(b"not json"), Err(AppError::BadRequest(_))));

        let event = parse_event(br#"{"id":"evt_1","type":"payment_method.attached","data":{"object":{}}}"#)
            .unwrap();
        assert!(matches!(
            object::<PaymentMethodObject>(&event),
            Err(AppError::BadRequest(_))
        ));
    }
}
