//! Florist-side order handling: the store's order queue and status updates.

use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, TransactionTrait};
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderActions, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_florist},
    models::Order,
    order_status::{FulfillmentType, OrderStatus, available_statuses, can_cancel_order, is_final_status},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::{
        florist_service::florist_for_user,
        order_service::{apply_status_change, list_orders_where, load_order_details, notify_status_change},
    },
    state::AppState,
};

pub fn order_actions(status: OrderStatus, fulfillment: FulfillmentType) -> OrderActions {
    OrderActions {
        current: status,
        fulfillment_type: fulfillment,
        available: available_statuses(status, fulfillment),
        can_cancel: can_cancel_order(status),
        is_final: is_final_status(status),
    }
}

async fn find_store_order<C: ConnectionTrait>(
    conn: &C,
    florist_id: Uuid,
    id: Uuid,
    lock: bool,
) -> AppResult<OrderModel> {
    let mut finder = Orders::find().filter(
        Condition::all()
            .add(OrderCol::FloristId.eq(florist_id))
            .add(OrderCol::Id.eq(id)),
    );
    if lock {
        finder = finder.lock(LockType::Update);
    }
    finder.one(conn).await?.ok_or(AppError::NotFound)
}

pub async fn list_store_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_florist(user)?;
    let florist = florist_for_user(state, user).await?;
    let condition = Condition::all().add(OrderCol::FloristId.eq(florist.id));
    list_orders_where(state, condition, query).await
}

pub async fn get_store_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_florist(user)?;
    let florist = florist_for_user(state, user).await?;
    let order = find_store_order(&state.orm, florist.id, id, false).await?;
    let data = load_order_details(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn store_order_actions(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderActions>> {
    ensure_florist(user)?;
    let florist = florist_for_user(state, user).await?;
    let order = Order::try_from(find_store_order(&state.orm, florist.id, id, false).await?)?;
    Ok(ApiResponse::success(
        "OK",
        order_actions(order.status, order.fulfillment_type),
        Some(Meta::empty()),
    ))
}

pub async fn update_store_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_florist(user)?;
    let florist = florist_for_user(state, user).await?;

    let txn = state.orm.begin().await?;
    let order = find_store_order(&txn, florist.id, id, true).await?;
    let note = payload.note.filter(|n| !n.trim().is_empty());
    let order = apply_status_change(&txn, order, payload.status, Some(user.user_id), note.clone()).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": order.status }),
    )
    .await;
    notify_status_change(state, &order, note.as_deref()).await;

    Ok(ApiResponse::success(
        "Order updated",
        Order::try_from(order)?,
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pickup_order_in_preparation_offers_pickup_branch_only() {
        let actions = order_actions(OrderStatus::Preparing, FulfillmentType::Pickup);
        assert_eq!(
            actions.available,
            vec![
                OrderStatus::ReadyForPickup,
                OrderStatus::Cancelled,
                OrderStatus::Refunded
            ]
        );
        assert!(actions.can_cancel);
        assert!(!actions.is_final);
    }

    #[test]
    fn delivered_order_has_no_actions() {
        let actions = order_actions(OrderStatus::Delivered, FulfillmentType::Delivery);
        assert!(actions.available.is_empty());
        assert!(!actions.can_cancel);
        assert!(actions.is_final);
    }
}
