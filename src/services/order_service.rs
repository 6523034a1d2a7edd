use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::{LockType, OnConflict};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CancelOrderRequest, CheckoutRequest, CheckoutResponse, OrderList, OrderWithItems,
        PaymentMethodList,
    },
    entity::{
        florist_profiles::{Entity as FloristProfiles, Model as FloristModel},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        order_status_history::{
            ActiveModel as HistoryActive, Column as HistoryCol, Entity as OrderStatusHistory,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        payment_methods::{Column as PaymentMethodCol, Entity as PaymentMethods},
        payment_transactions::ActiveModel as TransactionActive,
        cart_items::{
            ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems,
        },
        profiles::{ActiveModel as ProfileActive, Entity as Profiles},
    },
    error::{AppError, AppResult},
    integrations::{Coordinates, email},
    middleware::auth::{AuthUser, ensure_customer},
    models::{Order, OrderItem, PaymentMethod, StatusHistoryEntry},
    order_status::{FulfillmentType, OrderStatus, can_cancel_order, is_valid_status_transition},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    services::florist_service::{parse_hhmm, store_location},
    state::AppState,
};

pub const PAYMENT_UNPAID: &str = "unpaid";
pub const PAYMENT_PAID: &str = "paid";
pub const PAYMENT_FAILED: &str = "failed";
pub const PAYMENT_REFUNDED: &str = "refunded";

#[derive(Debug, Clone, FromRow)]
pub struct CartLine {
    pub product_id: Uuid,
    pub florist_id: Uuid,
    pub title: String,
    pub price: i64,
    pub in_stock: bool,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pricing {
    pub florist_id: Uuid,
    pub subtotal: i64,
    pub delivery_fee: i64,
    pub total: i64,
}

/// Store rules that decide whether a cart can be checked out.
#[derive(Debug, Clone)]
pub struct StoreRules {
    pub florist_id: Uuid,
    pub delivery_enabled: bool,
    pub pickup_enabled: bool,
    pub delivery_fee: i64,
    pub minimum_order: i64,
}

impl From<&FloristModel> for StoreRules {
    fn from(florist: &FloristModel) -> Self {
        Self {
            florist_id: florist.id,
            delivery_enabled: florist.delivery_enabled,
            pickup_enabled: florist.pickup_enabled,
            delivery_fee: florist.delivery_fee,
            minimum_order: florist.minimum_order,
        }
    }
}

/// The single florist every line of the cart belongs to.
pub fn cart_florist(lines: &[CartLine]) -> AppResult<Uuid> {
    let first = lines
        .first()
        .ok_or_else(|| AppError::BadRequest("Cart is empty".into()))?;
    if lines.iter().any(|line| line.florist_id != first.florist_id) {
        return Err(AppError::BadRequest(
            "All items in an order must come from the same florist".into(),
        ));
    }
    Ok(first.florist_id)
}

pub fn price_cart(
    lines: &[CartLine],
    store: &StoreRules,
    fulfillment: FulfillmentType,
) -> AppResult<Pricing> {
    let florist_id = cart_florist(lines)?;
    if florist_id != store.florist_id {
        return Err(AppError::BadRequest("Cart does not match florist".into()));
    }

    let mut subtotal: i64 = 0;
    for line in lines {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        if !line.in_stock {
            return Err(AppError::BadRequest(format!(
                "{} is currently out of stock",
                line.title
            )));
        }
        subtotal = line
            .price
            .checked_mul(i64::from(line.quantity))
            .and_then(|amount| subtotal.checked_add(amount))
            .ok_or_else(order_too_large)?;
    }

    let delivery_fee = match fulfillment {
        FulfillmentType::Delivery if !store.delivery_enabled => {
            return Err(AppError::BadRequest("This florist does not deliver".into()));
        }
        FulfillmentType::Pickup if !store.pickup_enabled => {
            return Err(AppError::BadRequest(
                "This florist does not offer pickup".into(),
            ));
        }
        FulfillmentType::Delivery => store.delivery_fee,
        FulfillmentType::Pickup => 0,
    };

    if subtotal < store.minimum_order {
        return Err(AppError::BadRequest(format!(
            "Minimum order for this florist is {}",
            store.minimum_order
        )));
    }

    let total = subtotal
        .checked_add(delivery_fee)
        .ok_or_else(order_too_large)?;

    Ok(Pricing {
        florist_id,
        subtotal,
        delivery_fee,
        total,
    })
}

fn order_too_large() -> AppError {
    AppError::BadRequest("Order total is too large".into())
}

/// Same-day orders close at the store's cutoff; cutoff times are interpreted in UTC.
pub fn check_delivery_date(
    date: Option<NaiveDate>,
    same_day_cutoff: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let Some(date) = date else {
        return Ok(());
    };
    let today = now.date_naive();
    if date < today {
        return Err(AppError::BadRequest(
            "Delivery date cannot be in the past".into(),
        ));
    }
    if date == today {
        if let Some(cutoff) = same_day_cutoff {
            if now.time() > parse_hhmm(cutoff)? {
                return Err(AppError::BadRequest(format!(
                    "Same-day orders close at {cutoff}"
                )));
            }
        }
    }
    Ok(())
}

pub fn build_order_number(order_id: Uuid, now: DateTime<Utc>) -> String {
    let date = now.format("%Y%m%d");
    let suffix = order_id.simple().to_string();
    format!("ORD-{}-{}", date, suffix[..8].to_uppercase())
}

/// Validate `next` against the lifecycle table, persist it and append history.
pub async fn apply_status_change<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
    next: OrderStatus,
    actor: Option<Uuid>,
    note: Option<String>,
) -> AppResult<OrderModel> {
    let current: OrderStatus = order
        .status
        .parse()
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    let fulfillment: FulfillmentType = order
        .fulfillment_type
        .parse()
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

    let check = is_valid_status_transition(current, next, fulfillment);
    if !check.valid {
        return Err(AppError::InvalidTransition(
            check.reason.unwrap_or_else(|| "transition not allowed".into()),
        ));
    }

    let order_id = order.id;
    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    if next == OrderStatus::Refunded {
        active.payment_status = Set(PAYMENT_REFUNDED.to_string());
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(conn).await?;

    HistoryActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        previous_status: Set(Some(current.as_str().to_string())),
        status: Set(next.as_str().to_string()),
        note: Set(note),
        changed_by: Set(actor),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    tracing::info!(order_id = %order_id, from = %current, to = %next, "order status changed");
    Ok(updated)
}

/// Email the customer about a status change without holding up the request.
pub async fn notify_status_change(state: &AppState, order: &OrderModel, note: Option<&str>) {
    let Ok(status) = order.status.parse::<OrderStatus>() else {
        return;
    };
    match Profiles::find_by_id(order.customer_id).one(&state.orm).await {
        Ok(Some(customer)) => {
            let message =
                email::templates::order_status_changed(&customer.email, &order.order_number, status, note);
            email::send_in_background(state.integrations.mailer.clone(), message);
        }
        Ok(None) => tracing::warn!(order_id = %order.id, "order customer not found for notification"),
        Err(err) => tracing::warn!(error = %err, order_id = %order.id, "customer lookup failed"),
    }
}

pub async fn load_order_details<C: ConnectionTrait>(
    conn: &C,
    order: OrderModel,
) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();
    let history = OrderStatusHistory::find()
        .filter(HistoryCol::OrderId.eq(order.id))
        .order_by_asc(HistoryCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(StatusHistoryEntry::from)
        .collect();
    Ok(OrderWithItems {
        order: Order::try_from(order)?,
        items,
        history,
    })
}

/// Paginated order listing shared by the customer, florist and admin views.
pub async fn list_orders_where(
    state: &AppState,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::try_from)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::CustomerId.eq(user.user_id));
    list_orders_where(state, condition, query).await
}

async fn load_cart_lines(state: &AppState, user_id: Uuid) -> AppResult<Vec<CartLine>> {
    let lines = sqlx::query_as::<_, CartLine>(
        r#"
        SELECT p.id AS product_id, p.florist_id, p.title, p.price, p.in_stock, ci.quantity
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await?;
    Ok(lines)
}

/// The processor-side customer for a profile, created on first checkout.
async fn ensure_payment_customer(state: &AppState, user_id: Uuid) -> AppResult<String> {
    let profile = Profiles::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthorized("profile not found".into()))?;
    if let Some(customer_id) = profile.stripe_customer_id.clone() {
        return Ok(customer_id);
    }

    let customer = state
        .integrations
        .payments
        .create_customer(profile.id, &profile.email, profile.full_name.as_deref())
        .await?;
    let mut active: ProfileActive = profile.into();
    active.stripe_customer_id = Set(Some(customer.id.clone()));
    active.update(&state.orm).await?;
    tracing::info!(user_id = %user_id, customer = %customer.id, "payment customer created");
    Ok(customer.id)
}

/// Put checked-out lines back; items added since then are kept.
async fn restore_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    lines: &[CartLine],
) -> AppResult<()> {
    if lines.is_empty() {
        return Ok(());
    }
    let rows = lines.iter().map(|line| CartItemActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        product_id: Set(line.product_id),
        quantity: Set(line.quantity),
        created_at: NotSet,
    });
    CartItems::insert_many(rows)
        .on_conflict(
            OnConflict::columns([CartItemCol::UserId, CartItemCol::ProductId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

async fn abandon_checkout(
    state: &AppState,
    order: OrderModel,
    lines: &[CartLine],
) -> AppResult<()> {
    let txn = state.orm.begin().await?;
    let customer_id = order.customer_id;
    apply_status_change(
        &txn,
        order,
        OrderStatus::Cancelled,
        None,
        Some("Payment could not be initialised".into()),
    )
    .await?;
    restore_cart(&txn, customer_id, lines).await?;
    txn.commit().await?;
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    ensure_customer(user)?;
    let recipient_name = payload.recipient_name.trim().to_string();
    if recipient_name.is_empty() {
        return Err(AppError::BadRequest("recipient_name is required".into()));
    }

    let lines = load_cart_lines(state, user.user_id).await?;
    let florist_id = cart_florist(&lines)?;
    let florist = FloristProfiles::find_by_id(florist_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Florist no longer exists".into()))?;

    let fulfillment = payload.fulfillment_type;
    let pricing = price_cart(&lines, &StoreRules::from(&florist), fulfillment)?;
    check_delivery_date(
        payload.delivery_date,
        florist.same_day_cutoff.as_deref(),
        Utc::now(),
    )?;

    let delivery_address = non_blank(payload.delivery_address);
    let (destination, distance_km) = match fulfillment {
        FulfillmentType::Delivery => {
            if delivery_address.is_none() {
                return Err(AppError::BadRequest("delivery_address is required".into()));
            }
            let (Some(lat), Some(lng)) = (payload.delivery_latitude, payload.delivery_longitude)
            else {
                return Err(AppError::BadRequest(
                    "delivery coordinates are required".into(),
                ));
            };
            let destination = Coordinates::new(lat, lng)?;
            let route = state
                .integrations
                .router
                .driving_route(store_location(&florist)?, destination)
                .await?;
            if route.distance_km > florist.delivery_radius_km {
                return Err(AppError::BadRequest(format!(
                    "Address is {:.1} km away; this florist delivers within {:.1} km",
                    route.distance_km, florist.delivery_radius_km
                )));
            }
            (Some(destination), Some(route.distance_km))
        }
        FulfillmentType::Pickup => (None, None),
    };

    let payment_customer = ensure_payment_customer(state, user.user_id).await?;

    let now = Utc::now();
    let order_id = Uuid::new_v4();
    let txn = state.orm.begin().await?;

    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(build_order_number(order_id, now)),
        customer_id: Set(user.user_id),
        florist_id: Set(pricing.florist_id),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        fulfillment_type: Set(fulfillment.as_str().to_string()),
        subtotal: Set(pricing.subtotal),
        delivery_fee: Set(pricing.delivery_fee),
        total_amount: Set(pricing.total),
        payment_status: Set(PAYMENT_UNPAID.to_string()),
        payment_intent_id: Set(None),
        recipient_name: Set(recipient_name),
        recipient_phone: Set(non_blank(payload.recipient_phone)),
        delivery_address: Set(delivery_address.filter(|_| fulfillment == FulfillmentType::Delivery)),
        delivery_latitude: Set(destination.map(|d| d.latitude)),
        delivery_longitude: Set(destination.map(|d| d.longitude)),
        delivery_distance_km: Set(distance_km),
        delivery_date: Set(payload.delivery_date),
        gift_message: Set(non_blank(payload.gift_message)),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(Some(line.product_id)),
            title: Set(line.title.clone()),
            quantity: Set(line.quantity),
            unit_price: Set(line.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(item.into());
    }

    HistoryActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        previous_status: Set(None),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        note: Set(Some("Order placed".into())),
        changed_by: Set(Some(user.user_id)),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    // clear cart; a concurrent edit since pricing shows up as a count mismatch
    let cleared = CartItems::delete_many()
        .filter(CartItemCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;
    if cleared.rows_affected != lines.len() as u64 {
        txn.rollback().await?;
        return Err(AppError::Conflict(
            "Cart changed during checkout, please review it and try again".into(),
        ));
    }

    txn.commit().await?;

    let intent = match state
        .integrations
        .payments
        .create_payment_intent(
            pricing.total,
            &state.config.currency,
            order.id,
            Some(payment_customer.as_str()),
        )
        .await
    {
        Ok(intent) => intent,
        Err(err) => {
            tracing::warn!(error = %err, order_id = %order.id, "payment intent creation failed");
            if let Err(cancel_err) = abandon_checkout(state, order, &lines).await {
                tracing::error!(error = %cancel_err, order_id = %order_id, "failed to cancel unpaid order");
            }
            return Err(err);
        }
    };

    let mut active: OrderActive = order.into();
    active.payment_intent_id = Set(Some(intent.id.clone()));
    let order = active.update(&state.orm).await?;

    TransactionActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(Some(order.id)),
        payment_intent_id: Set(intent.id.clone()),
        amount: Set(pricing.total),
        currency: Set(state.config.currency.clone()),
        status: Set("pending".to_string()),
        failure_message: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": pricing.total }),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout success",
        CheckoutResponse {
            order: Order::try_from(order)?,
            items: order_items,
            payment_intent_id: intent.id,
            client_secret: intent.client_secret,
        },
        Some(Meta::empty()),
    ))
}

async fn find_customer_order<C: ConnectionTrait>(
    conn: &C,
    user: &AuthUser,
    id: Uuid,
    lock: bool,
) -> AppResult<OrderModel> {
    let mut finder = Orders::find().filter(
        Condition::all()
            .add(OrderCol::CustomerId.eq(user.user_id))
            .add(OrderCol::Id.eq(id)),
    );
    if lock {
        finder = finder.lock(LockType::Update);
    }
    finder.one(conn).await?.ok_or(AppError::NotFound)
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_customer_order(&state.orm, user, id, false).await?;
    let data = load_order_details(&state.orm, order).await?;
    Ok(ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: CancelOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;
    let order = find_customer_order(&txn, user, id, true).await?;

    let status: OrderStatus = order
        .status
        .parse()
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    if !can_cancel_order(status) {
        return Err(AppError::InvalidTransition(format!(
            "Orders that are {status} can no longer be cancelled"
        )));
    }

    let note = non_blank(payload.reason).or_else(|| Some("Cancelled by customer".into()));
    let order = apply_status_change(&txn, order, OrderStatus::Cancelled, Some(user.user_id), note).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        Order::try_from(order)?,
        Some(Meta::empty()),
    ))
}

pub async fn list_payment_methods(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<PaymentMethodList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = PaymentMethods::find()
        .filter(PaymentMethodCol::UserId.eq(user.user_id))
        .order_by_desc(PaymentMethodCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(PaymentMethod::from)
        .collect();
    Ok(ApiResponse::success(
        "OK",
        PaymentMethodList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn line(florist_id: Uuid, price: i64, quantity: i32) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            florist_id,
            title: "Bouquet".into(),
            price,
            in_stock: true,
            quantity,
        }
    }

    fn store(florist_id: Uuid) -> StoreRules {
        StoreRules {
            florist_id,
            delivery_enabled: true,
            pickup_enabled: true,
            delivery_fee: 1500,
            minimum_order: 5000,
        }
    }

    #[test]
    fn prices_delivery_with_fee() {
        let florist = Uuid::new_v4();
        let lines = vec![line(florist, 4500, 1), line(florist, 1200, 2)];
        let pricing = price_cart(&lines, &store(florist), FulfillmentType::Delivery).unwrap();
        assert_eq!(pricing.subtotal, 6900);
        assert_eq!(pricing.delivery_fee, 1500);
        assert_eq!(pricing.total, 8400);
    }

    #[test]
    fn pickup_has_no_fee() {
        let florist = Uuid::new_v4();
        let lines = vec![line(florist, 6000, 1)];
        let pricing = price_cart(&lines, &store(florist), FulfillmentType::Pickup).unwrap();
        assert_eq!(pricing.delivery_fee, 0);
        assert_eq!(pricing.total, 6000);
    }

    #[test]
    fn oversized_totals_are_rejected_not_wrapped() {
        let florist = Uuid::new_v4();
        let lines = vec![line(florist, i64::MAX / 2, 3)];
        assert!(matches!(
            price_cart(&lines, &store(florist), FulfillmentType::Pickup),
            Err(AppError::BadRequest(_))
        ));

        let lines = vec![line(florist, i64::MAX / 2, 1), line(florist, i64::MAX / 2, 1)];
        assert!(matches!(
            price_cart(&lines, &store(florist), FulfillmentType::Delivery),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_mixed_florists_and_empty_cart() {
        let lines = vec![line(Uuid::new_v4(), 6000, 1), line(Uuid::new_v4(), 6000, 1)];
        assert!(cart_florist(&lines).is_err());
        assert!(cart_florist(&[]).is_err());
    }

    #[test]
    fn enforces_minimum_stock_and_fulfillment_support() {
        let florist = Uuid::new_v4();
        let small = vec![line(florist, 1000, 1)];
        assert!(price_cart(&small, &store(florist), FulfillmentType::Pickup).is_err());

        let mut sold_out = line(florist, 6000, 1);
        sold_out.in_stock = false;
        assert!(price_cart(&[sold_out], &store(florist), FulfillmentType::Pickup).is_err());

        let mut no_delivery = store(florist);
        no_delivery.delivery_enabled = false;
        let lines = vec![line(florist, 6000, 1)];
        assert!(price_cart(&lines, &no_delivery, FulfillmentType::Delivery).is_err());
        assert!(price_cart(&lines, &no_delivery, FulfillmentType::Pickup).is_ok());
    }

    #[test]
    fn same_day_cutoff_and_past_dates() {
        let morning = Utc.with_ymd_and_hms(2025, 2, 14, 9, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2025, 2, 14, 16, 0, 0).unwrap();
        let today = morning.date_naive();
        let yesterday = today.pred_opt().unwrap();
        let tomorrow = today.succ_opt().unwrap();

        assert!(check_delivery_date(Some(today), Some("14:00"), morning).is_ok());
        assert!(check_delivery_date(Some(today), Some("14:00"), evening).is_err());
        assert!(check_delivery_date(Some(tomorrow), Some("14:00"), evening).is_ok());
        assert!(check_delivery_date(Some(yesterday), None, morning).is_err());
        assert!(check_delivery_date(None, Some("14:00"), evening).is_ok());
    }

    #[test]
    fn order_number_has_date_and_short_id() {
        let id = Uuid::parse_str("3f2a9c1e-0000-4000-8000-000000000000").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 5, 11, 8, 0, 0).unwrap();
        assert_eq!(build_order_number(id, now), "ORD-20250511-3F2A9C1E");
    }
}
