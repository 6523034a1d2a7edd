use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use sha2::Sha256;
use uuid::Uuid;

use florist_marketplace_api::{
    config::AppConfig,
    db::{MIGRATOR, create_pool},
    dto::{
        applications::{RejectApplicationRequest, SubmitApplicationRequest},
        auth::RegisterRequest,
        cart::AddToCartRequest,
        florists::UpdateFloristProfileRequest,
        orders::{CancelOrderRequest, CheckoutRequest, UpdateOrderStatusRequest},
        products::{CreateProductRequest, UpdateProductRequest},
    },
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        profiles::{ActiveModel as ProfileActive, Entity as Profiles},
    },
    error::{AppError, AppResult},
    integrations::{
        Coordinates, Customer, EmailMessage, Integrations, Mailer, PaymentGateway, PaymentIntent,
        RouteEstimate, RouteProvider, stripe::StripeEvent,
    },
    middleware::auth::AuthUser,
    models::{ROLE_ADMIN, ROLE_CUSTOMER, ROLE_FLORIST},
    order_status::{FulfillmentType, OrderStatus},
    routes::params::{AuditLogQuery, OrderListQuery, Pagination, ProductQuery},
    services::{
        admin_service, application_service, auth_service, cart_service, florist_service,
        fulfillment_service, order_service, product_service, webhook_service,
    },
    state::AppState,
};

const WEBHOOK_SECRET: &str = "whsec_flow_test";

struct FixedRouter {
    distance_km: f64,
}

#[async_trait]
impl RouteProvider for FixedRouter {
    async fn driving_route(&self, _from: Coordinates, _to: Coordinates) -> AppResult<RouteEstimate> {
        Ok(RouteEstimate {
            distance_km: self.distance_km,
            duration_minutes: self.distance_km * 2.0,
        })
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> AppResult<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Payments fake. With `fail_intents` set, intent creation fails like an outage.
#[derive(Default)]
struct FakePayments {
    fail_intents: bool,
}

#[async_trait]
impl PaymentGateway for FakePayments {
    async fn create_customer(
        &self,
        profile_id: Uuid,
        _email: &str,
        _name: Option<&str>,
    ) -> AppResult<Customer> {
        Ok(Customer {
            id: format!("cus_{}", profile_id.simple()),
        })
    }

    async fn create_payment_intent(
        &self,
        _amount: i64,
        _currency: &str,
        order_id: Uuid,
        customer_id: Option<&str>,
    ) -> AppResult<PaymentIntent> {
        if self.fail_intents {
            return Err(AppError::Upstream("payment processor: unavailable".into()));
        }
        assert!(customer_id.is_some_and(|id| id.starts_with("cus_")));
        Ok(PaymentIntent {
            id: format!("pi_{}", order_id.simple()),
            client_secret: Some("secret_test".into()),
        })
    }
}

/// Router fake that slips an extra line into a cart while checkout is routing.
struct CartEditingRouter {
    pool: sqlx::PgPool,
    user_id: Uuid,
    product_id: Uuid,
}

#[async_trait]
impl RouteProvider for CartEditingRouter {
    async fn driving_route(&self, _from: Coordinates, _to: Coordinates) -> AppResult<RouteEstimate> {
        sqlx::query("INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, 1)")
            .bind(self.user_id)
            .bind(self.product_id)
            .execute(&self.pool)
            .await?;
        Ok(RouteEstimate {
            distance_km: 1.0,
            duration_minutes: 2.0,
        })
    }
}

fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        stripe_secret_key: None,
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        mapbox_access_token: None,
        resend_api_key: None,
        email_from: "test@example.com".into(),
        currency: "aud".into(),
        reapply_cooldown_days: 30,
    }
}

async fn setup_state_with(
    database_url: &str,
    router: Arc<dyn RouteProvider>,
    payments: Arc<dyn PaymentGateway>,
) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    MIGRATOR.run(&pool).await?;
    let integrations = Integrations {
        router,
        mailer: Arc::new(RecordingMailer::default()),
        payments,
    };
    Ok(AppState::new(pool, test_config(database_url), integrations))
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    setup_state_with(
        database_url,
        Arc::new(FixedRouter { distance_km: 4.2 }),
        Arc::new(FakePayments::default()),
    )
    .await
}

fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests.");
            None
        }
    }
}

fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

async fn create_admin(state: &AppState) -> anyhow::Result<AuthUser> {
    let profile = ProfileActive {
        id: Set(Uuid::new_v4()),
        email: Set(unique_email("admin")),
        password_hash: Set(auth_service::hash_password("admin-password")?),
        full_name: Set(Some("Admin".into())),
        role: Set(ROLE_ADMIN.into()),
        stripe_customer_id: Set(None),
        created_at: sea_orm::ActiveValue::NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(AuthUser {
        user_id: profile.id,
        role: ROLE_ADMIN.into(),
    })
}

async fn register_customer(state: &AppState) -> anyhow::Result<AuthUser> {
    let resp = auth_service::register_user(
        state,
        RegisterRequest {
            email: unique_email("customer"),
            password: "customer-password".into(),
            full_name: Some("Casey Customer".into()),
        },
    )
    .await?;
    let profile = resp.data.expect("profile");
    assert_eq!(profile.role, ROLE_CUSTOMER);
    Ok(AuthUser {
        user_id: profile.id,
        role: profile.role,
    })
}

fn application(email: &str) -> SubmitApplicationRequest {
    SubmitApplicationRequest {
        email: email.to_string(),
        full_name: "Ivy Green".into(),
        business_name: "Ivy's Blooms".into(),
        phone: Some("+61 400 000 000".into()),
        address: Some("1 Collins St".into()),
        website: None,
    }
}

fn sign(body: &[u8]) -> String {
    let ts = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{ts}.").as_bytes());
    mac.update(body);
    format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn status_request(status: OrderStatus) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest { status, note: None }
}

/// Provision a florist with a located store that delivers within `radius_km`.
async fn located_florist(
    state: &AppState,
    admin: &AuthUser,
    store_name: &str,
    radius_km: f64,
) -> anyhow::Result<AuthUser> {
    let provisioned = application_service::provision_florist_directly(
        state,
        admin,
        florist_marketplace_api::dto::applications::ProvisionFloristRequest {
            email: unique_email("florist"),
            full_name: None,
            store_name: store_name.into(),
            phone: None,
            address: None,
            website: None,
            password: None,
        },
    )
    .await?
    .data
    .expect("florist");
    let florist = AuthUser {
        user_id: provisioned.profile.id,
        role: ROLE_FLORIST.into(),
    };
    florist_service::update_own_profile(
        state,
        &florist,
        UpdateFloristProfileRequest {
            latitude: Some(-37.8136),
            longitude: Some(144.9631),
            delivery_radius_km: Some(radius_km),
            ..Default::default()
        },
    )
    .await?;
    Ok(florist)
}

async fn stock_product(state: &AppState, florist: &AuthUser, title: &str) -> anyhow::Result<Uuid> {
    let product = product_service::create_product(
        state,
        florist,
        CreateProductRequest {
            title: title.into(),
            description: None,
            price: 7200,
            images: vec![],
            category: None,
            occasions: vec![],
            in_stock: None,
        },
    )
    .await?
    .data
    .expect("product");
    Ok(product.id)
}

async fn fill_cart(state: &AppState, customer: &AuthUser, product_id: Uuid) -> AppResult<()> {
    cart_service::add_to_cart(
        state,
        customer,
        AddToCartRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;
    Ok(())
}

async fn cart_len(state: &AppState, customer: &AuthUser) -> anyhow::Result<usize> {
    let cart = cart_service::list_cart(state, customer, Pagination::default())
        .await?
        .data
        .expect("cart");
    Ok(cart.items.len())
}

async fn product_florist(state: &AppState, product_id: Uuid) -> anyhow::Result<Uuid> {
    let product = florist_marketplace_api::entity::products::Entity::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product");
    Ok(product.florist_id)
}

fn pickup() -> CheckoutRequest {
    CheckoutRequest {
        fulfillment_type: FulfillmentType::Pickup,
        recipient_name: "Casey".into(),
        recipient_phone: None,
        delivery_address: None,
        delivery_latitude: None,
        delivery_longitude: None,
        delivery_date: None,
        gift_message: None,
    }
}

fn delivery() -> CheckoutRequest {
    CheckoutRequest {
        fulfillment_type: FulfillmentType::Delivery,
        recipient_name: "Robin".into(),
        recipient_phone: None,
        delivery_address: Some("5 Lygon St, Carlton".into()),
        delivery_latitude: Some(-37.8000),
        delivery_longitude: Some(144.9667),
        delivery_date: None,
        gift_message: None,
    }
}

fn intent_event(event_type: &str, intent_id: &str, order_id: Uuid) -> anyhow::Result<StripeEvent> {
    Ok(serde_json::from_value(serde_json::json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": event_type,
        "data": { "object": {
            "id": intent_id,
            "amount": 7200,
            "currency": "aud",
            "metadata": { "order_id": order_id.to_string() },
            "last_payment_error": { "message": "card declined" }
        }}
    }))?)
}

// Onboard a florist, sell a bouquet, take payment by webhook and fulfil the order.
#[tokio::test]
async fn checkout_payment_and_fulfilment_flow() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&database_url).await?;
    let admin = create_admin(&state).await?;
    let customer = register_customer(&state).await?;

    // Onboarding
    let florist_email = unique_email("florist");
    let submitted = application_service::submit_application(&state, application(&florist_email))
        .await?
        .data
        .expect("application");
    let decision = application_service::approve_application(&state, &admin, submitted.id)
        .await?
        .data
        .expect("decision");
    assert_eq!(decision.application.status, "approved");
    let provisioned = decision.provisioned.expect("provisioned florist");
    assert_eq!(provisioned.profile.role, ROLE_FLORIST);
    let florist = AuthUser {
        user_id: provisioned.profile.id,
        role: ROLE_FLORIST.into(),
    };

    florist_service::update_own_profile(
        &state,
        &florist,
        UpdateFloristProfileRequest {
            latitude: Some(-37.8136),
            longitude: Some(144.9631),
            delivery_radius_km: Some(10.0),
            delivery_fee: Some(1500),
            ..Default::default()
        },
    )
    .await?;

    let product = product_service::create_product(
        &state,
        &florist,
        CreateProductRequest {
            title: "Garden Rose Bouquet".into(),
            description: Some("Twelve garden roses".into()),
            price: 8900,
            images: vec![],
            category: Some("Bouquets".into()),
            occasions: vec!["Birthday".into()],
            in_stock: Some(true),
        },
    )
    .await?
    .data
    .expect("product");

    // Florists cannot shop
    let err = cart_service::add_to_cart(
        &state,
        &florist,
        AddToCartRequest {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            product_id: product.id,
            quantity: 2,
        },
    )
    .await?;
    let cart = cart_service::list_cart(&state, &customer, Pagination::default())
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.subtotal, 17800);

    // Checkout
    let checkout = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            fulfillment_type: FulfillmentType::Delivery,
            recipient_name: "Robin".into(),
            recipient_phone: None,
            delivery_address: Some("5 Lygon St, Carlton".into()),
            delivery_latitude: Some(-37.8000),
            delivery_longitude: Some(144.9667),
            delivery_date: None,
            gift_message: Some("Happy birthday".into()),
        },
    )
    .await?
    .data
    .expect("checkout");
    let order_id = checkout.order.id;
    assert_eq!(checkout.order.status, OrderStatus::Pending);
    assert_eq!(checkout.order.subtotal, 17800);
    assert_eq!(checkout.order.delivery_fee, 1500);
    assert_eq!(checkout.order.total_amount, 19300);
    assert_eq!(checkout.order.delivery_distance_km, Some(4.2));
    assert_eq!(checkout.items.len(), 1);

    let cart = cart_service::list_cart(&state, &customer, Pagination::default())
        .await?
        .data
        .expect("cart");
    assert!(cart.items.is_empty());

    // A florist cannot confirm an unpaid order by skipping ahead
    let err = fulfillment_service::update_store_order_status(
        &state,
        &florist,
        order_id,
        status_request(OrderStatus::Preparing),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    // Payment webhook
    let body = serde_json::to_vec(&serde_json::json!({
        "id": "evt_flow_1",
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": checkout.payment_intent_id,
            "amount": 19300,
            "currency": "aud",
            "metadata": { "order_id": order_id.to_string() }
        }}
    }))?;

    let err = webhook_service::handle_stripe_webhook(&state, &body, Some("t=1,v1=deadbeef"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let ack = webhook_service::handle_stripe_webhook(&state, &body, Some(sign(&body).as_str())).await?;
    assert!(ack.handled);
    // Replays are harmless
    webhook_service::handle_stripe_webhook(&state, &body, Some(sign(&body).as_str())).await?;

    let order = Orders::find_by_id(order_id).one(&state.orm).await?.expect("order");
    assert_eq!(order.status, "confirmed");
    assert_eq!(order.payment_status, "paid");
    assert!(order.paid_at.is_some());

    // Fulfilment
    let actions = fulfillment_service::store_order_actions(&state, &florist, order_id)
        .await?
        .data
        .expect("actions");
    assert_eq!(
        actions.available,
        vec![OrderStatus::Preparing, OrderStatus::Cancelled, OrderStatus::Refunded]
    );

    fulfillment_service::update_store_order_status(
        &state,
        &florist,
        order_id,
        status_request(OrderStatus::Preparing),
    )
    .await?;

    let err = fulfillment_service::update_store_order_status(
        &state,
        &florist,
        order_id,
        status_request(OrderStatus::ReadyForPickup),
    )
    .await
    .unwrap_err();
    match err {
        AppError::InvalidTransition(reason) => {
            assert_eq!(reason, "Status ready_for_pickup is not valid for delivery orders")
        }
        other => panic!("unexpected error: {other:?}"),
    }

    for next in [
        OrderStatus::ReadyForDelivery,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ] {
        fulfillment_service::update_store_order_status(&state, &florist, order_id, status_request(next))
            .await?;
    }

    let err = order_service::cancel_order(
        &state,
        &customer,
        order_id,
        CancelOrderRequest { reason: None },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));

    let details = order_service::get_order(&state, &customer, order_id)
        .await?
        .data
        .expect("order details");
    assert_eq!(details.order.status, OrderStatus::Delivered);
    let trail: Vec<&str> = details.history.iter().map(|h| h.status.as_str()).collect();
    assert_eq!(
        trail,
        vec![
            "pending",
            "confirmed",
            "preparing",
            "ready_for_delivery",
            "out_for_delivery",
            "delivered"
        ]
    );

    // Admin view
    let all = admin_service::list_all_orders(
        &state,
        &admin,
        OrderListQuery {
            status: Some(OrderStatus::Delivered),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("orders");
    assert!(all.items.iter().any(|o| o.id == order_id));

    let err = admin_service::list_all_orders(&state, &customer, OrderListQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

#[tokio::test]
async fn refund_and_saved_card_flow() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&database_url).await?;
    let admin = create_admin(&state).await?;
    let customer = register_customer(&state).await?;
    let florist = located_florist(&state, &admin, "Pickup Petals", 10.0).await?;
    let product_id = stock_product(&state, &florist, "Potted Orchid").await?;

    fill_cart(&state, &customer, product_id).await?;
    let checkout = order_service::checkout(&state, &customer, pickup())
        .await?
        .data
        .expect("checkout");
    assert_eq!(checkout.order.delivery_fee, 0);
    let order_id = checkout.order.id;

    // Checkout registers the customer with the processor once
    let profile = Profiles::find_by_id(customer.user_id)
        .one(&state.orm)
        .await?
        .expect("profile");
    let customer_ref = profile.stripe_customer_id.expect("stripe customer");
    assert_eq!(customer_ref, format!("cus_{}", customer.user_id.simple()));

    let paid = intent_event("payment_intent.succeeded", &checkout.payment_intent_id, order_id)?;
    assert!(webhook_service::process_event(&state, &paid).await?);

    let refunded = admin_service::update_order_status(
        &state,
        &admin,
        order_id,
        status_request(OrderStatus::Refunded),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(refunded.status, OrderStatus::Refunded);
    assert_eq!(refunded.payment_status, "refunded");

    // Late or replayed payment events leave a refund alone
    webhook_service::process_event(&state, &paid).await?;
    let failed = intent_event("payment_intent.payment_failed", &checkout.payment_intent_id, order_id)?;
    webhook_service::process_event(&state, &failed).await?;
    let order = Orders::find_by_id(order_id).one(&state.orm).await?.expect("order");
    assert_eq!(order.status, "refunded");
    assert_eq!(order.payment_status, "refunded");

    // Saved cards mirror Stripe
    let method_id = format!("pm_{}", Uuid::new_v4().simple());
    let attached: StripeEvent = serde_json::from_value(serde_json::json!({
        "id": "evt_pm_1",
        "type": "payment_method.attached",
        "data": { "object": {
            "id": method_id,
            "customer": customer_ref,
            "card": { "brand": "visa", "last4": "4242", "exp_month": 12, "exp_year": 2030 }
        }}
    }))?;
    assert!(webhook_service::process_event(&state, &attached).await?);
    // Redelivery updates the same card
    webhook_service::process_event(&state, &attached).await?;

    let cards = order_service::list_payment_methods(&state, &customer, Pagination::default())
        .await?
        .data
        .expect("cards");
    assert_eq!(cards.items.len(), 1);
    assert_eq!(cards.items[0].last4.as_deref(), Some("4242"));

    let detached: StripeEvent = serde_json::from_value(serde_json::json!({
        "id": "evt_pm_2",
        "type": "payment_method.detached",
        "data": { "object": { "id": method_id, "customer": null } }
    }))?;
    webhook_service::process_event(&state, &detached).await?;
    let cards = order_service::list_payment_methods(&state, &customer, Pagination::default())
        .await?
        .data
        .expect("cards");
    assert!(cards.items.is_empty());

    Ok(())
}

#[tokio::test]
async fn checkout_guards_leave_the_cart_intact() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&database_url).await?;
    let admin = create_admin(&state).await?;
    let customer = register_customer(&state).await?;
    let near = located_florist(&state, &admin, "Corner Stems", 3.0).await?;
    let other = located_florist(&state, &admin, "Other Stems", 10.0).await?;
    let near_product = stock_product(&state, &near, "Tulip Bunch").await?;
    let other_product = stock_product(&state, &other, "Lily Bunch").await?;

    fill_cart(&state, &customer, near_product).await?;

    // One florist per cart
    let err = fill_cart(&state, &customer, other_product).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // The fixed route is 4.2 km, past this store's 3 km radius
    let err = order_service::checkout(&state, &customer, delivery())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref msg) if msg.contains("delivers within")));
    assert_eq!(cart_len(&state, &customer).await?, 1);

    // Payment outage: the order is cancelled and the cart comes back
    let failing = setup_state_with(
        &database_url,
        Arc::new(FixedRouter { distance_km: 4.2 }),
        Arc::new(FakePayments { fail_intents: true }),
    )
    .await?;
    let err = order_service::checkout(&failing, &customer, pickup())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Upstream(_)));
    assert_eq!(cart_len(&state, &customer).await?, 1);
    let orders = Orders::find()
        .filter(OrderCol::CustomerId.eq(customer.user_id))
        .all(&state.orm)
        .await?;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, "cancelled");
    assert_eq!(orders[0].payment_status, "unpaid");

    // A line added while checkout is in flight aborts it
    let editing = setup_state_with(
        &database_url,
        Arc::new(CartEditingRouter {
            pool: state.pool.clone(),
            user_id: customer.user_id,
            product_id: stock_product(&state, &near, "Peony Bunch").await?,
        }),
        Arc::new(FakePayments::default()),
    )
    .await?;
    let err = order_service::checkout(&editing, &customer, delivery())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(cart_len(&state, &customer).await?, 2);
    let orders = Orders::find()
        .filter(OrderCol::CustomerId.eq(customer.user_id))
        .all(&state.orm)
        .await?;
    assert_eq!(orders.len(), 1);

    Ok(())
}

#[tokio::test]
async fn catalog_filters_and_audit_trail() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&database_url).await?;
    let admin = create_admin(&state).await?;
    let florist = located_florist(&state, &admin, "Birthday Blooms", 10.0).await?;
    let product_id = stock_product(&state, &florist, "Party Posy").await?;

    product_service::update_product(
        &state,
        &florist,
        product_id,
        UpdateProductRequest {
            category: Some("Posies".into()),
            occasions: Some(vec!["Birthday".into()]),
            ..Default::default()
        },
    )
    .await?;

    // Filters match whatever casing the florist typed
    let found = product_service::search_products(
        &state,
        ProductQuery {
            category: Some("Posies".into()),
            occasion: Some("Birthday".into()),
            florist_id: Some(product_florist(&state, product_id).await?),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("products");
    assert_eq!(found.items.len(), 1);
    assert_eq!(found.items[0].id, product_id);

    let stores = florist_service::list_florists(
        &state,
        florist_marketplace_api::routes::params::FloristQuery {
            q: Some("birthday blooms".into()),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("stores");
    assert!(stores.items.iter().any(|store| store.store_name == "Birthday Blooms"));

    // Audit listing filters by action and actor
    let logs = admin_service::list_audit_logs(
        &state,
        &admin,
        AuditLogQuery {
            action: Some("product_update".into()),
            user_id: Some(florist.user_id),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("logs");
    assert_eq!(logs.items.len(), 1);
    assert_eq!(logs.items[0].action, "product_update");
    assert_eq!(
        logs.items[0].metadata.as_ref().and_then(|m| m.get("product_id")).cloned(),
        Some(serde_json::json!(product_id))
    );

    let by_florist = admin_service::list_audit_logs(
        &state,
        &admin,
        AuditLogQuery {
            user_id: Some(florist.user_id),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("logs");
    let actions: Vec<&str> = by_florist.items.iter().map(|log| log.action.as_str()).collect();
    assert!(actions.contains(&"product_create"));
    assert!(actions.contains(&"product_update"));
    assert!(by_florist.items.iter().all(|log| log.user_id == Some(florist.user_id)));

    let err = admin_service::list_audit_logs(&state, &florist, AuditLogQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    Ok(())
}

#[tokio::test]
async fn rejected_applications_respect_reapply_rules() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    let state = setup_state(&database_url).await?;
    let admin = create_admin(&state).await?;

    // Final rejection
    let email = unique_email("applicant");
    let first = application_service::submit_application(&state, application(&email))
        .await?
        .data
        .expect("application");
    let err = application_service::submit_application(&state, application(&email))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    application_service::reject_application(
        &state,
        &admin,
        first.id,
        RejectApplicationRequest {
            reason: Some("Outside service area".into()),
            allow_reapply: false,
            cooldown_days: None,
        },
    )
    .await?;
    let err = application_service::submit_application(&state, application(&email))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Cooldown window
    let email = unique_email("applicant");
    let first = application_service::submit_application(&state, application(&email))
        .await?
        .data
        .expect("application");
    let rejected = application_service::reject_application(
        &state,
        &admin,
        first.id,
        RejectApplicationRequest {
            reason: None,
            allow_reapply: true,
            cooldown_days: None,
        },
    )
    .await?
    .data
    .expect("decision");
    assert!(rejected.application.reapply_after.is_some());
    let err = application_service::submit_application(&state, application(&email))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // No cooldown
    let email = unique_email("applicant");
    let first = application_service::submit_application(&state, application(&email))
        .await?
        .data
        .expect("application");
    application_service::reject_application(
        &state,
        &admin,
        first.id,
        RejectApplicationRequest {
            reason: None,
            allow_reapply: true,
            cooldown_days: Some(0),
        },
    )
    .await?;
    let second = application_service::submit_application(&state, application(&email))
        .await?
        .data
        .expect("application");
    assert_eq!(second.status, "pending");

    // Reviewed applications cannot be decided twice
    let err = application_service::approve_application(&state, &admin, first.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}
