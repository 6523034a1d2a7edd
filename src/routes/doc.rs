use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::AuditLogList,
        applications::{
            ApplicationDecision, ApplicationList, ProvisionFloristRequest, ProvisionedFlorist,
            RejectApplicationRequest, SubmitApplicationRequest,
        },
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartItemDto, CartList},
        florists::{
            DeliveryQuote, DeliveryQuoteQuery, FloristList, SetupProgress,
            UpdateFloristProfileRequest,
        },
        orders::{
            CancelOrderRequest, CheckoutRequest, CheckoutResponse, OrderActions, OrderList,
            OrderWithItems, PaymentMethodList, UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        webhooks::WebhookAck,
    },
    integrations::{Coordinates, RouteEstimate},
    models::{
        AuditLog, CartItem, DayHours, FloristApplication, FloristProfile, Order, OrderItem,
        PaymentMethod, Product, Profile, StatusHistoryEntry,
    },
    order_status::{FulfillmentType, OrderStatus},
    response::{ApiResponse, Meta},
    routes::{
        admin, applications, auth, cart, florist, florists, health, orders, params, products,
        webhooks,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness,
        auth::register,
        auth::login,
        auth::me,
        products::list_products,
        products::get_product,
        florists::list_florists,
        florists::get_florist,
        florists::delivery_quote,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        orders::list_order,
        orders::checkout,
        orders::get_order,
        orders::cancel_order,
        orders::list_payment_methods,
        florist::get_profile,
        florist::update_profile,
        florist::setup_progress,
        florist::list_products,
        florist::create_product,
        florist::update_product,
        florist::delete_product,
        florist::list_orders,
        florist::get_order,
        florist::order_actions,
        florist::update_order_status,
        applications::submit_application,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_applications,
        admin::approve_application,
        admin::reject_application,
        admin::provision_florist,
        admin::list_audit_logs,
        webhooks::stripe_webhook
    ),
    components(
        schemas(
            Profile,
            FloristProfile,
            DayHours,
            Product,
            CartItem,
            Order,
            OrderItem,
            StatusHistoryEntry,
            PaymentMethod,
            FloristApplication,
            AuditLog,
            OrderStatus,
            FulfillmentType,
            Coordinates,
            RouteEstimate,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            AddToCartRequest,
            CartItemDto,
            CartList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            UpdateFloristProfileRequest,
            FloristList,
            SetupProgress,
            DeliveryQuoteQuery,
            DeliveryQuote,
            CheckoutRequest,
            CheckoutResponse,
            UpdateOrderStatusRequest,
            CancelOrderRequest,
            OrderWithItems,
            OrderList,
            OrderActions,
            PaymentMethodList,
            SubmitApplicationRequest,
            RejectApplicationRequest,
            ProvisionFloristRequest,
            ProvisionedFlorist,
            ApplicationList,
            ApplicationDecision,
            AuditLogList,
            WebhookAck,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::FloristQuery,
            params::ApplicationQuery,
            params::AuditLogQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Product catalogue"),
        (name = "Florists", description = "Store directory and delivery quotes"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Customer orders and checkout"),
        (name = "Florist", description = "Store dashboard"),
        (name = "Applications", description = "Florist onboarding"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Webhooks", description = "Payment provider callbacks"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
