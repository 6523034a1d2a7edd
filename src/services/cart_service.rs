use chrono::{DateTime, Utc};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartItemDto, CartList},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    models::{CartItem, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

#[derive(FromRow)]
struct CartWithProductRow {
    cart_id: Uuid,
    quantity: i32,
    product_id: Uuid,
    florist_id: Uuid,
    title: String,
    description: Option<String>,
    price: i64,
    images: Json<Vec<String>>,
    category: Option<String>,
    occasions: Json<Vec<String>>,
    in_stock: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub async fn list_cart(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();
    let rows = sqlx::query_as::<_, CartWithProductRow>(
        r#"
        SELECT ci.id AS cart_id, ci.quantity,
               p.id AS product_id, p.florist_id, p.title, p.description, p.price, p.images,
               p.category, p.occasions, p.in_stock, p.created_at, p.updated_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let totals: (i64, Option<i64>) = sqlx::query_as(
        r#"
        SELECT COUNT(*), SUM(ci.quantity::BIGINT * p.price)::BIGINT
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        "#,
    )
    .bind(user.user_id)
    .fetch_one(&state.pool)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| CartItemDto {
            id: row.cart_id,
            line_total: row.price * i64::from(row.quantity),
            quantity: row.quantity,
            product: Product {
                id: row.product_id,
                florist_id: row.florist_id,
                title: row.title,
                description: row.description,
                price: row.price,
                images: row.images.0,
                category: row.category,
                occasions: row.occasions.0,
                in_stock: row.in_stock,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        })
        .collect();

    let meta = Meta::new(page, limit, totals.0);
    Ok(ApiResponse::success(
        "OK",
        CartList {
            items,
            subtotal: totals.1.unwrap_or(0),
        },
        Some(meta),
    ))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    ensure_customer(user)?;
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product: Option<(Uuid, bool)> =
        sqlx::query_as("SELECT florist_id, in_stock FROM products WHERE id = $1")
            .bind(payload.product_id)
            .fetch_optional(&state.pool)
            .await?;
    let florist_id = match product {
        None => return Err(AppError::BadRequest("product not found".to_string())),
        Some((_, false)) => {
            return Err(AppError::BadRequest("product is out of stock".to_string()));
        }
        Some((florist_id, true)) => florist_id,
    };

    let mixed: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT ci.id
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1 AND p.florist_id <> $2
        LIMIT 1
        "#,
    )
    .bind(user.user_id)
    .bind(florist_id)
    .fetch_optional(&state.pool)
    .await?;
    if mixed.is_some() {
        return Err(AppError::Conflict(
            "cart already holds products from another florist".to_string(),
        ));
    }

    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (user_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
        RETURNING id, product_id, user_id, quantity, created_at
        "#,
    )
    .bind(user.user_id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .fetch_one(&state.pool)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND user_id = $2")
        .bind(product_id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
