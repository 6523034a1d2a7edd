use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use sqlx::{FromRow, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_florist},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SortOrder},
    services::florist_service::florist_for_user,
    state::AppState,
};

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
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

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
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
        }
    }
}

/// Appends the storefront filters shared by the page query and the count query.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    builder.push(" WHERE TRUE");
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{q}%");
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    // Tags are stored normalized, so filter values are normalized the same way.
    if let Some(category) = query.category.as_deref().and_then(normalize_tag) {
        builder.push(" AND category = ").push_bind(category);
    }
    if let Some(occasion) = query.occasion.as_deref().and_then(normalize_tag) {
        builder.push(" AND occasions ? ").push_bind(occasion);
    }
    if let Some(florist_id) = query.florist_id {
        builder.push(" AND florist_id = ").push_bind(florist_id);
    }
    if let Some(min) = query.min_price {
        builder.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = query.max_price {
        builder.push(" AND price <= ").push_bind(max);
    }
    if let Some(in_stock) = query.in_stock {
        builder.push(" AND in_stock = ").push_bind(in_stock);
    }
}

pub async fn search_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination().normalize();
    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(AppError::BadRequest(
                "min_price must not exceed max_price".into(),
            ));
        }
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT id, florist_id, title, description, price, images, category, occasions, \
         in_stock, created_at, updated_at FROM products",
    );
    push_filters(&mut builder, &query);
    // Sort column and direction come from closed enums, never from raw input.
    builder
        .push(format!(
            " ORDER BY {} {}, id",
            sort_by.as_sql(),
            sort_order.as_sql()
        ))
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let items: Vec<Product> = builder
        .build_query_as::<ProductRow>()
        .fetch_all(&state.pool)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
    push_filters(&mut count, &query);
    let total: (i64,) = count.build_query_as().fetch_one(&state.pool).await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product.into(), None))
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("title must not be empty".into()));
    }
    Ok(title.to_string())
}

/// Upper bound on a product price, in minor units.
pub const MAX_PRICE: i64 = 100_000_000;

fn validate_price(price: i64) -> AppResult<i64> {
    if price <= 0 {
        return Err(AppError::BadRequest("price must be greater than 0".into()));
    }
    if price > MAX_PRICE {
        return Err(AppError::BadRequest(format!(
            "price must not exceed {MAX_PRICE}"
        )));
    }
    Ok(price)
}

fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().to_lowercase();
    (!tag.is_empty()).then_some(tag)
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = tags.iter().filter_map(|t| normalize_tag(t)).collect();
    cleaned.sort();
    cleaned.dedup();
    cleaned
}

pub async fn list_own_products(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_florist(user)?;
    let florist = florist_for_user(state, user).await?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Products::find()
        .filter(ProdCol::FloristId.eq(florist.id))
        .order_by_desc(ProdCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_florist(user)?;
    let florist = florist_for_user(state, user).await?;

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        florist_id: Set(florist.id),
        title: Set(validate_title(&payload.title)?),
        description: Set(payload.description),
        price: Set(validate_price(payload.price)?),
        images: Set(serde_json::json!(payload.images)),
        category: Set(payload.category.as_deref().and_then(normalize_tag)),
        occasions: Set(serde_json::json!(clean_tags(payload.occasions))),
        in_stock: Set(payload.in_stock.unwrap_or(true)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_create",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        product.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_florist(user)?;
    let florist = florist_for_user(state, user).await?;

    let existing = Products::find()
        .filter(
            Condition::all()
                .add(ProdCol::Id.eq(id))
                .add(ProdCol::FloristId.eq(florist.id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ProductActive = existing.into();
    if let Some(title) = payload.title {
        active.title = Set(validate_title(&title)?);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(validate_price(price)?);
    }
    if let Some(images) = payload.images {
        active.images = Set(serde_json::json!(images));
    }
    if let Some(category) = payload.category {
        active.category = Set(normalize_tag(&category));
    }
    if let Some(occasions) = payload.occasions {
        active.occasions = Set(serde_json::json!(clean_tags(occasions)));
    }
    if let Some(in_stock) = payload.in_stock {
        active.in_stock = Set(in_stock);
    }
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        product.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_florist(user)?;
    let florist = florist_for_user(state, user).await?;

    let result = Products::delete_many()
        .filter(ProdCol::Id.eq(id))
        .filter(ProdCol::FloristId.eq(florist.id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_trimmed_lowercased_and_deduplicated() {
        let tags = vec![
            " Birthday".to_string(),
            "birthday".to_string(),
            "".to_string(),
            "Anniversary".to_string(),
        ];
        assert_eq!(clean_tags(tags), vec!["anniversary", "birthday"]);
    }

    #[test]
    fn rejects_blank_title_and_non_positive_price() {
        assert!(validate_title("   ").is_err());
        assert_eq!(validate_title(" Roses ").unwrap(), "Roses");
        assert!(validate_price(0).is_err());
        assert_eq!(validate_price(4500).unwrap(), 4500);
        assert_eq!(validate_price(MAX_PRICE).unwrap(), MAX_PRICE);
        assert!(validate_price(MAX_PRICE + 1).is_err());
        assert!(validate_price(i64::MAX / 2).is_err());
    }

    #[test]
    fn filter_tags_match_stored_casing() {
        assert_eq!(normalize_tag(" Birthday "), Some("birthday".to_string()));
        assert_eq!(normalize_tag("   "), None);

        let query = ProductQuery {
            category: Some("   ".into()),
            occasion: Some("Birthday".into()),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filters(&mut builder, &query);
        let sql = builder.sql();
        assert!(!sql.contains("category ="));
        assert!(sql.contains("occasions ? $1"));
    }

    #[test]
    fn filters_bind_every_user_value() {
        let query = ProductQuery {
            q: Some("rose".into()),
            occasion: Some("birthday".into()),
            min_price: Some(1000),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filters(&mut builder, &query);
        let sql = builder.sql();
        assert!(sql.contains("title ILIKE $1 OR description ILIKE $2"));
        assert!(sql.contains("occasions ? $3"));
        assert!(sql.contains("price >= $4"));
        assert!(!sql.contains("rose"));
    }
}
