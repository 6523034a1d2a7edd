use florist_marketplace_api::{
    config::AppConfig,
    db::{MIGRATOR, create_pool},
    models::{ROLE_ADMIN, ROLE_CUSTOMER, ROLE_FLORIST},
    services::auth_service::hash_password,
};
use serde_json::json;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    MIGRATOR.run(&pool).await?;

    let admin_id = ensure_profile(&pool, "admin@example.com", "admin12345", ROLE_ADMIN).await?;
    let customer_id =
        ensure_profile(&pool, "customer@example.com", "customer12345", ROLE_CUSTOMER).await?;
    let florist_user_id =
        ensure_profile(&pool, "florist@example.com", "florist12345", ROLE_FLORIST).await?;
    let florist_id = ensure_store(&pool, florist_user_id).await?;
    seed_products(&pool, florist_id).await?;

    println!(
        "Seed completed. Admin ID: {admin_id}, Customer ID: {customer_id}, Florist ID: {florist_id}"
    );
    Ok(())
}

async fn ensure_profile(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO profiles (id, email, password_hash, full_name, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(format!("Demo {role}"))
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured profile {email} (role={role})");
    Ok(id)
}

async fn ensure_store(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<Uuid> {
    let hours = json!({
        "monday": { "open": "08:00", "close": "17:00", "closed": false },
        "tuesday": { "open": "08:00", "close": "17:00", "closed": false },
        "wednesday": { "open": "08:00", "close": "17:00", "closed": false },
        "thursday": { "open": "08:00", "close": "17:00", "closed": false },
        "friday": { "open": "08:00", "close": "18:00", "closed": false },
        "saturday": { "open": "09:00", "close": "13:00", "closed": false },
        "sunday": { "open": null, "close": null, "closed": true }
    });

    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO florist_profiles (
            id, user_id, store_name, about, phone, address, suburb, state, postcode,
            latitude, longitude, operating_hours, delivery_radius_km, delivery_fee,
            minimum_order, same_day_cutoff
        )
        VALUES ($1, $2, 'Fitzroy Flower Co.', 'Seasonal bouquets from local growers',
                '+61 3 9000 0000', '12 Smith Street', 'Fitzroy', 'VIC', '3065',
                -37.8001, 144.9787, $3, 15, 1500, 4000, '13:00')
        ON CONFLICT (user_id) DO UPDATE SET updated_at = now()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(hours)
    .fetch_one(pool)
    .await?;

    println!("Ensured store for florist {user_id}");
    Ok(id)
}

async fn seed_products(pool: &sqlx::PgPool, florist_id: Uuid) -> anyhow::Result<()> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE florist_id = $1")
        .bind(florist_id)
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        println!("Products already seeded");
        return Ok(());
    }

    let products = vec![
        ("Garden Rose Bouquet", "Twelve garden roses wrapped in kraft paper", 8900, "bouquets", vec!["anniversary", "birthday"]),
        ("Native Posy", "Waratah, banksia and eucalyptus", 6500, "posies", vec!["thank_you"]),
        ("Sympathy Wreath", "White lilies and chrysanthemums", 14500, "wreaths", vec!["sympathy"]),
        ("Potted Orchid", "Phalaenopsis in a ceramic pot", 7200, "plants", vec!["birthday", "get_well"]),
    ];

    for (title, description, price, category, occasions) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, florist_id, title, description, price, category, occasions)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(florist_id)
        .bind(title)
        .bind(description)
        .bind(price as i64)
        .bind(category)
        .bind(json!(occasions))
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
