use florist_marketplace_api::{
    config::AppConfig,
    db::{MIGRATOR, create_pool},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,florist_marketplace_api=debug".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    MIGRATOR.run(&pool).await?;
    println!("Migrations applied");
    Ok(())
}
