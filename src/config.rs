use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub mapbox_access_token: Option<String>,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub currency: String,
    pub reapply_cooldown_days: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let reapply_cooldown_days = env::var("REAPPLY_COOLDOWN_DAYS")
            .ok()
            .and_then(|d| d.parse::<i64>().ok())
            .filter(|d| *d >= 0)
            .unwrap_or(30);
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            stripe_secret_key: optional("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
            mapbox_access_token: optional("MAPBOX_ACCESS_TOKEN"),
            resend_api_key: optional("RESEND_API_KEY"),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Petal Market <orders@petalmarket.local>".to_string()),
            currency: env::var("CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or_else(|_| "aud".to_string()),
            reapply_cooldown_days,
        })
    }
}

// Blank values count as unset so `.env` templates can leave keys empty.
fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::optional;

    #[test]
    fn blank_optional_values_are_unset() {
        // SAFETY: keys are unique to this test.
        unsafe {
            std::env::set_var("FLORIST_TEST_BLANK_KEY", "  ");
            std::env::set_var("FLORIST_TEST_SET_KEY", "sk_test");
        }
        assert_eq!(optional("FLORIST_TEST_BLANK_KEY"), None);
        assert_eq!(optional("FLORIST_TEST_SET_KEY").as_deref(), Some("sk_test"));
        assert_eq!(optional("FLORIST_TEST_MISSING_KEY"), None);
    }
}
