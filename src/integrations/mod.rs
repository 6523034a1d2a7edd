//! Outbound calls to hosted services.
//!
//! Each service sits behind a trait so the rest of the crate only sees
//! `Arc<dyn Trait>` and tests can plug in fakes.

pub mod email;
pub mod routing;
pub mod stripe;

use std::{sync::Arc, time::Duration};

use crate::config::AppConfig;

pub use email::{EmailMessage, Mailer, ResendMailer};
pub use routing::{Coordinates, MapboxRouter, RouteEstimate, RouteProvider};
pub use stripe::{Customer, PaymentGateway, PaymentIntent, StripeGateway};

/// Shared HTTP client for all integrations.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;
    Ok(client)
}

#[derive(Clone)]
pub struct Integrations {
    pub router: Arc<dyn RouteProvider>,
    pub mailer: Arc<dyn Mailer>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl Integrations {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let client = http_client()?;
        Ok(Self {
            router: Arc::new(MapboxRouter::new(
                client.clone(),
                config.mapbox_access_token.clone(),
            )),
            mailer: Arc::new(ResendMailer::new(
                client.clone(),
                config.resend_api_key.clone(),
                config.email_from.clone(),
            )),
            payments: Arc::new(StripeGateway::new(client, config.stripe_secret_key.clone())),
        })
    }
}
