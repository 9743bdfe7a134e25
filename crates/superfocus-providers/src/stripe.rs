//! Stripe billing portal sessions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use superfocus_core::{BillingPortal, Result};
use tracing::info;

use crate::http::{self, check_status, read_json, transport_error};

const PROVIDER: &str = "stripe";

/// Default API root.
pub const STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Deserialize)]
struct PortalSession {
    id: String,
    url: String,
}

/// Stripe client.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    /// Creates a client against `base_url` (normally [`STRIPE_API_BASE`]).
    pub fn new(secret_key: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            secret_key: secret_key.into(),
            base_url: http::base_url(base_url),
        })
    }
}

#[async_trait]
impl BillingPortal for StripeClient {
    async fn create_session(&self, customer_id: &str, return_url: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/billing_portal/sessions", self.base_url))
            .basic_auth(&self.secret_key, Some(""))
            .form(&[("customer", customer_id), ("return_url", return_url)])
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;
        let response = check_status(PROVIDER, response).await?;
        let session: PortalSession = read_json(PROVIDER, response).await?;
        info!(session_id = %session.id, "Billing portal session created");
        Ok(session.url)
    }
}
