//! Supabase auth and REST access.
//!
//! Tokens are verified by asking the auth server who they belong to
//! (`GET /auth/v1/user`). Profile reads go through PostgREST with the
//! caller's own token so row-level security applies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use superfocus_core::{
    AuthUser, AuthVerifier, FocusError, ProfileStore, Result, ServiceProbe,
};
use tracing::{debug, warn};

use crate::http::{self, check_status, read_json, transport_error};

const PROVIDER: &str = "supabase";

#[derive(Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct ProfileRow {
    #[serde(default)]
    stripe_customer_id: Option<String>,
}

/// Supabase project client.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    url: String,
    anon_key: String,
}

impl SupabaseClient {
    /// Creates a client for the project at `url`.
    pub fn new(url: &str, anon_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            url: http::base_url(url),
            anon_key: anon_key.into(),
        })
    }

    fn get(&self, path: &str, bearer: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{path}", self.url))
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }
}

#[async_trait]
impl AuthVerifier for SupabaseClient {
    async fn verify(&self, token: &str) -> Result<AuthUser> {
        let response = self
            .get("/auth/v1/user", token)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            debug!("Session token rejected by auth server");
            return Err(FocusError::unauthorized("invalid or expired session"));
        }
        let response = check_status(PROVIDER, response).await?;
        let user: UserResponse = read_json(PROVIDER, response).await?;
        Ok(AuthUser::new(user.id, user.email, token))
    }
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn billing_customer(&self, user: &AuthUser) -> Result<Option<String>> {
        let response = self
            .get("/rest/v1/profiles", user.access_token())
            .query(&[
                ("id", format!("eq.{}", user.id)),
                ("select", "stripe_customer_id".to_string()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;
        let response = check_status(PROVIDER, response).await?;
        let rows: Vec<ProfileRow> = read_json(PROVIDER, response).await?;

        let customer = rows
            .into_iter()
            .find_map(|row| row.stripe_customer_id)
            .filter(|id| !id.trim().is_empty());
        if customer.is_none() {
            warn!(user_id = %user.id, "Profile has no billing customer");
        }
        Ok(customer)
    }
}

#[async_trait]
impl ServiceProbe for SupabaseClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .get("/auth/v1/health", &self.anon_key)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;
        check_status(PROVIDER, response).await?;
        Ok(())
    }
}
