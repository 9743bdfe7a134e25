//! Stand-in for a service whose credentials are missing.
//!
//! Every call fails with `ServiceNotConfigured`, which the API maps to 503.

use async_trait::async_trait;
use superfocus_core::{
    AudioStream, AuthUser, AuthVerifier, BillingPortal, ChatModel, FocusError, GenerationRequest,
    ProfileStore, Result, ServiceProbe, SpeechRequest, SpeechSynthesizer, Video, VideoSearch,
};

/// A service that cannot be reached because it has no configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unconfigured {
    service: &'static str,
    env_hint: &'static str,
}

impl Unconfigured {
    /// Creates a stand-in for `service`, naming the variables that enable it.
    #[must_use]
    pub const fn new(service: &'static str, env_hint: &'static str) -> Self {
        Self { service, env_hint }
    }

    fn error(&self) -> FocusError {
        FocusError::not_configured(self.service, self.env_hint)
    }
}

#[async_trait]
impl ChatModel for Unconfigured {
    async fn complete(&self, _request: &GenerationRequest) -> Result<String> {
        Err(self.error())
    }
}

#[async_trait]
impl SpeechSynthesizer for Unconfigured {
    async fn synthesize(&self, _request: &SpeechRequest) -> Result<AudioStream> {
        Err(self.error())
    }
}

#[async_trait]
impl VideoSearch for Unconfigured {
    async fn search(&self, _query: &str, _max_results: u32) -> Result<Vec<Video>> {
        Err(self.error())
    }
}

#[async_trait]
impl AuthVerifier for Unconfigured {
    async fn verify(&self, _token: &str) -> Result<AuthUser> {
        Err(self.error())
    }
}

#[async_trait]
impl ProfileStore for Unconfigured {
    async fn billing_customer(&self, _user: &AuthUser) -> Result<Option<String>> {
        Err(self.error())
    }
}

#[async_trait]
impl BillingPortal for Unconfigured {
    async fn create_session(&self, _customer_id: &str, _return_url: &str) -> Result<String> {
        Err(self.error())
    }
}

#[async_trait]
impl ServiceProbe for Unconfigured {
    fn name(&self) -> &str {
        self.service
    }

    async fn ping(&self) -> Result<()> {
        Err(self.error())
    }
}
