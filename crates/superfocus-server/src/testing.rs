//! Counting fakes for router tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{Method, Request},
    response::Response,
    Router,
};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use superfocus_core::{
    AudioStream, AuthUser, AuthVerifier, BillingPortal, ChatModel, FocusError, GenerationRequest,
    ProfileStore, RateLimitPolicy, RateLimiter, Result, ServiceProbe, SpeechRequest,
    SpeechSynthesizer, Video, VideoSearch,
};
use superfocus_providers::MemoryRateLimiter;
use tower::util::ServiceExt;

use crate::services::Services;

pub const GOOD_TOKEN: &str = "good-token";
pub const PORTAL_URL: &str = "https://billing.stripe.com/p/session/test_123";

#[derive(Default)]
pub struct FakeModel {
    replies: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for FakeModel {
    async fn complete(&self, _request: &GenerationRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| {
                FocusError::provider("fake", superfocus_core::ProviderErrorKind::Server, "no reply")
            })
    }
}

#[derive(Default)]
pub struct FakeSpeech {
    calls: AtomicUsize,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, _request: &SpeechRequest) -> Result<AudioStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks = vec![Ok(Bytes::from_static(b"ID3")), Ok(Bytes::from_static(b"audio"))];
        Ok(futures::stream::iter(chunks).boxed())
    }
}

#[derive(Default)]
pub struct FakeVideos {
    calls: AtomicUsize,
    last: Mutex<Option<(String, u32)>>,
}

pub fn video(id: &str, channel: &str) -> Video {
    Video {
        video_id: id.to_string(),
        title: format!("Video {id}"),
        description: String::new(),
        thumbnail_url: None,
        channel_title: channel.to_string(),
        published_at: None,
    }
}

#[async_trait]
impl VideoSearch for FakeVideos {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Video>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some((query.to_string(), max_results));
        Ok(vec![
            video("a", "Khan Academy"),
            video("b", "Random Channel X"),
            video("c", "SciShow Kids"),
            video("d", "TED-Ed"),
        ])
    }
}

#[derive(Default)]
pub struct FakeAuth {
    calls: AtomicUsize,
}

#[async_trait]
impl AuthVerifier for FakeAuth {
    async fn verify(&self, token: &str) -> Result<AuthUser> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if token == GOOD_TOKEN {
            Ok(AuthUser::new("user-1", Some("kid@example.com".to_string()), token))
        } else {
            Err(FocusError::unauthorized("invalid or expired session"))
        }
    }
}

pub struct FakeProfiles {
    customer: Option<String>,
}

#[async_trait]
impl ProfileStore for FakeProfiles {
    async fn billing_customer(&self, _user: &AuthUser) -> Result<Option<String>> {
        Ok(self.customer.clone())
    }
}

#[derive(Default)]
pub struct FakeBilling {
    calls: AtomicUsize,
    return_url: Mutex<Option<String>>,
}

#[async_trait]
impl BillingPortal for FakeBilling {
    async fn create_session(&self, _customer_id: &str, return_url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.return_url.lock().unwrap() = Some(return_url.to_string());
        Ok(PORTAL_URL.to_string())
    }
}

pub struct FakeProbe {
    healthy: bool,
}

#[async_trait]
impl ServiceProbe for FakeProbe {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn ping(&self) -> Result<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(FocusError::provider(
                "supabase",
                superfocus_core::ProviderErrorKind::Network,
                "connection refused",
            ))
        }
    }
}

/// A set of fakes plus the knobs tests turn.
pub struct Fakes {
    pub model: Arc<FakeModel>,
    pub speech: Arc<FakeSpeech>,
    pub videos: Arc<FakeVideos>,
    pub auth: Arc<FakeAuth>,
    pub billing: Arc<FakeBilling>,
    customer: Option<String>,
    policy: Option<RateLimitPolicy>,
    healthy: bool,
}

pub fn fake_services() -> Fakes {
    Fakes {
        model: Arc::default(),
        speech: Arc::default(),
        videos: Arc::default(),
        auth: Arc::default(),
        billing: Arc::default(),
        customer: Some("cus_123".to_string()),
        policy: Some(RateLimitPolicy {
            max_requests: 100,
            window_secs: 60,
        }),
        healthy: true,
    }
}

impl Fakes {
    pub fn with_rate_limit(mut self, max_requests: u32) -> Self {
        self.policy = Some(RateLimitPolicy {
            max_requests,
            window_secs: 60,
        });
        self
    }

    pub fn without_customer(mut self) -> Self {
        self.customer = None;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn reply(&self, raw: impl Into<String>) {
        self.model.replies.lock().unwrap().push_back(raw.into());
    }

    pub fn services(&self) -> Services {
        Services {
            model: self.model.clone(),
            speech: self.speech.clone(),
            videos: self.videos.clone(),
            auth: self.auth.clone(),
            profiles: Arc::new(FakeProfiles {
                customer: self.customer.clone(),
            }),
            billing: self.billing.clone(),
            rate_limiter: self
                .policy
                .map(|p| Arc::new(MemoryRateLimiter::new(p)) as Arc<dyn RateLimiter>),
            database: Arc::new(FakeProbe {
                healthy: self.healthy,
            }),
        }
    }

    pub fn model_calls(&self) -> usize {
        self.model.calls.load(Ordering::SeqCst)
    }

    pub fn speech_calls(&self) -> usize {
        self.speech.calls.load(Ordering::SeqCst)
    }

    pub fn video_calls(&self) -> usize {
        self.videos.calls.load(Ordering::SeqCst)
    }

    pub fn auth_calls(&self) -> usize {
        self.auth.calls.load(Ordering::SeqCst)
    }

    pub fn billing_calls(&self) -> usize {
        self.billing.calls.load(Ordering::SeqCst)
    }

    pub fn last_video_search(&self) -> Option<(String, u32)> {
        self.videos.last.lock().unwrap().clone()
    }

    pub fn last_return_url(&self) -> Option<String> {
        self.billing.return_url.lock().unwrap().clone()
    }
}

pub async fn read_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> T {
    serde_json::from_slice(&read_bytes(response).await).unwrap()
}

pub async fn send(
    router: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    router.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn post(
    router: Router,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Response {
    send(router, Method::POST, uri, token, Some(body)).await
}

pub async fn get(router: Router, uri: &str) -> Response {
    send(router, Method::GET, uri, None, None).await
}
