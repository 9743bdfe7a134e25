//! End-to-end tests for the SuperFocus API.
//!
//! The server runs on a real listener with real provider clients; every
//! provider is a local `httpmock` server.

use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use futures::StreamExt;
use httpmock::prelude::*;
use serde_json::{json, Value};
use superfocus_server::{
    create_router, AppState, Config, Environment, ProviderUrls, RateLimitConfig,
};

const TOKEN: &str = "session-token";
const STALE_TOKEN: &str = "stale-token";

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

fn config_for(mock: &MockServer, max_requests: u32) -> Config {
    Config {
        rate_limit: RateLimitConfig {
            enabled: true,
            max_requests,
            window_seconds: 60,
        },
        providers: ProviderUrls {
            openai: mock.base_url(),
            youtube: mock.base_url(),
            stripe: mock.base_url(),
        },
        ..Config::default()
    }
}

fn environment_for(mock: &MockServer) -> Environment {
    Environment {
        openai_api_key: Some("sk-test".to_string()),
        supabase_url: Some(mock.base_url()),
        supabase_anon_key: Some("anon-key".to_string()),
        stripe_secret_key: Some("sk_test_stripe".to_string()),
        youtube_api_key: Some("yt-key".to_string()),
        site_url: Some("https://superfocus.app".to_string()),
        ..Environment::default()
    }
}

/// Spawns the server and returns its base URL.
async fn spawn_server(config: Config, env: Environment) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let state = AppState::from_environment(config, env).expect("Failed to build state");
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Server failed");
    });

    // Give the server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}"), handle)
}

async fn mock_session(mock: &MockServer) {
    mock.mock_async(|when, then| {
        when.method(GET)
            .path("/auth/v1/user")
            .header("authorization", format!("Bearer {TOKEN}"));
        then.status(200)
            .json_body(json!({ "id": "user-1", "email": "kid@example.com" }));
    })
    .await;
    mock.mock_async(|when, then| {
        when.method(GET)
            .path("/auth/v1/user")
            .header("authorization", format!("Bearer {STALE_TOKEN}"));
        then.status(401).json_body(json!({ "msg": "invalid JWT" }));
    })
    .await;
}

#[tokio::test]
async fn test_health_reports_configured_services() {
    let mock = MockServer::start_async().await;
    let (base, handle) = spawn_server(config_for(&mock, 20), environment_for(&mock)).await;

    let response = reqwest::get(format!("{base}/api/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["services"]["openai"], "configured");
    assert_eq!(body["services"]["upstash"], "missing");

    handle.abort();
}

#[tokio::test]
async fn test_supabase_health_pings_auth_server() {
    let mock = MockServer::start_async().await;
    let health = mock
        .mock_async(|when, then| {
            when.method(GET)
                .path("/auth/v1/health")
                .header("apikey", "anon-key");
            then.status(200).json_body(json!({ "name": "GoTrue" }));
        })
        .await;
    let (base, handle) = spawn_server(config_for(&mock, 20), environment_for(&mock)).await;

    let response = reqwest::get(format!("{base}/api/health/supabase")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    health.assert_async().await;

    handle.abort();
}

#[tokio::test]
async fn test_rejected_session_never_reaches_openai() {
    let mock = MockServer::start_async().await;
    mock_session(&mock).await;
    let (base, handle) = spawn_server(config_for(&mock, 20), environment_for(&mock)).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/test-prep"))
        .bearer_auth(STALE_TOKEN)
        .json(&json!({ "subject": "Science", "topic": "Cells", "type": "flashcards", "count": 2 }))
        .send()
        .await
        .unwrap();

    // No chat mock is registered: reaching OpenAI would surface as a 502.
    assert_eq!(response.status(), 401);

    handle.abort();
}

#[tokio::test]
async fn test_flashcards_through_openai() {
    let mock = MockServer::start_async().await;
    mock_session(&mock).await;
    let reply = json!({
        "cards": [
            { "term": "Nucleus", "definition": "Holds the cell's DNA." },
            { "term": "Membrane", "definition": "Controls what enters the cell." }
        ]
    });
    let chat = mock
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer sk-test");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "role": "assistant", "content": reply.to_string() } }],
                "usage": { "prompt_tokens": 40, "completion_tokens": 30, "total_tokens": 70 }
            }));
        })
        .await;
    let (base, handle) = spawn_server(config_for(&mock, 20), environment_for(&mock)).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/test-prep"))
        .bearer_auth(TOKEN)
        .json(&json!({ "subject": "Science", "topic": "Cells", "type": "flashcards", "count": 2 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["type"], "flashcards");
    assert_eq!(body["cards"][1]["term"], "Membrane");
    chat.assert_async().await;

    handle.abort();
}

#[tokio::test]
async fn test_tts_streams_upstream_bytes() {
    let mock = MockServer::start_async().await;
    mock_session(&mock).await;
    let audio: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
    let speech = mock
        .mock_async(|when, then| {
            when.method(POST).path("/audio/speech");
            then.status(200)
                .header("content-type", "audio/mpeg")
                .body(audio.clone());
        })
        .await;
    let (base, handle) = spawn_server(config_for(&mock, 20), environment_for(&mock)).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/tts"))
        .bearer_auth(TOKEN)
        .json(&json!({ "text": "Let's practice fractions.", "voice": "shimmer", "speed": 1.25 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "audio/mpeg");

    let mut received = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(received, audio);
    speech.assert_async().await;

    handle.abort();
}

#[tokio::test]
async fn test_youtube_search_is_filtered_and_anonymous() {
    let mock = MockServer::start_async().await;
    let search = mock
        .mock_async(|when, then| {
            when.method(GET)
                .path("/youtube/v3/search")
                .query_param("safeSearch", "strict")
                .query_param("key", "yt-key");
            then.status(200).json_body(json!({
                "items": [
                    {
                        "id": { "videoId": "v1" },
                        "snippet": { "title": "Photosynthesis", "description": "", "channelTitle": "Crash Course" }
                    },
                    {
                        "id": { "videoId": "v2" },
                        "snippet": { "title": "Prank video", "description": "", "channelTitle": "Random Channel X" }
                    }
                ]
            }));
        })
        .await;
    let (base, handle) = spawn_server(config_for(&mock, 20), environment_for(&mock)).await;

    let response = reqwest::get(format!("{base}/api/youtube-search?q=photosynthesis&maxResults=5"))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let videos = body["videos"].as_array().unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0]["videoId"], "v1");
    search.assert_async().await;

    handle.abort();
}

#[tokio::test]
async fn test_portal_session_round_trip() {
    let mock = MockServer::start_async().await;
    mock_session(&mock).await;
    mock.mock_async(|when, then| {
        when.method(GET)
            .path("/rest/v1/profiles")
            .query_param("id", "eq.user-1");
        then.status(200)
            .json_body(json!([{ "stripe_customer_id": "cus_42" }]));
    })
    .await;
    let portal = mock
        .mock_async(|when, then| {
            when.method(POST).path("/v1/billing_portal/sessions");
            then.status(200).json_body(json!({
                "id": "bps_1",
                "url": "https://billing.stripe.com/p/session/test_42"
            }));
        })
        .await;
    let (base, handle) = spawn_server(config_for(&mock, 20), environment_for(&mock)).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/create-portal-session"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["url"], "https://billing.stripe.com/p/session/test_42");
    portal.assert_async().await;

    handle.abort();
}

async fn post_stt(
    client: &reqwest::Client,
    base: &str,
    forwarded_for: Option<&str>,
) -> reqwest::Response {
    let mut request = client
        .post(format!("{base}/api/stt"))
        .bearer_auth(TOKEN)
        .json(&json!({ "audio": "data:audio/webm;base64,GkXfow==" }));
    if let Some(address) = forwarded_for {
        request = request.header("x-forwarded-for", address);
    }
    request.send().await.unwrap()
}

#[tokio::test]
async fn test_rate_limit_applies_per_client() {
    let mock = MockServer::start_async().await;
    mock_session(&mock).await;
    let config = Config {
        trust_proxy_headers: true,
        ..config_for(&mock, 2)
    };
    let (base, handle) = spawn_server(config, environment_for(&mock)).await;
    let client = reqwest::Client::new();

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let response = post_stt(&client, &base, None).await;
        statuses.push(response.status().as_u16());
        if response.status() == 429 {
            assert!(response.headers().contains_key("retry-after"));
        }
    }
    assert_eq!(statuses, vec![501, 501, 429]);

    // Behind a trusted proxy, a different forwarded client has its own window.
    let response = post_stt(&client, &base, Some("203.0.113.9")).await;
    assert_eq!(response.status(), 501);

    handle.abort();
}

#[tokio::test]
async fn test_untrusted_forwarded_for_cannot_reset_limit() {
    let mock = MockServer::start_async().await;
    mock_session(&mock).await;
    let (base, handle) = spawn_server(config_for(&mock, 2), environment_for(&mock)).await;
    let client = reqwest::Client::new();

    let mut statuses = Vec::new();
    for i in 0..4 {
        let address = format!("203.0.113.{i}");
        let response = post_stt(&client, &base, Some(&address)).await;
        statuses.push(response.status().as_u16());
    }
    assert_eq!(statuses, vec![501, 501, 429, 429]);

    handle.abort();
}
