//! YouTube Data API v3 search.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use superfocus_core::{Result, Video, VideoSearch};
use tracing::debug;

use crate::http::{self, check_status, read_json, transport_error};

const PROVIDER: &str = "youtube";

/// Default API root.
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com";

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    channel_title: String,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Default, Deserialize)]
struct Thumbnails {
    #[serde(default)]
    high: Option<Thumbnail>,
    #[serde(default)]
    medium: Option<Thumbnail>,
    #[serde(default)]
    default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

impl SearchItem {
    fn into_video(self) -> Option<Video> {
        let video_id = self.id.video_id?;
        let thumbnails = self.snippet.thumbnails;
        let thumbnail_url = thumbnails
            .medium
            .or(thumbnails.high)
            .or(thumbnails.default)
            .map(|t| t.url);
        Some(Video {
            video_id,
            title: self.snippet.title,
            description: self.snippet.description,
            thumbnail_url,
            channel_title: self.snippet.channel_title,
            published_at: self.snippet.published_at,
        })
    }
}

/// YouTube search client.
#[derive(Clone)]
pub struct YouTubeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    /// Creates a client against `base_url` (normally [`YOUTUBE_API_BASE`]).
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            api_key: api_key.into(),
            base_url: http::base_url(base_url),
        })
    }
}

#[async_trait]
impl VideoSearch for YouTubeClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Video>> {
        let max_results = max_results.to_string();
        let response = self
            .client
            .get(format!("{}/youtube/v3/search", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("safeSearch", "strict"),
                ("maxResults", max_results.as_str()),
                ("q", query),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, &e))?;
        let response = check_status(PROVIDER, response).await?;
        let body: SearchResponse = read_json(PROVIDER, response).await?;

        let videos: Vec<Video> = body
            .items
            .into_iter()
            .filter_map(SearchItem::into_video)
            .collect();
        debug!(results = videos.len(), "YouTube search returned");
        Ok(videos)
    }
}
