use async_trait::async_trait;
use log::info;
use serde::Deserialize;

use super::{ VideoResult, VideoSearch };
use crate::error::{ AgentError, AgentResult };
use crate::llm::chat::send_json;

const PROVIDER: &str = "youtube";
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_MAX_RESULTS: u32 = 4;

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
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    thumbnails: Option<Thumbnails>,
}

#[derive(Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

impl SearchItem {
    fn into_result(self) -> Option<VideoResult> {
        let video_id = self.id.video_id?;
        let thumbnail_url = self.snippet.thumbnails
            .and_then(|t| t.medium.or(t.default))
            .map(|t| t.url);
        Some(VideoResult {
            url: VideoResult::watch_url(&video_id),
            video_id,
            title: self.snippet.title,
            thumbnail_url,
        })
    }
}

/// YouTube Data API v3 search for tutorial videos.
pub struct YouTubeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    max_results: u32,
}

impl YouTubeClient {
    pub fn new(api_key: String, base_url: Option<String>, max_results: u32) -> AgentResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AgentError::Config("YouTube API key is required for video search".into()));
        }
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            max_results,
        })
    }
}

#[async_trait]
impl VideoSearch for YouTubeClient {
    async fn search(&self, query: &str) -> AgentResult<Vec<VideoResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AgentError::InvalidInput("video search query is empty".into()));
        }
        let q = format!("{} tutorial", query);
        let max_results = self.max_results.to_string();
        info!("YouTube search q={:?} max_results={}", q, max_results);

        let request = self.http
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("q", q.as_str()),
                ("key", self.api_key.as_str()),
            ]);
        let resp: SearchResponse = send_json(PROVIDER, request).await?;

        Ok(resp.items.into_iter().filter_map(SearchItem::into_result).collect())
    }
}
