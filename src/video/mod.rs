pub mod youtube;

use async_trait::async_trait;
use serde::{ Deserialize, Serialize };

use crate::error::AgentResult;

pub use youtube::YouTubeClient;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoResult {
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub url: String,
}

impl VideoResult {
    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }
}

#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &str) -> AgentResult<Vec<VideoResult>>;
}
