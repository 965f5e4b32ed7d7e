use async_trait::async_trait;
use reqwest::header::{ HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE };
use serde::{ Deserialize, Serialize };
use log::info;

use super::{ ChatClient, CompletionResponse, merge_options, require_text, send_json };
use crate::error::{ AgentError, AgentResult };
use crate::llm::{ GenerationOptions, LlmConfig, LlmType };

const PROVIDER: &str = "cohere";
pub const DEFAULT_BASE_URL: &str = "https://api.cohere.ai";
pub const DEFAULT_MODEL: &str = "command-r-plus";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    generations: Vec<Generation>,
}

#[derive(Deserialize)]
struct Generation {
    text: String,
}

/// Client for Cohere's legacy `/v1/generate` completion endpoint.
pub struct CohereChatClient {
    http: reqwest::Client,
    model: String,
    base_url: String,
    defaults: GenerationOptions,
}

impl CohereChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        defaults: GenerationOptions
    ) -> AgentResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| AgentError::Config(format!("Invalid API key format: {}", e)))?
        );

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            defaults,
        })
    }

    pub fn from_config(config: &LlmConfig) -> AgentResult<Self> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| AgentError::Config("Cohere API key is required".into()))?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone(), config.defaults)
    }
}

#[async_trait]
impl ChatClient for CohereChatClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions
    ) -> AgentResult<CompletionResponse> {
        info!("CohereChatClient::complete() → model={} base_url={}", self.model, self.base_url);

        let options = merge_options(&self.defaults, options);
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };
        let url = format!("{}/v1/generate", self.base_url);
        let resp: GenerateResponse = send_json(PROVIDER, self.http.post(url).json(&payload)).await?;

        require_text(PROVIDER, resp.generations.into_iter().next().map(|g| g.text))
    }

    fn provider(&self) -> LlmType {
        LlmType::Cohere
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
