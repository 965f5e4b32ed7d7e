use async_trait::async_trait;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{
    ChatClient,
    CompletionResponse,
    TextStream,
    http_stream_generate,
    merge_options,
    require_text,
    send_json,
};
use crate::error::{ AgentError, AgentResult };
use crate::llm::{ GenerationOptions, LlmConfig, LlmType };

const PROVIDER: &str = "groq";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com";
pub const DEFAULT_MODEL: &str = "gemma2-9b-it";

pub struct GroqChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    defaults: GenerationOptions,
}

#[derive(Serialize, Deserialize)]
struct GroqMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct GroqRequest {
    messages: Vec<GroqMessage>,
    model: String,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct GroqResponse {
    choices: Vec<GroqChoice>,
}

#[derive(Deserialize)]
struct GroqChoice {
    message: GroqMessage,
}

#[derive(Deserialize)]
struct GroqStreamResponse {
    choices: Vec<GroqStreamChoice>,
}

#[derive(Deserialize)]
struct GroqStreamChoice {
    delta: GroqDelta,
}

#[derive(Deserialize)]
struct GroqDelta {
    content: Option<String>,
}

fn parse_groq_line(line: &str) -> Option<String> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<GroqStreamResponse>(data) {
        Ok(chunk) => {
            let text: String = chunk.choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect();
            Some(text).filter(|t| !t.is_empty())
        }
        Err(e) => {
            debug!("Failed to parse Groq chunk: {}, error: {}", data, e);
            None
        }
    }
}

impl GroqChatClient {
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

        let http = HttpClient::builder().default_headers(headers).build()?;

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
            .ok_or_else(|| AgentError::Config("Groq API key is required".into()))?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone(), config.defaults)
    }

    fn build_request(&self, prompt: &str, options: &GenerationOptions, stream: bool) -> GroqRequest {
        let options = merge_options(&self.defaults, options);
        GroqRequest {
            messages: vec![GroqMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            model: self.model.clone(),
            temperature: options.temperature.unwrap_or(0.0),
            max_tokens: options.max_tokens,
            stream: stream.then_some(true),
        }
    }

    fn url(&self) -> String {
        format!("{}/openai/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatClient for GroqChatClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions
    ) -> AgentResult<CompletionResponse> {
        info!("GroqChatClient::complete() → model={} base_url={}", self.model, self.base_url);

        let req = self.build_request(prompt, options, false);
        let resp: GroqResponse = send_json(PROVIDER, self.http.post(self.url()).json(&req)).await?;

        require_text(PROVIDER, resp.choices.into_iter().next().map(|c| c.message.content))
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions
    ) -> AgentResult<TextStream> {
        info!("Starting Groq stream request to {}", self.url());

        let req = self.build_request(prompt, options, true);
        http_stream_generate(PROVIDER, self.http.clone(), self.url(), req, parse_groq_line, None).await
    }

    fn provider(&self) -> LlmType {
        LlmType::Groq
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn supports_native_streaming(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delta_content_and_skips_done() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(parse_groq_line(line), Some("Hello".to_string()));
        assert_eq!(parse_groq_line("data: [DONE]"), None);
        assert_eq!(parse_groq_line(r#"data: {"choices":[{"delta":{}}]}"#), None);
    }
}
