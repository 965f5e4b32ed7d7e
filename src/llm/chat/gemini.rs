use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use log::info;

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

const PROVIDER: &str = "gemini";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        Some(text)
    }
}

fn parse_gemini_line(line: &str) -> Option<String> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    serde_json::from_str::<GenerateContentResponse>(data)
        .ok()
        .and_then(GenerateContentResponse::text)
        .filter(|t| !t.is_empty())
}

pub struct GeminiChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    defaults: GenerationOptions,
}

impl GeminiChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        defaults: GenerationOptions
    ) -> AgentResult<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            api_key,
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
            .ok_or_else(|| AgentError::Config("Google API key is required for GeminiChatClient".into()))?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone(), config.defaults)
    }

    fn build_request(&self, prompt: &str, options: &GenerationOptions) -> GenerateContentRequest {
        let options = merge_options(&self.defaults, options);
        let generation_config = if options.max_tokens.is_some() || options.temperature.is_some() {
            Some(GenerationConfig {
                max_output_tokens: options.max_tokens,
                temperature: options.temperature,
            })
        } else {
            None
        };

        GenerateContentRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions
    ) -> AgentResult<CompletionResponse> {
        info!("GeminiChatClient::complete() → model={} base_url={}", self.model, self.base_url);

        let payload = self.build_request(prompt, options);
        let request = self.http
            .post(self.endpoint("generateContent"))
            .query(&[("key", self.api_key.as_str())])
            .json(&payload);
        let resp: GenerateContentResponse = send_json(PROVIDER, request).await?;
        require_text(PROVIDER, resp.text())
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions
    ) -> AgentResult<TextStream> {
        info!("GeminiChatClient::complete_stream() → model={} base_url={}", self.model, self.base_url);

        let payload = self.build_request(prompt, options);
        let url = format!("{}?alt=sse&key={}", self.endpoint("streamGenerateContent"), self.api_key);
        let headers = vec![("Content-Type".to_string(), "application/json".to_string())];

        http_stream_generate(
            PROVIDER,
            self.http.clone(),
            url,
            payload,
            parse_gemini_line,
            Some(headers)
        ).await
    }

    fn provider(&self) -> LlmType {
        LlmType::Gemini
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
    fn sse_line_yields_candidate_text() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"Keep "},{"text":"going"}],"role":"model"}}]}"#;
        assert_eq!(parse_gemini_line(line), Some("Keep going".to_string()));
    }

    #[test]
    fn non_data_lines_are_skipped() {
        assert_eq!(parse_gemini_line(""), None);
        assert_eq!(parse_gemini_line(": keep-alive"), None);
        assert_eq!(parse_gemini_line(r#"data: {"candidates":[]}"#), None);
    }

    #[test]
    fn request_carries_generation_config_only_when_set() {
        let client = GeminiChatClient::new("k".into(), None, None, GenerationOptions::default()).unwrap();
        let bare = serde_json::to_value(client.build_request("hi", &GenerationOptions::default())).unwrap();
        assert!(bare.get("generationConfig").is_none());
        assert_eq!(bare["contents"][0]["parts"][0]["text"], "hi");

        let tuned = serde_json::to_value(client.build_request("hi", &GenerationOptions::new(300, 0.6))).unwrap();
        assert_eq!(tuned["generationConfig"]["maxOutputTokens"], 300);
    }
}
