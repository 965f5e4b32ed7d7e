pub mod gemini;
pub mod cohere;
pub mod groq;

use async_trait::async_trait;
use futures::{ Future, Stream, StreamExt };
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::sync::Arc;
use super::{ GenerationOptions, LlmConfig, LlmType };
use self::gemini::GeminiChatClient;
use self::cohere::CohereChatClient;
use self::groq::GroqChatClient;
use crate::error::{ AgentError, AgentResult };
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use log::debug;

pub type TextStream = Pin<Box<dyn Stream<Item = AgentResult<String>> + Send>>;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &GenerationOptions
    ) -> AgentResult<CompletionResponse>;

    /// Providers without a streaming endpoint yield the whole reply as one chunk.
    async fn complete_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions
    ) -> AgentResult<TextStream> {
        let resp = self.complete(prompt, options).await?;
        Ok(single_chunk_stream(resp.response))
    }

    fn provider(&self) -> LlmType;
    fn get_model(&self) -> String;
    fn supports_native_streaming(&self) -> bool {
        false
    }
}

pub fn single_chunk_stream(text: String) -> TextStream {
    Box::pin(futures::stream::once(async move { Ok(text) }))
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> TextStream
where
    F: FnOnce(mpsc::Sender<AgentResult<String>>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> AgentResult<Arc<dyn ChatClient>> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Gemini => {
            let specific_client = GeminiChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Cohere => {
            let specific_client = CohereChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Groq => {
            let specific_client = GroqChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Overlay per-call options on the client defaults.
pub(crate) fn merge_options(
    defaults: &GenerationOptions,
    options: &GenerationOptions
) -> GenerationOptions {
    GenerationOptions {
        max_tokens: options.max_tokens.or(defaults.max_tokens),
        temperature: options.temperature.or(defaults.temperature),
    }
}

pub(crate) fn require_text(
    provider: &'static str,
    text: Option<String>
) -> AgentResult<CompletionResponse> {
    match text.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => Ok(CompletionResponse { response: t }),
        _ => Err(AgentError::EmptyResponse { provider }),
    }
}

pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &'static str,
    request: reqwest::RequestBuilder
) -> AgentResult<T> {
    let resp = request.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AgentError::ProviderStatus {
            provider,
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Reassembles response lines from raw network chunks. Bytes are only decoded
/// once a full line is buffered, so a character split across chunks survives.
#[derive(Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Adds `bytes` and returns every line completed by them.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// The unterminated tail left when the stream ends.
    pub(crate) fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}

/// POSTs `payload` and feeds every complete response line through `line_parser`.
/// Lines split across network chunks are reassembled before parsing.
pub async fn http_stream_generate(
    provider: &'static str,
    client: reqwest::Client,
    url: String,
    payload: impl serde::Serialize + Send + 'static,
    line_parser: fn(&str) -> Option<String>,
    headers: Option<Vec<(String, String)>>,
) -> AgentResult<TextStream> {
    let mut req = client.post(&url).json(&payload);
    if let Some(header_list) = headers {
        for (name, value) in header_list {
            req = req.header(name, value);
        }
    }

    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AgentError::ProviderStatus {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    Ok(create_streaming_response(move |tx| async move {
        let mut bytes = resp.bytes_stream();
        let mut lines = LineBuffer::default();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    for line in lines.push(&buf) {
                        if let Some(tok) = line_parser(&line) {
                            if tx.send(Ok(tok)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(AgentError::Http(e))).await;
                    return;
                }
            }
        }
        if let Some(tok) = lines.finish().and_then(|tail| line_parser(&tail)) {
            let _ = tx.send(Ok(tok)).await;
        }
        debug!("{} stream finished", provider);
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_call_options_win_over_defaults() {
        let defaults = GenerationOptions::new(1024, 0.0);
        let merged = merge_options(&defaults, &GenerationOptions {
            max_tokens: Some(300),
            temperature: None,
        });
        assert_eq!(merged.max_tokens, Some(300));
        assert_eq!(merged.temperature, Some(0.0));
    }

    #[test]
    fn blank_text_is_an_empty_response() {
        assert!(matches!(
            require_text("cohere", Some("  \n".into())),
            Err(AgentError::EmptyResponse { provider: "cohere" })
        ));
        assert!(require_text("cohere", None).is_err());
        assert_eq!(require_text("cohere", Some(" hi ".into())).unwrap().response, "hi");
    }

    #[test]
    fn split_multibyte_character_is_reassembled() {
        let line = "data: {\"text\":\"café 🚀\"}\n".as_bytes();
        // Cut inside the four-byte emoji.
        let cut = line.len() - 5;
        let mut lines = LineBuffer::default();
        assert!(lines.push(&line[..cut]).is_empty());
        assert_eq!(lines.push(&line[cut..]), vec!["data: {\"text\":\"café 🚀\"}\n".to_string()]);
        assert!(lines.finish().is_none());
    }

    #[test]
    fn unterminated_tail_is_returned_at_end() {
        let mut lines = LineBuffer::default();
        assert_eq!(lines.push(b"one\ntwo\nthr"), vec!["one\n".to_string(), "two\n".to_string()]);
        assert_eq!(lines.finish().as_deref(), Some("thr"));
    }

    #[tokio::test]
    async fn single_chunk_stream_yields_once() {
        let chunks: Vec<_> = single_chunk_stream("whole".into()).collect().await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), "whole");
    }
}
