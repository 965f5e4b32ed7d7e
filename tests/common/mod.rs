#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{ Arc, Mutex };

use youniq_agent::agent::{ AgentComponents, StudyAgent };
use youniq_agent::config::prompt::PromptConfig;
use youniq_agent::error::{ AgentError, AgentResult };
use youniq_agent::history::{ BlobStore, MemoryBackend };
use youniq_agent::llm::{ GenerationOptions, LlmType };
use youniq_agent::llm::chat::{ ChatClient, CompletionResponse, TextStream };

pub enum Scripted {
    Reply(&'static str),
    Chunks(Vec<&'static str>),
    Fail,
}

/// Chat client that replays scripted replies and records every prompt.
#[derive(Default)]
pub struct FakeChat {
    script: Mutex<VecDeque<Scripted>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeChat {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> String {
        self.prompts().last().cloned().unwrap_or_default()
    }

    fn next(&self, prompt: &str) -> Option<Scripted> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.script.lock().unwrap().pop_front()
    }
}

fn failure() -> AgentError {
    AgentError::ProviderStatus { provider: "fake", status: 500, body: "boom".into() }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn complete(
        &self,
        prompt: &str,
        _options: &GenerationOptions
    ) -> AgentResult<CompletionResponse> {
        match self.next(prompt) {
            Some(Scripted::Reply(text)) => Ok(CompletionResponse { response: text.to_string() }),
            Some(Scripted::Chunks(parts)) => Ok(CompletionResponse { response: parts.concat() }),
            Some(Scripted::Fail) | None => Err(failure()),
        }
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        _options: &GenerationOptions
    ) -> AgentResult<TextStream> {
        let items: Vec<AgentResult<String>> = match self.next(prompt) {
            Some(Scripted::Reply(text)) => vec![Ok(text.to_string())],
            Some(Scripted::Chunks(parts)) => parts.into_iter().map(|p| Ok(p.to_string())).collect(),
            Some(Scripted::Fail) | None => return Err(failure()),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn provider(&self) -> LlmType {
        LlmType::Gemini
    }

    fn get_model(&self) -> String {
        "fake".to_string()
    }
}

pub fn agent_with(chat: Arc<FakeChat>, context_messages: usize) -> StudyAgent {
    StudyAgent::from_components(AgentComponents {
        chat_client: chat.clone(),
        roadmap_client: chat.clone(),
        quiz_client: chat,
        video_search: None,
        store: Arc::new(BlobStore::new(MemoryBackend::default())),
        prompts: Arc::new(PromptConfig::default()),
        prompts_path: None,
        context_messages,
    })
}
