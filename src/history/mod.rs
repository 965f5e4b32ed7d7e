mod blob;
mod file;
mod memory;
mod redis;

pub use blob::{ BlobBackend, BlobStore };
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use self::redis::RedisBackend;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use crate::cli::Args;
use crate::error::{ AgentError, AgentResult };
use crate::models::chat::{ Conversation, Message };

/// Fixed name the whole conversation list is stored under.
pub const STORAGE_KEY: &str = "chatConversations";

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// All conversations, newest first.
    async fn list(&self) -> AgentResult<Vec<Conversation>>;

    async fn get(&self, conversation_id: &str) -> AgentResult<Conversation>;

    async fn create(&self, conversation: Conversation) -> AgentResult<()>;

    /// The only way an existing conversation changes: one more message at the end.
    async fn append_message(
        &self,
        conversation_id: &str,
        message: Message
    ) -> AgentResult<Conversation>;

    async fn delete(&self, conversation_id: &str) -> AgentResult<()>;
}

pub fn create_conversation_store(args: &Args) -> AgentResult<Arc<dyn ConversationStore>> {
    match args.history_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(BlobStore::new(MemoryBackend::default()))),
        "file" => {
            let backend = FileBackend::new(&args.history_path)?;
            Ok(Arc::new(BlobStore::new(backend)))
        }
        "redis" => {
            let backend = RedisBackend::new(&args.history_host, &args.history_redis_prefix)?;
            Ok(Arc::new(BlobStore::new(backend)))
        }
        other => Err(AgentError::Config(format!("Unsupported history store type: {}", other))),
    }
}

pub fn initialize_conversation_store(args: &Args) -> AgentResult<Arc<dyn ConversationStore>> {
    let location = match args.history_type.to_lowercase().as_str() {
        "file" => args.history_path.clone(),
        "redis" => args.history_host.clone(),
        _ => "process memory".to_string(),
    };
    info!("Conversations will be stored in: {} at {}", args.history_type, location);
    create_conversation_store(args)
}

pub fn serialize_conversations(conversations: &[Conversation]) -> AgentResult<String> {
    Ok(serde_json::to_string(conversations)?)
}

pub fn deserialize_conversations(blob: &str) -> AgentResult<Vec<Conversation>> {
    if blob.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(blob)?)
}

/// Renders messages as `Speaker: text` lines for a prompt.
pub fn format_history_for_prompt(messages: &[Message], bot_label: &str) -> String {
    let mut result = String::new();
    for msg in messages {
        let role_display = if msg.is_user { "User" } else { bot_label };
        result.push_str(&format!("{}: {}\n", role_display, msg.text));
    }
    result
}
