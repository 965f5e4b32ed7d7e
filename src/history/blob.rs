use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;

use super::{ deserialize_conversations, serialize_conversations, ConversationStore };
use crate::error::{ AgentError, AgentResult };
use crate::models::chat::{ Conversation, Message };

/// Somewhere a single serialized conversation list can live.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    async fn load(&self) -> AgentResult<Option<String>>;
    async fn save(&self, blob: String) -> AgentResult<()>;
}

/// Keeps the whole conversation list as one JSON blob, the way browser
/// storage did. Every mutation is a read-modify-write under one lock.
pub struct BlobStore<B> {
    backend: B,
    lock: Mutex<()>,
}

impl<B: BlobBackend> BlobStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend, lock: Mutex::new(()) }
    }

    async fn read_all(&self) -> AgentResult<Vec<Conversation>> {
        match self.backend.load().await? {
            Some(blob) => deserialize_conversations(&blob),
            None => Ok(Vec::new()),
        }
    }

    async fn write_all(&self, conversations: &[Conversation]) -> AgentResult<()> {
        let blob = serialize_conversations(conversations)?;
        debug!("Persisting {} conversations ({} bytes)", conversations.len(), blob.len());
        self.backend.save(blob).await
    }
}

#[async_trait]
impl<B: BlobBackend> ConversationStore for BlobStore<B> {
    async fn list(&self) -> AgentResult<Vec<Conversation>> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    async fn get(&self, conversation_id: &str) -> AgentResult<Conversation> {
        let _guard = self.lock.lock().await;
        self.read_all().await?
            .into_iter()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| AgentError::ConversationNotFound(conversation_id.to_string()))
    }

    async fn create(&self, conversation: Conversation) -> AgentResult<()> {
        let _guard = self.lock.lock().await;
        let mut all = self.read_all().await?;
        all.retain(|c| c.id != conversation.id);
        all.insert(0, conversation);
        self.write_all(&all).await
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        message: Message
    ) -> AgentResult<Conversation> {
        let _guard = self.lock.lock().await;
        let mut all = self.read_all().await?;
        let conversation = all
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| AgentError::ConversationNotFound(conversation_id.to_string()))?;
        conversation.push(message);
        let updated = conversation.clone();
        self.write_all(&all).await?;
        Ok(updated)
    }

    async fn delete(&self, conversation_id: &str) -> AgentResult<()> {
        let _guard = self.lock.lock().await;
        let mut all = self.read_all().await?;
        let before = all.len();
        all.retain(|c| c.id != conversation_id);
        if all.len() == before {
            return Err(AgentError::ConversationNotFound(conversation_id.to_string()));
        }
        self.write_all(&all).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryBackend;
    use std::sync::Arc;

    fn store() -> BlobStore<MemoryBackend> {
        BlobStore::new(MemoryBackend::default())
    }

    #[tokio::test]
    async fn newest_conversation_is_listed_first() {
        let store = store();
        let first = Conversation::new("coach", "Hi");
        let second = Conversation::new("doubt", "Hello");
        store.create(first.clone()).await.unwrap();
        store.create(second.clone()).await.unwrap();

        let ids: Vec<_> = store.list().await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn append_is_persisted() {
        let store = store();
        let conv = Conversation::new("coach", "Hi");
        store.create(conv.clone()).await.unwrap();

        let updated = store.append_message(&conv.id, Message::user("Tips for better study habits")).await.unwrap();
        assert_eq!(updated.messages.len(), 2);
        assert_eq!(updated.title, "Tips for better study habits...");

        let reloaded = store.get(&conv.id).await.unwrap();
        assert_eq!(reloaded, updated);
    }

    #[tokio::test]
    async fn missing_conversation_is_not_found() {
        let store = store();
        assert!(store.get("nope").await.unwrap_err().is_not_found());
        assert!(store.append_message("nope", Message::user("x")).await.unwrap_err().is_not_found());
        assert!(store.delete("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_removes_only_target() {
        let store = store();
        let keep = Conversation::new("coach", "Hi");
        let gone = Conversation::new("coach", "Hi");
        store.create(keep.clone()).await.unwrap();
        store.create(gone.clone()).await.unwrap();

        store.delete(&gone.id).await.unwrap();
        let remaining = store.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let store = Arc::new(store());
        let conv = Conversation::new("coach", "Hi");
        store.create(conv.clone()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            let id = conv.id.clone();
            handles.push(tokio::spawn(async move {
                store.append_message(&id, Message::user(format!("msg {}", i))).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(store.get(&conv.id).await.unwrap().messages.len(), 21);
    }
}
