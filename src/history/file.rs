use async_trait::async_trait;
use log::info;
use std::path::{ Path, PathBuf };

use super::{ BlobBackend, STORAGE_KEY };
use crate::error::AgentResult;

/// Stores the conversation list as `<dir>/chatConversations.json`.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl AsRef<Path>) -> AgentResult<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            info!("Created conversation directory {}", dir.display());
        }
        Ok(Self { path: dir.join(format!("{}.json", STORAGE_KEY)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl BlobBackend for FileBackend {
    async fn load(&self) -> AgentResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, blob: String) -> AgentResult<()> {
        // Temp file first, then rename over the list.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, blob).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ BlobStore, ConversationStore };
    use crate::models::chat::{ Conversation, Message };

    #[tokio::test]
    async fn conversations_survive_a_new_store() {
        let dir = tempfile::tempdir().unwrap();
        let conv = Conversation::new("coach", "Hi");

        {
            let store = BlobStore::new(FileBackend::new(dir.path()).unwrap());
            store.create(conv.clone()).await.unwrap();
            store.append_message(&conv.id, Message::user("I'm afraid of failing")).await.unwrap();
        }

        let reopened = BlobStore::new(FileBackend::new(dir.path()).unwrap());
        let loaded = reopened.get(&conv.id).await.unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert!(loaded.messages[1].is_user);
        assert_eq!(loaded.messages[1].text, "I'm afraid of failing");
    }

    #[tokio::test]
    async fn missing_file_means_no_conversations() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("nested")).unwrap();
        assert!(backend.load().await.unwrap().is_none());
        assert!(backend.path().ends_with("chatConversations.json"));
    }
}
