use async_trait::async_trait;
use tokio::sync::RwLock;

use super::BlobBackend;
use crate::error::AgentResult;

/// Process-local blob. Gone on restart.
#[derive(Default)]
pub struct MemoryBackend {
    blob: RwLock<Option<String>>,
}

#[async_trait]
impl BlobBackend for MemoryBackend {
    async fn load(&self) -> AgentResult<Option<String>> {
        Ok(self.blob.read().await.clone())
    }

    async fn save(&self, blob: String) -> AgentResult<()> {
        *self.blob.write().await = Some(blob);
        Ok(())
    }
}
