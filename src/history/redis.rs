use async_trait::async_trait;
use redis::{ Client, AsyncCommands };

use super::{ BlobBackend, STORAGE_KEY };
use crate::error::AgentResult;

pub struct RedisBackend {
    client: Client,
    key: String,
}

impl RedisBackend {
    pub fn new(host: &str, key_prefix: &str) -> AgentResult<Self> {
        Ok(Self {
            client: Client::open(host)?,
            key: format!("{}{}", key_prefix, STORAGE_KEY),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }
}

#[async_trait]
impl BlobBackend for RedisBackend {
    async fn load(&self) -> AgentResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        let blob: Option<String> = conn.get(&self.key).await?;
        Ok(blob)
    }

    async fn save(&self, blob: String) -> AgentResult<()> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.set(&self.key, blob).await?;
        Ok(())
    }
}
