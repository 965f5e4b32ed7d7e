pub mod api;
pub mod websocket;

use crate::agent::StudyAgent;
use crate::cli::Args;
use log::debug;
use std::error::Error;
use std::sync::Arc;

/// Makes ring the process-wide rustls provider. `axum-server` compiles in
/// aws-lc-rs as well, and rustls panics when two providers are present and
/// none is installed.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }
}

pub struct Server {
    addr: String,
    agent: Arc<StudyAgent>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<StudyAgent>, args: Args) -> Self {
        Self { addr, agent, args }
    }

    /// Starts the HTTP API in the background, then serves WebSocket chat until
    /// the listener fails.
    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.start_http_server(self.args.http_port).await?;

        self.start_ws_server().await?;

        Ok(())
    }

    async fn start_http_server(&self, http_port: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(http_port, self.agent.clone(), self.args.clone()).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(
            &self.addr,
            self.agent.clone(),
            self.args.server_api_key.clone(),
            self.args.clone()
        ).await
    }
}
