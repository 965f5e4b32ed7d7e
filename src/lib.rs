pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod quiz;
pub mod roadmap;
pub mod server;
pub mod video;

use agent::StudyAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("WebSocket Address: {}", args.server_addr);
    info!("HTTP Port: {}", args.http_port);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Roadmap LLM Type: {}", args.roadmap_llm_type.as_deref().unwrap_or(&args.chat_llm_type));
    info!("Quiz LLM Type: {}", args.quiz_llm_type.as_deref().unwrap_or(&args.chat_llm_type));
    info!("History Store Type: {}", args.history_type);
    info!("Context Messages: {}", args.context_messages);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Video Search Enabled: {}", !args.youtube_api_key.trim().is_empty());
    info!("API Key Required: {}", args.server_api_key.as_deref().map_or(false, |k| !k.is_empty()));
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    server::install_crypto_provider();
    let agent = Arc::new(StudyAgent::new(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
