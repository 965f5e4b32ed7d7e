pub mod chat;
pub mod roadmap;
pub mod websocket;
