use crate::agent::StudyAgent;
use crate::cli::Args;
use crate::models::websocket::{ ClientMessage, ServerMessage };

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ ErrorResponse, Request, Response };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;

use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };

use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use lazy_static::lazy_static;

use futures::{ Sink, SinkExt, StreamExt };
use log::{ debug, error, info, warn };
use url::form_urlencoded;

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
const CONNECTIONS_PER_SECOND: u32 = 10;
const API_KEY_HEADER: &str = "x-api-key";
const API_KEY_PARAM: &str = "api_key";

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(
            Quota::per_second(NonZeroU32::new(CONNECTIONS_PER_SECOND).unwrap_or(NonZeroU32::MIN))
        );
}

fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let key = match pkcs8_private_keys(&mut key_reader).next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

/// True when the handshake carries the expected key, either as an
/// `X-API-Key` header or an `api_key` query parameter.
pub fn handshake_authorized(req: &Request, expected: Option<&str>) -> bool {
    let expected = match expected {
        Some(k) if !k.is_empty() => k,
        _ => return true,
    };

    if let Some(value) = req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return value == expected;
    }

    let qs = req.uri().query().unwrap_or("");
    let params: HashMap<String, String> = form_urlencoded
        ::parse(qs.as_bytes())
        .into_owned()
        .collect();
    params.get(API_KEY_PARAM).map(|k| k == expected).unwrap_or(false)
}

fn unauthorized() -> ErrorResponse {
    let mut res = ErrorResponse::new(Some("invalid or missing api key".into()));
    *res.status_mut() = StatusCode::UNAUTHORIZED;
    res
}

pub async fn start_ws_server(
    addr: &str,
    agent: Arc<StudyAgent>,
    api_key: Option<String>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        None
    };
    let protocol = if tls_acceptor.is_some() { "WSS" } else { "WS" };
    info!("{} server listening on: {}", protocol, addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let agent_clone = Arc::clone(&agent);
        let required_api_key = api_key.clone();
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        process_connection(peer, tls_stream, agent_clone, required_api_key).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, agent_clone, required_api_key).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    agent: Arc<StudyAgent>,
    required_api_key: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if handshake_authorized(req, required_api_key.as_deref()) {
            Ok(response)
        } else {
            warn!("Rejected WebSocket handshake from {}: bad api key", peer);
            Err(unauthorized())
        }
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, agent).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

async fn send_frame<W>(tx: &mut W, frame: &ServerMessage) -> Result<(), String>
    where W: Sink<Message> + Unpin, W::Error: Display
{
    tx.send(Message::Text(frame.to_json())).await.map_err(|e| e.to_string())
}

/// Forwards a chunk unless an earlier send already failed. The first failure
/// is kept so the turn can still run to completion.
async fn forward_chunk<W>(tx: &mut W, chunk: String, send_error: &mut Option<String>)
    where W: Sink<Message> + Unpin, W::Error: Display
{
    if send_error.is_some() {
        return;
    }
    if let Err(e) = send_frame(tx, &ServerMessage::Chunk { content: chunk }).await {
        warn!("Client stopped receiving chunks: {}", e);
        *send_error = Some(e);
    }
}

/// Runs one chat turn, forwarding reply chunks as `chunk` frames while the
/// agent is still working, then the final `response` or `error` frame.
/// The turn always finishes and is stored, even if the client goes away.
async fn handle_chat<W>(
    tx: &mut W,
    agent: &StudyAgent,
    conversation_id: &str,
    content: &str
) -> Result<(), String>
    where W: Sink<Message> + Unpin, W::Error: Display
{
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(32);
    let turn = agent.stream_message(conversation_id, content, chunk_tx);
    tokio::pin!(turn);

    let mut send_error = None;
    let result = loop {
        tokio::select! {
            Some(chunk) = chunk_rx.recv() => {
                forward_chunk(tx, chunk, &mut send_error).await;
            }
            res = &mut turn => break res,
        }
    };
    while let Ok(chunk) = chunk_rx.try_recv() {
        forward_chunk(tx, chunk, &mut send_error).await;
    }
    if let Some(e) = send_error {
        return Err(e);
    }

    let frame = match result {
        Ok(reply) => {
            if reply.failed {
                warn!("Conversation {} answered with apology", conversation_id);
            }
            ServerMessage::Response {
                content: reply.reply.text,
                conversation_id: conversation_id.to_string(),
                timestamp: reply.reply.timestamp.timestamp_millis(),
            }
        }
        Err(e) => {
            error!("Chat turn for {} failed: {}", conversation_id, e);
            ServerMessage::error(e.to_string())
        }
    };
    send_frame(tx, &frame).await
}

/// Picks the conversation a chat frame belongs to, opening a new one when the
/// client has none yet.
async fn resolve_conversation<W>(
    tx: &mut W,
    agent: &StudyAgent,
    requested: Option<String>,
    current: &mut Option<String>,
    persona: Option<&str>
) -> Result<Option<String>, String>
    where W: Sink<Message> + Unpin, W::Error: Display
{
    if let Some(id) = requested.or_else(|| current.clone()) {
        *current = Some(id.clone());
        return Ok(Some(id));
    }
    match agent.create_conversation(persona).await {
        Ok(conversation) => {
            let id = conversation.id.clone();
            send_frame(tx, &ServerMessage::ConversationCreated { conversation }).await?;
            *current = Some(id.clone());
            Ok(Some(id))
        }
        Err(e) => {
            send_frame(tx, &ServerMessage::error(e.to_string())).await?;
            Ok(None)
        }
    }
}

pub async fn handle_connection<S>(peer: SocketAddr, websocket: WebSocketStream<S>, agent: Arc<StudyAgent>)
    where S: AsyncRead + AsyncWrite + Unpin
{
    info!("New WebSocket connection: {}", peer);

    let (mut tx, mut rx) = websocket.split();
    let mut current_conversation: Option<String> = None;

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                peer,
                message.len(),
                MAX_MESSAGE_SIZE
            );
            let _ = send_frame(&mut tx, &ServerMessage::error("Message too large")).await;
            break;
        }

        let outcome = match message {
            Message::Text(text) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Chat { content, conversation_id, persona }) => {
                        debug!("Chat frame from {} ({} bytes)", peer, content.len());
                        match send_frame(&mut tx, &ServerMessage::Processing).await {
                            Err(e) => Err(e),
                            Ok(()) => {
                                match
                                    resolve_conversation(
                                        &mut tx,
                                        &agent,
                                        conversation_id,
                                        &mut current_conversation,
                                        persona.as_deref()
                                    ).await
                                {
                                    Ok(Some(id)) => handle_chat(&mut tx, &agent, &id, &content).await,
                                    Ok(None) => Ok(()),
                                    Err(e) => Err(e),
                                }
                            }
                        }
                    }
                    Ok(ClientMessage::NewConversation { persona }) => {
                        match agent.create_conversation(persona.as_deref()).await {
                            Ok(conversation) => {
                                current_conversation = Some(conversation.id.clone());
                                send_frame(&mut tx, &ServerMessage::ConversationCreated {
                                    conversation,
                                }).await
                            }
                            Err(e) => send_frame(&mut tx, &ServerMessage::error(e.to_string())).await,
                        }
                    }
                    Err(e) => {
                        error!("Failed to parse message from {}: {}", peer, e);
                        let frame = ServerMessage::error(format!("Failed to parse message: {}", e));
                        send_frame(&mut tx, &frame).await
                    }
                }
            }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(ping_data) => {
                tx.send(Message::Pong(ping_data)).await.map_err(|e| e.to_string())
            }
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
                Ok(())
            }
            Message::Pong(_) | Message::Frame(_) => Ok(()),
        };

        if let Err(e) = outcome {
            error!("Failed to send to {}: {}", peer, e);
            break;
        }
    }
    info!(
        "WebSocket connection closed for {} (Conv ID: {})",
        peer,
        current_conversation.as_deref().unwrap_or("none")
    );
}
