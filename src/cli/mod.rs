use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (gemini, cohere, groq)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "gemini")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API. Adapters use their public endpoint when unset.
    #[arg(long, env = "CHAT_BASE_URL")]
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gemini-2.5-flash, command-r-plus)
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    // --- Roadmap LLM Provider Args (Optional) ---
    /// Type of LLM provider for roadmap outlines. Defaults to CHAT_LLM_TYPE if not set.
    #[arg(long, env = "ROADMAP_LLM_TYPE")]
    pub roadmap_llm_type: Option<String>,

    /// Base URL for the roadmap provider. Defaults to CHAT_BASE_URL if not set.
    #[arg(long, env = "ROADMAP_BASE_URL")]
    pub roadmap_base_url: Option<String>,

    /// API Key for the roadmap provider. Defaults to CHAT_API_KEY if not set.
    #[arg(long, env = "ROADMAP_API_KEY")]
    pub roadmap_api_key: Option<String>,

    /// Model name for roadmap outlines. Defaults to CHAT_MODEL if not set.
    #[arg(long, env = "ROADMAP_MODEL")]
    pub roadmap_model: Option<String>,

    // --- Quiz / Career LLM Provider Args (Optional) ---
    /// Type of LLM provider for quizzes and career guidance. Defaults to CHAT_LLM_TYPE if not set.
    #[arg(long, env = "QUIZ_LLM_TYPE")]
    pub quiz_llm_type: Option<String>,

    /// Base URL for the quiz provider. Defaults to CHAT_BASE_URL if not set.
    #[arg(long, env = "QUIZ_BASE_URL")]
    pub quiz_base_url: Option<String>,

    /// API Key for the quiz provider. Defaults to CHAT_API_KEY if not set.
    #[arg(long, env = "QUIZ_API_KEY")]
    pub quiz_api_key: Option<String>,

    /// Model name for quizzes. Defaults to CHAT_MODEL if not set.
    #[arg(long, env = "QUIZ_MODEL")]
    pub quiz_model: Option<String>,

    // --- Video Search Args ---
    /// YouTube Data API key. Video search is disabled when empty.
    #[arg(long, env = "YOUTUBE_API_KEY", default_value = "")]
    pub youtube_api_key: String,

    /// Base URL for the YouTube Data API.
    #[arg(long, env = "YOUTUBE_BASE_URL")]
    pub youtube_base_url: Option<String>,

    /// Number of videos returned per search.
    #[arg(long, env = "YOUTUBE_MAX_RESULTS", default_value = "4")]
    pub youtube_max_results: u32,

    // --- History Store Args ---
    /// Conversation store type (memory, file, redis)
    #[arg(long, env = "HISTORY_TYPE", default_value = "file")]
    pub history_type: String,

    /// Directory holding the conversation file when HISTORY_TYPE=file.
    #[arg(long, env = "HISTORY_PATH", default_value = "data")]
    pub history_path: String,

    /// Redis endpoint when HISTORY_TYPE=redis (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Prefix for the Redis conversation key.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "youniq:")]
    pub history_redis_prefix: String,

    // --- General App Args ---
    /// Number of previous messages rendered into a chat prompt.
    #[arg(long, env = "CONTEXT_MESSAGES", default_value = "5")]
    pub context_messages: usize,

    /// Optional path to a persona/template JSON file. Built-in prompts are used when unset.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP API, served alongside the WebSocket listener.
    #[arg(long, env = "HTTP_PORT", default_value = "4001")]
    pub http_port: u16,

    /// Optional API Key required on HTTP requests and WebSocket connections.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    /// Parses only the given flags, ignoring the environment's argv.
    pub fn from_flags<I, T>(flags: I) -> Self
        where I: IntoIterator<Item = T>, T: Into<std::ffi::OsString> + Clone
    {
        let mut argv: Vec<std::ffi::OsString> = vec!["youniq-agent".into()];
        argv.extend(flags.into_iter().map(Into::into));
        Args::parse_from(argv)
    }
}
