use crate::cli::Args;
use crate::config::prompt::{ self, get_chat_prompt, Persona, PromptConfig, CAREER_TEMPLATE };
use crate::error::{ AgentError, AgentResult };
use crate::history::{ format_history_for_prompt, initialize_conversation_store, ConversationStore };
use crate::llm::{ GenerationOptions, LlmConfig, LlmType };
use crate::llm::chat::{ new_client as new_chat_client, ChatClient };
use crate::models::chat::{ Conversation, Message };
use crate::models::roadmap::Roadmap;
use crate::quiz::{ self, QuizFeedback, QuizQuestion };
use crate::roadmap::{ self, Expansion, RoadmapRequest };
use crate::video::{ VideoResult, VideoSearch, YouTubeClient };

use futures::StreamExt;
use log::{ debug, error, info, warn };
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{ Arc, RwLock };
use tokio::sync::mpsc;

pub const DOUBT_PERSONA: &str = "doubt";
pub const CAREER_PERSONA: &str = "career";

/// Outcome of one chat turn. `failed` is set when the reply is the persona's
/// apology rather than model output.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub conversation: Conversation,
    pub reply: Message,
    pub failed: bool,
}

/// Everything a `StudyAgent` is built from.
pub struct AgentComponents {
    pub chat_client: Arc<dyn ChatClient>,
    pub roadmap_client: Arc<dyn ChatClient>,
    pub quiz_client: Arc<dyn ChatClient>,
    pub video_search: Option<Arc<dyn VideoSearch>>,
    pub store: Arc<dyn ConversationStore>,
    pub prompts: Arc<PromptConfig>,
    pub prompts_path: Option<PathBuf>,
    pub context_messages: usize,
}

struct PreparedTurn {
    persona: Persona,
    prompt: String,
}

pub struct StudyAgent {
    chat_client: Arc<dyn ChatClient>,
    roadmap_client: Arc<dyn ChatClient>,
    quiz_client: Arc<dyn ChatClient>,
    video_search: Option<Arc<dyn VideoSearch>>,
    store: Arc<dyn ConversationStore>,
    prompt_config: RwLock<Arc<PromptConfig>>,
    prompts_path: Option<PathBuf>,
    context_messages: usize,
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value.to_string()) }
}

fn parse_llm_type(value: &str) -> AgentResult<LlmType> {
    value.parse::<LlmType>().map_err(|e| AgentError::Config(e.to_string()))
}

/// Builds a client for one role, taking anything the role leaves unset from
/// the chat settings.
fn role_client(
    role: &str,
    args: &Args,
    llm_type: Option<&String>,
    base_url: Option<&String>,
    api_key: Option<&String>,
    model: Option<&String>
) -> AgentResult<Arc<dyn ChatClient>> {
    let type_str = match llm_type {
        Some(s) if !s.trim().is_empty() => s.as_str(),
        _ => &args.chat_llm_type,
    };
    let config = LlmConfig {
        llm_type: parse_llm_type(type_str)?,
        base_url: base_url.cloned().or_else(|| args.chat_base_url.clone()),
        api_key: non_empty(api_key.map(String::as_str).unwrap_or(&args.chat_api_key)),
        completion_model: model.cloned().or_else(|| args.chat_model.clone()),
        ..LlmConfig::default()
    };
    let client = new_chat_client(&config)?;
    info!(
        "{} client configured: Type={}, Model={}, BaseURL={}",
        role,
        type_str,
        client.get_model(),
        config.base_url.as_deref().unwrap_or("adapter default")
    );
    Ok(client)
}

impl StudyAgent {
    fn initialize_llm_clients(
        args: &Args
    ) -> AgentResult<(Arc<dyn ChatClient>, Arc<dyn ChatClient>, Arc<dyn ChatClient>)> {
        let chat_client = role_client("Chat", args, None, None, None, None)?;
        let roadmap_client = role_client(
            "Roadmap",
            args,
            args.roadmap_llm_type.as_ref(),
            args.roadmap_base_url.as_ref(),
            args.roadmap_api_key.as_ref(),
            args.roadmap_model.as_ref()
        )?;
        let quiz_client = role_client(
            "Quiz",
            args,
            args.quiz_llm_type.as_ref(),
            args.quiz_base_url.as_ref(),
            args.quiz_api_key.as_ref(),
            args.quiz_model.as_ref()
        )?;
        Ok((chat_client, roadmap_client, quiz_client))
    }

    fn initialize_video_search(args: &Args) -> AgentResult<Option<Arc<dyn VideoSearch>>> {
        if args.youtube_api_key.trim().is_empty() {
            warn!("YOUTUBE_API_KEY not set, video search is disabled");
            return Ok(None);
        }
        let client = YouTubeClient::new(
            args.youtube_api_key.clone(),
            args.youtube_base_url.clone(),
            args.youtube_max_results
        )?;
        Ok(Some(Arc::new(client)))
    }

    fn load_prompt_config(args: &Args) -> AgentResult<(Arc<PromptConfig>, Option<PathBuf>)> {
        match &args.prompts_path {
            Some(path) if !path.trim().is_empty() => {
                let config = prompt::load_prompts(path)?;
                Ok((config, Some(PathBuf::from(path))))
            }
            _ => {
                info!("No prompts file configured, using built-in personas");
                Ok((Arc::new(PromptConfig::default()), None))
            }
        }
    }

    pub fn new(args: &Args) -> AgentResult<Self> {
        let (chat_client, roadmap_client, quiz_client) = Self::initialize_llm_clients(args)?;
        let video_search = Self::initialize_video_search(args)?;
        let store = initialize_conversation_store(args)?;
        let (prompts, prompts_path) = Self::load_prompt_config(args)?;

        Ok(Self::from_components(AgentComponents {
            chat_client,
            roadmap_client,
            quiz_client,
            video_search,
            store,
            prompts,
            prompts_path,
            context_messages: args.context_messages,
        }))
    }

    pub fn from_components(components: AgentComponents) -> Self {
        Self {
            chat_client: components.chat_client,
            roadmap_client: components.roadmap_client,
            quiz_client: components.quiz_client,
            video_search: components.video_search,
            store: components.store,
            prompt_config: RwLock::new(components.prompts),
            prompts_path: components.prompts_path,
            context_messages: components.context_messages,
        }
    }

    pub fn prompts(&self) -> Arc<PromptConfig> {
        let guard = self.prompt_config.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    /// Persona for a conversation; falls back to the default persona when the
    /// stored key no longer exists after a prompt reload.
    fn persona_for(&self, key: Option<&str>) -> AgentResult<Persona> {
        let prompts = self.prompts();
        let persona = match prompts.persona(key) {
            Ok(p) => p,
            Err(e) => {
                warn!("{}, using default persona", e);
                prompts.persona(None)?
            }
        };
        Ok(persona.clone())
    }

    // --- Conversations ---

    pub async fn create_conversation(&self, persona: Option<&str>) -> AgentResult<Conversation> {
        let prompts = self.prompts();
        let key = persona.unwrap_or(prompts.default_persona.as_str()).to_string();
        let greeting = prompts.persona(Some(&key))?.greeting.clone();

        let conversation = Conversation::new(&key, &greeting);
        self.store.create(conversation.clone()).await?;
        info!("Created conversation {} with persona '{}'", conversation.id, key);
        Ok(conversation)
    }

    pub async fn list_conversations(&self) -> AgentResult<Vec<Conversation>> {
        self.store.list().await
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> AgentResult<Conversation> {
        self.store.get(conversation_id).await
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> AgentResult<()> {
        self.store.delete(conversation_id).await?;
        info!("Deleted conversation {}", conversation_id);
        Ok(())
    }

    /// Appends the user message and builds the prompt from the last N messages,
    /// the new one included.
    async fn prepare_turn(&self, conversation_id: &str, text: &str) -> AgentResult<PreparedTurn> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentError::InvalidInput("Message text is empty".into()));
        }

        if let Err(e) = self.reload_prompts_if_changed() {
            warn!("Keeping current prompts, reload failed: {}", e);
        }

        let mut conversation = self.store.get(conversation_id).await?;
        let persona = self.persona_for(conversation.persona.as_deref())?;
        let user_message = Message::user(text);
        conversation.push(user_message.clone());
        let context = format_history_for_prompt(
            conversation.recent(self.context_messages),
            &persona.bot_label
        );
        let prompt = get_chat_prompt(&persona, &context, text);

        self.store.append_message(conversation_id, user_message).await?;
        debug!("Chat prompt for {}:\n{}", conversation_id, prompt);
        Ok(PreparedTurn { persona, prompt })
    }

    async fn finish_turn(
        &self,
        conversation_id: &str,
        persona: &Persona,
        outcome: AgentResult<String>
    ) -> AgentResult<ChatReply> {
        let (reply, failed) = match outcome {
            Ok(text) => (Message::bot(text), false),
            Err(e) => {
                error!("Chat reply for {} failed: {}", conversation_id, e);
                (Message::bot(persona.apology.clone()), true)
            }
        };
        let conversation = self.store.append_message(conversation_id, reply.clone()).await?;
        Ok(ChatReply { conversation, reply, failed })
    }

    /// One chat turn: user message in, model reply (or apology) appended.
    pub async fn process_message(&self, conversation_id: &str, text: &str) -> AgentResult<ChatReply> {
        let turn = self.prepare_turn(conversation_id, text).await?;
        let outcome = self.chat_client
            .complete(&turn.prompt, &turn.persona.generation_options()).await
            .map(|r| r.response);
        self.finish_turn(conversation_id, &turn.persona, outcome).await
    }

    /// Like `process_message`, but forwards reply chunks to `chunks` as they
    /// arrive. A failure part way through still ends in the apology.
    pub async fn stream_message(
        &self,
        conversation_id: &str,
        text: &str,
        chunks: mpsc::Sender<String>
    ) -> AgentResult<ChatReply> {
        let turn = self.prepare_turn(conversation_id, text).await?;
        let options = turn.persona.generation_options();

        let outcome = self.collect_stream(conversation_id, &turn.prompt, &options, &chunks).await;

        self.finish_turn(conversation_id, &turn.persona, outcome).await
    }

    async fn collect_stream(
        &self,
        conversation_id: &str,
        prompt: &str,
        options: &GenerationOptions,
        chunks: &mpsc::Sender<String>
    ) -> AgentResult<String> {
        let mut stream = self.chat_client.complete_stream(prompt, options).await?;
        let mut full = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            full.push_str(&chunk);
            if chunks.send(chunk).await.is_err() {
                debug!("Chunk receiver for {} went away", conversation_id);
            }
        }
        let full = full.trim().to_string();
        if full.is_empty() {
            return Err(AgentError::EmptyResponse {
                provider: self.chat_client.provider().as_str(),
            });
        }
        Ok(full)
    }

    /// Stateless doubt clarification over a caller-held history. Returns the
    /// history with the question and the answer (or apology) appended.
    pub async fn clarify_doubt(
        &self,
        mut history: Vec<Message>,
        question: &str
    ) -> AgentResult<Vec<Message>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::InvalidInput("Question is empty".into()));
        }
        let persona = self.persona_for(Some(DOUBT_PERSONA))?;
        let context = format_history_for_prompt(&history, &persona.bot_label);
        let prompt = get_chat_prompt(&persona, &context, question);
        history.push(Message::user(question));

        match self.chat_client.complete(&prompt, &persona.generation_options()).await {
            Ok(resp) => history.push(Message::bot(resp.response)),
            Err(e) => {
                error!("Doubt clarification failed: {}", e);
                history.push(Message::bot(persona.apology));
            }
        }
        Ok(history)
    }

    pub async fn career_guidance(&self, field: &str) -> AgentResult<String> {
        let field = field.trim();
        if field.is_empty() {
            return Err(AgentError::InvalidInput("Field of interest is required".into()));
        }
        let prompts = self.prompts();
        let persona = self.persona_for(Some(CAREER_PERSONA))?;
        let request = prompts.render(CAREER_TEMPLATE, &[("field", field)])?;
        let prompt = get_chat_prompt(&persona, "", &request);

        info!("Career guidance requested for '{}'", field);
        let resp = self.quiz_client.complete(&prompt, &persona.generation_options()).await?;
        Ok(resp.response)
    }

    // --- Roadmaps ---

    pub async fn generate_roadmap(&self, request: &RoadmapRequest) -> AgentResult<Roadmap> {
        let prompts = self.prompts();
        roadmap::generate_roadmap(self.roadmap_client.as_ref(), &prompts, request).await
    }

    pub async fn expand_roadmap_node(
        &self,
        label: &str,
        topic: &str,
        context: &str,
        expansion: Expansion
    ) -> AgentResult<Roadmap> {
        let prompts = self.prompts();
        roadmap::expand_node(
            self.roadmap_client.as_ref(),
            &prompts,
            label,
            topic,
            context,
            expansion
        ).await
    }

    pub async fn roadmap_node_details(
        &self,
        label: &str,
        topic: &str,
        context: &str
    ) -> AgentResult<String> {
        let prompts = self.prompts();
        roadmap::node_details(self.roadmap_client.as_ref(), &prompts, label, topic, context).await
    }

    pub async fn search_videos(&self, query: &str) -> AgentResult<Vec<VideoResult>> {
        match &self.video_search {
            Some(search) => search.search(query).await,
            None => Err(AgentError::Config("Video search is not configured".into())),
        }
    }

    // --- Quizzes ---

    pub async fn generate_quiz(&self, topic: &str, count: usize) -> AgentResult<Vec<QuizQuestion>> {
        let prompts = self.prompts();
        quiz::generate_quiz(self.quiz_client.as_ref(), &prompts, topic, count).await
    }

    pub async fn check_quiz_answer(
        &self,
        question: &QuizQuestion,
        answer: &str
    ) -> AgentResult<QuizFeedback> {
        let prompts = self.prompts();
        quiz::check_answer(self.quiz_client.as_ref(), &prompts, question, answer).await
    }

    /// Re-reads the prompts file when it changed on disk. Returns whether a
    /// new configuration was swapped in.
    pub fn reload_prompts_if_changed(&self) -> AgentResult<bool> {
        let path = match &self.prompts_path {
            Some(p) => p,
            None => return Ok(false),
        };
        let current = self.prompts();
        match prompt::reload_prompts_if_changed(path, &current)? {
            Some(new_config) => {
                let mut guard = self.prompt_config
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *guard = new_config;
                info!("Prompt configuration reloaded from {}", path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
