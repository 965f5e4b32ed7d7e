use serde::{ Deserialize, Serialize };
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::info;

use crate::llm::GenerationOptions;

pub const DEFAULT_PERSONA: &str = "coach";

pub const ROADMAP_TEMPLATE: &str = "roadmap";
pub const ROADMAP_SUBTREE_TEMPLATE: &str = "roadmap_subtree";
pub const NODE_DETAILS_TEMPLATE: &str = "node_details";
pub const QUIZ_GENERATE_TEMPLATE: &str = "quiz_generate";
pub const QUIZ_CHECK_TEMPLATE: &str = "quiz_check";
pub const CAREER_TEMPLATE: &str = "career_guidance";

#[derive(Debug)]
pub enum PromptError {
    TemplateNotFound(String),
    PersonaNotFound(String),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::TemplateNotFound(key) => write!(f, "Prompt template '{}' not found", key),
            PromptError::PersonaNotFound(key) => write!(f, "Persona '{}' not found", key),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

/// One chat assistant flavour: who it is, how it greets, and how its
/// prompt is framed.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Persona {
    pub name: String,
    /// Speaker label for bot lines in the rendered context.
    pub bot_label: String,
    pub greeting: String,
    pub instructions: String,
    pub reply_cue: String,
    pub apology: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Persona {
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_persona_key")]
    pub default_persona: String,
    #[serde(default)]
    pub personas: HashMap<String, Persona>,
    #[serde(default)]
    pub templates: HashMap<String, String>,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

fn default_persona_key() -> String {
    DEFAULT_PERSONA.to_string()
}

impl Default for PromptConfig {
    fn default() -> Self {
        let personas = builtin_personas()
            .into_iter()
            .map(|(k, p)| (k.to_string(), p))
            .collect();
        let templates = builtin_templates()
            .into_iter()
            .map(|(k, t)| (k.to_string(), t.to_string()))
            .collect();

        Self {
            default_persona: default_persona_key(),
            personas,
            templates,
            last_loaded: None,
        }
    }
}

impl PromptConfig {
    /// Built-in personas and templates fill whatever a file leaves out.
    fn fill_defaults(&mut self) {
        let builtin = PromptConfig::default();
        for (key, persona) in builtin.personas {
            self.personas.entry(key).or_insert(persona);
        }
        for (key, template) in builtin.templates {
            self.templates.entry(key).or_insert(template);
        }
    }

    /// Looks a persona up by key, falling back to the default persona when
    /// no key is given.
    pub fn persona(&self, key: Option<&str>) -> Result<&Persona, PromptError> {
        let key = key.unwrap_or(&self.default_persona);
        self.personas.get(key).ok_or_else(|| PromptError::PersonaNotFound(key.to_string()))
    }

    pub fn template(&self, key: &str) -> Result<&str, PromptError> {
        self.templates
            .get(key)
            .map(|s| s.as_str())
            .ok_or_else(|| PromptError::TemplateNotFound(format!("templates:{}", key)))
    }

    pub fn render(&self, key: &str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let template = self.template(key)?;
        Ok(render_template(template, vars))
    }
}

/// Substitutes `{name}` placeholders in one pass, so substituted values are
/// never rescanned. Unknown placeholders and stray braces are kept as is.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Full chat prompt: persona instructions, prior context, the new user line
/// and the reply cue.
pub fn get_chat_prompt(persona: &Persona, context: &str, user_text: &str) -> String {
    let mut prompt = persona.instructions.trim_end().to_string();
    if !context.is_empty() {
        prompt.push_str("\n\nConversation context:\n");
        prompt.push_str(context.trim_end());
    }
    prompt.push_str("\n\nUser: ");
    prompt.push_str(user_text);
    prompt.push_str("\n\n");
    prompt.push_str(&persona.reply_cue);
    prompt
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(path.as_ref())?;
    let mut config: PromptConfig = serde_json::from_str(&file_content)?;
    config.fill_defaults();
    config.last_loaded = Some(SystemTime::now());
    info!(
        "Loaded prompts from {}: {} personas, {} templates",
        path.as_ref().display(),
        config.personas.len(),
        config.templates.len()
    );
    Ok(Arc::new(config))
}

pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;

    if let Ok(modified) = metadata.modified() {
        if let Some(last_loaded) = current_config.last_loaded {
            if modified > last_loaded {
                info!("Prompts file changed, reloading...");
                return load_prompts(path).map(Some);
            }
        } else {
            info!("No last_loaded timestamp, reloading prompts...");
            return load_prompts(path).map(Some);
        }
    }
    Ok(None)
}

fn builtin_personas() -> Vec<(&'static str, Persona)> {
    vec![
        (
            "coach",
            Persona {
                name: "Youniq".to_string(),
                bot_label: "Youniq".to_string(),
                greeting: "Hi! I'm Youniq, your personal motivation coach. I can help you with:\n\n\
• Staying motivated in your studies\n\
• Overcoming learning challenges\n\
• Setting and achieving goals\n\
• Building study habits\n\
• Managing study stress\n\n\
What's on your mind today?".to_string(),
                instructions: "You are Youniq, a motivational coach helping students succeed.\n\n\
Your role:\n\
1. Provide encouragement and positivity\n\
2. Help students overcome learning challenges\n\
3. Give practical study tips\n\
4. Support them emotionally\n\
5. Guide them in setting goals\n\n\
Style:\n\
- Warm and empathetic\n\
- Solution-oriented\n\
- Inspiring and uplifting\n\
- Practical and actionable\n\
- Personal and relatable".to_string(),
                reply_cue: "Give a supportive motivational response:".to_string(),
                apology: "I'm having trouble responding. Try again soon.".to_string(),
                max_tokens: None,
                temperature: None,
            },
        ),
        (
            "doubt",
            Persona {
                name: "Doubt Clarifier".to_string(),
                bot_label: "Assistant".to_string(),
                greeting: "Hi! I'm your doubt clarifier. I can help you with:\n\n\
• Explaining complex concepts\n\
• Solving technical problems\n\
• Answering subject-specific questions\n\
• Providing detailed examples\n\
• Suggesting learning resources\n\n\
What would you like to clarify?".to_string(),
                instructions: "You are a technical doubt clarifier focused on providing detailed, accurate explanations. Your role is to:\n\
1. Break down complex concepts into simple terms\n\
2. Provide step-by-step solutions to problems\n\
3. Use relevant examples and analogies\n\
4. Include technical details when appropriate\n\
5. Suggest additional resources for deeper understanding".to_string(),
                reply_cue: "Provide a detailed, educational response:".to_string(),
                apology: "I apologize, but I'm having trouble processing your request. Please try again.".to_string(),
                max_tokens: Some(500),
                temperature: Some(0.7),
            },
        ),
        (
            "career",
            Persona {
                name: "Career Counselor".to_string(),
                bot_label: "Counselor".to_string(),
                greeting: "Hi! Tell me which career you are curious about and I'll map out how to get there.".to_string(),
                instructions: "You are a highly knowledgeable Career Counseling Assistant, dedicated to providing comprehensive career guidance based on the user's field of interest. Follow these strict guidelines:\n\
1. Respond ONLY to career-related queries that ask for career advice, paths, or guidance in a specific field.\n\
2. Your response must be structured, practical, and informative, focusing on actionable steps without unnecessary introductions.\n\
3. If the query is unrelated to career counseling, respond with: \"I am a career counseling assistant, specialized in providing career guidance. Please ask a career-related query.\"\n\
4. Include: Key Skills Required, Recommended Books, Online Courses & Certifications, Practical Projects, Experience & Internships, Career Roadmap, Job Market & Salary Insights.\n\
5. Ensure that recommendations are up-to-date and relevant to current industry standards.\n\
6. If the field of interest is not provided, ask the user to specify it.".to_string(),
                reply_cue: "Provide the career guidance:".to_string(),
                apology: "I couldn't put together career guidance right now. Please try again.".to_string(),
                max_tokens: None,
                temperature: Some(0.0),
            },
        ),
    ]
}

fn builtin_templates() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            ROADMAP_TEMPLATE,
            "Create a beginner-friendly learning roadmap for the topic: \"{topic}\" within a time span of {time} {unit}.

Format the output as a tree using vertical bars \"|\" to indicate depth/level:
- | = Main Topics
- || = Subtopics
- ||| = More Subtopics

Rules:
- 2 to 4 Main Topics
- 1 to 2 Subtopics each
- few more Subtopics
- Short, clear names only
- No preface or explanation, only the roadmap tree

Do not add bullets, dashes, indentation or explanation text.",
        ),
        (
            ROADMAP_SUBTREE_TEMPLATE,
            "Create a detailed learning roadmap for the concept: \"{label}\" in the context of the topic: \"{topic}\".

Assume the learner already saw this in the main roadmap:

{context}

Now break down \"{label}\" in depth.

Use this format:
| Category
|| Concept
||| SubTopic

Rules:
- 2-3 Main Categories
- 2-3 Concepts per category
- Keep names short
- Only return the tree

Do not add bullets, dashes, indentation or explanation text.",
        ),
        (
            NODE_DETAILS_TEMPLATE,
            "Provide a detailed explanation about \"{label}\" in the context of learning \"{topic}\".

Include:
- What it is
- Why it's important
- Key concepts to understand
- Learning tips

make it all very short like 15 to 20 words

Keep it educational and beginner-friendly and use the html structure for the format like make all under a <p> tag, dont use markdown language like *s, #s , just use <b> and tags for these stuffs",
        ),
        (
            QUIZ_GENERATE_TEMPLATE,
            "Generate {count} multiple choice questions about {topic}.
For each question, provide 4 options with one correct answer.
Format the response as a JSON array where each question has:
- question: the question text
- options: array of 4 possible answers
- correctAnswer: the correct answer from the options

Example format:
[
    {
        \"question\": \"What is...\",
        \"options\": [\"Option 1\", \"Option 2\", \"Option 3\", \"Option 4\"],
        \"correctAnswer\": \"Option 1\"
    }
]

Return only the JSON array.",
        ),
        (
            QUIZ_CHECK_TEMPLATE,
            "Given the question: \"{question}\"
Options: {options}
Correct answer: {correct_answer}
User's answer: {answer}

Provide feedback in JSON format:
{
    \"correct\": true/false,
    \"explanation\": \"Detailed explanation of why the answer is correct/incorrect\",
    \"correctAnswer\": \"The correct answer\"
}

Return only the JSON object.",
        ),
        (CAREER_TEMPLATE, "Provide detailed career counseling on becoming a {field}."),
    ]
}
