use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "New Conversation";
const TITLE_CHARS: usize = 30;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub text: String,
    pub is_user: bool,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_user: true, timestamp: Utc::now() }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_user: false, timestamp: Utc::now() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

impl Conversation {
    /// Starts a conversation whose first message is the bot greeting.
    /// The id is the creation time in milliseconds plus a short random suffix.
    pub fn new(persona: &str, greeting: &str) -> Self {
        let now = Utc::now();
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("{}-{}", now.timestamp_millis(), &suffix[..8]),
            title: DEFAULT_TITLE.to_string(),
            messages: vec![Message::bot(greeting)],
            last_updated: now,
            topic: None,
            persona: Some(persona.to_string()),
        }
    }

    /// Appends a message. The first user message names the conversation.
    pub fn push(&mut self, message: Message) {
        if message.is_user && !self.messages.iter().any(|m| m.is_user) {
            self.title = title_from(&message.text);
        }
        self.last_updated = message.timestamp;
        self.messages.push(message);
    }

    /// The last `n` messages in order.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

fn title_from(text: &str) -> String {
    let head: String = text.trim().chars().take(TITLE_CHARS).collect();
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conversation_starts_with_greeting() {
        let conv = Conversation::new("coach", "Hi there");
        assert_eq!(conv.title, DEFAULT_TITLE);
        assert_eq!(conv.messages.len(), 1);
        assert!(!conv.messages[0].is_user);
        assert_eq!(conv.persona.as_deref(), Some("coach"));
        let (millis, suffix) = conv.id.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 8);
        assert_ne!(conv.id, Conversation::new("coach", "Hi there").id);
    }

    #[test]
    fn first_user_message_sets_title_once() {
        let mut conv = Conversation::new("coach", "Hi");
        conv.push(Message::user("I'm feeling overwhelmed with my studies lately"));
        assert_eq!(conv.title, "I'm feeling overwhelmed with m...");

        conv.push(Message::bot("That's okay."));
        conv.push(Message::user("Another question"));
        assert_eq!(conv.title, "I'm feeling overwhelmed with m...");
        assert_eq!(conv.messages.len(), 4);
    }

    #[test]
    fn recent_returns_tail() {
        let mut conv = Conversation::new("coach", "Hi");
        for i in 0..7 {
            conv.push(Message::user(format!("m{}", i)));
        }
        let tail: Vec<_> = conv.recent(5).iter().map(|m| m.text.as_str()).collect();
        assert_eq!(tail, vec!["m2", "m3", "m4", "m5", "m6"]);
        assert_eq!(conv.recent(100).len(), 8);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let conv = Conversation::new("coach", "Hi");
        let json = serde_json::to_value(&conv).unwrap();
        assert!(json.get("lastUpdated").is_some());
        assert_eq!(json["messages"][0]["isUser"], false);
        assert!(json.get("topic").is_none());
    }
}
