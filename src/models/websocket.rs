use serde::{ Serialize, Deserialize };

use super::chat::Conversation;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Without a `conversation_id` a new conversation is opened first.
    #[serde(rename = "chat")] Chat {
        content: String,
        #[serde(default)]
        conversation_id: Option<String>,
        #[serde(default)]
        persona: Option<String>,
    },
    #[serde(rename = "new_conversation")] NewConversation {
        #[serde(default)]
        persona: Option<String>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "chunk")] Chunk {
        content: String,
    },
    #[serde(rename = "response")] Response {
        content: String,
        conversation_id: String,
        timestamp: i64,
    },
    #[serde(rename = "conversation_created")] ConversationCreated {
        conversation: Conversation,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"serialization failed"}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_frame_without_conversation_parses() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"chat","content":"hi"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Chat {
            content: "hi".into(),
            conversation_id: None,
            persona: None,
        });
    }

    #[test]
    fn server_frames_are_tagged() {
        let json = ServerMessage::Chunk { content: "par".into() }.to_json();
        assert_eq!(json, r#"{"type":"chunk","content":"par"}"#);
        assert_eq!(ServerMessage::Processing.to_json(), r#"{"type":"processing"}"#);
    }
}
