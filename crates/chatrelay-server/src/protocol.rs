use serde::{Deserialize, Serialize};

/// First write on every new connection.
pub const WELCOME_MESSAGE: &str =
    "Welcome to the chatbot! Type your message to start chatting.";
/// Reply to a quit keyword, written just before the connection closes.
pub const GOODBYE_MESSAGE: &str = "Goodbye! Thanks for chatting.";
/// Reply to input that does not parse as a known message.
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid message format. Please send valid JSON.";

/// True when the whole message body is a quit keyword, any casing.
pub fn is_quit(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "quit" | "exit" | "bye"
    )
}

// ---------------------------------------------------------------------------
// Socket variant: newline-delimited JSON.
// ---------------------------------------------------------------------------

/// Inbound socket message. A missing `message` field reads as empty text,
/// which handlers silently ignore.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    System,
    Bot,
    Error,
}

/// Outbound socket frame, one JSON object per line.
#[derive(Debug, Serialize)]
pub struct ChatFrame {
    #[serde(rename = "type")]
    pub kind: FrameKind,
    pub message: String,
}

impl ChatFrame {
    pub fn system(message: impl Into<String>) -> Self {
        Self { kind: FrameKind::System, message: message.into() }
    }

    pub fn bot(message: impl Into<String>) -> Self {
        Self { kind: FrameKind::Bot, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: FrameKind::Error, message: message.into() }
    }

    /// Serialize to the wire form: one JSON object, newline-terminated.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

// ---------------------------------------------------------------------------
// WebSocket variant: one JSON object per text frame.
// ---------------------------------------------------------------------------

/// Inbound WebSocket command.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Select the model used for this session's subsequent chat turns.
    Model { text: String },
    /// Plain chat text; quit keywords close the connection.
    Message { text: String },
    /// Translate text with the session's language pair. The optional
    /// `text_from`/`text_to` codes update the pair first and stay sticky.
    Translate {
        text: String,
        #[serde(default)]
        text_from: Option<String>,
        #[serde(default)]
        text_to: Option<String>,
    },
    /// Ask for the translation language catalog.
    Languages,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    Response,
    Error,
}

/// Outbound WebSocket frame.
#[derive(Debug, Serialize)]
pub struct WsReply {
    #[serde(rename = "type")]
    pub kind: ReplyKind,
    pub message: String,
}

impl WsReply {
    pub fn response(message: impl Into<String>) -> Self {
        Self { kind: ReplyKind::Response, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: ReplyKind::Error, message: message.into() }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
