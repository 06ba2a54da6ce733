use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A binary payload attached to a single message, carried as a
/// self-describing data URI (`data:<mime>;base64,<payload>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub data_uri: String,
    pub name: String,
    pub mime_type: String,
}

/// One turn of a conversation.
///
/// Messages are never mutated in place; edits replace the message with a
/// new one (see the edit/resubmit path in the chat controller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachment: None,
        }
    }

    pub fn user_with_attachment(content: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachment: Some(attachment),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachment: None,
        }
    }
}
