use chrono::Utc;
use uuid::Uuid;

use super::message::{Message, Role};
use crate::indigo::repositories::ConversationData;

/// Title given to a conversation before its first user message arrives
pub const DEFAULT_TITLE: &str = "New Chat";

/// Maximum number of characters taken from the first user message when
/// deriving the conversation title
pub const TITLE_MAX_CHARS: usize = 30;

/// A titled, ordered sequence of messages with an archived flag
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    title: String,
    messages: Vec<Message>,
    archived: bool,
    created_at: i64,
    updated_at: i64,
    /// Whether the title has been assigned from a first user message.
    /// Stays true across edit-truncation so the title is set exactly once.
    titled: bool,
}

impl Conversation {
    /// Create a new empty conversation with a fresh id
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            archived: false,
            created_at: now,
            updated_at: now,
            titled: false,
        }
    }

    /// Restore a conversation from persisted data
    pub fn from_data(data: ConversationData) -> Self {
        // Any conversation that has held a message has been titled; the
        // flag itself is not persisted.
        let titled = !data.messages.is_empty() || data.title != DEFAULT_TITLE;
        Self {
            id: data.id,
            title: data.title,
            messages: data.messages,
            archived: data.archived,
            created_at: data.created_at,
            updated_at: data.updated_at,
            titled,
        }
    }

    /// Serializable snapshot for persistence
    pub fn to_data(&self) -> ConversationData {
        ConversationData {
            id: self.id.clone(),
            title: self.title.clone(),
            messages: self.messages.clone(),
            archived: self.archived,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Append a message to the history.
    ///
    /// The first message ever appended sets the title: the leading
    /// characters of the first user message, capped at [`TITLE_MAX_CHARS`].
    /// The title is never overwritten afterwards.
    pub fn append(&mut self, message: Message) {
        if !self.titled && self.messages.is_empty() && message.role == Role::User {
            self.title = message.content.chars().take(TITLE_MAX_CHARS).collect();
            if self.title.is_empty() {
                self.title = DEFAULT_TITLE.to_string();
            }
            self.titled = true;
        }
        self.messages.push(message);
        self.touch();
    }

    /// Discard the message at `index` and everything after it, keeping
    /// `[0, index)`. Used by the edit/resubmit path; not reversible.
    pub fn truncate_from(&mut self, index: usize) {
        self.messages.truncate(index);
        self.touch();
    }

    /// Clone of the current message sequence, used to snapshot the
    /// conversation before an optimistic mutation.
    pub fn messages_snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Restore a previously taken snapshot wholesale. The title is left
    /// alone: once set by the first user message it stays, even if that
    /// message is rolled back.
    pub fn restore_messages(&mut self, snapshot: Vec<Message>) {
        self.messages = snapshot;
        self.touch();
    }

    pub fn set_archived(&mut self, archived: bool) {
        self.archived = archived;
        self.touch();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn archived(&self) -> bool {
        self.archived
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().timestamp();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
