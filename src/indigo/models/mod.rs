pub mod conversation;
pub mod conversation_set;
pub mod message;

pub use conversation::{Conversation, DEFAULT_TITLE, TITLE_MAX_CHARS};
pub use conversation_set::{ConversationSet, Mutation, Partition};
pub use message::{Attachment, Message, Role};
