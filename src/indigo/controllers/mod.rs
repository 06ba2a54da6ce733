pub mod chat_controller;

pub use chat_controller::{ChatController, ChatError, EditState, REFUSAL_MESSAGE};
