pub mod conversation_repository;
pub mod error;
pub mod in_memory_repository;
pub mod json_repository;

pub use conversation_repository::{
    ConversationData, ConversationSetData, ConversationSetRepository,
};
pub use error::{RepositoryError, RepositoryResult};
pub use in_memory_repository::InMemorySetRepository;
pub use json_repository::JsonSetRepository;
