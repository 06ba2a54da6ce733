pub mod attachment;
pub mod context_assembler;
pub mod generation;
pub mod moderation;

pub use attachment::{stage_attachment, AttachmentError, MAX_ENCODED_BYTES};
pub use context_assembler::assemble;
pub use generation::{
    GenerationClient, GenerationContext, GenerationError, HttpGenerationClient,
};
pub use moderation::{HttpModerationGate, ModerationError, ModerationGate, ModerationVerdict};
