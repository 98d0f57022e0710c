pub mod api;
pub mod message;

pub use api::{
    ApiErrorBody, ApiMessage, ChatCompletionChunk, ChunkChoice, ChunkDelta, ContentBlock, Delta,
    MessageStartData, StreamEvent,
};
pub use message::{Message, Role, TransportEvent};
