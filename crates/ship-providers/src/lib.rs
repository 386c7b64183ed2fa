//! The `LanguageModel` capability boundary: chat/streaming interface plus
//! the message and tool-call wire types exchanged across it.

pub mod capability;
pub mod message;
pub mod stream;
pub mod traits;

#[cfg(feature = "test-util")]
pub mod testing;

pub use capability::LlmCapabilities;
pub use message::{ContentPart, ModelContent, ModelMessage, ModelRole};
pub use stream::{BoxStream, StreamEvent, Usage};
pub use traits::{ChatRequest, ChatResponse, LlmProvider};
