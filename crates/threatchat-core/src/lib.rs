pub mod backend;
pub mod chat;
pub mod composer;
pub mod config;
pub mod error;
pub mod format;
pub mod state;
pub mod view;

// Re-export main types for convenience
pub use backend::{ChatBackend, HttpBackend};
pub use chat::{ChatClient, PendingRequest, PendingState, RequestId};
pub use composer::Composer;
pub use config::{Config, Suggestion};
pub use error::{ChatError, ChatResult};
pub use state::{ChatResponse, Role, SourceCitation};
pub use view::{Bubble, Entry, MessageList, SourcePanel, TypingId};
