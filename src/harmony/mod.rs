//! Harmony conversation format: rendering and parsing.
//!
//! This layer turns structured conversations into token streams and back:
//!
//! - [`types`]: the conversation data model (roles, messages, system and
//!   developer metadata, tool namespaces) with the reference JSON shape
//! - [`encoding`]: the [`Encoding`] facade with render/parse entry points
//!   and stop-token sets
//! - [`parser`]: the token-at-a-time [`StreamParser`] state machine
//! - `header`: pure string parsing for decoded message headers
//! - `render_system` / `render_tools`: plain-text body builders for system
//!   metadata and the TypeScript-like tools section

pub mod encoding;
pub(crate) mod header;
pub mod parser;
pub(crate) mod render_system;
pub(crate) mod render_tools;
pub mod types;

pub use encoding::{Encoding, HARMONY_GPT_OSS};
pub use parser::StreamParser;
pub use types::{
    Author, ChannelConfig, Content, Conversation, DeveloperContent, Message,
    ReasoningEffort, RenderConversationConfig, Role, SystemContent, ToolDescription,
    ToolNamespaceConfig, ToolNamespaceMap,
};
