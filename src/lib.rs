//! Harmonium - Harmony conversation codec over the O200k BPE tokenizer.
//!
//! Converts structured conversations into integer token streams and back,
//! byte-exact with the Harmony prompt format:
//!
//! - Regex-free 7-rule O200k segmenter with an ASCII fast path
//! - Rank-driven byte-pair merging with reusable working buffers
//! - Aho-Corasick special-token matching and an LRU segment cache
//! - Conversation renderer (channels, tool calls, constraints, system and
//!   developer metadata, TypeScript-like tool schemas)
//! - Streaming three-state parser with per-token content deltas
//! - Rayon-parallel rendering for large conversations, byte-identical to
//!   the sequential path
//!
//! ```no_run
//! use harmonium::{Conversation, Encoding, Message, Role};
//!
//! let encoding = Encoding::load()?;
//! let conversation = Conversation::from_messages(vec![
//!     Message::from_role_and_content(Role::User, "What is 2 + 2?"),
//! ]);
//! let tokens =
//!     encoding.render_conversation_for_completion(&conversation, Role::Assistant, None)?;
//! # Ok::<(), harmonium::HarmonyError>(())
//! ```

pub mod core;
pub mod error;
pub mod harmony;

pub use crate::core::{
    harmony_special_tokens, O200kSegmenter, Segmenter, Tokenizer, TokenizerError, VocabError,
};
pub use crate::error::{HarmonyError, Result};
pub use crate::harmony::{
    Author, ChannelConfig, Content, Conversation, DeveloperContent, Encoding, Message,
    ReasoningEffort, RenderConversationConfig, Role, StreamParser, SystemContent,
    ToolDescription, ToolNamespaceConfig, ToolNamespaceMap, HARMONY_GPT_OSS,
};
