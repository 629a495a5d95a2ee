//! The Harmony encoding facade.
//!
//! An [`Encoding`] owns the O200k tokenizer with Harmony specials installed
//! and exposes the rendering entry points (single message, conversation,
//! completion, training), the batch parse entry point, and the stop-token
//! sets. Construction happens once; the value is then shared read-only.

use rayon::prelude::*;
use std::sync::OnceLock;

use crate::core::specials::{
    TOK_CALL, TOK_CHANNEL, TOK_CONSTRAIN, TOK_END, TOK_MESSAGE, TOK_RETURN, TOK_START,
};
use crate::core::{
    harmony_special_tokens, load_o200k, O200kSegmenter, Tokenizer, VocabPairs,
};
use crate::error::{HarmonyError, Result};
use crate::harmony::parser::StreamParser;
use crate::harmony::render_system::render_system_content;
use crate::harmony::render_tools::render_developer_content;
use crate::harmony::types::{
    Content, Conversation, Message, RenderConversationConfig, Role, SystemContent,
};

/// Canonical name of the supported encoding.
pub const HARMONY_GPT_OSS: &str = "HarmonyGptOss";

const CONSTRAIN_MARKER: &str = "<|constrain|>";

/// Messages below this combined size render sequentially; the parallel path
/// only pays off for large conversations.
const PARALLEL_RENDER_MIN_BYTES: usize = 8 * 1024;
const PARALLEL_RENDER_MIN_MESSAGES: usize = 2;

#[derive(Clone, Copy, Default)]
struct RenderOptions {
    conversation_has_function_tools: bool,
}

/// Rendering and parsing for the Harmony format over the O200k tokenizer.
pub struct Encoding {
    name: String,
    bpe: Tokenizer,
}

impl Encoding {
    /// Loads the o200k_base vocabulary (downloading and caching it when
    /// needed) and installs the Harmony special tokens.
    pub fn load() -> Result<Self> {
        let pairs = load_o200k()?;
        Self::from_pairs(HARMONY_GPT_OSS, pairs)
    }

    /// Builds an encoding from explicit merge pairs. Useful for tests and
    /// embedded vocabularies; the Harmony specials are always installed.
    pub fn from_pairs(name: &str, pairs: VocabPairs) -> Result<Self> {
        let bpe = Tokenizer::new(
            pairs,
            harmony_special_tokens(),
            Box::new(O200kSegmenter::new()),
        )
        .map_err(HarmonyError::Tokenizer)?;
        Ok(Self {
            name: name.to_string(),
            bpe,
        })
    }

    /// The encoding's canonical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying tokenizer.
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.bpe
    }

    /// Tokens that terminate any message.
    pub fn stop_tokens(&self) -> Vec<u32> {
        vec![TOK_RETURN, TOK_END, TOK_CALL]
    }

    /// Stop tokens for sampled assistant actions (call/return).
    pub fn stop_tokens_for_assistant_actions(&self) -> Vec<u32> {
        vec![TOK_RETURN, TOK_CALL]
    }

    /// Decodes tokens into a UTF-8 string.
    pub fn decode_utf8(&self, tokens: &[u32]) -> Result<String> {
        Ok(self.bpe.decode_utf8(tokens)?)
    }

    /// Decodes tokens into raw bytes.
    pub fn decode_bytes(&self, tokens: &[u32]) -> Result<Vec<u8>> {
        Ok(self.bpe.decode_bytes(tokens)?)
    }

    /// Encodes text, recognizing Harmony special literals. A convenience
    /// for tools and tests; rendering never goes through this path.
    pub fn encode_with_special_tokens(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_with_special_tokens(text)
    }

    /// Renders a single message into Harmony tokens.
    pub fn render(&self, message: &Message) -> Result<Vec<u32>> {
        let mut out = Vec::with_capacity(estimate_message_size(message) / 3 + 16);
        self.render_message_into(message, RenderOptions::default(), &mut out)?;
        Ok(out)
    }

    /// Renders an entire conversation. With auto-drop enabled (the default)
    /// and a conversation whose last assistant message is in the `final`
    /// channel, assistant `analysis` messages before the first `final`
    /// message are omitted.
    pub fn render_conversation(
        &self,
        conversation: &Conversation,
        config: Option<&RenderConversationConfig>,
    ) -> Result<Vec<u32>> {
        let auto_drop = config.map_or(true, |c| c.auto_drop_analysis);
        let messages = &conversation.messages;

        let mut last_assistant_final = false;
        let mut first_final: Option<usize> = None;
        let mut has_function_tools = false;
        for (i, msg) in messages.iter().enumerate() {
            if msg.channel.as_deref() == Some("final") && first_final.is_none() {
                first_final = Some(i);
            }
            if msg.author.role == Role::Assistant {
                last_assistant_final = msg.channel.as_deref() == Some("final");
            }
            if !has_function_tools {
                has_function_tools = msg.content.iter().any(|c| match c {
                    Content::Developer { developer_content } => developer_content
                        .tools
                        .get("functions")
                        .is_some_and(|ns| !ns.tools.is_empty()),
                    _ => false,
                });
            }
        }
        let should_drop = auto_drop && last_assistant_final;

        let render_idx: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(i, msg)| {
                !(should_drop
                    && first_final.is_some_and(|f| *i < f)
                    && msg.author.role == Role::Assistant
                    && msg.channel.as_deref() == Some("analysis"))
            })
            .map(|(i, _)| i)
            .collect();
        if render_idx.is_empty() {
            return Ok(Vec::new());
        }

        let opts = RenderOptions {
            conversation_has_function_tools: has_function_tools,
        };

        if self.should_parallel_render(messages, &render_idx) {
            tracing::debug!(
                messages = render_idx.len(),
                "rendering conversation on the parallel path"
            );
            // Ordered collect keeps the output byte-identical to the
            // sequential concatenation.
            let results: Vec<Vec<u32>> = render_idx
                .par_iter()
                .map(|&idx| {
                    let mut toks = Vec::new();
                    self.render_message_into(&messages[idx], opts, &mut toks)?;
                    Ok(toks)
                })
                .collect::<Result<_>>()?;
            return Ok(results.concat());
        }

        let budget: usize = render_idx
            .iter()
            .map(|&i| estimate_message_size(&messages[i]) / 3 + 16)
            .sum();
        let mut out = Vec::with_capacity(budget.min(1 << 20));
        for &idx in &render_idx {
            self.render_message_into(&messages[idx], opts, &mut out)?;
        }
        Ok(out)
    }

    /// Renders a conversation and appends `<|start|>` plus the next role
    /// name, prompting the model for its next message.
    pub fn render_conversation_for_completion(
        &self,
        conversation: &Conversation,
        next_role: Role,
        config: Option<&RenderConversationConfig>,
    ) -> Result<Vec<u32>> {
        let mut out = self.render_conversation(conversation, config)?;
        out.push(TOK_START);
        self.bpe.encode_ordinary_into(next_role.as_str(), &mut out);
        Ok(out)
    }

    /// Renders a conversation for training: when the last message is an
    /// assistant `final`, the trailing `<|end|>` becomes `<|return|>`.
    pub fn render_conversation_for_training(
        &self,
        conversation: &Conversation,
        config: Option<&RenderConversationConfig>,
    ) -> Result<Vec<u32>> {
        let mut out = self.render_conversation(conversation, config)?;
        if let Some(last) = conversation.messages.last() {
            if last.author.role == Role::Assistant && last.channel.as_deref() == Some("final") {
                if let Some(terminator) = out.last_mut() {
                    *terminator = TOK_RETURN;
                }
            }
        }
        Ok(out)
    }

    /// Parses completion tokens back into messages. `role` seeds the parser
    /// with a hint for a header that arrives without `<|start|>`.
    pub fn parse_messages_from_completion_tokens(
        &self,
        tokens: &[u32],
        role: Option<Role>,
    ) -> Result<Vec<Message>> {
        let mut parser = StreamParser::new(self, role);
        for &token in tokens {
            parser.process(token)?;
        }
        parser.process_eos()?;
        Ok(parser.into_messages())
    }

    fn render_text(&self, text: &str, out: &mut Vec<u32>) {
        self.bpe.encode_ordinary_into(text, out);
    }

    fn render_message_into(
        &self,
        msg: &Message,
        opts: RenderOptions,
        out: &mut Vec<u32>,
    ) -> Result<()> {
        out.push(TOK_START);

        let author_name = msg.author.name.as_deref().unwrap_or("");
        if msg.author.role == Role::Tool && author_name.is_empty() {
            return Err(HarmonyError::InvalidInput(
                "tool messages must have an author name".to_string(),
            ));
        }

        let recipient = msg
            .recipient
            .as_deref()
            .filter(|r| !r.is_empty() && *r != "all");

        let mut header = String::new();
        if msg.author.role == Role::Tool {
            header.push_str(author_name);
        } else {
            header.push_str(msg.author.role.as_str());
            if !author_name.is_empty() {
                header.push(':');
                header.push_str(author_name);
            }
        }
        if let Some(recipient) = recipient {
            header.push_str(" to=");
            header.push_str(recipient);
        }
        self.render_text(&header, out);

        if let Some(channel) = msg.channel.as_deref().filter(|c| !c.is_empty()) {
            out.push(TOK_CHANNEL);
            self.render_text(channel, out);
        }

        if let Some(content_type) = msg.content_type.as_deref().filter(|c| !c.is_empty()) {
            self.render_content_type(content_type, out);
        }

        out.push(TOK_MESSAGE);

        for item in &msg.content {
            match item {
                Content::Text { text } => self.render_text(text, out),
                Content::System { system_content } => {
                    self.render_system(system_content, opts, out)
                }
                Content::Developer { developer_content } => {
                    self.render_text(&render_developer_content(developer_content), out)
                }
            }
        }

        if msg.author.role == Role::Assistant && recipient.is_some() {
            out.push(TOK_CALL);
        } else {
            out.push(TOK_END);
        }
        Ok(())
    }

    fn render_system(&self, sys: &SystemContent, opts: RenderOptions, out: &mut Vec<u32>) {
        let body = render_system_content(sys, opts.conversation_has_function_tools);
        self.render_text(&body, out);
    }

    /// A content type beginning with the `<|constrain|>` literal emits the
    /// marker id itself rather than its text.
    fn render_content_type(&self, content_type: &str, out: &mut Vec<u32>) {
        if let Some(rest) = content_type.strip_prefix(CONSTRAIN_MARKER) {
            self.render_text(" ", out);
            out.push(TOK_CONSTRAIN);
            if !rest.is_empty() {
                self.render_text(rest, out);
            }
            return;
        }
        self.render_text(&format!(" {content_type}"), out);
    }

    fn should_parallel_render(&self, messages: &[Message], indices: &[usize]) -> bool {
        if !parallel_render_enabled() || indices.len() < PARALLEL_RENDER_MIN_MESSAGES {
            return false;
        }
        let mut total = 0;
        for &idx in indices {
            total += estimate_message_size(&messages[idx]);
            if total >= PARALLEL_RENDER_MIN_BYTES {
                return true;
            }
        }
        false
    }
}

/// The parallel render path can be disabled with
/// `HARMONY_RENDER_PARALLEL=0` (or `false`); it never changes output bytes.
fn parallel_render_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        !matches!(
            std::env::var("HARMONY_RENDER_PARALLEL")
                .unwrap_or_default()
                .to_lowercase()
                .as_str(),
            "0" | "false"
        )
    })
}

/// Rough source-byte size of a message, used only for capacity hints and
/// the parallel-path threshold.
fn estimate_message_size(msg: &Message) -> usize {
    let mut total = msg.author.name.as_deref().map_or(0, str::len)
        + msg.channel.as_deref().map_or(0, str::len)
        + msg.content_type.as_deref().map_or(0, str::len);
    if let Some(recipient) = msg.recipient.as_deref().filter(|r| *r != "all") {
        total += recipient.len();
    }
    for item in &msg.content {
        total += match item {
            Content::Text { text } => text.len(),
            Content::System { system_content } => {
                let sys = system_content;
                sys.model_identity.as_deref().map_or(0, str::len)
                    + sys.conversation_start_date.as_deref().map_or(0, str::len)
                    + sys.knowledge_cutoff.as_deref().map_or(0, str::len)
                    + sys
                        .channel_config
                        .as_ref()
                        .map_or(0, |c| c.valid_channels.iter().map(String::len).sum::<usize>())
                    + estimate_tools_size(&sys.tools)
            }
            Content::Developer { developer_content } => {
                developer_content.instructions.as_deref().map_or(0, str::len)
                    + estimate_tools_size(&developer_content.tools)
            }
        };
    }
    total
}

fn estimate_tools_size(tools: &crate::harmony::types::ToolNamespaceMap) -> usize {
    tools
        .values()
        .map(|ns| {
            ns.name.len()
                + ns.description.as_deref().map_or(0, str::len)
                + ns.tools
                    .iter()
                    .map(|t| {
                        t.name.len()
                            + t.description.len()
                            + t.parameters.as_ref().map_or(0, |p| p.get().len())
                    })
                    .sum::<usize>()
        })
        .sum()
}
