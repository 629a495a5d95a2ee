//! Conversation data model for the Harmony format.
//!
//! The JSON shape matches the reference format: author role/name are
//! flattened onto the message, and `content` accepts either a bare string
//! or a list of structured items.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

/// Author class of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Developer,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Developer => "developer",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message author: a role plus an optional name (e.g. a namespaced tool id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Author {
    pub fn new(role: Role, name: impl Into<String>) -> Self {
        Self {
            role,
            name: Some(name.into()),
        }
    }

    pub fn from_role(role: Role) -> Self {
        Self { role, name: None }
    }
}

/// Desired level of model reasoning, rendered into the system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

/// Valid channel names and whether every message must carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub valid_channels: Vec<String>,
    pub channel_required: bool,
}

impl ChannelConfig {
    /// The default Harmony channel set: analysis, commentary, final;
    /// channel required on every message.
    pub fn require_channels() -> Self {
        Self {
            valid_channels: vec![
                "analysis".to_string(),
                "commentary".to_string(),
                "final".to_string(),
            ],
            channel_required: true,
        }
    }
}

/// One tool and its JSON-Schema parameters.
///
/// The raw parameter blob is kept verbatim; the parsed value and the
/// original property-key order are cached behind a shared once-cell the
/// first time the tool is rendered, so concurrent renders parse at most
/// once and clones share the cache instead of copying it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Box<RawValue>>,
    #[serde(skip, default)]
    parsed: Arc<OnceLock<Option<ParsedParameters>>>,
}

#[derive(Debug)]
pub(crate) struct ParsedParameters {
    pub(crate) value: Value,
    pub(crate) ordered_keys: Vec<String>,
}

impl ToolDescription {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Option<Box<RawValue>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            parsed: Arc::default(),
        }
    }

    /// The parsed parameter schema plus the property-key order found in the
    /// raw JSON. `None` when there are no parameters or they fail to parse.
    pub(crate) fn parsed_parameters(&self) -> Option<&ParsedParameters> {
        let raw = self.parameters.as_ref()?.get();
        if raw.is_empty() {
            return None;
        }
        self.parsed
            .get_or_init(|| {
                let value = serde_json::from_str::<Value>(raw).ok()?;
                Some(ParsedParameters {
                    value,
                    ordered_keys: ordered_property_keys(raw),
                })
            })
            .as_ref()
    }
}

/// A group of tools published under one namespace (e.g. `functions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolNamespaceConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tools: Vec<ToolDescription>,
}

/// Tool namespaces keyed by namespace name; iteration order is ascending,
/// which is also the rendering order.
pub type ToolNamespaceMap = BTreeMap<String, ToolNamespaceConfig>;

/// System instructions and conversation metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: ToolNamespaceMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_cutoff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_config: Option<ChannelConfig>,
}

impl SystemContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model_identity(mut self, identity: impl Into<String>) -> Self {
        self.model_identity = Some(identity.into());
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    pub fn with_conversation_start_date(mut self, date: impl Into<String>) -> Self {
        self.conversation_start_date = Some(date.into());
        self
    }

    pub fn with_knowledge_cutoff(mut self, cutoff: impl Into<String>) -> Self {
        self.knowledge_cutoff = Some(cutoff.into());
        self
    }

    pub fn with_channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = Some(config);
        self
    }

    pub fn with_tools(mut self, namespace: ToolNamespaceConfig) -> Self {
        self.tools.insert(namespace.name.clone(), namespace);
        self
    }
}

/// Developer instructions and tool declarations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeveloperContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: ToolNamespaceMap,
}

impl DeveloperContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_function_tools(mut self, tools: Vec<ToolDescription>) -> Self {
        self.tools.insert(
            "functions".to_string(),
            ToolNamespaceConfig {
                name: "functions".to_string(),
                description: None,
                tools,
            },
        );
        self
    }

    pub fn with_tools(mut self, namespace: ToolNamespaceConfig) -> Self {
        self.tools.insert(namespace.name.clone(), namespace);
        self
    }
}

/// One content item within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "system_content")]
    System { system_content: SystemContent },
    #[serde(rename = "developer_content")]
    Developer { developer_content: DeveloperContent },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    /// The text of a `Text` item, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::text(text)
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::text(text)
    }
}

impl From<SystemContent> for Content {
    fn from(system_content: SystemContent) -> Self {
        Content::System { system_content }
    }
}

impl From<DeveloperContent> for Content {
    fn from(developer_content: DeveloperContent) -> Self {
        Content::Developer { developer_content }
    }
}

/// A single Harmony message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "RawMessage", from = "RawMessage")]
pub struct Message {
    pub author: Author,
    pub recipient: Option<String>,
    pub content: Vec<Content>,
    pub channel: Option<String>,
    pub content_type: Option<String>,
}

impl Message {
    pub fn from_author_and_content(author: Author, content: impl Into<Content>) -> Self {
        Self {
            author,
            recipient: None,
            content: vec![content.into()],
            channel: None,
            content_type: None,
        }
    }

    pub fn from_role_and_content(role: Role, content: impl Into<Content>) -> Self {
        Self::from_author_and_content(Author::from_role(role), content)
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// JSON wire shape of a message: author flattened, content as a bare string
/// when the message holds exactly one text item.
#[derive(Serialize, Deserialize)]
struct RawMessage {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    recipient: Option<String>,
    content: RawContent,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    content_type: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Items(Vec<Content>),
}

impl From<Message> for RawMessage {
    fn from(msg: Message) -> Self {
        let content = match msg.content.as_slice() {
            [Content::Text { text }] => RawContent::Text(text.clone()),
            _ => RawContent::Items(msg.content),
        };
        RawMessage {
            role: msg.author.role,
            name: msg.author.name,
            recipient: msg.recipient,
            content,
            channel: msg.channel,
            content_type: msg.content_type,
        }
    }
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        let content = match raw.content {
            RawContent::Text(text) => vec![Content::Text { text }],
            RawContent::Items(items) => items,
        };
        Message {
            author: Author {
                role: raw.role,
                name: raw.name,
            },
            recipient: raw.recipient,
            content,
            channel: raw.channel,
            content_type: raw.content_type,
        }
    }
}

/// An ordered list of messages; rendering concatenates them in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

/// Rendering behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConversationConfig {
    pub auto_drop_analysis: bool,
}

impl Default for RenderConversationConfig {
    fn default() -> Self {
        Self {
            auto_drop_analysis: true,
        }
    }
}

/// Extracts the key order of the top-level `"properties"` object from a raw
/// schema blob, preserving the author's insertion order. Returns an empty
/// vector when there is no properties object.
fn ordered_property_keys(raw: &str) -> Vec<String> {
    let bytes = raw.as_bytes();
    let mut pos = skip_ws(bytes, 0);
    if pos >= bytes.len() || bytes[pos] != b'{' {
        return Vec::new();
    }
    pos += 1;

    loop {
        pos = skip_ws(bytes, pos);
        match bytes.get(pos) {
            Some(b'}') | None => return Vec::new(),
            Some(b',') => {
                pos += 1;
                continue;
            }
            _ => {}
        }
        let Some((key, next)) = parse_json_string(bytes, pos) else {
            return Vec::new();
        };
        pos = skip_ws(bytes, next);
        if bytes.get(pos) != Some(&b':') {
            return Vec::new();
        }
        pos = skip_ws(bytes, pos + 1);

        if key == "properties" {
            return object_key_order(bytes, pos);
        }
        let Some(next) = skip_json_value(bytes, pos) else {
            return Vec::new();
        };
        pos = next;
    }
}

/// Reads the keys of the object starting at `pos`, in order.
fn object_key_order(bytes: &[u8], mut pos: usize) -> Vec<String> {
    if bytes.get(pos) != Some(&b'{') {
        return Vec::new();
    }
    pos += 1;
    let mut keys = Vec::new();
    loop {
        pos = skip_ws(bytes, pos);
        match bytes.get(pos) {
            Some(b'}') | None => return keys,
            Some(b',') => {
                pos += 1;
                continue;
            }
            _ => {}
        }
        let Some((key, next)) = parse_json_string(bytes, pos) else {
            return keys;
        };
        keys.push(key);
        pos = skip_ws(bytes, next);
        if bytes.get(pos) != Some(&b':') {
            return keys;
        }
        pos = skip_ws(bytes, pos + 1);
        let Some(next) = skip_json_value(bytes, pos) else {
            return keys;
        };
        pos = next;
    }
}

#[inline]
fn skip_ws(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t' | b'\n' | b'\r') {
        pos += 1;
    }
    pos
}

/// Parses the JSON string at `pos`, returning its unescaped value and the
/// index just past the closing quote.
fn parse_json_string(bytes: &[u8], pos: usize) -> Option<(String, usize)> {
    if bytes.get(pos) != Some(&b'"') {
        return None;
    }
    let start = pos + 1;
    let mut i = start;
    let mut escaped = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                escaped = true;
                i += 2;
            }
            b'"' => {
                let raw = std::str::from_utf8(&bytes[pos..=i]).ok()?;
                let value = if escaped {
                    serde_json::from_str::<String>(raw).ok()?
                } else {
                    raw[1..raw.len() - 1].to_string()
                };
                return Some((value, i + 1));
            }
            _ => i += 1,
        }
    }
    None
}

/// Skips one JSON value starting at `pos`, returning the index just past it.
fn skip_json_value(bytes: &[u8], pos: usize) -> Option<usize> {
    match bytes.get(pos)? {
        b'"' => parse_json_string(bytes, pos).map(|(_, next)| next),
        b'{' | b'[' => {
            let mut depth = 0usize;
            let mut i = pos;
            while i < bytes.len() {
                match bytes[i] {
                    b'"' => {
                        let (_, next) = parse_json_string(bytes, i)?;
                        i = next;
                        continue;
                    }
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some(i + 1);
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            None
        }
        _ => {
            // number, true, false, null
            let mut i = pos;
            while i < bytes.len() && !matches!(bytes[i], b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r') {
                i += 1;
            }
            Some(i)
        }
    }
}
