//! Incremental parser for Harmony token streams.
//!
//! The parser is fed one token id at a time and drives a three-state
//! machine (`ExpectStart` -> `Header` -> `Content`) that reconstructs
//! structured messages from format markers. During `Content` every decoded
//! token is also exposed as a single-token delta, which is what streaming
//! front-ends print.
//!
//! A parser is single-use and owned by one caller; after an error it
//! refuses further tokens.

use crate::core::specials::{TOK_CALL, TOK_END, TOK_MESSAGE, TOK_RETURN, TOK_START};
use crate::error::{HarmonyError, Result};
use crate::harmony::encoding::Encoding;
use crate::harmony::header::{
    detect_role_and_author, extract_channel, extract_recipient, normalize_header,
    scrub_content_type, split_leading_token,
};
use crate::harmony::types::{Author, Content, Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ExpectStart,
    Header,
    Content,
}

impl State {
    fn label(&self) -> &'static str {
        match self {
            State::ExpectStart => "ExpectStart",
            State::Header => "Header",
            State::Content => "Content",
        }
    }
}

/// Streaming Harmony parser over a shared [`Encoding`].
pub struct StreamParser<'a> {
    encoding: &'a Encoding,
    role_hint: Option<Role>,
    state: State,
    poisoned: bool,
    tokens: Vec<u32>,
    messages: Vec<Message>,
    header_tokens: Vec<u32>,
    content_tokens: Vec<u32>,
    last_delta: Vec<u8>,
    scratch: Vec<u8>,
}

impl<'a> StreamParser<'a> {
    /// Creates a parser. With a role hint the parser starts in `Header`,
    /// accepting a header that arrives without a leading `<|start|>`.
    pub fn new(encoding: &'a Encoding, role_hint: Option<Role>) -> Self {
        let state = if role_hint.is_some() {
            State::Header
        } else {
            State::ExpectStart
        };
        Self {
            encoding,
            role_hint,
            state,
            poisoned: false,
            tokens: Vec::new(),
            messages: Vec::new(),
            header_tokens: Vec::new(),
            content_tokens: Vec::new(),
            last_delta: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Consumes a single token and advances the state machine.
    pub fn process(&mut self, token: u32) -> Result<()> {
        if self.poisoned {
            return Err(HarmonyError::Parse(
                "parser cannot be reused after an error".to_string(),
            ));
        }
        let result = self.process_inner(token);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn process_inner(&mut self, token: u32) -> Result<()> {
        self.tokens.push(token);
        match self.state {
            State::ExpectStart => {
                if token == TOK_START {
                    self.header_tokens.clear();
                    self.state = State::Header;
                    return Ok(());
                }
                Err(HarmonyError::Parse(format!(
                    "unexpected token {token} while expecting <|start|>"
                )))
            }
            State::Header => {
                if token == TOK_START {
                    // A stray start is tolerated only while the initial
                    // role-hinted header is still pending.
                    if self.role_hint.is_some() {
                        return Ok(());
                    }
                    return Err(HarmonyError::Parse(
                        "unexpected <|start|> inside a message header".to_string(),
                    ));
                }
                if token == TOK_MESSAGE {
                    let message = self.parse_header()?;
                    self.role_hint = None;
                    self.content_tokens.clear();
                    self.messages.push(message);
                    self.state = State::Content;
                    return Ok(());
                }
                self.header_tokens.push(token);
                Ok(())
            }
            State::Content => {
                if matches!(token, TOK_END | TOK_RETURN | TOK_CALL) {
                    self.finalize_message()?;
                    self.state = State::ExpectStart;
                    return Ok(());
                }
                self.content_tokens.push(token);
                self.scratch.clear();
                self.encoding
                    .tokenizer()
                    .decode_bytes_into(&[token], &mut self.scratch)
                    .map_err(|e| HarmonyError::Parse(format!("content token: {e}")))?;
                self.last_delta.clear();
                self.last_delta.extend_from_slice(&self.scratch);
                Ok(())
            }
        }
    }

    /// Flushes buffered content and finalizes the in-flight message, if any.
    pub fn process_eos(&mut self) -> Result<()> {
        if self.poisoned {
            return Err(HarmonyError::Parse(
                "parser cannot be reused after an error".to_string(),
            ));
        }
        if self.state == State::Content {
            let result = self.finalize_message();
            if result.is_err() {
                self.poisoned = true;
            }
            return result;
        }
        Ok(())
    }

    fn finalize_message(&mut self) -> Result<()> {
        let Some(message) = self.messages.last_mut() else {
            return Ok(());
        };
        let text = self.encoding.tokenizer().decode_utf8(&self.content_tokens)?;
        message.content = vec![Content::Text { text }];
        self.header_tokens.clear();
        self.content_tokens.clear();
        Ok(())
    }

    fn parse_header(&mut self) -> Result<Message> {
        let decoded = self
            .encoding
            .tokenizer()
            .decode_utf8(&self.header_tokens)
            .map_err(|e| HarmonyError::Parse(format!("message header: {e}")))?;
        let header = normalize_header(&decoded);
        let (role_token, remainder) = split_leading_token(&header);

        let (detected_role, detected_name) = detect_role_and_author(role_token, remainder);
        let role = self.role_hint.unwrap_or(detected_role);

        Ok(Message {
            author: Author {
                role,
                name: detected_name,
            },
            recipient: extract_recipient(&header),
            content: Vec::new(),
            channel: extract_channel(&header),
            content_type: scrub_content_type(remainder),
        })
    }

    /// All fully parsed messages so far.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Consumes the parser, returning the parsed messages.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Every token fed to the parser, in order.
    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    /// The current state as a JSON object, for interop and debugging.
    pub fn state_json(&self) -> String {
        format!("{{\"state\":\"{}\"}}", self.state.label())
    }

    /// Role of the in-flight message, falling back to the role hint before
    /// a header has been parsed.
    pub fn current_role(&self) -> Option<Role> {
        match self.state {
            State::Content => self.messages.last().map(|m| m.author.role),
            _ => self.role_hint,
        }
    }

    /// Channel of the in-flight message, if any.
    pub fn current_channel(&self) -> Option<&str> {
        if self.state != State::Content {
            return None;
        }
        self.messages.last().and_then(|m| m.channel.as_deref())
    }

    /// Recipient of the in-flight message, if any.
    pub fn current_recipient(&self) -> Option<&str> {
        if self.state != State::Content {
            return None;
        }
        self.messages.last().and_then(|m| m.recipient.as_deref())
    }

    /// Content type of the in-flight message, if any.
    pub fn current_content_type(&self) -> Option<&str> {
        if self.state != State::Content {
            return None;
        }
        self.messages.last().and_then(|m| m.content_type.as_deref())
    }

    /// Text accumulated so far for the in-flight message.
    pub fn current_content(&self) -> String {
        if self.state != State::Content {
            return String::new();
        }
        self.encoding
            .tokenizer()
            .decode_utf8(&self.content_tokens)
            .unwrap_or_default()
    }

    /// The most recently decoded single-token fragment.
    pub fn last_content_delta(&self) -> String {
        String::from_utf8_lossy(&self.last_delta).into_owned()
    }
}
