//! System message body builder.
//!
//! Assembles the plain-text system block: model identity and dates,
//! reasoning effort, the tools section, and the channel line. Sections are
//! separated by exactly one blank line; the result is BPE-encoded as
//! ordinary text by the caller.

use super::render_tools::write_tools_section;
use super::types::{ChannelConfig, SystemContent};

const DEFAULT_MODEL_IDENTITY: &str =
    "You are ChatGPT, a large language model trained by OpenAI.";
const DEFAULT_KNOWLEDGE_CUTOFF: &str = "2024-06";

fn begin_section(body: &mut String) {
    if !body.is_empty() {
        body.push_str("\n\n");
    }
}

pub(crate) fn render_system_content(
    sys: &SystemContent,
    conversation_has_function_tools: bool,
) -> String {
    let mut body = String::new();

    let identity = sys
        .model_identity
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_MODEL_IDENTITY);
    let cutoff = sys
        .knowledge_cutoff
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_KNOWLEDGE_CUTOFF);

    begin_section(&mut body);
    body.push_str(identity);
    body.push('\n');
    body.push_str("Knowledge cutoff: ");
    body.push_str(cutoff);
    if let Some(date) = sys
        .conversation_start_date
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        body.push('\n');
        body.push_str("Current date: ");
        body.push_str(date);
    }

    let effort = sys
        .reasoning_effort
        .map(|e| e.as_str())
        .unwrap_or("medium");
    begin_section(&mut body);
    body.push_str("Reasoning: ");
    body.push_str(effort);

    if !sys.tools.is_empty() {
        begin_section(&mut body);
        write_tools_section(&mut body, &sys.tools);
    }

    let default_channels;
    let channel_config = match &sys.channel_config {
        Some(cfg) => cfg,
        None => {
            default_channels = ChannelConfig::require_channels();
            &default_channels
        }
    };
    if !channel_config.valid_channels.is_empty() {
        begin_section(&mut body);
        body.push_str("# Valid channels: ");
        body.push_str(&channel_config.valid_channels.join(", "));
        body.push('.');
        if channel_config.channel_required {
            body.push_str(" Channel must be included for every message.");
        }
        if conversation_has_function_tools {
            body.push_str(
                "\nCalls to these tools must go to the commentary channel: 'functions'.",
            );
        }
    }

    body
}
