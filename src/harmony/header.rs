//! Pure string helpers for decoded message headers.
//!
//! A header is the decoded UTF-8 between `<|start|>` and `<|message|>`,
//! e.g. `assistant to=functions.get_weather<|channel|>commentary
//! <|constrain|>json`. These helpers split it into role, author name,
//! channel, recipient, and content type without touching the tokenizer.

use super::types::Role;

const CHANNEL_MARKER: &str = "<|channel|>";
const CONSTRAIN_MARKER: &str = "<|constrain|>";

/// Inserts a space before meta markers that may sit flush against the
/// preceding token, so whitespace splitting is reliable.
pub(crate) fn normalize_header(s: &str) -> String {
    let mut s = s.to_string();
    if s.contains(CHANNEL_MARKER) {
        s = s
            .replace(CHANNEL_MARKER, &format!(" {CHANNEL_MARKER}"))
            .trim()
            .to_string();
    }
    if s.contains(CONSTRAIN_MARKER) {
        s = s
            .replace(CONSTRAIN_MARKER, &format!(" {CONSTRAIN_MARKER}"))
            .trim()
            .to_string();
    }
    s
}

/// Splits off the leading token (up to the first space or `<`) and returns
/// it with the trimmed remainder.
pub(crate) fn split_leading_token(s: &str) -> (&str, &str) {
    let stop = s.find([' ', '<']).unwrap_or(s.len());
    (&s[..stop], s[stop..].trim())
}

/// First token of `input` that is not a meta token (`to=...` or `<|...`).
fn next_value_token(input: &str) -> &str {
    let input = input.trim();
    if input.is_empty() {
        return "";
    }
    let end = input.find([' ', '<']).unwrap_or(input.len());
    let token = &input[..end];
    if token.starts_with("to=") || token.starts_with("<|") {
        ""
    } else {
        token
    }
}

/// Infers the role from the leading header token and recovers the author
/// name when present (alias `role:name`, or the tool id itself).
pub(crate) fn detect_role_and_author(role_token: &str, remainder: &str) -> (Role, Option<String>) {
    let known = [
        Role::User,
        Role::Assistant,
        Role::System,
        Role::Developer,
    ];
    let detected = known
        .into_iter()
        .find(|r| {
            role_token == r.as_str() || role_token.starts_with(&format!("{}:", r.as_str()))
        })
        .unwrap_or(Role::Tool);

    let name = if detected == Role::Tool {
        let name = if let Some(rest) = role_token.strip_prefix("tool:") {
            rest
        } else if role_token == Role::Tool.as_str() || role_token.is_empty() {
            next_value_token(remainder)
        } else {
            role_token
        };
        if name.is_empty() {
            next_value_token(remainder)
        } else {
            name
        }
    } else {
        role_token
            .strip_prefix(&format!("{}:", detected.as_str()))
            .unwrap_or("")
    };

    let name = if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    };
    (detected, name)
}

/// Channel name: the text between `<|channel|>` and the next space or end.
pub(crate) fn extract_channel(s: &str) -> Option<String> {
    let idx = s.find(CHANNEL_MARKER)?;
    let after = &s[idx + CHANNEL_MARKER.len()..];
    let end = after.find(' ').unwrap_or(after.len());
    let channel = &after[..end];
    if channel.is_empty() {
        None
    } else {
        Some(channel.to_string())
    }
}

/// Recipient: the text after ` to=` up to the next space or `<`.
pub(crate) fn extract_recipient(s: &str) -> Option<String> {
    let idx = s.find(" to=")?;
    let after = &s[idx + " to=".len()..];
    let end = after.find([' ', '<']).unwrap_or(after.len());
    let recipient = &after[..end];
    if recipient.is_empty() {
        None
    } else {
        Some(recipient.to_string())
    }
}

/// Content type: the remainder once role/alias prefixes, the `to=...`
/// segment, and all `<|channel|>...` annotations are stripped.
pub(crate) fn scrub_content_type(remainder: &str) -> Option<String> {
    let mut s = remainder.to_string();

    for role in ["assistant", "user", "system", "developer"] {
        if let Some(rest) = s.strip_prefix(role) {
            if let Some(named) = rest.strip_prefix(':') {
                s = match named.find(' ') {
                    Some(sp) => named[sp..].to_string(),
                    None => String::new(),
                };
            } else {
                s = rest.to_string();
            }
            break;
        }
    }

    if let Some(after) = s.strip_prefix("to=") {
        s = match after.find(' ') {
            Some(sp) => after[sp..].trim().to_string(),
            None => String::new(),
        };
    } else if let Some(idx) = s.find(" to=") {
        let before = &s[..idx];
        let after = &s[idx + " to=".len()..];
        s = match after.find(' ') {
            Some(sp) => format!("{before}{}", &after[sp..]).trim().to_string(),
            None => before.trim().to_string(),
        };
    }

    while let Some(idx) = s.find(CHANNEL_MARKER) {
        let after = &s[idx + CHANNEL_MARKER.len()..];
        s = match after.find(' ') {
            Some(sp) => format!("{}{}", &s[..idx], &after[sp..]).trim().to_string(),
            None => s[..idx].trim().to_string(),
        };
    }

    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
