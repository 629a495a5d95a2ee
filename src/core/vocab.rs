//! Vocabulary parsing for the tiktoken BPE format.
//!
//! Each line of a vocabulary file carries one merge: a base64-encoded byte
//! sequence, a space, and the decimal rank. Lower ranks merge first. Blank
//! lines are skipped; anything else malformed is a fatal error carrying the
//! 1-based line number.
//!
//! ```text
//! SGVsbG8= 0
//! V29ybGQ= 1
//! IQ== 2
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

/// Merge pairs in file order: `(bytes, rank)`.
pub type VocabPairs = Vec<(Vec<u8>, u32)>;

/// Errors raised while acquiring or parsing a vocabulary.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("invalid base64 at line {line}: {source}")]
    Base64 {
        line: usize,
        source: base64::DecodeError,
    },
    #[error("invalid vocabulary line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("vocabulary download failed: {0}")]
    Download(String),
    #[error("vocabulary checksum mismatch: got {got}, want {want}")]
    ChecksumMismatch { got: String, want: String },
    #[error("vocabulary file missing and offline mode is set: {0}")]
    Offline(String),
}

/// Parses tiktoken-format vocabulary data into merge pairs.
pub fn parse_tiktoken(data: &[u8]) -> Result<VocabPairs, VocabError> {
    let mut pairs = Vec::with_capacity(data.len() / 12);

    for (idx, line) in data.split(|&b| b == b'\n').enumerate() {
        let line_no = idx + 1;
        let line = match line.last() {
            Some(b'\r') => &line[..line.len() - 1],
            _ => line,
        };
        if line.is_empty() {
            continue;
        }

        let space = line
            .iter()
            .position(|&b| b == b' ')
            .filter(|&p| p > 0)
            .ok_or_else(|| VocabError::Parse {
                line: line_no,
                reason: "missing space separator".to_string(),
            })?;

        let token = STANDARD
            .decode(&line[..space])
            .map_err(|source| VocabError::Base64 {
                line: line_no,
                source,
            })?;

        let rank_str =
            std::str::from_utf8(&line[space + 1..]).map_err(|_| VocabError::Parse {
                line: line_no,
                reason: "rank is not valid UTF-8".to_string(),
            })?;
        let rank: u32 = rank_str.trim().parse().map_err(|_| VocabError::Parse {
            line: line_no,
            reason: format!("invalid rank {rank_str:?}"),
        })?;

        pairs.push((token, rank));
    }

    Ok(pairs)
}

/// Reads and parses a tiktoken vocabulary file from disk.
pub fn load_tiktoken_file(path: &std::path::Path) -> Result<VocabPairs, VocabError> {
    let data = std::fs::read(path)?;
    parse_tiktoken(&data)
}
