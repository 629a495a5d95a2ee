//! Crate-level error type.

use thiserror::Error;

use crate::core::{TokenizerError, VocabError};

/// Errors surfaced by the Harmony encoding: vocabulary and decode failures
/// from the tokenizer core, invalid render input, and stream parse errors.
#[derive(Error, Debug)]
pub enum HarmonyError {
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<VocabError> for HarmonyError {
    fn from(err: VocabError) -> Self {
        HarmonyError::Tokenizer(TokenizerError::Vocab(err))
    }
}

pub type Result<T> = std::result::Result<T, HarmonyError>;
