//! Core tokenization engine.
//!
//! This module contains the O200k BPE tokenizer that backs the Harmony
//! encoding:
//!
//! - [`Tokenizer`]: main tokenizer struct with encode/decode API, LRU
//!   caching, and Aho-Corasick special-token matching
//! - [`bpe`]: low-level rank-driven byte-pair merge loop
//! - [`segmenter`]: the 7-rule O200k text splitter (no regex engine)
//! - [`vocab`]: tiktoken-format vocabulary parsing
//! - [`loader`]: vocabulary file acquisition (cache, offline, checksum)
//! - [`specials`]: the frozen Harmony special-token id table

pub mod bpe;
pub mod loader;
pub mod segmenter;
pub mod specials;
pub mod tokenizer;
pub mod vocab;

pub use bpe::{byte_pair_encode, byte_pair_encode_into};
pub use loader::load_o200k;
pub use segmenter::{O200kSegmenter, Segmenter};
pub use specials::harmony_special_tokens;
pub use tokenizer::{Tokenizer, TokenizerError};
pub use vocab::{load_tiktoken_file, parse_tiktoken, VocabError, VocabPairs};
