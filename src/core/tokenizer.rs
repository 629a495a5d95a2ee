//! Main tokenizer interface for the O200k BPE vocabulary.
//!
//! The tokenizer owns the forward map (bytes -> rank), a rank-indexed
//! decoder store, the special-token tables, and the segmenter that drives
//! ordinary encoding. Construction happens once; afterwards the tokenizer
//! is shared read-only between renderers and parsers.

use aho_corasick::AhoCorasick;
use lru::LruCache;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use thiserror::Error;

use super::bpe::byte_pair_encode_into;
use super::segmenter::Segmenter;
use super::vocab::{VocabError, VocabPairs};

/// Errors from tokenizer construction, encoding, and decoding.
#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("invalid token for decoding: {0}")]
    InvalidToken(u32),
    #[error("decoding error: invalid UTF-8")]
    InvalidUtf8,
    #[error("special token matcher build error: {0}")]
    SpecialMatcher(#[from] aho_corasick::BuildError),
}

/// Default size of the LRU cache for merged segments.
const DEFAULT_CACHE_SIZE: usize = 4096;

/// BPE tokenizer with special-token support.
///
/// - Ordinary encoding walks the segmenter and merges each segment by rank.
/// - Special-aware encoding recognizes the longest special literal first
///   (Aho-Corasick, leftmost-longest) and emits its fixed id directly.
/// - Decoding resolves ids through the rank store or the special table;
///   unknown ids are an error.
/// - An LRU cache keyed by segment bytes skips repeated merge work.
pub struct Tokenizer {
    encoder: FxHashMap<Vec<u8>, u32>,
    decoder: Vec<Option<Box<[u8]>>>,
    special_tokens: FxHashMap<String, u32>,
    special_decoder: FxHashMap<u32, Vec<u8>>,
    special_strings: Vec<String>,
    special_matcher: Option<AhoCorasick>,
    segmenter: Box<dyn Segmenter>,
    chunk_cache: Mutex<LruCache<u64, Vec<u32>>>,
}

impl Tokenizer {
    /// Builds a tokenizer from merge pairs, special tokens, and a segmenter.
    pub fn new(
        pairs: VocabPairs,
        special_tokens: FxHashMap<String, u32>,
        segmenter: Box<dyn Segmenter>,
    ) -> Result<Self, TokenizerError> {
        let max_rank = pairs.iter().map(|(_, r)| *r).max().unwrap_or(0);
        let mut decoder: Vec<Option<Box<[u8]>>> = vec![None; max_rank as usize + 1];
        let mut encoder = FxHashMap::default();
        encoder.reserve(pairs.len());
        for (bytes, rank) in pairs {
            let slot = &mut decoder[rank as usize];
            if slot.is_none() {
                *slot = Some(bytes.clone().into_boxed_slice());
            }
            encoder.entry(bytes).or_insert(rank);
        }

        let special_decoder: FxHashMap<u32, Vec<u8>> = special_tokens
            .iter()
            .map(|(s, &id)| (id, s.as_bytes().to_vec()))
            .collect();
        let special_strings: Vec<String> = special_tokens.keys().cloned().collect();
        // Anchored + leftmost-longest: the matcher reports the longest
        // special literal that is a prefix of the haystack.
        let special_matcher = if special_strings.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(aho_corasick::MatchKind::LeftmostLongest)
                    .start_kind(aho_corasick::StartKind::Anchored)
                    .build(&special_strings)?,
            )
        };

        let cache_size = NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap();
        Ok(Self {
            encoder,
            decoder,
            special_tokens,
            special_decoder,
            special_strings,
            special_matcher,
            segmenter,
            chunk_cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    #[inline]
    fn hash_slice(slice: &[u8]) -> u64 {
        let mut hasher = FxHasher::default();
        slice.hash(&mut hasher);
        hasher.finish()
    }

    /// Encodes one segment, consulting the exact-match fast path and the
    /// LRU cache before running the merge loop.
    fn encode_segment_into(&self, segment: &[u8], out: &mut Vec<u32>) {
        if let Some(&rank) = self.encoder.get(segment) {
            out.push(rank);
            return;
        }

        let hash = Self::hash_slice(segment);
        if let Ok(mut cache) = self.chunk_cache.lock() {
            if let Some(cached) = cache.get(&hash) {
                out.extend_from_slice(cached);
                return;
            }
        }

        let start = out.len();
        byte_pair_encode_into(segment, &self.encoder, out);

        if let Ok(mut cache) = self.chunk_cache.lock() {
            cache.put(hash, out[start..].to_vec());
        }
    }

    /// Encodes text without recognizing any special literal.
    pub fn encode_ordinary(&self, text: &str) -> Vec<u32> {
        let mut out = Vec::new();
        self.encode_ordinary_into(text, &mut out);
        out
    }

    /// Append-into variant of [`encode_ordinary`](Self::encode_ordinary).
    pub fn encode_ordinary_into(&self, text: &str, out: &mut Vec<u32>) {
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < text.len() {
            let mut end = self.segmenter.next(text, i);
            if end <= i {
                end = i + 1;
            }
            self.encode_segment_into(&bytes[i..end], out);
            i = end;
        }
    }

    /// Encodes text, emitting fixed ids for any special literal found in it.
    /// Longest literal wins when several match at the same position.
    pub fn encode_with_special_tokens(&self, text: &str) -> Vec<u32> {
        let mut out = Vec::new();
        self.encode_with_special_tokens_into(text, &mut out);
        out
    }

    /// Append-into variant of
    /// [`encode_with_special_tokens`](Self::encode_with_special_tokens).
    ///
    /// At every segment boundary the longest special literal that is a
    /// prefix of the remaining text wins; otherwise one ordinary segment
    /// is consumed.
    pub fn encode_with_special_tokens_into(&self, text: &str, out: &mut Vec<u32>) {
        let Some(matcher) = &self.special_matcher else {
            self.encode_ordinary_into(text, out);
            return;
        };

        let bytes = text.as_bytes();
        let mut i = 0;
        while i < text.len() {
            let input = aho_corasick::Input::new(&bytes[i..])
                .anchored(aho_corasick::Anchored::Yes);
            if let Some(m) = matcher.find(input) {
                let literal = &self.special_strings[m.pattern().as_usize()];
                if let Some(&id) = self.special_tokens.get(literal) {
                    out.push(id);
                    i += m.end();
                    continue;
                }
            }
            let mut end = self.segmenter.next(text, i);
            if end <= i {
                end = i + 1;
            }
            self.encode_segment_into(&bytes[i..end], out);
            i = end;
        }
    }

    /// Decodes token ids into raw bytes. Ids must resolve through either
    /// the rank store or the special table.
    pub fn decode_bytes(&self, tokens: &[u32]) -> Result<Vec<u8>, TokenizerError> {
        let mut out = Vec::with_capacity(tokens.len() * 4);
        self.decode_bytes_into(tokens, &mut out)?;
        Ok(out)
    }

    /// Append-into variant of [`decode_bytes`](Self::decode_bytes).
    pub fn decode_bytes_into(
        &self,
        tokens: &[u32],
        dst: &mut Vec<u8>,
    ) -> Result<(), TokenizerError> {
        for &token in tokens {
            if let Some(Some(bytes)) = self.decoder.get(token as usize) {
                dst.extend_from_slice(bytes);
            } else if let Some(special) = self.special_decoder.get(&token) {
                dst.extend_from_slice(special);
            } else {
                return Err(TokenizerError::InvalidToken(token));
            }
        }
        Ok(())
    }

    /// Decodes token ids into a UTF-8 string, failing when the accumulated
    /// bytes are not valid UTF-8.
    pub fn decode_utf8(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        let bytes = self.decode_bytes(tokens)?;
        String::from_utf8(bytes).map_err(|_| TokenizerError::InvalidUtf8)
    }

    /// Whether `id` is a registered special token.
    pub fn is_special_token(&self, id: u32) -> bool {
        self.special_decoder.contains_key(&id)
    }

    /// The id registered for a special literal, if any.
    pub fn special_token_id(&self, literal: &str) -> Option<u32> {
        self.special_tokens.get(literal).copied()
    }

    /// Total id range: max of ranks and special ids, plus one.
    pub fn vocab_size(&self) -> usize {
        let max_special = self.special_tokens.values().max().copied().unwrap_or(0);
        self.decoder.len().max(max_special as usize + 1)
    }

    /// Encodes many texts in parallel (ordinary path).
    pub fn encode_batch(&self, texts: &[String]) -> Vec<Vec<u32>> {
        texts.par_iter().map(|t| self.encode_ordinary(t)).collect()
    }

    /// Decodes many token lists in parallel.
    pub fn decode_batch(&self, token_lists: &[Vec<u32>]) -> Result<Vec<String>, TokenizerError> {
        token_lists
            .par_iter()
            .map(|tokens| self.decode_utf8(tokens))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::segmenter::O200kSegmenter;

    fn make_test_tokenizer() -> Tokenizer {
        let mut pairs: VocabPairs = (0u8..=255).map(|b| (vec![b], b as u32)).collect();
        pairs.push((b"Hello".to_vec(), 300));
        pairs.push((b"He".to_vec(), 301));
        pairs.push((b"ll".to_vec(), 302));
        pairs.push((b"llo".to_vec(), 303));

        let mut specials = FxHashMap::default();
        specials.insert("<|endoftext|>".to_string(), 50256);
        specials.insert("<|end|>".to_string(), 50257);

        Tokenizer::new(pairs, specials, Box::new(O200kSegmenter::new())).unwrap()
    }

    #[test]
    fn test_exact_segment_fast_path() {
        let tok = make_test_tokenizer();
        assert_eq!(tok.encode_ordinary("Hello"), vec![300]);
    }

    #[test]
    fn test_merge_path_roundtrip() {
        let tok = make_test_tokenizer();
        let tokens = tok.encode_ordinary("Hey llamas!");
        assert_eq!(tok.decode_utf8(&tokens).unwrap(), "Hey llamas!");
    }

    #[test]
    fn test_specials_ignored_by_ordinary_encoding() {
        let tok = make_test_tokenizer();
        let tokens = tok.encode_ordinary("<|endoftext|>");
        assert!(!tokens.contains(&50256));
        assert_eq!(tok.decode_utf8(&tokens).unwrap(), "<|endoftext|>");
    }

    #[test]
    fn test_encode_with_special_tokens() {
        let tok = make_test_tokenizer();
        let tokens = tok.encode_with_special_tokens("Hello<|endoftext|>!");
        assert_eq!(tokens, vec![300, 50256, b'!' as u32]);
    }

    #[test]
    fn test_longest_special_wins() {
        // "<|end|>" is a prefix of no other literal here, but
        // "<|endoftext|>" contains "<|end|>"-like text; leftmost-longest
        // must pick the full literal.
        let tok = make_test_tokenizer();
        let tokens = tok.encode_with_special_tokens("<|endoftext|>");
        assert_eq!(tokens, vec![50256]);
    }

    #[test]
    fn test_decode_special_tokens() {
        let tok = make_test_tokenizer();
        assert_eq!(tok.decode_utf8(&[50256]).unwrap(), "<|endoftext|>");
    }

    #[test]
    fn test_unknown_token_is_error() {
        let tok = make_test_tokenizer();
        let err = tok.decode_bytes(&[999_999]).unwrap_err();
        assert!(matches!(err, TokenizerError::InvalidToken(999_999)));
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let tok = make_test_tokenizer();
        // 0xFF alone is never valid UTF-8.
        let err = tok.decode_utf8(&[0xFF]).unwrap_err();
        assert!(matches!(err, TokenizerError::InvalidUtf8));
    }

    #[test]
    fn test_append_into_variants() {
        let tok = make_test_tokenizer();
        let mut out = vec![1];
        tok.encode_ordinary_into("Hi", &mut out);
        assert_eq!(out[0], 1);
        let mut bytes = b"x".to_vec();
        tok.decode_bytes_into(&out[1..], &mut bytes).unwrap();
        assert_eq!(bytes, b"xHi");
    }

    #[test]
    fn test_empty_input() {
        let tok = make_test_tokenizer();
        assert!(tok.encode_ordinary("").is_empty());
        assert_eq!(tok.decode_utf8(&[]).unwrap(), "");
    }

    #[test]
    fn test_batch_matches_individual() {
        let tok = make_test_tokenizer();
        let texts = vec!["Hello".to_string(), "world".to_string()];
        let batch = tok.encode_batch(&texts);
        for (text, tokens) in texts.iter().zip(&batch) {
            assert_eq!(&tok.encode_ordinary(text), tokens);
        }
    }
}
