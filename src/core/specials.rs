//! Harmony special token table for the O200k vocabulary.
//!
//! The ids below are part of the public ABI of the format and never move.
//! Everything in 200014..=201088 is reserved and mapped by formula so the
//! decoder can always resolve an id in that range.

use rustc_hash::FxHashMap;

pub const TOK_START_OF_TEXT: u32 = 199998;
pub const TOK_END_OF_TEXT: u32 = 199999;
pub const TOK_RETURN: u32 = 200002;
pub const TOK_CONSTRAIN: u32 = 200003;
pub const TOK_CHANNEL: u32 = 200005;
pub const TOK_START: u32 = 200006;
pub const TOK_END: u32 = 200007;
pub const TOK_MESSAGE: u32 = 200008;
pub const TOK_CALL: u32 = 200012;

/// Reserved id range, mapped to `<|reserved_N|>` literals.
pub const RESERVED_START: u32 = 200014;
pub const RESERVED_END: u32 = 201088;

/// Builds the full Harmony special-token map, markers plus reserved range.
pub fn harmony_special_tokens() -> FxHashMap<String, u32> {
    let mut specials = FxHashMap::default();
    specials.insert("<|startoftext|>".to_string(), TOK_START_OF_TEXT);
    specials.insert("<|endoftext|>".to_string(), TOK_END_OF_TEXT);
    specials.insert("<|return|>".to_string(), TOK_RETURN);
    specials.insert("<|constrain|>".to_string(), TOK_CONSTRAIN);
    specials.insert("<|channel|>".to_string(), TOK_CHANNEL);
    specials.insert("<|start|>".to_string(), TOK_START);
    specials.insert("<|end|>".to_string(), TOK_END);
    specials.insert("<|message|>".to_string(), TOK_MESSAGE);
    specials.insert("<|call|>".to_string(), TOK_CALL);
    for id in RESERVED_START..=RESERVED_END {
        specials.insert(format!("<|reserved_{id}|>"), id);
    }
    specials
}
