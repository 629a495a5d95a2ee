//! Rank-driven byte-pair merging.
//!
//! The merge loop operates on a list of cut positions into the piece rather
//! than on owned sub-slices: each entry records the start offset of a part
//! and the rank of merging it with its right neighbor. Merging removes the
//! right boundary and re-ranks the two affected neighbors through a
//! four-part lookup window. The loop ends when no adjacent pair has a rank
//! below the sentinel.

use rustc_hash::FxHashMap;
use std::cell::RefCell;

/// A cut position: byte offset where a part starts, and the rank of the
/// merge with the following part (`u32::MAX` when the pair is unknown).
#[derive(Debug, Clone, Copy)]
struct Part {
    start: usize,
    rank: u32,
}

const SENTINEL: u32 = u32::MAX;

thread_local! {
    // Merge working array, reused across calls on the same thread.
    static PARTS: RefCell<Vec<Part>> = const { RefCell::new(Vec::new()) };
}

#[inline]
fn pair_rank(ranks: &FxHashMap<Vec<u8>, u32>, piece: &[u8], parts: &[Part], i: usize) -> u32 {
    if i + 3 < parts.len() {
        ranks
            .get(&piece[parts[i].start..parts[i + 3].start])
            .copied()
            .unwrap_or(SENTINEL)
    } else {
        SENTINEL
    }
}

/// Encodes `piece` into token ranks, appending to `out`.
///
/// Every single byte of the piece must be present in `ranks` (true for any
/// complete BPE vocabulary); unknown single bytes are skipped.
pub fn byte_pair_encode_into(piece: &[u8], ranks: &FxHashMap<Vec<u8>, u32>, out: &mut Vec<u32>) {
    if piece.len() == 1 {
        out.extend(ranks.get(piece).copied());
        return;
    }
    PARTS.with(|cell| {
        let mut parts = cell.borrow_mut();
        byte_pair_merge(piece, ranks, &mut parts);
        out.reserve(parts.len().saturating_sub(1));
        for w in 0..parts.len().saturating_sub(1) {
            out.extend(
                ranks
                    .get(&piece[parts[w].start..parts[w + 1].start])
                    .copied(),
            );
        }
    });
}

/// Convenience wrapper returning a fresh token vector.
pub fn byte_pair_encode(piece: &[u8], ranks: &FxHashMap<Vec<u8>, u32>) -> Vec<u32> {
    let mut out = Vec::new();
    byte_pair_encode_into(piece, ranks, &mut out);
    out
}

fn byte_pair_merge(piece: &[u8], ranks: &FxHashMap<Vec<u8>, u32>, parts: &mut Vec<Part>) {
    parts.clear();
    parts.reserve(piece.len() + 2);

    // Seed with the rank of every adjacent byte pair, tracking the minimum.
    let mut min_rank = (SENTINEL, usize::MAX);
    for i in 0..piece.len() - 1 {
        let rank = ranks.get(&piece[i..i + 2]).copied().unwrap_or(SENTINEL);
        if rank < min_rank.0 {
            min_rank = (rank, i);
        }
        parts.push(Part { start: i, rank });
    }
    parts.push(Part {
        start: piece.len() - 1,
        rank: SENTINEL,
    });
    parts.push(Part {
        start: piece.len(),
        rank: SENTINEL,
    });

    while min_rank.0 != SENTINEL {
        let i = min_rank.1;
        // Re-rank the neighbors of the merged pair, then drop the right
        // boundary of the pair.
        if i > 0 {
            parts[i - 1].rank = pair_rank(ranks, piece, parts, i - 1);
        }
        parts[i].rank = pair_rank(ranks, piece, parts, i);
        parts.remove(i + 1);

        min_rank = (SENTINEL, usize::MAX);
        for (j, part) in parts[..parts.len() - 1].iter().enumerate() {
            if part.rank < min_rank.0 {
                min_rank = (part.rank, j);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranks(entries: &[(&[u8], u32)]) -> FxHashMap<Vec<u8>, u32> {
        entries.iter().map(|(b, r)| (b.to_vec(), *r)).collect()
    }

    fn byte_ranks() -> FxHashMap<Vec<u8>, u32> {
        (0u8..=255).map(|b| (vec![b], b as u32)).collect()
    }

    #[test]
    fn test_single_byte() {
        let r = byte_ranks();
        assert_eq!(byte_pair_encode(b"a", &r), vec![b'a' as u32]);
    }

    #[test]
    fn test_no_merges_yields_bytes() {
        let r = byte_ranks();
        assert_eq!(
            byte_pair_encode(b"abc", &r),
            vec![b'a' as u32, b'b' as u32, b'c' as u32]
        );
    }

    #[test]
    fn test_lowest_rank_merges_first() {
        let mut r = byte_ranks();
        r.extend(ranks(&[(b"ab", 256), (b"bc", 257), (b"abc", 258)]));
        // "ab" (256) beats "bc" (257); the merged "ab"+"c" pair then
        // resolves through the whole-piece lookup to 258.
        assert_eq!(byte_pair_encode(b"abc", &r), vec![258]);
    }

    #[test]
    fn test_merge_order_is_rank_driven() {
        let mut r = byte_ranks();
        r.extend(ranks(&[(b"bc", 256), (b"ab", 257)]));
        // "bc" merges first, leaving "a" + "bc" with no further pair.
        assert_eq!(byte_pair_encode(b"abc", &r), vec![b'a' as u32, 256]);
    }

    #[test]
    fn test_append_into_preserves_existing() {
        let r = byte_ranks();
        let mut out = vec![7];
        byte_pair_encode_into(b"hi", &r, &mut out);
        assert_eq!(out, vec![7, b'h' as u32, b'i' as u32]);
    }
}
