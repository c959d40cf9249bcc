/*!
Builds the info block that precedes the compiled program.

The info block summarizes what the matching engine can know about a pattern
before running it: the minimum and maximum number of symbols a match can
consume, and the run of literal codepoints every match must start with, if
there is one. The engine uses the width bounds to discard start positions
too close to the end of the subject, and the literal prefix to scan for
candidate start positions without entering the backtracking loop at all.

When the prefix is non-empty the block also carries its overlap table (the
failure function of Knuth-Morris-Pratt searching), so that after a partial
prefix match the engine can advance by more than one symbol instead of
retrying every offset.
*/

use crate::instr::{CodeSeq, Opcode};
use crate::tree::{Flags, Node};
use crate::width;

/// Bit set in the info block's flag word when the whole pattern is exactly
/// its literal prefix, so a prefix hit is already a full match.
pub const INFO_LITERAL: u32 = 0x01;

/// Emits the info block for the given top-level sequence, if one is worth
/// emitting.
///
/// Patterns that can match the empty string get no info block: every
/// position is a candidate start, so there is nothing to pre-filter.
pub(crate) fn emit(code: &mut CodeSeq, nodes: &[Node], flags: Flags) {
    let (min, max) = width::of_seq(nodes);
    if min == 0 {
        return;
    }

    // A literal prefix is only usable when matching is case-sensitive;
    // under IGNORE_CASE the engine would have to fold every candidate,
    // which defeats the point of a cheap pre-scan.
    let mut prefix = Vec::new();
    if !flags.contains(Flags::IGNORE_CASE) {
        for node in nodes {
            match node {
                Node::Literal(c) => prefix.push(*c),
                _ => break,
            }
        }
    }

    code.emit_opcode(Opcode::Info);
    let skip = code.reserve();

    let literal_only = !prefix.is_empty() && prefix.len() == nodes.len();
    code.emit(if literal_only { INFO_LITERAL } else { 0 });
    code.emit(min);
    code.emit(max);
    code.emit(prefix.len() as u32);
    code.extend(prefix.iter().copied());
    if !prefix.is_empty() {
        code.extend(overlap_table(&prefix));
    }

    code.patch(skip);
}

/// Computes the overlap table for a literal prefix.
///
/// `table[i]` is the length of the longest proper suffix of `prefix[..=i]`
/// that is also a prefix of `prefix`. The table is built with one synthetic
/// `-1` head entry that never leaves this function.
pub(crate) fn overlap_table(prefix: &[u32]) -> Vec<u32> {
    let mut table = vec![-1i64; prefix.len() + 1];
    for i in 0..prefix.len() {
        let mut t = table[i] + 1;
        while t > 0 && prefix[i] != prefix[(t - 1) as usize] {
            t = table[(t - 1) as usize] + 1;
        }
        table[i + 1] = t;
    }
    table[1..].iter().map(|&t| t as u32).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn table(prefix: &str) -> Vec<u32> {
        let prefix: Vec<u32> = prefix.chars().map(|c| c as u32).collect();
        overlap_table(&prefix)
    }

    #[test]
    fn overlap_tables() {
        assert_eq!(table(""), vec![]);
        assert_eq!(table("a"), vec![0]);
        assert_eq!(table("aa"), vec![0, 1]);
        assert_eq!(table("abab"), vec![0, 0, 1, 2]);
        assert_eq!(table("aabaabaaa"), vec![0, 1, 0, 1, 2, 3, 4, 5, 2]);
    }

    #[test]
    fn overlap_entries_are_proper_borders() {
        // Cross-check against the definition: table[i] is the length of the
        // longest proper suffix of prefix[..=i] that is also a prefix.
        let prefix: Vec<u32> = "abracadabra".chars().map(|c| c as u32).collect();
        let table = overlap_table(&prefix);
        for (i, &t) in table.iter().enumerate() {
            let upto = &prefix[..=i];
            let longest = (0..=i)
                .rev()
                .find(|&k| upto[upto.len() - k..] == prefix[..k])
                .unwrap_or(0);
            assert_eq!(t as usize, longest, "at position {}", i);
        }
    }
}
