/*!
Types describing a parsed pattern.

The Retrace parser turns the textual form of a regular expression into a
tree of [`Node`], together with pattern-level metadata like the number of
capture groups and the mapping from group names to group numbers. The
compiler consumes this tree as-is; node operands (codepoints, repeat bounds,
anchor and category tags) are already validated by the parser and are never
re-checked here.
*/

use bitflags::bitflags;
use rustc_hash::FxHashMap;

bitflags! {
    /// Flags that modify how a pattern is compiled and matched.
    ///
    /// A pattern carries the flags that appeared in its source (inline
    /// `(?i)`-style groups are resolved by the parser); additional flags can
    /// be merged in when calling [`crate::Compiler::compile`].
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        /// Case-insensitive matching.
        const IGNORE_CASE = 0x0001;
        /// `^` and `$` match at line boundaries, not only at the start and
        /// end of the subject.
        const MULTI_LINE = 0x0002;
        /// `.` also matches line breaks.
        const DOT_ALL = 0x0004;
        /// Unicode character categories instead of the ASCII ones.
        const UNICODE = 0x0008;
        /// Locale-dependent character categories and case folding.
        const LOCALE = 0x0010;
        /// The pattern is a replacement template; repeats compile to their
        /// re-entrant form.
        const TEMPLATE = 0x0020;
    }
}

/// Greediness of a repeat node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatKind {
    /// Match as many repetitions as possible.
    Greedy,
    /// Match as few repetitions as possible.
    Lazy,
    /// Re-entrant verbatim form, used for repeats inside replacement
    /// templates. Always compiles to the generic repeat instruction.
    Template,
}

/// Position assertions that consume no input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `^`. Start of subject, or start of line under
    /// [`Flags::MULTI_LINE`].
    Start,
    /// `$`. End of subject, or end of line under [`Flags::MULTI_LINE`].
    End,
    /// `\A`. Start of subject, regardless of flags.
    StartOfString,
    /// `\z`. End of subject, regardless of flags.
    EndOfString,
    /// `\b`.
    WordBoundary,
    /// `\B`.
    NotWordBoundary,
}

/// Character categories such as `\d` or `\w`.
///
/// The compiler only selects which classification table the matching engine
/// consults (ASCII, locale or Unicode, depending on the pattern flags); the
/// tables themselves live in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Digit,
    NotDigit,
    Space,
    NotSpace,
    Word,
    NotWord,
    Linebreak,
    NotLinebreak,
}

/// One entry of a character class (`[...]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassItem {
    /// Negates the whole class. The parser always puts this first.
    Negate,
    /// A single codepoint.
    Literal(u32),
    /// An inclusive codepoint range.
    Range(u32, u32),
    /// A character category, e.g. the `\d` in `[0-9a-f\d]`.
    Category(Category),
}

/// A single node of a pattern tree.
///
/// Concatenation has no node of its own; it is expressed by sequences
/// (`Vec<Node>`) wherever a node has a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Matches exactly the given codepoint.
    Literal(u32),
    /// Matches any codepoint except the given one.
    NotLiteral(u32),
    /// A character class.
    Class(Vec<ClassItem>),
    /// `.`
    Any,
    /// A quantifier. `max` is `None` for unbounded repeats like `a*`.
    Repeat { min: u32, max: Option<u32>, kind: RepeatKind, body: Vec<Node> },
    /// A parenthesized subpattern. `index` is `None` for non-capturing
    /// groups; capturing groups are numbered starting at 1.
    Group { index: Option<u32>, body: Vec<Node> },
    /// An alternation; each member is one alternative, tried in order.
    Branch(Vec<Vec<Node>>),
    /// A zero-width lookahead; `negate` selects negative lookahead.
    Assert { negate: bool, body: Vec<Node> },
    /// A subroutine call to an inline subpattern.
    Call(Vec<Node>),
    /// A position assertion.
    At(Anchor),
    /// A character category outside a class, e.g. a bare `\w`.
    Category(Category),
    /// A backreference to an earlier capture group.
    Backref(u32),
    /// Records the current subject position in the given mark slot.
    Mark(u32),
    /// Succeeds unconditionally.
    Success,
    /// Fails unconditionally.
    Failure,
}

/// A parsed pattern, as handed over by the parser.
///
/// The compiler treats this as read-only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pattern {
    /// Top-level sequence of nodes.
    pub nodes: Vec<Node>,
    /// Flags that appeared in the pattern source.
    pub flags: Flags,
    /// Number of capture groups in the pattern.
    pub group_count: u32,
    /// Maps group names to group numbers.
    pub group_names: FxHashMap<String, u32>,
    /// The original pattern text, kept for diagnostics.
    pub source: Option<String>,
}

impl Pattern {
    /// Creates a pattern with the given top-level sequence and no flags,
    /// groups or source text.
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes, ..Self::default() }
    }
}
