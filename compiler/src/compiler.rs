/*!
This module provides a compiler that takes a parsed [`Pattern`] and produces
a program for the backtracking matching engine.

Compiling is a single depth-first walk of the pattern tree. Each node lowers
to a short run of instructions; constructs whose extent is not known until
their body has been emitted (classes, repeats, assertions, alternation
branches) reserve a skip slot up front and patch it afterwards. The emitted
program is prefixed by an info block (see [`crate::info`]) and closed with a
final `SUCCESS`.
*/

#[cfg(feature = "logging")]
use log::*;
#[cfg(feature = "logging")]
use std::time::Instant;

use std::fmt::{Display, Formatter};

use rustc_hash::FxHashMap;

use crate::errors::Error;
use crate::instr::{anchor_code, category_code, disassemble, CodeSeq, Opcode};
use crate::tree::{Category, ClassItem, Flags, Node, Pattern, RepeatKind};
use crate::{info, width, UNBOUNDED};

/// Default limit on the number of capture groups per pattern.
///
/// This is an engine capability, not a property of the code format; engines
/// that reserve more mark slots can raise it through
/// [`Compiler::max_capture_groups`].
pub const DEFAULT_MAX_CAPTURE_GROUPS: u32 = 100;

/// Skip counts and code addresses must fit in a code word.
const MAX_CODE_WORDS: usize = u32::MAX as usize;

/// Compiles parsed patterns into programs for the matching engine.
///
/// ```
/// use retrace_compiler::{Compiler, Flags, Node, Pattern};
///
/// let pattern = Pattern::new(vec![Node::Literal('a' as u32), Node::Any]);
/// let program = Compiler::new().compile(&pattern, Flags::empty()).unwrap();
/// assert_eq!(program.group_count(), 0);
/// ```
pub struct Compiler {
    max_capture_groups: u32,
    repeat_one: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            max_capture_groups: DEFAULT_MAX_CAPTURE_GROUPS,
            repeat_one: true,
        }
    }

    /// Sets the maximum number of capture groups accepted per pattern.
    ///
    /// Defaults to [`DEFAULT_MAX_CAPTURE_GROUPS`].
    pub fn max_capture_groups(mut self, max: u32) -> Self {
        self.max_capture_groups = max;
        self
    }

    /// If true, a greedy repeat whose body consumes exactly one symbol is
    /// compiled to the specialized `REPEAT_ONE` instruction, which the
    /// engine runs without pushing a backtracking frame per iteration.
    /// When false every repeat uses the generic form. Enabled by default.
    pub fn use_repeat_one(mut self, yes: bool) -> Self {
        self.repeat_one = yes;
        self
    }

    /// Compiles `pattern`, merging `flags` into the flags the pattern
    /// already carries.
    pub fn compile(
        &self,
        pattern: &Pattern,
        flags: Flags,
    ) -> Result<Program, Error> {
        #[cfg(feature = "logging")]
        let start = Instant::now();

        let flags = pattern.flags | flags;

        let mut code = CodeSeq::new();
        info::emit(&mut code, &pattern.nodes, flags);
        self.emit_seq(&mut code, &pattern.nodes, flags)?;
        code.emit_opcode(Opcode::Success);

        if pattern.group_count > self.max_capture_groups {
            return Err(Error::GroupLimitExceeded {
                groups: pattern.group_count,
                max: self.max_capture_groups,
            });
        }

        if code.len() > MAX_CODE_WORDS {
            return Err(Error::TooLarge);
        }

        #[cfg(feature = "logging")]
        debug!(
            "compiled pattern to {} words in {:?}",
            code.len(),
            Instant::elapsed(&start)
        );

        Ok(Program {
            code: code.into_words(),
            flags,
            group_count: pattern.group_count,
            group_names: pattern.group_names.clone(),
            source: pattern.source.clone(),
        })
    }

    /// Emits a sequence of nodes. Concatenation is implicit in the linear
    /// layout of the code; there is no instruction for it.
    pub(crate) fn emit_seq(
        &self,
        code: &mut CodeSeq,
        nodes: &[Node],
        flags: Flags,
    ) -> Result<(), Error> {
        for node in nodes {
            self.emit_node(code, node, flags)?;
        }
        Ok(())
    }

    fn emit_node(
        &self,
        code: &mut CodeSeq,
        node: &Node,
        flags: Flags,
    ) -> Result<(), Error> {
        match node {
            Node::Literal(c) => {
                code.emit_opcode(Opcode::Literal.for_flags(flags));
                code.emit(fixup(*c, flags));
            }
            Node::NotLiteral(c) => {
                code.emit_opcode(Opcode::NotLiteral.for_flags(flags));
                code.emit(fixup(*c, flags));
            }
            Node::Class(items) => self.emit_class(code, items, flags),
            Node::Any => {
                // Without DOT_ALL the dot must still refuse to cross line
                // boundaries, which is a category test, not a true "any".
                if flags.contains(Flags::DOT_ALL) {
                    code.emit_opcode(Opcode::Any);
                } else {
                    code.emit_opcode(Opcode::Category);
                    code.emit(
                        category_code(Category::NotLinebreak, flags) as u32
                    );
                }
            }
            Node::Repeat { min, max, kind, body } => {
                self.emit_repeat(code, *min, *max, *kind, body, flags)?;
            }
            Node::Group { index, body } => {
                if let Some(group) = index {
                    code.emit_opcode(Opcode::Mark);
                    code.emit((group - 1) * 2);
                }
                self.emit_seq(code, body, flags)?;
                if let Some(group) = index {
                    code.emit_opcode(Opcode::Mark);
                    code.emit((group - 1) * 2 + 1);
                }
            }
            Node::Branch(alternatives) => {
                self.emit_branch(code, alternatives, flags)?;
            }
            Node::Assert { negate, body } => {
                code.emit_opcode(if *negate {
                    Opcode::AssertNot
                } else {
                    Opcode::Assert
                });
                let skip = code.reserve();
                self.emit_seq(code, body, flags)?;
                code.emit_opcode(Opcode::Success);
                code.patch(skip);
            }
            Node::Call(body) => {
                code.emit_opcode(Opcode::Call);
                let skip = code.reserve();
                self.emit_seq(code, body, flags)?;
                code.emit_opcode(Opcode::Success);
                code.patch(skip);
            }
            Node::At(anchor) => {
                code.emit_opcode(Opcode::At);
                code.emit(anchor_code(
                    *anchor,
                    flags.contains(Flags::MULTI_LINE),
                ) as u32);
            }
            Node::Category(category) => {
                code.emit_opcode(Opcode::Category);
                code.emit(category_code(*category, flags) as u32);
            }
            Node::Backref(group) => {
                code.emit_opcode(Opcode::Backref.for_flags(flags));
                code.emit(group - 1);
            }
            Node::Mark(slot) => {
                code.emit_opcode(Opcode::Mark);
                code.emit(*slot);
            }
            Node::Success => code.emit_opcode(Opcode::Success),
            Node::Failure => code.emit_opcode(Opcode::Failure),
        }
        Ok(())
    }

    /// A class compiles to a membership sub-program: one instruction per
    /// item, closed by FAILURE. An item that matches ends the test; falling
    /// through every item fails the class as a whole.
    fn emit_class(&self, code: &mut CodeSeq, items: &[ClassItem], flags: Flags) {
        code.emit_opcode(Opcode::In.for_flags(flags));
        let skip = code.reserve();
        for item in items {
            match item {
                ClassItem::Negate => code.emit_opcode(Opcode::Negate),
                ClassItem::Literal(c) => {
                    code.emit_opcode(Opcode::Literal);
                    code.emit(fixup(*c, flags));
                }
                ClassItem::Range(lo, hi) => {
                    code.emit_opcode(Opcode::Range);
                    code.emit(fixup(*lo, flags));
                    code.emit(fixup(*hi, flags));
                }
                ClassItem::Category(category) => {
                    code.emit_opcode(Opcode::Category);
                    code.emit(category_code(*category, flags) as u32);
                }
            }
        }
        code.emit_opcode(Opcode::Failure);
        code.patch(skip);
    }

    fn emit_repeat(
        &self,
        code: &mut CodeSeq,
        min: u32,
        max: Option<u32>,
        kind: RepeatKind,
        body: &[Node],
        flags: Flags,
    ) -> Result<(), Error> {
        // Checked before anything is emitted, so a failed compilation
        // leaves no trace of the subtree in the buffer.
        let body_width = width::of_seq(body);
        if body_width.0 == 0 {
            return Err(Error::NothingToRepeat);
        }

        // Template repeats must re-enter the exact bracketed sub-match, so
        // they always take the generic instruction.
        let opcode = if flags.contains(Flags::TEMPLATE)
            || kind == RepeatKind::Template
        {
            Opcode::Repeat
        } else if kind == RepeatKind::Lazy {
            Opcode::MinRepeat
        } else if self.repeat_one && body_width == (1, 1) {
            Opcode::RepeatOne
        } else {
            Opcode::Repeat
        };

        code.emit_opcode(opcode);
        let skip = code.reserve();
        code.emit(min);
        code.emit(max.unwrap_or(UNBOUNDED));
        self.emit_seq(code, body, flags)?;
        code.emit_opcode(Opcode::Success);
        code.patch(skip);
        Ok(())
    }

    fn emit_branch(
        &self,
        code: &mut CodeSeq,
        alternatives: &[Vec<Node>],
        flags: Flags,
    ) -> Result<(), Error> {
        code.emit_opcode(Opcode::Branch);
        let mut tails = Vec::with_capacity(alternatives.len());
        for alternative in alternatives {
            // The leading skip of each alternative lands on the next
            // alternative's skip, so the engine can walk the list; the
            // trailing jump, patched below, lands on the shared
            // continuation past the terminator.
            let skip = code.reserve();
            self.emit_seq(code, alternative, flags)?;
            code.emit_opcode(Opcode::Jump);
            tails.push(code.reserve());
            code.patch(skip);
        }
        code.emit_opcode(Opcode::Failure);
        for tail in tails {
            code.patch(tail);
        }
        Ok(())
    }
}

/// Folds the case of a codepoint at compile time, when the flags call for
/// it.
///
/// Under LOCALE the stored codepoint is left untouched; the engine owns the
/// locale tables and folds at match time.
fn fixup(c: u32, flags: Flags) -> u32 {
    if !flags.contains(Flags::IGNORE_CASE) || flags.contains(Flags::LOCALE) {
        return c;
    }
    if flags.contains(Flags::UNICODE) {
        match char::from_u32(c) {
            Some(ch) => {
                let mut lower = ch.to_lowercase();
                match (lower.next(), lower.next()) {
                    // Multi-codepoint lowerings can't be stored in a single
                    // operand; those fold at match time instead.
                    (Some(l), None) => l as u32,
                    _ => c,
                }
            }
            None => c,
        }
    } else if c < 0x80 {
        (c as u8).to_ascii_lowercase() as u32
    } else {
        c
    }
}

/// A compiled pattern, ready to be executed by the matching engine.
///
/// Holds the program words together with the metadata the engine needs at
/// match time: the resolved flag set, the number of capture groups and the
/// group name table. Immutable once built.
///
/// The `Display` implementation renders a listing of the program, mostly
/// useful in tests and while debugging the compiler itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    code: Vec<u32>,
    flags: Flags,
    group_count: u32,
    group_names: FxHashMap<String, u32>,
    source: Option<String>,
}

impl Program {
    /// The program words.
    #[inline]
    pub fn code(&self) -> &[u32] {
        &self.code
    }

    /// The flags the pattern was compiled with, pattern-intrinsic and
    /// caller-supplied ones merged.
    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Number of capture groups in the pattern.
    #[inline]
    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    /// Maps group names to group numbers.
    #[inline]
    pub fn group_names(&self) -> &FxHashMap<String, u32> {
        &self.group_names
    }

    /// The original pattern text, if the parser provided it.
    #[inline]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        disassemble(&self.code, f)
    }
}
