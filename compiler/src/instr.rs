/*!
This module defines the instructions executed by the matching engine, along
with the code buffer used to emit sequences of them.

Instruction encoding format
---------------------------

A compiled program is a flat sequence of 32-bit words. Every instruction
starts with an opcode word, followed by zero or more operand words. Operands
are codepoints ([`Opcode::Literal`]), table selectors ([`Opcode::At`],
[`Opcode::Category`]), mark slot or group numbers ([`Opcode::Mark`],
[`Opcode::Backref`]), or skip counts.

A skip count is the length in words of the sub-program it brackets, measured
from the word holding the count itself. It lets the engine step over a
sub-program without decoding it: when a skip count sits at address `a`, the
first word after the sub-program is at `a + skip`. Skip counts are emitted as
zero placeholders and backpatched once the bracketed sub-program has been
written; see [`CodeSeq::reserve`] and [`CodeSeq::patch`].

Sub-program layouts:

```text
IN        skip  item...  FAILURE                ; skip lands after FAILURE
REPEAT    skip  min  max  body...  SUCCESS      ; also MIN_REPEAT, REPEAT_ONE
ASSERT    skip  body...  SUCCESS                ; also ASSERT_NOT, CALL
BRANCH    ( skip  alt...  JUMP  skip )*  0      ; each alternative's leading
                                                ; skip lands on the next
                                                ; alternative's skip; the
                                                ; terminating zero word is
                                                ; the FAILURE encoding
INFO      skip  bits  min  max  n  prefix[n]  overlap[n]
```

The numeric opcode values are a private contract between this compiler and
the engine it is paired with; both sides of one build must agree exactly, but
nothing outside the build may rely on them.
*/

use std::fmt;
use std::fmt::Formatter;

use crate::tree::{Anchor, Category, Flags};
use crate::UNBOUNDED;

/// Instructions understood by the matching engine.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Failure = 0x00,
    Success = 0x01,
    Any = 0x02,
    Assert = 0x03,
    AssertNot = 0x04,
    At = 0x05,
    Backref = 0x06,
    BackrefIgnore = 0x07,
    Branch = 0x08,
    Call = 0x09,
    Category = 0x0a,
    In = 0x0b,
    InIgnore = 0x0c,
    Info = 0x0d,
    Jump = 0x0e,
    Literal = 0x0f,
    LiteralIgnore = 0x10,
    Mark = 0x11,
    MinRepeat = 0x12,
    Negate = 0x13,
    NotLiteral = 0x14,
    NotLiteralIgnore = 0x15,
    Range = 0x16,
    Repeat = 0x17,
    RepeatOne = 0x18,
}

impl Opcode {
    const FAILURE: u32 = Opcode::Failure as u32;
    const SUCCESS: u32 = Opcode::Success as u32;
    const ANY: u32 = Opcode::Any as u32;
    const ASSERT: u32 = Opcode::Assert as u32;
    const ASSERT_NOT: u32 = Opcode::AssertNot as u32;
    const AT: u32 = Opcode::At as u32;
    const BACKREF: u32 = Opcode::Backref as u32;
    const BACKREF_IGNORE: u32 = Opcode::BackrefIgnore as u32;
    const BRANCH: u32 = Opcode::Branch as u32;
    const CALL: u32 = Opcode::Call as u32;
    const CATEGORY: u32 = Opcode::Category as u32;
    const IN: u32 = Opcode::In as u32;
    const IN_IGNORE: u32 = Opcode::InIgnore as u32;
    const INFO: u32 = Opcode::Info as u32;
    const JUMP: u32 = Opcode::Jump as u32;
    const LITERAL: u32 = Opcode::Literal as u32;
    const LITERAL_IGNORE: u32 = Opcode::LiteralIgnore as u32;
    const MARK: u32 = Opcode::Mark as u32;
    const MIN_REPEAT: u32 = Opcode::MinRepeat as u32;
    const NEGATE: u32 = Opcode::Negate as u32;
    const NOT_LITERAL: u32 = Opcode::NotLiteral as u32;
    const NOT_LITERAL_IGNORE: u32 = Opcode::NotLiteralIgnore as u32;
    const RANGE: u32 = Opcode::Range as u32;
    const REPEAT: u32 = Opcode::Repeat as u32;
    const REPEAT_ONE: u32 = Opcode::RepeatOne as u32;

    /// Returns the variant of this opcode that folds case at match time.
    ///
    /// Opcodes without a case-folding twin are returned unchanged.
    pub fn folding(self) -> Opcode {
        match self {
            Opcode::Literal => Opcode::LiteralIgnore,
            Opcode::NotLiteral => Opcode::NotLiteralIgnore,
            Opcode::In => Opcode::InIgnore,
            Opcode::Backref => Opcode::BackrefIgnore,
            opcode => opcode,
        }
    }

    /// Selects between this opcode and its case-folding twin according to
    /// the given flag set.
    pub fn for_flags(self, flags: Flags) -> Opcode {
        if flags.contains(Flags::IGNORE_CASE) {
            self.folding()
        } else {
            self
        }
    }
}

/// Operand of [`Opcode::At`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorCode {
    Start = 0x00,
    StartLine = 0x01,
    StartString = 0x02,
    Boundary = 0x03,
    NonBoundary = 0x04,
    End = 0x05,
    EndLine = 0x06,
    EndString = 0x07,
}

const ANCHOR_NAMES: [&str; 8] = [
    "START",
    "START_LINE",
    "START_STRING",
    "BOUNDARY",
    "NON_BOUNDARY",
    "END",
    "END_LINE",
    "END_STRING",
];

/// Returns the encoding for an anchor node.
///
/// `^` and `$` have one encoding in single-line mode and a distinct one in
/// multi-line mode; string anchors and word boundaries are mode-independent.
pub fn anchor_code(anchor: Anchor, multi_line: bool) -> AnchorCode {
    match (anchor, multi_line) {
        (Anchor::Start, false) => AnchorCode::Start,
        (Anchor::Start, true) => AnchorCode::StartLine,
        (Anchor::End, false) => AnchorCode::End,
        (Anchor::End, true) => AnchorCode::EndLine,
        (Anchor::StartOfString, _) => AnchorCode::StartString,
        (Anchor::EndOfString, _) => AnchorCode::EndString,
        (Anchor::WordBoundary, _) => AnchorCode::Boundary,
        (Anchor::NotWordBoundary, _) => AnchorCode::NonBoundary,
    }
}

/// Operand of [`Opcode::Category`], selecting one of the engine's
/// classification tables.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryCode {
    Digit = 0x00,
    NotDigit = 0x01,
    Space = 0x02,
    NotSpace = 0x03,
    Word = 0x04,
    NotWord = 0x05,
    Linebreak = 0x06,
    NotLinebreak = 0x07,
    LocWord = 0x08,
    LocNotWord = 0x09,
    UniDigit = 0x0a,
    UniNotDigit = 0x0b,
    UniSpace = 0x0c,
    UniNotSpace = 0x0d,
    UniWord = 0x0e,
    UniNotWord = 0x0f,
    UniLinebreak = 0x10,
    UniNotLinebreak = 0x11,
}

const CATEGORY_NAMES: [&str; 18] = [
    "DIGIT",
    "NOT_DIGIT",
    "SPACE",
    "NOT_SPACE",
    "WORD",
    "NOT_WORD",
    "LINEBREAK",
    "NOT_LINEBREAK",
    "LOC_WORD",
    "LOC_NOT_WORD",
    "UNI_DIGIT",
    "UNI_NOT_DIGIT",
    "UNI_SPACE",
    "UNI_NOT_SPACE",
    "UNI_WORD",
    "UNI_NOT_WORD",
    "UNI_LINEBREAK",
    "UNI_NOT_LINEBREAK",
];

/// Returns the encoding for a character category under the given flags.
///
/// Three parallel tables exist in the engine. [`Flags::LOCALE`] swaps the
/// word categories for their locale-dependent twins and leaves the rest
/// alone, as locale does not re-define digits, spaces or line breaks.
/// [`Flags::UNICODE`] swaps every category. Locale wins when both are set.
pub fn category_code(category: Category, flags: Flags) -> CategoryCode {
    if flags.contains(Flags::LOCALE) {
        match category {
            Category::Word => CategoryCode::LocWord,
            Category::NotWord => CategoryCode::LocNotWord,
            other => plain_category_code(other),
        }
    } else if flags.contains(Flags::UNICODE) {
        match category {
            Category::Digit => CategoryCode::UniDigit,
            Category::NotDigit => CategoryCode::UniNotDigit,
            Category::Space => CategoryCode::UniSpace,
            Category::NotSpace => CategoryCode::UniNotSpace,
            Category::Word => CategoryCode::UniWord,
            Category::NotWord => CategoryCode::UniNotWord,
            Category::Linebreak => CategoryCode::UniLinebreak,
            Category::NotLinebreak => CategoryCode::UniNotLinebreak,
        }
    } else {
        plain_category_code(category)
    }
}

fn plain_category_code(category: Category) -> CategoryCode {
    match category {
        Category::Digit => CategoryCode::Digit,
        Category::NotDigit => CategoryCode::NotDigit,
        Category::Space => CategoryCode::Space,
        Category::NotSpace => CategoryCode::NotSpace,
        Category::Word => CategoryCode::Word,
        Category::NotWord => CategoryCode::NotWord,
        Category::Linebreak => CategoryCode::Linebreak,
        Category::NotLinebreak => CategoryCode::NotLinebreak,
    }
}

/// A growable sequence of code words for the matching engine.
#[derive(Default)]
pub(crate) struct CodeSeq {
    words: Vec<u32>,
}

/// A reservation for a skip slot in a [`CodeSeq`].
///
/// Obtained from [`CodeSeq::reserve`] and consumed, exactly once, by
/// [`CodeSeq::patch`]. The ticket is moved into `patch`, so it cannot be
/// redeemed twice, and it cannot be silently dropped either.
#[must_use = "a reserved skip slot must be patched"]
pub(crate) struct PatchSlot {
    index: usize,
}

impl CodeSeq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of words emitted so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Appends one word at the end of the sequence.
    #[inline]
    pub fn emit(&mut self, word: u32) {
        self.words.push(word);
    }

    /// Appends an opcode at the end of the sequence.
    #[inline]
    pub fn emit_opcode(&mut self, opcode: Opcode) {
        self.words.push(opcode as u32);
    }

    /// Appends all the given words at the end of the sequence.
    pub fn extend<I: IntoIterator<Item = u32>>(&mut self, words: I) {
        self.words.extend(words);
    }

    /// Appends a zero placeholder for a skip count that is not known yet,
    /// returning the ticket that [`CodeSeq::patch`] redeems to fill it in.
    pub fn reserve(&mut self) -> PatchSlot {
        let index = self.words.len();
        self.words.push(0);
        PatchSlot { index }
    }

    /// Fills a reserved slot with the distance, in words, from the slot to
    /// the current end of the sequence.
    ///
    /// Must be called only after every word of the sub-program the slot
    /// brackets has been emitted; the engine adds the stored count to the
    /// slot's address to step over the sub-program.
    pub fn patch(&mut self, slot: PatchSlot) {
        debug_assert_eq!(
            self.words[slot.index], 0,
            "skip slot written before being patched"
        );
        self.words[slot.index] = (self.words.len() - slot.index) as u32;
    }

    /// Consumes the sequence, returning the emitted words.
    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.words
    }
}

#[inline]
fn word(code: &[u32], pc: usize) -> u32 {
    code.get(pc).copied().unwrap_or(0)
}

/// Writes a listing of the given program.
///
/// Addresses are word indexes; skip counts are resolved to the absolute
/// address they land on, so a listing doubles as a check that every skip
/// steps onto an instruction boundary.
pub(crate) fn disassemble(code: &[u32], f: &mut Formatter<'_>) -> fmt::Result {
    writeln!(f)?;
    disassemble_range(code, 0, code.len(), f)
}

fn disassemble_range(
    code: &[u32],
    mut pc: usize,
    end: usize,
    f: &mut Formatter<'_>,
) -> fmt::Result {
    while pc < end {
        let addr = pc;
        match word(code, pc) {
            Opcode::FAILURE => {
                writeln!(f, "{:05x}: FAILURE", addr)?;
                pc += 1;
            }
            Opcode::SUCCESS => {
                writeln!(f, "{:05x}: SUCCESS", addr)?;
                pc += 1;
            }
            Opcode::ANY => {
                writeln!(f, "{:05x}: ANY", addr)?;
                pc += 1;
            }
            Opcode::NEGATE => {
                writeln!(f, "{:05x}: NEGATE", addr)?;
                pc += 1;
            }
            opcode @ (Opcode::LITERAL
            | Opcode::LITERAL_IGNORE
            | Opcode::NOT_LITERAL
            | Opcode::NOT_LITERAL_IGNORE) => {
                let name = match opcode {
                    Opcode::LITERAL => "LITERAL",
                    Opcode::LITERAL_IGNORE => "LITERAL_IGNORE",
                    Opcode::NOT_LITERAL => "NOT_LITERAL",
                    _ => "NOT_LITERAL_IGNORE",
                };
                writeln!(f, "{:05x}: {} {:#04x}", addr, name, word(code, pc + 1))?;
                pc += 2;
            }
            Opcode::RANGE => {
                writeln!(
                    f,
                    "{:05x}: RANGE {:#04x} {:#04x}",
                    addr,
                    word(code, pc + 1),
                    word(code, pc + 2)
                )?;
                pc += 3;
            }
            Opcode::AT => {
                let at = word(code, pc + 1) as usize;
                let name = ANCHOR_NAMES.get(at).unwrap_or(&"?");
                writeln!(f, "{:05x}: AT {}", addr, name)?;
                pc += 2;
            }
            Opcode::CATEGORY => {
                let cat = word(code, pc + 1) as usize;
                let name = CATEGORY_NAMES.get(cat).unwrap_or(&"?");
                writeln!(f, "{:05x}: CATEGORY {}", addr, name)?;
                pc += 2;
            }
            Opcode::MARK => {
                writeln!(f, "{:05x}: MARK {}", addr, word(code, pc + 1))?;
                pc += 2;
            }
            opcode @ (Opcode::BACKREF | Opcode::BACKREF_IGNORE) => {
                let name = match opcode {
                    Opcode::BACKREF => "BACKREF",
                    _ => "BACKREF_IGNORE",
                };
                writeln!(f, "{:05x}: {} {}", addr, name, word(code, pc + 1))?;
                pc += 2;
            }
            Opcode::JUMP => {
                let target = pc + 1 + word(code, pc + 1) as usize;
                writeln!(f, "{:05x}: JUMP {:05x}", addr, target)?;
                pc += 2;
            }
            opcode @ (Opcode::IN | Opcode::IN_IGNORE) => {
                let name = match opcode {
                    Opcode::IN => "IN",
                    _ => "IN_IGNORE",
                };
                // The class items that follow decode as ordinary
                // instructions, up to the terminating FAILURE.
                let target = pc + 1 + word(code, pc + 1) as usize;
                writeln!(f, "{:05x}: {} {:05x}", addr, name, target)?;
                pc += 2;
            }
            opcode @ (Opcode::REPEAT | Opcode::MIN_REPEAT | Opcode::REPEAT_ONE) => {
                let name = match opcode {
                    Opcode::REPEAT => "REPEAT",
                    Opcode::MIN_REPEAT => "MIN_REPEAT",
                    _ => "REPEAT_ONE",
                };
                let target = pc + 1 + word(code, pc + 1) as usize;
                let min = word(code, pc + 2);
                let max = word(code, pc + 3);
                write!(f, "{:05x}: {} {:05x} {} ", addr, name, target, min)?;
                if max == UNBOUNDED {
                    writeln!(f, "inf")?;
                } else {
                    writeln!(f, "{}", max)?;
                }
                pc += 4;
            }
            opcode @ (Opcode::ASSERT | Opcode::ASSERT_NOT | Opcode::CALL) => {
                let name = match opcode {
                    Opcode::ASSERT => "ASSERT",
                    Opcode::ASSERT_NOT => "ASSERT_NOT",
                    _ => "CALL",
                };
                let target = pc + 1 + word(code, pc + 1) as usize;
                writeln!(f, "{:05x}: {} {:05x}", addr, name, target)?;
                pc += 2;
            }
            Opcode::INFO => {
                let target = pc + 1 + word(code, pc + 1) as usize;
                let bits = word(code, pc + 2);
                let min = word(code, pc + 3);
                let max = word(code, pc + 4);
                let n = word(code, pc + 5) as usize;
                let prefix = code.get(pc + 6..pc + 6 + n).unwrap_or(&[]);
                let overlap = code.get(pc + 6 + n..target).unwrap_or(&[]);
                write!(f, "{:05x}: INFO {:05x} flags={:#x} min={} max=", addr, target, bits, min)?;
                if max == UNBOUNDED {
                    write!(f, "inf")?;
                } else {
                    write!(f, "{}", max)?;
                }
                write!(f, " prefix=[")?;
                for (i, c) in prefix.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:#04x}", c)?;
                }
                write!(f, "] overlap=[")?;
                for (i, v) in overlap.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                writeln!(f, "]")?;
                pc = target.max(pc + 1);
            }
            Opcode::BRANCH => {
                writeln!(f, "{:05x}: BRANCH", addr)?;
                pc += 1;
                // Every alternative starts with a skip landing on the next
                // alternative's skip; a zero word ends the list.
                while pc < end {
                    let skip = word(code, pc) as usize;
                    if skip == 0 {
                        writeln!(f, "{:05x}: FAILURE", pc)?;
                        pc += 1;
                        break;
                    }
                    writeln!(f, "{:05x}: ALT {:05x}", pc, pc + skip)?;
                    disassemble_range(code, pc + 1, pc + skip, f)?;
                    pc += skip;
                }
            }
            unknown => {
                writeln!(f, "{:05x}: DW {:#010x}", addr, unknown)?;
                pc += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Anchor, Category, Flags};

    #[test]
    fn patch_stores_distance_to_end() {
        let mut code = CodeSeq::new();
        code.emit_opcode(Opcode::Literal);
        code.emit(0x61);
        let slot = code.reserve();
        code.emit(1);
        code.emit(2);
        code.emit(3);
        code.patch(slot);
        // Three words lie between the slot and the end, plus the slot
        // itself: stepping 4 words from the slot lands past the block.
        assert_eq!(code.as_slice(), &[Opcode::Literal as u32, 0x61, 4, 1, 2, 3]);
    }

    #[test]
    fn folding_twins() {
        assert_eq!(Opcode::Literal.folding(), Opcode::LiteralIgnore);
        assert_eq!(Opcode::NotLiteral.folding(), Opcode::NotLiteralIgnore);
        assert_eq!(Opcode::In.folding(), Opcode::InIgnore);
        assert_eq!(Opcode::Backref.folding(), Opcode::BackrefIgnore);
        // No twin: returned unchanged.
        assert_eq!(Opcode::Any.folding(), Opcode::Any);
        assert_eq!(Opcode::Literal.for_flags(Flags::empty()), Opcode::Literal);
        assert_eq!(
            Opcode::Literal.for_flags(Flags::IGNORE_CASE),
            Opcode::LiteralIgnore
        );
    }

    #[test]
    fn anchor_codes_follow_multi_line() {
        assert_eq!(anchor_code(Anchor::Start, false), AnchorCode::Start);
        assert_eq!(anchor_code(Anchor::Start, true), AnchorCode::StartLine);
        assert_eq!(anchor_code(Anchor::End, false), AnchorCode::End);
        assert_eq!(anchor_code(Anchor::End, true), AnchorCode::EndLine);
        // String anchors and word boundaries ignore the flag.
        assert_eq!(
            anchor_code(Anchor::StartOfString, true),
            AnchorCode::StartString
        );
        assert_eq!(anchor_code(Anchor::EndOfString, true), AnchorCode::EndString);
        assert_eq!(anchor_code(Anchor::WordBoundary, true), AnchorCode::Boundary);
        assert_eq!(
            anchor_code(Anchor::NotWordBoundary, true),
            AnchorCode::NonBoundary
        );
    }

    #[test]
    fn category_codes_follow_flags() {
        assert_eq!(
            category_code(Category::Digit, Flags::empty()),
            CategoryCode::Digit
        );
        assert_eq!(
            category_code(Category::Digit, Flags::UNICODE),
            CategoryCode::UniDigit
        );
        // Locale only re-defines the word categories.
        assert_eq!(
            category_code(Category::Word, Flags::LOCALE),
            CategoryCode::LocWord
        );
        assert_eq!(
            category_code(Category::Digit, Flags::LOCALE),
            CategoryCode::Digit
        );
        // Locale wins over unicode when both are set.
        assert_eq!(
            category_code(Category::Word, Flags::LOCALE | Flags::UNICODE),
            CategoryCode::LocWord
        );
        assert_eq!(
            category_code(Category::NotWord, Flags::LOCALE | Flags::UNICODE),
            CategoryCode::LocNotWord
        );
    }
}
