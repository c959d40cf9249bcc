/*!
This crate compiles Retrace patterns into bytecode for the matching engine.

The Retrace parser turns pattern text into a tree of typed nodes (see
[`Pattern`] and [`Node`]); this crate lowers that tree into the linear
program of 32-bit words that the backtracking engine executes. The engine
itself lives in its own crate; the instruction encoding defined in [`instr`]
is the contract between the two, private to one build of the pair.

Lowering is a single recursive walk of the tree. Constructs whose extent is
only known after their body has been emitted (classes, repeats, lookaround,
alternation) reserve a placeholder word up front and backpatch it with the
length of the sub-program it brackets. The program is preceded by an info
block carrying the pattern's match-width bounds and literal prefix, which
the engine uses to skip start positions that cannot possibly match, and is
closed by a final `SUCCESS`.

```
use retrace_compiler::{Compiler, Flags, Node, Pattern, RepeatKind};

// The tree for `ab+`, as the parser would produce it.
let pattern = Pattern::new(vec![
    Node::Literal('a' as u32),
    Node::Repeat {
        min: 1,
        max: None,
        kind: RepeatKind::Greedy,
        body: vec![Node::Literal('b' as u32)],
    },
]);

let program = Compiler::new().compile(&pattern, Flags::empty()).unwrap();
```

Compilation is purely computational: no I/O, no shared mutable state, one
code buffer per call. Patterns can be compiled concurrently from any number
of threads.
*/

pub mod instr;

mod compiler;
mod errors;
mod info;
mod tree;
mod width;


pub use compiler::{Compiler, Program, DEFAULT_MAX_CAPTURE_GROUPS};
pub use errors::Error;
pub use info::INFO_LITERAL;
pub use tree::{
    Anchor, Category, ClassItem, Flags, Node, Pattern, RepeatKind,
};

/// Sentinel for "no upper bound" in width computations, repeat bounds and
/// the info block.
pub const UNBOUNDED: u32 = u32::MAX;
