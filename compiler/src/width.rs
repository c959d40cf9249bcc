/*!
Computes how many input symbols a pattern can consume.

The result is a `(min, max)` pair, with [`UNBOUNDED`] standing in for "no
upper bound". The bounds are used in two places: the emitter refuses to
compile a quantifier whose body has a minimum width of zero, and the info
block reports the bounds to the matching engine so it can discard candidate
start positions that don't leave enough input for a match.
*/

use crate::tree::Node;
use crate::UNBOUNDED;

/// Returns the minimum and maximum number of input symbols the given
/// sequence can consume. Arithmetic saturates at [`UNBOUNDED`].
pub(crate) fn of_seq(nodes: &[Node]) -> (u32, u32) {
    let mut min: u32 = 0;
    let mut max: u32 = 0;
    for node in nodes {
        let (lo, hi) = of_node(node);
        min = min.saturating_add(lo);
        max = max.saturating_add(hi);
    }
    (min, max)
}

pub(crate) fn of_node(node: &Node) -> (u32, u32) {
    match node {
        Node::Literal(_) | Node::NotLiteral(_) | Node::Class(_) | Node::Any => {
            (1, 1)
        }
        // Zero-width: anchors, categories, marks and assertions constrain
        // the current position without consuming anything.
        Node::At(_)
        | Node::Category(_)
        | Node::Mark(_)
        | Node::Assert { .. }
        | Node::Success
        | Node::Failure => (0, 0),
        Node::Group { body, .. } | Node::Call(body) => of_seq(body),
        Node::Repeat { min, max, body, .. } => {
            let (lo, hi) = of_seq(body);
            (
                lo.saturating_mul(*min),
                hi.saturating_mul(max.unwrap_or(UNBOUNDED)),
            )
        }
        Node::Branch(alternatives) => alternatives
            .iter()
            .map(|alt| of_seq(alt))
            .reduce(|(min, max), (lo, hi)| (min.min(lo), max.max(hi)))
            .unwrap_or((0, 0)),
        // The length of the referenced group is not known statically.
        Node::Backref(_) => (0, UNBOUNDED),
    }
}
