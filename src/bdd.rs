use std::collections::HashMap;
use std::fmt::Write as _;

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

use crate::formula::{Formula, Kind, Node};

/// One slot of the output diagram. Slots 0 and 1 are the terminals with
/// self-loops; every other slot decides on `x<var>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BddNode {
    pub label: String,
    pub then_id: usize,
    pub else_id: usize,
    pub var: usize,
}

/// Compile a propositional formula into a reduced ordered BDD.
///
/// Returns the node array plus the root index. A formula that folds down to
/// a constant has root 0 or 1 and contributes no decision nodes, so the
/// caller can tell the degenerate case apart from a diagram rooted at the
/// last slot.
pub fn build(formula: &Formula) -> (Vec<BddNode>, usize) {
    let bump = Bump::new();
    let mut builder = Builder {
        nodes: vec![
            BddNode {
                label: "0".to_string(),
                then_id: 0,
                else_id: 0,
                var: 0,
            },
            BddNode {
                label: "1".to_string(),
                then_id: 1,
                else_id: 1,
                var: 0,
            },
        ],
        consed: HashMap::new(),
    };
    let root_nodes = BumpVec::from_iter_in(formula.nodes.iter().copied(), &bump);
    let root = builder.apply(
        &bump,
        Cofactor {
            nodes: root_nodes,
            next_var: 0,
        },
    );
    (builder.nodes, root)
}

/// A formula specialized under the assignments made so far. Node storage
/// lives in the per-build arena and is dropped wholesale with it.
struct Cofactor<'b> {
    nodes: BumpVec<'b, Node>,
    /// Next variable to decide on; assignments always proceed in ascending
    /// index order, which is what makes the diagram ordered.
    next_var: usize,
}

enum Restricted<'b> {
    /// The assignment folded the whole formula to a constant.
    Collapsed(bool),
    Formula(Cofactor<'b>),
}

/// Simplifier stack entry: a subformula either became a known constant or
/// survives as the (inclusive) node range it occupies.
#[derive(Clone, Copy)]
enum Seg {
    Subst(bool),
    Span(usize, usize),
}

struct Builder {
    nodes: Vec<BddNode>,
    /// Structural dedup keyed on `(then, else, var)`.
    consed: HashMap<(usize, usize, usize), usize>,
}

impl Builder {
    /// Shannon expansion: recurse on both cofactors of the current
    /// variable, collapse redundant decisions, and hash-cons the rest.
    fn apply<'b>(&mut self, bump: &'b Bump, cof: Cofactor<'b>) -> usize {
        if cof.nodes.len() == 1 {
            if let Kind::Const(value) = cof.nodes[0].kind {
                return value as usize;
            }
        }

        let var = cof.next_var;
        let then_id = match restrict(bump, &cof, true) {
            Restricted::Collapsed(value) => value as usize,
            Restricted::Formula(sub) => self.apply(bump, sub),
        };
        let else_id = match restrict(bump, &cof, false) {
            Restricted::Collapsed(value) => value as usize,
            Restricted::Formula(sub) => self.apply(bump, sub),
        };
        if then_id == else_id {
            return then_id;
        }
        match self.consed.get(&(then_id, else_id, var)) {
            Some(&existing) => existing,
            None => {
                self.nodes.push(BddNode {
                    label: format!("x{var}"),
                    then_id,
                    else_id,
                    var,
                });
                let fresh = self.nodes.len() - 1;
                self.consed.insert((then_id, else_id, var), fresh);
                fresh
            }
        }
    }
}

/// Substitute `x<next_var> := value` and fold constants in one forward pass.
///
/// Nodes end up in one of three camps: untouched, skipped (absorbed by a
/// constant operand, like the right side of `And(False, _)`), or rewritten
/// in place (`Xor(True, f)` and `Eq(False, f)` turn the operator into `Not`,
/// same for `Impl(f, False)`).
fn restrict<'b>(bump: &'b Bump, cof: &Cofactor<'b>, value: bool) -> Restricted<'b> {
    let target = cof.next_var as u32;
    let mut nodes = BumpVec::from_iter_in(cof.nodes.iter().copied(), bump);
    let mut skipped = bumpalo::vec![in bump; false; nodes.len()];
    let mut stack: Vec<Seg> = Vec::new();

    for i in 0..nodes.len() {
        match nodes[i].kind {
            Kind::Var(index) if index != target => stack.push(Seg::Span(i, i)),
            Kind::Var(_) => {
                stack.push(Seg::Subst(value));
                skipped[i] = true;
            }
            Kind::Const(constant) => {
                stack.push(Seg::Subst(constant));
                skipped[i] = true;
            }
            Kind::Not => match pop(&mut stack) {
                Seg::Subst(operand) => {
                    stack.push(Seg::Subst(!operand));
                    skipped[i] = true;
                }
                Seg::Span(start, _) => stack.push(Seg::Span(start, i)),
            },
            kind @ (Kind::And | Kind::Or | Kind::Xor | Kind::Impl | Kind::Eq) => {
                let arg2 = pop(&mut stack);
                let arg1 = pop(&mut stack);
                match (arg1, arg2) {
                    (Seg::Span(start, _), Seg::Span(..)) => stack.push(Seg::Span(start, i)),
                    (Seg::Subst(a), Seg::Subst(b)) => {
                        stack.push(Seg::Subst(fold(kind, a, b)));
                        skipped[i] = true;
                    }
                    _ if kind == Kind::Impl => {
                        // Non-commutative; the four antecedent/consequent
                        // cases each resolve differently.
                        match (arg1, arg2) {
                            (Seg::Subst(true), span) => {
                                skipped[i] = true;
                                stack.push(span);
                            }
                            (Seg::Subst(false), Seg::Span(start, end)) => {
                                for j in start..=end {
                                    skipped[j] = true;
                                }
                                skipped[i] = true;
                                stack.push(Seg::Subst(true));
                            }
                            (Seg::Span(start, end), Seg::Subst(true)) => {
                                for j in start..=end {
                                    skipped[j] = true;
                                }
                                skipped[i] = true;
                                stack.push(Seg::Subst(true));
                            }
                            (Seg::Span(start, _), Seg::Subst(false)) => {
                                nodes[i].kind = Kind::Not;
                                stack.push(Seg::Span(start, i));
                            }
                            (Seg::Subst(..), Seg::Subst(..)) | (Seg::Span(..), Seg::Span(..)) => {
                                unreachable!("mixed case handled above")
                            }
                        }
                    }
                    _ => {
                        // Commutative: normalize so the constant is on the
                        // left, then absorb or rewrite.
                        let (constant, span) = match (arg1, arg2) {
                            (Seg::Subst(c), span) => (c, span),
                            (span, Seg::Subst(c)) => (c, span),
                            _ => unreachable!("one operand is constant here"),
                        };
                        let Seg::Span(start, end) = span else {
                            unreachable!("one operand survives here")
                        };
                        match kind {
                            Kind::And => {
                                if constant {
                                    skipped[i] = true;
                                    stack.push(span);
                                } else {
                                    for j in start..=end {
                                        skipped[j] = true;
                                    }
                                    skipped[i] = true;
                                    stack.push(Seg::Subst(false));
                                }
                            }
                            Kind::Or => {
                                if constant {
                                    for j in start..=end {
                                        skipped[j] = true;
                                    }
                                    skipped[i] = true;
                                    stack.push(Seg::Subst(true));
                                } else {
                                    skipped[i] = true;
                                    stack.push(span);
                                }
                            }
                            Kind::Xor => {
                                if constant {
                                    nodes[i].kind = Kind::Not;
                                    stack.push(Seg::Span(start, i));
                                } else {
                                    skipped[i] = true;
                                    stack.push(span);
                                }
                            }
                            Kind::Eq => {
                                if constant {
                                    skipped[i] = true;
                                    stack.push(span);
                                } else {
                                    nodes[i].kind = Kind::Not;
                                    stack.push(Seg::Span(start, i));
                                }
                            }
                            other => unreachable!("non-propositional operator {other:?} in BDD"),
                        }
                    }
                }
            }
            other => unreachable!("non-propositional node {other:?} in BDD input"),
        }
    }

    match pop(&mut stack) {
        Seg::Subst(constant) => Restricted::Collapsed(constant),
        Seg::Span(..) => {
            let mut out = BumpVec::with_capacity_in(nodes.len(), bump);
            out.extend(
                nodes
                    .iter()
                    .zip(skipped.iter())
                    .filter(|(_, skip)| !**skip)
                    .map(|(node, _)| *node),
            );
            Restricted::Formula(Cofactor {
                nodes: out,
                next_var: cof.next_var + 1,
            })
        }
    }
}

fn pop(stack: &mut Vec<Seg>) -> Seg {
    stack.pop().expect("postfix operand stack underflow")
}

fn fold(kind: Kind, a: bool, b: bool) -> bool {
    match kind {
        Kind::And => a && b,
        Kind::Or => a || b,
        Kind::Xor => a ^ b,
        Kind::Eq => a == b,
        Kind::Impl => !a || b,
        other => unreachable!("non-propositional operator {other:?} in BDD"),
    }
}

/// Graphviz emission: rectangular terminals, circular decision nodes,
/// solid then-edges, dashed else-edges, one rank group per variable level.
pub fn render_dot(nodes: &[BddNode], root: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph {{");
    if root < 2 {
        // The formula collapsed to a constant; emit the single terminal.
        let _ = writeln!(out, "    {root} [shape=rect]");
        let _ = writeln!(out, "}}");
        return out;
    }
    let _ = writeln!(out, "    0 [shape=rect]");
    let _ = writeln!(out, "    1 [shape=rect]");
    for (id, node) in nodes.iter().enumerate().skip(2) {
        let _ = writeln!(out, "    {id} [label={}] [shape=circle]", node.label);
        let _ = writeln!(out, "    {id}->{}", node.then_id);
        let _ = writeln!(out, "    {id}->{} [style=dashed]", node.else_id);
    }
    let max_level = nodes.iter().skip(2).map(|node| node.var).max().unwrap_or(0);
    let _ = writeln!(out, "    {{rank=same; 0 1}}");
    for level in 0..=max_level {
        let _ = write!(out, "    {{rank=same;");
        for (id, node) in nodes.iter().enumerate().skip(2) {
            if node.var == level {
                let _ = write!(out, " {id}");
            }
        }
        let _ = writeln!(out, "}}");
    }
    let _ = writeln!(out, "}}");
    out
}
