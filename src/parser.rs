use lasso::Rodeo;

use crate::formula::{Formula, Kind, Node};
use crate::lexer::{lex, Dialect, Tok};

/// Binding strength for the operator stack; higher binds tighter. Equal
/// strength never pops, so every binary operator chains to the right.
fn strength(kind: Kind) -> u8 {
    match kind {
        Kind::Impl | Kind::Eq | Kind::Until | Kind::Release => 1,
        Kind::Xor => 2,
        Kind::Or => 3,
        Kind::And => 4,
        Kind::Not | Kind::Next | Kind::Future | Kind::Globally => 5,
        other => panic!("{other:?} is not an operator"),
    }
}

enum StackOp {
    /// Left parenthesis marker, including the artificial outer pair.
    Sentinel,
    Op(Kind),
}

/// Shunting-yard parser shared by both dialects. Owns the atom interner so
/// `Atom` nodes stay `Copy` keys into it.
pub struct FormulaParser {
    pub interner: Rodeo,
}

impl FormulaParser {
    pub fn new() -> Self {
        FormulaParser {
            interner: Rodeo::new(),
        }
    }

    /// Parse one line into a postfix node vector. Lexer diagnostics go to
    /// stderr and parsing continues; `Err` means nothing usable remained.
    pub fn parse(&mut self, src: &str, dialect: Dialect) -> Result<Formula, String> {
        let tokens = lex(src, dialect, &mut self.interner);

        let mut nodes: Vec<Node> = Vec::new();
        // Spans of completed subformulas, parallel to the value stack a
        // tree-building parser would keep.
        let mut spans: Vec<(u32, u32)> = Vec::new();
        let mut ops: Vec<StackOp> = vec![StackOp::Sentinel];

        for token in tokens {
            match token {
                Tok::LParen => ops.push(StackOp::Sentinel),
                Tok::RParen => {
                    loop {
                        match ops.pop() {
                            Some(StackOp::Sentinel) => break,
                            Some(StackOp::Op(kind)) => emit(&mut nodes, &mut spans, kind),
                            None => {
                                report_plain(src, "unmatched ')' in formula");
                                break;
                            }
                        }
                    }
                }
                Tok::Var(index) => {
                    let at = nodes.len() as u32;
                    nodes.push(Node::leaf(Kind::Var(index), at));
                    spans.push((at, at));
                }
                Tok::Atom(name) => {
                    let at = nodes.len() as u32;
                    nodes.push(Node::leaf(Kind::Atom(name), at));
                    spans.push((at, at));
                }
                operator => {
                    let kind = operator_kind(operator);
                    while let Some(StackOp::Op(top)) = ops.last() {
                        if strength(*top) > strength(kind) {
                            let top = *top;
                            ops.pop();
                            emit(&mut nodes, &mut spans, top);
                        } else {
                            break;
                        }
                    }
                    ops.push(StackOp::Op(kind));
                }
            }
        }

        // Close the artificial outer parenthesis.
        loop {
            match ops.pop() {
                Some(StackOp::Sentinel) => {
                    if !ops.is_empty() {
                        report_plain(src, "unmatched '(' in formula");
                        continue;
                    }
                    break;
                }
                Some(StackOp::Op(kind)) => emit(&mut nodes, &mut spans, kind),
                None => break,
            }
        }

        if spans.len() != 1 || nodes.is_empty() {
            return Err(format!(
                "formula did not reduce to a single root ({} fragments): {src}",
                spans.len()
            ));
        }
        Ok(Formula { nodes })
    }
}

fn operator_kind(token: Tok) -> Kind {
    match token {
        Tok::Not => Kind::Not,
        Tok::And => Kind::And,
        Tok::Or => Kind::Or,
        Tok::Xor => Kind::Xor,
        Tok::Eq => Kind::Eq,
        Tok::Impl => Kind::Impl,
        Tok::Next => Kind::Next,
        Tok::Future => Kind::Future,
        Tok::Globally => Kind::Globally,
        Tok::Until => Kind::Until,
        Tok::Release => Kind::Release,
        other => panic!("{other:?} is not an operator token"),
    }
}

/// Emit an operator node, wiring its operand spans from the span stack.
/// Operators with missing operands are dropped (the caret diagnostic for
/// their cause was already printed by the lexer pass).
fn emit(nodes: &mut Vec<Node>, spans: &mut Vec<(u32, u32)>, kind: Kind) {
    let at = nodes.len() as u32;
    if kind.is_unary() {
        let Some(arg1) = spans.pop() else { return };
        nodes.push(Node::unary(kind, arg1, at));
        spans.push((arg1.0, at));
    } else {
        let Some(arg2) = spans.pop() else { return };
        let Some(arg1) = spans.pop() else {
            spans.push(arg2);
            return;
        };
        debug_assert_eq!(arg2.1, at - 1, "right operand must end just below the operator");
        nodes.push(Node::binary(kind, arg1, arg2, at));
        spans.push((arg1.0, at));
    }
}

fn report_plain(src: &str, what: &str) {
    eprintln!("{what}:");
    eprintln!("{src}");
}
