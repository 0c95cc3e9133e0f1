use lasso::{Rodeo, Spur};
use logos::Logos;

/// Which of the two surface grammars is being read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// BDD input: `! & | ^ = ->` over `x<digits>` variables.
    Prop,
    /// LTL input: `! && || -> X F G U R` over `[a-z]+` atoms.
    Temporal,
}

#[derive(Logos, Clone, Copy, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum PropToken {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("!")]
    Not,
    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token("^")]
    Xor,
    #[token("=")]
    Eq,
    #[token("->")]
    Impl,
    #[regex("x[0-9]+", |lex| lex.slice()[1..].parse::<u32>().ok())]
    Var(u32),
}

#[derive(Logos, Clone, Copy, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum TemporalToken<'s> {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("!")]
    Not,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("->")]
    Impl,
    #[token("X")]
    Next,
    #[token("F")]
    Future,
    #[token("G")]
    Globally,
    #[token("U")]
    Until,
    #[token("R")]
    Release,
    #[regex("[a-z]+", |lex| lex.slice())]
    Atom(&'s str),
}

/// Dialect-independent token fed to the shunting-yard parser.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tok {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Xor,
    Eq,
    Impl,
    Next,
    Future,
    Globally,
    Until,
    Release,
    Var(u32),
    Atom(Spur),
}

/// Tokenize one input line. Unrecognized text is reported with a caret on
/// stderr and skipped; the surviving tokens are returned so parsing can
/// continue best-effort.
pub fn lex(src: &str, dialect: Dialect, interner: &mut Rodeo) -> Vec<Tok> {
    let mut tokens = Vec::new();
    match dialect {
        Dialect::Prop => {
            let mut lexer = PropToken::lexer(src);
            while let Some(result) = lexer.next() {
                match result {
                    Ok(token) => tokens.push(match token {
                        PropToken::LParen => Tok::LParen,
                        PropToken::RParen => Tok::RParen,
                        PropToken::Not => Tok::Not,
                        PropToken::And => Tok::And,
                        PropToken::Or => Tok::Or,
                        PropToken::Xor => Tok::Xor,
                        PropToken::Eq => Tok::Eq,
                        PropToken::Impl => Tok::Impl,
                        PropToken::Var(index) => Tok::Var(index),
                    }),
                    Err(()) => {
                        let span = lexer.span();
                        if src[span.clone()].starts_with('x') {
                            report(src, span.start, "Error in formula variable name");
                        } else {
                            report(src, span.start, "Error in formula");
                        }
                    }
                }
            }
        }
        Dialect::Temporal => {
            let mut lexer = TemporalToken::lexer(src);
            while let Some(result) = lexer.next() {
                match result {
                    Ok(token) => tokens.push(match token {
                        TemporalToken::LParen => Tok::LParen,
                        TemporalToken::RParen => Tok::RParen,
                        TemporalToken::Not => Tok::Not,
                        TemporalToken::And => Tok::And,
                        TemporalToken::Or => Tok::Or,
                        TemporalToken::Impl => Tok::Impl,
                        TemporalToken::Next => Tok::Next,
                        TemporalToken::Future => Tok::Future,
                        TemporalToken::Globally => Tok::Globally,
                        TemporalToken::Until => Tok::Until,
                        TemporalToken::Release => Tok::Release,
                        TemporalToken::Atom(name) => Tok::Atom(interner.get_or_intern(name)),
                    }),
                    Err(()) => report(src, lexer.span().start, "Error in formula"),
                }
            }
        }
    }
    tokens
}

/// Diagnostic in the source/caret shape: the offending line followed by a
/// `^` under the first bad column.
fn report(src: &str, at: usize, what: &str) {
    eprintln!("{what}:");
    eprintln!("{src}");
    eprintln!("{:at$}^", "");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_prop(src: &str) -> Vec<Tok> {
        lex(src, Dialect::Prop, &mut Rodeo::new())
    }

    #[test]
    fn prop_tokens_and_variables() {
        assert_eq!(
            lex_prop("x0 & !x12 -> (x3 ^ x4)"),
            vec![
                Tok::Var(0),
                Tok::And,
                Tok::Not,
                Tok::Var(12),
                Tok::Impl,
                Tok::LParen,
                Tok::Var(3),
                Tok::Xor,
                Tok::Var(4),
                Tok::RParen,
            ]
        );
    }

    #[test]
    fn malformed_variable_is_skipped() {
        // Bare `x` has no index; the diagnostic goes to stderr and the
        // token stream keeps the rest.
        assert_eq!(lex_prop("x & x1"), vec![Tok::And, Tok::Var(1)]);
    }

    #[test]
    fn unknown_character_is_skipped() {
        assert_eq!(lex_prop("x0 ? x1"), vec![Tok::Var(0), Tok::Var(1)]);
    }

    #[test]
    fn temporal_tokens_and_atoms() {
        let mut interner = Rodeo::new();
        let tokens = lex("G (p -> F q)", Dialect::Temporal, &mut interner);
        let p = interner.get("p").unwrap();
        let q = interner.get("q").unwrap();
        assert_eq!(
            tokens,
            vec![
                Tok::Globally,
                Tok::LParen,
                Tok::Atom(p),
                Tok::Impl,
                Tok::Future,
                Tok::Atom(q),
                Tok::RParen,
            ]
        );
    }

    #[test]
    fn temporal_operators_are_single_uppercase_letters() {
        let mut interner = Rodeo::new();
        let tokens = lex("p U q R r", Dialect::Temporal, &mut interner);
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[1], Tok::Until);
        assert_eq!(tokens[3], Tok::Release);
    }
}
