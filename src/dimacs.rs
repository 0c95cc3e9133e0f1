use std::io::BufRead;

/// A CNF instance as read from a DIMACS stream: clause literals are signed
/// nonzero integers, `+i` for variable `i` and `-i` for its negation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cnf {
    pub n_vars: usize,
    pub n_clauses: usize,
    pub clauses: Vec<Vec<i32>>,
}

/// Read a DIMACS CNF instance. Comment lines start with `c`; the header
/// `p cnf N M` declares the variable and clause counts; clauses are
/// whitespace-separated integers terminated by `0`, newlines insignificant.
pub fn read_cnf<R: BufRead>(input: R) -> Result<Cnf, String> {
    let mut header: Option<(usize, usize)> = None;
    let mut literals: Vec<i32> = Vec::new();

    for line in input.lines() {
        let line = line.map_err(|err| format!("reading DIMACS input: {err}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('c') {
            continue;
        }
        if let Some(rest) = line.strip_prefix('p') {
            if header.is_some() {
                return Err("duplicate DIMACS header".to_string());
            }
            let mut fields = rest.split_whitespace();
            match (fields.next(), fields.next(), fields.next(), fields.next()) {
                (Some("cnf"), Some(vars), Some(clauses), None) => {
                    let n_vars = vars
                        .parse::<usize>()
                        .map_err(|_| format!("bad variable count in header: {line}"))?;
                    let n_clauses = clauses
                        .parse::<usize>()
                        .map_err(|_| format!("bad clause count in header: {line}"))?;
                    header = Some((n_vars, n_clauses));
                }
                _ => return Err(format!("malformed DIMACS header: {line}")),
            }
            continue;
        }
        if header.is_none() {
            return Err(format!("clause data before the DIMACS header: {line}"));
        }
        for token in line.split_whitespace() {
            let literal = token
                .parse::<i32>()
                .map_err(|_| format!("bad literal {token:?} in DIMACS input"))?;
            literals.push(literal);
        }
    }

    let Some((n_vars, n_clauses)) = header else {
        return Err("missing DIMACS header".to_string());
    };

    let mut clauses = Vec::with_capacity(n_clauses);
    let mut current = Vec::new();
    for literal in literals {
        if literal == 0 {
            clauses.push(std::mem::take(&mut current));
            continue;
        }
        if literal.unsigned_abs() as usize > n_vars {
            return Err(format!(
                "literal {literal} out of range for {n_vars} variables"
            ));
        }
        current.push(literal);
    }
    if !current.is_empty() {
        return Err("last clause is not terminated by 0".to_string());
    }
    if clauses.len() != n_clauses {
        return Err(format!(
            "header declares {n_clauses} clauses but {} were read",
            clauses.len()
        ));
    }
    Ok(Cnf {
        n_vars,
        n_clauses,
        clauses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Cnf, String> {
        read_cnf(text.as_bytes())
    }

    #[test]
    fn reads_header_comments_and_clauses() {
        let cnf = parse("c sample instance\np cnf 3 2\n1 -3 0\n2 3 -1 0\n").unwrap();
        assert_eq!(cnf.n_vars, 3);
        assert_eq!(cnf.n_clauses, 2);
        assert_eq!(cnf.clauses, vec![vec![1, -3], vec![2, 3, -1]]);
    }

    #[test]
    fn clause_may_span_lines() {
        let cnf = parse("p cnf 4 1\n1 2\n-3\n4 0\n").unwrap();
        assert_eq!(cnf.clauses, vec![vec![1, 2, -3, 4]]);
    }

    #[test]
    fn comments_between_clauses_are_skipped() {
        let cnf = parse("p cnf 2 2\nc first\n1 0\nc second\n-2 0\n").unwrap();
        assert_eq!(cnf.clauses, vec![vec![1], vec![-2]]);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("1 2 0\n").is_err());
        assert!(parse("p cnf x 2\n1 0\n").is_err());
        assert!(parse("p cnf 2 2\n1 0\n").is_err());
        assert!(parse("p cnf 2 1\n1 2\n").is_err());
        assert!(parse("p cnf 2 1\n5 0\n").is_err());
    }
}
