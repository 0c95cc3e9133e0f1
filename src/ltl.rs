use std::collections::HashMap;

use lasso::{Rodeo, Spur};

use crate::buchi::{assemble, Automaton};
use crate::formula::{Formula, Kind, Node};

/// One tracked proposition: the name of an atomic proposition together with
/// an X-depth, so `(p, 2)` stands for "p holds two steps from now".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtomSlot {
    pub name: Spur,
    pub x_count: usize,
}

/// One closure entry: a distinct non-atom subformula. Operand indices
/// address the combined `atoms ++ closure` position space; `neg1`/`neg2`
/// absorb any chain of `!`/`X` sitting directly above the operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClosureNode {
    pub kind: Kind,
    pub arg1: usize,
    pub arg2: usize,
    pub neg1: bool,
    pub neg2: bool,
}

/// Translate an LTL formula into a generalized Büchi automaton.
pub fn translate(
    formula: &mut Formula,
    interner: &Rodeo,
    verbose: bool,
) -> Result<Automaton, String> {
    propagate_x(formula);
    let atoms = make_atoms(formula)?;
    let closure = make_closure(formula, &atoms);
    if verbose {
        eprintln!("atoms:");
        for atom in &atoms {
            eprintln!("  {} @X{}", interner.resolve(&atom.name), atom.x_count);
        }
        eprintln!("closure:");
        for entry in &closure {
            eprintln!(
                "  {:?} arg1={}{} arg2={}{}",
                entry.kind,
                if entry.neg1 { "!" } else { "" },
                entry.arg1,
                if entry.neg2 { "!" } else { "" },
                entry.arg2
            );
        }
    }
    let (rows, constraints) = make_states(&atoms, &closure);
    Ok(assemble(
        &atoms,
        &closure,
        &rows,
        &constraints,
        formula,
        interner,
    ))
}

/// Tag every atom occurrence with the number of `X` operators above it.
/// Counts are recomputed from zero, so repeated runs are idempotent.
pub fn propagate_x(formula: &mut Formula) {
    for node in &mut formula.nodes {
        if matches!(node.kind, Kind::Atom(_)) {
            node.x_count = 0;
        }
    }
    for i in 0..formula.nodes.len() {
        if formula.nodes[i].kind == Kind::Next {
            let (start, end) = formula.nodes[i].arg1;
            for j in start as usize..=end as usize {
                if matches!(formula.nodes[j].kind, Kind::Atom(_)) {
                    formula.nodes[j].x_count += 1;
                }
            }
        }
    }
}

/// Enumerate the timed atoms: for each distinct name (first-encounter
/// order) emit `(name, 0) ..= (name, max depth seen)`. Refuses when the
/// state space `2^|atoms|` would overflow the machine word.
pub fn make_atoms(formula: &Formula) -> Result<Vec<AtomSlot>, String> {
    let mut by_name: Vec<AtomSlot> = Vec::new();
    for node in &formula.nodes {
        if let Kind::Atom(name) = node.kind {
            match by_name.iter_mut().find(|slot| slot.name == name) {
                Some(slot) => slot.x_count = slot.x_count.max(node.x_count as usize),
                None => by_name.push(AtomSlot {
                    name,
                    x_count: node.x_count as usize,
                }),
            }
        }
    }
    let mut atoms = Vec::new();
    for slot in &by_name {
        for depth in 0..=slot.x_count {
            atoms.push(AtomSlot {
                name: slot.name,
                x_count: depth,
            });
        }
    }
    if atoms.len() >= usize::BITS as usize {
        return Err(format!(
            "formula tracks {} timed atoms; enumerating 2^{} states exceeds the machine-word limit",
            atoms.len(),
            atoms.len()
        ));
    }
    Ok(atoms)
}

/// Walk the `!`/`X` chain down from the top of an operand span and return
/// the accumulated negation parity.
fn neg_parity(nodes: &[Node], end: u32) -> bool {
    let mut parity = false;
    let mut i = end as usize;
    loop {
        match nodes[i].kind {
            Kind::Not => parity = !parity,
            Kind::Next => {}
            _ => break,
        }
        if i == 0 {
            break;
        }
        i -= 1;
    }
    parity
}

/// Build the closure: one entry per distinct non-atom subformula.
///
/// `!` and `X` contribute no entries of their own (`X` is already folded
/// into atom depths, `!` into the neg flags); they just forward to their
/// operand's position. `F`/`G` are unary: `arg2` mirrors `arg1` with a
/// cleared flag and the state enumerator only ever reads `arg1` for them.
/// Commutative entries are ordered `arg1 <= arg2` so structural equality
/// deduplicates operand-swapped duplicates.
pub fn make_closure(formula: &Formula, atoms: &[AtomSlot]) -> Vec<ClosureNode> {
    let nodes = &formula.nodes;
    let mut closure: Vec<ClosureNode> = Vec::new();
    let mut consed: HashMap<ClosureNode, usize> = HashMap::new();
    let mut position = vec![0usize; nodes.len()];

    for i in 0..nodes.len() {
        match nodes[i].kind {
            Kind::Atom(name) => {
                position[i] = atoms
                    .iter()
                    .position(|slot| {
                        slot.name == name && slot.x_count == nodes[i].x_count as usize
                    })
                    .expect("every atom occurrence was enumerated");
            }
            Kind::Not | Kind::Next => position[i] = position[i - 1],
            kind @ (Kind::And
            | Kind::Or
            | Kind::Impl
            | Kind::Until
            | Kind::Release
            | Kind::Future
            | Kind::Globally) => {
                let mut arg1 = position[nodes[i].arg1.1 as usize];
                let mut neg1 = neg_parity(nodes, nodes[i].arg1.1);
                let (mut arg2, mut neg2) = if kind.is_unary() {
                    (arg1, false)
                } else {
                    (
                        position[nodes[i].arg2.1 as usize],
                        neg_parity(nodes, nodes[i].arg2.1),
                    )
                };
                if matches!(kind, Kind::And | Kind::Or) && arg1 > arg2 {
                    std::mem::swap(&mut arg1, &mut arg2);
                    std::mem::swap(&mut neg1, &mut neg2);
                }
                let entry = ClosureNode {
                    kind,
                    arg1,
                    arg2,
                    neg1,
                    neg2,
                };
                position[i] = *consed.entry(entry).or_insert_with(|| {
                    closure.push(entry);
                    atoms.len() + closure.len() - 1
                });
            }
            other => unreachable!("propositional-only node {other:?} in a temporal formula"),
        }
    }
    closure
}

/// Enumerate the consistent states and the successor constraints each one
/// imposes.
///
/// Every truth assignment over the atoms seeds one enumeration; closure
/// entries are then evaluated in order. Boolean entries are forced; a
/// temporal entry whose value is not locally determined splits the state in
/// two, each branch promising the opposite resolution and recording a
/// constraint `(position, expected)` that its successor must honor. Atoms
/// with a positive depth always constrain the successor's one-step-younger
/// twin.
pub fn make_states(
    atoms: &[AtomSlot],
    closure: &[ClosureNode],
) -> (Vec<Vec<bool>>, Vec<Vec<(usize, bool)>>) {
    let n_atoms = atoms.len();
    let mut rows: Vec<Vec<bool>> = Vec::new();
    let mut constraints: Vec<Vec<(usize, bool)>> = Vec::new();

    for assignment in 0u64..(1u64 << n_atoms) {
        let mut base = Vec::with_capacity(n_atoms + closure.len());
        for j in 0..n_atoms {
            base.push(assignment & (1 << (n_atoms - 1 - j)) != 0);
        }
        let mut base_constraints = Vec::new();
        for j in 0..n_atoms {
            if atoms[j].x_count > 0 {
                base_constraints.push((j - 1, base[j]));
            }
        }

        let mut work = vec![(base, base_constraints)];
        while let Some((mut values, constraint_row)) = work.pop() {
            let mut index = values.len() - n_atoms;
            let mut split = None;
            while index != closure.len() {
                let entry = &closure[index];
                let a1 = entry.neg1 != values[entry.arg1];
                let a2 = entry.neg2 != values[entry.arg2];
                let forced = match entry.kind {
                    Kind::And => Some(a1 && a2),
                    Kind::Or => Some(a1 || a2),
                    Kind::Impl => Some(!a1 || a2),
                    Kind::Future => a1.then_some(true),
                    Kind::Globally => (!a1).then_some(false),
                    Kind::Until => {
                        if a2 {
                            Some(true)
                        } else if !a1 {
                            Some(false)
                        } else {
                            None
                        }
                    }
                    Kind::Release => {
                        if !a2 {
                            Some(false)
                        } else if a1 {
                            Some(true)
                        } else {
                            None
                        }
                    }
                    other => unreachable!("{other:?} cannot appear in the closure"),
                };
                match forced {
                    Some(value) => {
                        values.push(value);
                        index += 1;
                    }
                    None => {
                        split = Some(index);
                        break;
                    }
                }
            }
            match split {
                None => {
                    rows.push(values);
                    constraints.push(constraint_row);
                }
                Some(index) => {
                    let global = n_atoms + index;
                    for resolution in [true, false] {
                        let mut branch_values = values.clone();
                        branch_values.push(resolution);
                        let mut branch_constraints = constraint_row.clone();
                        branch_constraints.push((global, resolution));
                        work.push((branch_values, branch_constraints));
                    }
                }
            }
        }
    }
    (rows, constraints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Dialect;
    use crate::parser::FormulaParser;

    fn prepared(src: &str) -> (Formula, FormulaParser) {
        let mut parser = FormulaParser::new();
        let mut formula = parser.parse(src, Dialect::Temporal).unwrap();
        propagate_x(&mut formula);
        (formula, parser)
    }

    #[test]
    fn x_depth_counts_nesting() {
        let (formula, parser) = prepared("X X p && X q");
        let p = parser.interner.get("p").unwrap();
        let q = parser.interner.get("q").unwrap();
        for node in &formula.nodes {
            match node.kind {
                Kind::Atom(name) if name == p => assert_eq!(node.x_count, 2),
                Kind::Atom(name) if name == q => assert_eq!(node.x_count, 1),
                _ => {}
            }
        }
    }

    #[test]
    fn propagate_x_is_idempotent() {
        let (mut formula, _) = prepared("X (p && X (q || X p))");
        let first: Vec<u32> = formula.nodes.iter().map(|node| node.x_count).collect();
        propagate_x(&mut formula);
        let second: Vec<u32> = formula.nodes.iter().map(|node| node.x_count).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn atoms_expand_per_depth() {
        let (formula, parser) = prepared("X X p");
        let atoms = make_atoms(&formula).unwrap();
        let p = parser.interner.get("p").unwrap();
        assert_eq!(
            atoms,
            vec![
                AtomSlot { name: p, x_count: 0 },
                AtomSlot { name: p, x_count: 1 },
                AtomSlot { name: p, x_count: 2 },
            ]
        );
    }

    #[test]
    fn closure_absorbs_negation_chains() {
        // !p && !q: the And entry sees both operands through neg flags and
        // contributes the only closure entry.
        let (formula, _) = prepared("!p && !q");
        let atoms = make_atoms(&formula).unwrap();
        let closure = make_closure(&formula, &atoms);
        assert_eq!(closure.len(), 1);
        let entry = closure[0];
        assert_eq!(entry.kind, Kind::And);
        assert!(entry.neg1 && entry.neg2);
        assert!(entry.arg1 <= entry.arg2);
    }

    #[test]
    fn commutative_entries_deduplicate_after_swap() {
        // (p && q) || (q && p) collapses to one And entry plus the Or.
        let (formula, _) = prepared("(p && q) || (q && p)");
        let atoms = make_atoms(&formula).unwrap();
        let closure = make_closure(&formula, &atoms);
        assert_eq!(closure.len(), 2);
        assert_eq!(closure[0].kind, Kind::And);
        assert_eq!(closure[1].kind, Kind::Or);
        assert_eq!(closure[1].arg1, closure[1].arg2);
    }

    #[test]
    fn unary_temporal_entries_mirror_arg1() {
        let (formula, _) = prepared("F !p");
        let atoms = make_atoms(&formula).unwrap();
        let closure = make_closure(&formula, &atoms);
        assert_eq!(closure.len(), 1);
        let entry = closure[0];
        assert_eq!(entry.kind, Kind::Future);
        assert_eq!(entry.arg2, entry.arg1);
        assert!(entry.neg1);
        assert!(!entry.neg2);
    }

    #[test]
    fn x_over_compound_lifts_the_atoms_not_the_closure() {
        // X(p && q) tracks (p,1) and (q,1); the And entry is over the
        // lifted atoms and the X itself adds nothing.
        let (formula, parser) = prepared("X (p && q)");
        let atoms = make_atoms(&formula).unwrap();
        let closure = make_closure(&formula, &atoms);
        assert_eq!(atoms.len(), 4);
        assert_eq!(closure.len(), 1);
        let p1 = atoms
            .iter()
            .position(|slot| slot.name == parser.interner.get("p").unwrap() && slot.x_count == 1)
            .unwrap();
        let q1 = atoms
            .iter()
            .position(|slot| slot.name == parser.interner.get("q").unwrap() && slot.x_count == 1)
            .unwrap();
        assert_eq!(closure[0].arg1, p1);
        assert_eq!(closure[0].arg2, q1);
    }

    #[test]
    fn pure_next_formula_has_no_splits() {
        let (formula, _) = prepared("X X p");
        let atoms = make_atoms(&formula).unwrap();
        let closure = make_closure(&formula, &atoms);
        let (rows, constraints) = make_states(&atoms, &closure);
        // One state per atom assignment, no tableau splits.
        assert_eq!(rows.len(), 8);
        for row in &rows {
            assert_eq!(row.len(), 3);
        }
        // Every state aligns (p,1) with the successor's (p,0) and (p,2)
        // with the successor's (p,1).
        for (row, constraint_row) in rows.iter().zip(&constraints) {
            assert_eq!(constraint_row.len(), 2);
            assert!(constraint_row.contains(&(0, row[1])));
            assert!(constraint_row.contains(&(1, row[2])));
        }
    }

    #[test]
    fn future_obligation_splits_when_undischarged() {
        let (formula, _) = prepared("F q");
        let atoms = make_atoms(&formula).unwrap();
        let closure = make_closure(&formula, &atoms);
        let (rows, constraints) = make_states(&atoms, &closure);
        // q=true forces Fq=true; q=false splits into both resolutions.
        assert_eq!(rows.len(), 3);
        let split_rows: Vec<_> = rows
            .iter()
            .zip(&constraints)
            .filter(|(_, cons)| !cons.is_empty())
            .collect();
        assert_eq!(split_rows.len(), 2);
        for (row, cons) in split_rows {
            assert!(!row[0], "only undischarged states split");
            assert_eq!(cons[0], (1, row[1]));
        }
    }
}
