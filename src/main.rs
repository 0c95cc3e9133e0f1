use std::io::{self, BufRead, IsTerminal};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reedline::{DefaultPrompt, Reedline, Signal};

mod bdd;
mod buchi;
mod dimacs;
mod dpll;
mod formula;
mod lexer;
mod ltl;
mod parser;

use lexer::Dialect;
use parser::FormulaParser;

#[derive(Parser)]
#[command(
    name = "symlog",
    about = "Symbolic-logic engines: BDD compilation, DPLL SAT solving, LTL-to-GNBA translation"
)]
struct Cli {
    /// Echo parsed formulas and translation tables on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a propositional formula into a reduced ordered BDD (Graphviz on stdout).
    Bdd,
    /// Decide satisfiability of a DIMACS CNF instance read from stdin.
    Sat,
    /// Translate an LTL formula into a generalized Büchi automaton (JSON on stdout).
    Ltl,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Bdd => run_formula_engine(cli.verbose, run_bdd),
        Command::Sat => run_sat(),
        Command::Ltl => run_formula_engine(cli.verbose, run_ltl),
    }
}

/// The formula engines consume one line each. On a terminal this becomes a
/// read-eval-print loop; on a pipe, the first line of stdin.
fn run_formula_engine(verbose: bool, engine: fn(&str, bool) -> Result<()>) -> Result<()> {
    if io::stdin().is_terminal() {
        let mut editor = Reedline::create();
        let prompt = DefaultPrompt::default();
        loop {
            match editor.read_line(&prompt) {
                Ok(Signal::Success(buffer)) => {
                    let line = buffer.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == ":quit" || line == ":q" {
                        break;
                    }
                    if let Err(err) = engine(line, verbose) {
                        eprintln!("error: {err:#}");
                    }
                }
                Ok(Signal::CtrlC) | Ok(Signal::CtrlD) => break,
                Err(err) => bail!("line editor failure: {err}"),
            }
        }
        Ok(())
    } else {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("reading formula from stdin")?;
        let line = line.trim();
        if line.is_empty() {
            bail!("empty input");
        }
        engine(line, verbose)
    }
}

fn run_bdd(line: &str, verbose: bool) -> Result<()> {
    let mut parser = FormulaParser::new();
    let formula = parser
        .parse(line, Dialect::Prop)
        .map_err(anyhow::Error::msg)?;
    if verbose {
        eprintln!("{}", formula.render(Dialect::Prop, &parser.interner));
    }
    let (nodes, root) = bdd::build(&formula);
    print!("{}", bdd::render_dot(&nodes, root));
    Ok(())
}

fn run_ltl(line: &str, verbose: bool) -> Result<()> {
    let mut parser = FormulaParser::new();
    let mut formula = parser
        .parse(line, Dialect::Temporal)
        .map_err(anyhow::Error::msg)?;
    if verbose {
        eprintln!("{}", formula.render(Dialect::Temporal, &parser.interner));
    }
    let automaton =
        ltl::translate(&mut formula, &parser.interner, verbose).map_err(anyhow::Error::msg)?;
    let json = serde_json::to_string_pretty(&automaton).context("serializing automaton")?;
    println!("{json}");
    Ok(())
}

fn run_sat() -> Result<()> {
    let cnf = dimacs::read_cnf(io::stdin().lock()).map_err(anyhow::Error::msg)?;
    let mut solver = dpll::Solver::new(cnf);
    match solver.solve() {
        dpll::Solution::Sat(model) => {
            println!("SAT");
            for (variable, value) in model.iter().enumerate().skip(1) {
                println!("{variable}: {value}");
            }
        }
        dpll::Solution::Unsat => println!("UNSAT"),
    }
    Ok(())
}
