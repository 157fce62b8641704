//! sbmlmath - formula tooling for SBML models
//!
//! Converts formulas between the infix syntax and MathML and checks their
//! units against a model's symbol table.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sbmlmath_formula::{format_formula, parse_formula, ExprNode};
use sbmlmath_mathml::{read_all_math, read_math, write_math_with, WriteOptions};
use sbmlmath_unit_check::{CheckOptions, ModelSymbols, UnitChecker, UnitDiagnostic};
use sbmlmath_units::UnitDefinition;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod logging;

#[derive(Parser)]
#[command(
    name = "sbmlmath",
    version = env!("CARGO_PKG_VERSION"),
    about = "Parse, convert and unit-check SBML formulas",
    after_help = r#"
Examples:
  sbmlmath parse "k1 * S1 / (Km + S1)"
  sbmlmath to-mathml "root(3, V)"
  sbmlmath from-mathml model.xml
  sbmlmath check-units "k1 * S1" --symbols model.json --expect "mole*second^-1"
"#
)]
struct Cli {
    /// Log level for the sbmlmath crates (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit log events as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an infix formula and print it back in normal form
    Parse {
        formula: String,
        /// Print the expression tree instead
        #[arg(long)]
        tree: bool,
    },
    /// Convert an infix formula to MathML
    ToMathml {
        formula: String,
        /// Spaces per nesting level, 0 for a single line
        #[arg(long, default_value_t = 2)]
        indent: usize,
        /// Start with an XML declaration
        #[arg(long)]
        declaration: bool,
    },
    /// Print every <math> element of a document as an infix formula
    FromMathml {
        /// Input document; stdin when omitted
        file: Option<PathBuf>,
    },
    /// Derive the units of a formula and report inconsistencies
    CheckUnits {
        formula: String,
        /// The formula is MathML rather than infix text
        #[arg(long)]
        mathml: bool,
        /// Symbol table (JSON)
        #[arg(long)]
        symbols: Option<PathBuf>,
        /// Units the formula must have, e.g. "mole*second^-1"
        #[arg(long)]
        expect: Option<String>,
        /// Treat numbers without units as dimensionless
        #[arg(long)]
        numbers_dimensionless: bool,
        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init_logging(&cli.log_level, cli.log_json) {
        eprintln!("warning: logging disabled: {err}");
    }

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Parse { formula, tree } => {
            let node = parse_formula(&formula).context("invalid formula")?;
            if tree {
                println!("{node:#?}");
            } else {
                println!("{}", format_formula(&node));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::ToMathml {
            formula,
            indent,
            declaration,
        } => {
            let node = parse_formula(&formula).context("invalid formula")?;
            let options = WriteOptions {
                indent,
                xml_declaration: declaration,
            };
            println!("{}", write_math_with(&node, &options)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::FromMathml { file } => from_mathml(file.as_deref()),
        Command::CheckUnits {
            formula,
            mathml,
            symbols,
            expect,
            numbers_dimensionless,
            json,
        } => {
            let node = if mathml {
                read_math(&formula).context("invalid MathML")?
            } else {
                parse_formula(&formula).context("invalid formula")?
            };
            let symbols = match symbols {
                Some(path) => load_symbols(&path)?,
                None => ModelSymbols::new(),
            };
            let expected = expect
                .map(|text| text.parse::<UnitDefinition>())
                .transpose()
                .context("invalid --expect units")?;
            let options = CheckOptions {
                numbers_are_dimensionless: numbers_dimensionless,
                ..CheckOptions::default()
            };
            check_units(&node, &symbols, expected.as_ref(), options, json)
        }
    }
}

fn from_mathml(file: Option<&Path>) -> Result<ExitCode> {
    let document = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    let results = read_all_math(&document);
    if results.is_empty() {
        tracing::warn!("no <math> element found");
    }
    let mut failed = 0usize;
    for result in results {
        match result {
            Ok(node) => println!("{}", format_formula(&node)),
            Err(err) => {
                failed += 1;
                eprintln!("error: {err}");
            }
        }
    }

    if failed > 0 {
        eprintln!("{failed} formula(s) could not be read");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn load_symbols(path: &Path) -> Result<ModelSymbols> {
    let text =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    ModelSymbols::from_json(&text).with_context(|| format!("invalid symbol table {}", path.display()))
}

fn check_units(
    node: &ExprNode,
    symbols: &ModelSymbols,
    expected: Option<&UnitDefinition>,
    options: CheckOptions,
    json: bool,
) -> Result<ExitCode> {
    let checker = UnitChecker::with_options(symbols, options);
    let mut diagnostics: Vec<UnitDiagnostic> = Vec::new();
    let derived = match expected {
        Some(expected) => checker.check(node, expected, &mut diagnostics),
        None => checker.derive(node, &mut diagnostics),
    };

    if json {
        let output = serde_json::json!({
            "formula": format_formula(node),
            "units": derived.units.to_string(),
            "hasUndeclaredUnits": derived.has_undeclared_units,
            "diagnostics": diagnostics,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let note = if derived.has_undeclared_units {
            " (undeclared units involved)"
        } else {
            ""
        };
        println!("{}: {}{}", format_formula(node), derived.units, note);
        for diagnostic in &diagnostics {
            println!("  {diagnostic}");
        }
    }

    if diagnostics.iter().any(UnitDiagnostic::is_failure) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
