use anyhow::{bail, Context, Result};
use automata::{
    analyzer::{report, unreachable_states},
    simulator::{Active, Trace},
    Automaton, AutomatonLoader, PresetManager,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None, arg_required_else_help = true)]
#[command(after_help = "AUTOMATON is a path to a .fa or .json file, or the name of a preset.

EXAMPLES:
  automata-cli run \"Even zeros\" 00 010
  automata-cli run samples/ends-with-ab.fa abab --trace
  automata-cli compose intersect \"Even zeros\" \"Contains a one\" --format json")]
struct Cli {
    /// Verbosity level (-v, -vv). Overrides RUST_LOG.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run input strings through an automaton
    Run {
        automaton: String,
        /// Inputs to test. Read one per line from stdin when omitted.
        inputs: Vec<String>,
        /// Print every step of each run
        #[arg(short, long)]
        trace: bool,
    },
    /// Combine two automata
    Compose {
        operation: Operation,
        first: String,
        second: String,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Fa)]
        format: OutputFormat,
        /// Write the result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check an automaton for structural problems and unreachable states
    Check { automaton: String },
    /// Print the transition table of an automaton
    Table { automaton: String },
    /// List the built-in automata
    Presets,
}

#[derive(Clone, Copy, ValueEnum)]
enum Operation {
    Union,
    Concat,
    Intersect,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Fa,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Run {
            automaton,
            inputs,
            trace,
        } => run(&load(&automaton)?, inputs, trace),
        Command::Compose {
            operation,
            first,
            second,
            format,
            output,
        } => compose(operation, &load(&first)?, &load(&second)?, format, output),
        Command::Check { automaton } => check(&load(&automaton)?),
        Command::Table { automaton } => {
            print_table(&load(&automaton)?);
            Ok(())
        }
        Command::Presets => {
            list_presets();
            Ok(())
        }
    }
}

/// Loads an automaton from a file if `source` names one, otherwise from the presets.
fn load(source: &str) -> Result<Automaton> {
    let path = Path::new(source);
    if path.exists() {
        debug!(path = source, "loading automaton from file");
        return AutomatonLoader::load_automaton(path)
            .with_context(|| format!("Failed to load automaton from {source}"));
    }

    PresetManager::get_by_name(source)
        .with_context(|| format!("'{source}' is neither a file nor a preset name"))
}

fn run(automaton: &Automaton, inputs: Vec<String>, show_trace: bool) -> Result<()> {
    let inputs = if inputs.is_empty() && atty::isnt(atty::Stream::Stdin) {
        io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .context("Failed to read inputs from stdin")?
    } else {
        inputs
    };

    if inputs.is_empty() {
        bail!("No input strings given");
    }

    for input in &inputs {
        let trace = automata::run(automaton, input)
            .with_context(|| format!("Cannot run \"{input}\" on {}", automaton.name()))?;

        if show_trace {
            print_trace(&trace);
        }
        println!("{:<12} \"{input}\"", trace.verdict().to_string());
    }

    Ok(())
}

fn print_trace(trace: &Trace) {
    for step in trace.steps() {
        let symbol = step.symbol.map_or("start".to_string(), |s| format!("'{s}'"));
        let states = match &step.active {
            Active::Single(Some(id)) => id.clone(),
            Active::Single(None) => "-".to_string(),
            Active::Set(ids) => format!("{{{}}}", ids.iter().cloned().collect::<Vec<_>>().join(", ")),
        };
        let marker = if step.rejected { "  (stuck)" } else { "" };
        println!("  {:>3}  {:<7} {states}{marker}", step.index, symbol);
    }
}

fn compose(
    operation: Operation,
    first: &Automaton,
    second: &Automaton,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    // Degenerate operands are reported through `warn!` by the composer.
    let automaton = match operation {
        Operation::Union => automata::union(first, second),
        Operation::Concat => automata::concatenate(first, second),
        Operation::Intersect => automata::intersect(first, second),
    }
    .into_automaton();

    let text = match format {
        OutputFormat::Fa => automata::render(&automaton)?,
        OutputFormat::Json => automata::to_json(&automaton)?,
    };

    match output {
        Some(path) => {
            std::fs::write(&path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote composed automaton");
        }
        None => print!("{text}"),
    }

    Ok(())
}

fn check(automaton: &Automaton) -> Result<()> {
    let problems = report(automaton);
    for problem in &problems {
        println!("error: {problem}");
    }

    if automaton.initial_state().is_none() {
        println!("warning: no initial state");
    }
    let unreachable = unreachable_states(automaton);
    if !unreachable.is_empty() {
        println!("warning: unreachable states: {}", unreachable.join(", "));
    }

    if !problems.is_empty() {
        bail!("{} has {} problem(s)", automaton.name(), problems.len());
    }

    println!("{} ({}) is valid", automaton.name(), automaton.kind());
    Ok(())
}

fn print_table(automaton: &Automaton) {
    let table = automaton.table();
    let cell = |targets: &[String]| {
        if targets.is_empty() {
            "-".to_string()
        } else {
            targets.join(",")
        }
    };

    let width = table
        .rows
        .iter()
        .flat_map(|row| row.targets.iter().map(|t| cell(t).chars().count()))
        .chain(table.rows.iter().map(|row| row.state.chars().count() + 2))
        .max()
        .unwrap_or(1)
        .max(3);

    let mut header = format!("{:<width$}", "");
    for symbol in &table.symbols {
        header.push_str(&format!(" | {symbol:<width$}"));
    }
    println!("{}", header.trim_end());

    for row in &table.rows {
        let flags = format!(
            "{}{}",
            if row.is_initial { "→" } else { "" },
            if row.is_final { "*" } else { "" }
        );
        let mut line = format!("{:<width$}", format!("{flags}{}", row.state));
        for targets in &row.targets {
            line.push_str(&format!(" | {:<width$}", cell(targets)));
        }
        println!("{}", line.trim_end());
    }
}

fn list_presets() {
    for index in 0..PresetManager::count() {
        if let Ok(info) = PresetManager::info(index) {
            println!(
                "{:>2}. {:<20} {} over {{{}}}, {} states, {} transitions",
                index + 1,
                info.name,
                info.kind,
                info.alphabet,
                info.state_count,
                info.transition_count
            );
        }
    }
}
