use std::{fs, io::Write, path::PathBuf, process};

use anyhow::Context;
use beau_collector::BeauCollector;
use clap::{Parser, Subcommand};
use itertools::Itertools;

use ebnfgen::{
    configuration::{load_config, ConfigReadError, ToolConfig},
    error::GrammarError,
    grammar::Grammar,
    log::pull_messages,
};

#[derive(Parser)]
#[command(name = "ebnfgen")]
#[command(about = "Matches text against an EBNF grammar or generates random text from it")]
struct Args {
    /// Grammar file, or a .toml/.json config that names one
    #[arg(short, long, default_value = "ebnfgen.toml")]
    config: PathBuf,

    /// Print the engine log when done
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether a file matches a rule
    Match {
        rule: String,
        file: PathBuf,

        /// Trim the input and collapse whitespace runs to one space
        #[arg(long, conflicts_with = "trim_all")]
        trim: bool,

        /// Remove all whitespace from the input
        #[arg(long)]
        trim_all: bool,

        /// Print every node attempt
        #[arg(long)]
        trace: bool,
    },

    /// Generate random text for a rule
    Generate {
        rule: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of samples, one per line
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
}

fn main() {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e @ ConfigReadError::ReadError { .. }) => {
            eprintln!("{e}");
            process::exit(exitcode::IOERR)
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(exitcode::CONFIG)
        }
    };

    let grammar_content = match fs::read_to_string(&config.grammar) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("error reading grammar file {}: {e}", config.grammar.display());
            process::exit(exitcode::IOERR);
        }
    };

    let mut grammar = match Grammar::parse_with_config(&grammar_content, config.generator.engine) {
        Ok(grammar) => grammar,
        Err(e) => {
            eprintln!("errors while parsing grammar");
            eprintln!("{e}");
            process::exit(exitcode::CONFIG)
        }
    };

    for warning in grammar.warnings() {
        eprintln!("{warning}");
    }

    if let Err(e) = apply_rule_configs(&mut grammar, &config) {
        eprintln!("errors in generator config");
        eprintln!("{e}");
        process::exit(exitcode::CONFIG)
    }

    let code = match args.command {
        Command::Match {
            rule,
            file,
            trim,
            trim_all,
            trace,
        } => {
            let input = match fs::read_to_string(&file) {
                Ok(input) => input,
                Err(e) => {
                    eprintln!("error reading input file {}: {e}", file.display());
                    process::exit(exitcode::IOERR);
                }
            };

            let input = if trim_all {
                input.split_whitespace().join("")
            } else if trim {
                input.split_whitespace().join(" ")
            } else {
                input
            };

            if trace {
                let mut engine = *grammar.engine_config();
                engine.create_match_trace = true;
                grammar.set_engine_config(engine);
            }

            run_match(&grammar, &rule, &input)
        }

        Command::Generate {
            rule,
            output,
            count,
        } => match run_generate(&grammar, &rule, output, count) {
            Ok(()) => exitcode::OK,
            Err(e) if e.is::<GrammarError>() => {
                eprintln!("{e}");
                exitcode::CONFIG
            }
            Err(e) => {
                eprintln!("{e:#}");
                exitcode::IOERR
            }
        },
    };

    if args.verbose {
        for message in pull_messages(256) {
            eprintln!("{message}");
        }
    }

    process::exit(code)
}

/// Applies every rule's generator overrides, reporting all failing rules.
fn apply_rule_configs(grammar: &mut Grammar, config: &ToolConfig) -> Result<(), anyhow::Error> {
    let _ = config
        .generator
        .rules
        .iter()
        .map(|(rule, rule_config)| {
            grammar
                .set_generator_config(rule, rule_config)
                .map_err(anyhow::Error::from)
        })
        .bcollect::<Vec<_>>()?;

    Ok(())
}

fn run_match(grammar: &Grammar, rule: &str, input: &str) -> exitcode::ExitCode {
    let outcome = match grammar.match_rule(rule, input) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{e}");
            return exitcode::CONFIG;
        }
    };

    for line in outcome.trace() {
        eprintln!("{line}");
    }

    match outcome.failure() {
        None => {
            println!("input matches rule `{rule}`");
            exitcode::OK
        }
        Some(failure) => {
            println!("{failure}");
            exitcode::DATAERR
        }
    }
}

fn run_generate(
    grammar: &Grammar,
    rule: &str,
    output: Option<PathBuf>,
    count: usize,
) -> Result<(), anyhow::Error> {
    let mut rng = rand::thread_rng();

    let samples = (0..count)
        .map(|_| grammar.generate_with(rule, &mut rng).map(|sample| sample.text))
        .collect::<Result<Vec<_>, _>>()?;
    let text = samples.join("\n");

    match output {
        Some(path) => fs::write(&path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{text}").context("failed to write to stdout")?;
        }
    }

    Ok(())
}
