mod commands;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use sira_core::config::{EngineOptions, MissingValuePolicy, UnknownFlagPolicy};
use sira_core::error::SiraError;
use sira_core::rules::store::RuleSource;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sira",
    version,
    about = "Antimicrobial susceptibility classification against breakpoint tables"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that classify.
#[derive(clap::Args)]
struct EngineArgs {
    /// Engine options file (JSON or YAML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// How a missing disc zone diameter is reported
    #[arg(long, value_enum)]
    missing_disc: Option<MissingDiscArg>,

    /// Reject measurements carrying unrecognized feature flags
    #[arg(long)]
    strict_flags: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum MissingDiscArg {
    Ambiguous,
    Review,
}

impl EngineArgs {
    /// File values first, then explicit flags on top.
    fn resolve(&self) -> Result<EngineOptions, SiraError> {
        let mut options = match &self.config {
            Some(path) => EngineOptions::load(path)?,
            None => EngineOptions::default(),
        };
        if let Some(policy) = self.missing_disc {
            options.missing_disc = match policy {
                MissingDiscArg::Ambiguous => MissingValuePolicy::Ambiguous,
                MissingDiscArg::Review => MissingValuePolicy::Review,
            };
        }
        if self.strict_flags {
            options.unknown_flags = UnknownFlagPolicy::Reject;
        }
        Ok(options)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Classify measurement records from a JSON file
    Classify {
        /// JSON file holding one measurement record or an array of them
        input_file: PathBuf,

        /// Rule file (JSON or YAML)
        #[arg(short, long = "rules", value_name = "FILE", conflicts_with = "preset")]
        rules: Option<PathBuf>,

        /// Predefined ruleset (default: demo)
        #[arg(short, long = "preset", value_name = "NAME")]
        preset: Option<String>,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Show the evaluation trace for each result
        #[arg(long)]
        explain: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Classify JSON-lines records from stdin, reloading the rule file when it changes
    Stream {
        /// Rule file (JSON or YAML) to serve and watch
        #[arg(short, long = "rules", value_name = "FILE")]
        rules: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Manage and inspect rulesets
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List predefined rulesets
    List,
    /// Explain a ruleset in plain language
    Explain {
        /// Preset name (e.g., "demo")
        preset: String,
    },
    /// Print the rule document schema with an example
    Schema,
    /// Validate a custom rule file
    Validate {
        /// Path to JSON or YAML rule file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Classify {
            input_file,
            rules,
            preset,
            output,
            explain,
            engine,
        } => engine.resolve().and_then(|options| {
            let source = match (rules, preset) {
                (Some(path), _) => RuleSource::File(path),
                (None, Some(name)) => RuleSource::Preset(name),
                (None, None) => RuleSource::Preset("demo".into()),
            };
            commands::classify::run(&input_file, &source, &options, &output, explain)
        }),
        Commands::Stream { rules, engine } => engine
            .resolve()
            .and_then(|options| commands::stream::run(rules, &options)),
        Commands::Rules { action } => match action {
            RulesAction::List => commands::rules::list(),
            RulesAction::Explain { preset } => commands::rules::explain(&preset),
            RulesAction::Schema => commands::rules::schema(),
            RulesAction::Validate { file } => commands::rules::validate(&file),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
