use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;

use lead_score::records::{load_records, Module, Record};
use lead_score::scoring::{validate_rules, ConditionEvaluator, ScoreCalculator, ScoringRule};
use lead_score::store::{FileRuleStore, InMemoryRuleStore, RuleStore};

const EXIT_SUCCESS: i32 = 0;
const EXIT_SCORING: i32 = 2;
const EXIT_CONFIG: i32 = 4;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    /// Aligned, optionally colored table
    Table,
    /// Tab-separated: score, module, id, name
    Tsv,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score every record in a JSON file, highest first
    Score {
        /// JSON file containing an array of records
        records: PathBuf,

        /// Only score records of this module
        #[arg(short, long)]
        module: Option<Module>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Show how a single record's score was built
    Explain {
        /// JSON file containing an array of records
        records: PathBuf,

        /// Id of the record to explain
        id: String,
    },
    /// List configured scoring rules
    Rules {
        /// Only list rules for this module
        #[arg(short, long)]
        module: Option<Module>,

        /// Include inactive rules
        #[arg(short, long)]
        all: bool,
    },
    /// Validate the scoring rules and exit
    Check,
    /// Write a starter config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

#[derive(Parser, Debug)]
#[command(name = "lead-score")]
#[command(about = "Score CRM records against weighted rule criteria", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/lead-score/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Read rules from this YAML file on every lookup instead of the config
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() {
    let cli = Cli::parse();
    lead_score::logging::init(cli.verbose);
    let start_time = Instant::now();
    let config_path = cli.config.map(PathBuf::from);

    if let Commands::Init { force } = cli.command {
        match lead_score::config::write_starter_config(config_path, force) {
            Ok(path) => {
                println!("Config written to {}", path.display());
                println!("Run `lead-score check` to validate it.");
                std::process::exit(EXIT_SUCCESS);
            }
            Err(e) => {
                eprintln!("Init error: {:#}", e);
                std::process::exit(EXIT_CONFIG);
            }
        }
    }

    // Load rules and pick the store that serves them
    let (rules, store): (Vec<ScoringRule>, Box<dyn RuleStore>) = match cli.rules {
        Some(path) => {
            let store = FileRuleStore::new(path);
            match store.load() {
                Ok(rules) => (rules, Box::new(store)),
                Err(e) => {
                    eprintln!("Rules error: {}", e);
                    std::process::exit(EXIT_CONFIG);
                }
            }
        }
        None => match lead_score::config::load_config(config_path) {
            Ok(config) => {
                let store = InMemoryRuleStore::new(config.rules.clone());
                (config.rules, Box::new(store))
            }
            Err(e) => {
                eprintln!("Config error: {:#}", e);
                std::process::exit(EXIT_CONFIG);
            }
        },
    };

    tracing::debug!(rules = rules.len(), "loaded scoring rules");

    // Validate scoring rules at startup
    if let Err(errors) = validate_rules(&rules) {
        eprintln!("Scoring rule errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    let use_colors = lead_score::output::should_use_colors();
    let calculator = ScoreCalculator::new(store, ConditionEvaluator::new());

    match cli.command {
        Commands::Check => {
            let active = rules.iter().filter(|r| r.active).count();
            println!("ok: {} rules ({} active)", rules.len(), active);
        }
        Commands::Rules { module, all } => {
            let listed: Vec<&ScoringRule> = rules
                .iter()
                .filter(|r| all || r.active)
                .filter(|r| module.map_or(true, |m| r.module == m))
                .collect();
            println!("{}", lead_score::output::format_rule_list(&listed, use_colors));
        }
        Commands::Score {
            records,
            module,
            format,
        } => {
            let mut records = load_records_or_exit(&records);
            if let Some(m) = module {
                records.retain(|r| r.module == m);
            }

            let scored = match calculator.score_all(&records) {
                Ok(scored) => scored,
                Err(e) => {
                    eprintln!("Scoring error: {:#}", anyhow::Error::new(e));
                    std::process::exit(EXIT_SCORING);
                }
            };

            let rows: Vec<lead_score::output::ScoredRecord> = scored
                .iter()
                .map(|(record, result)| lead_score::output::ScoredRecord { record, result })
                .collect();

            let output = match format {
                OutputFormat::Table => lead_score::output::format_scored_table(&rows, use_colors),
                OutputFormat::Tsv => lead_score::output::format_tsv(&rows),
            };
            if !output.is_empty() {
                println!("{}", output);
            }

            tracing::info!(
                records = rows.len(),
                elapsed = ?start_time.elapsed(),
                "scored records"
            );
        }
        Commands::Explain { records, id } => {
            let records = load_records_or_exit(&records);
            let Some(record) = records.iter().find(|r| r.id == id) else {
                eprintln!("No record with id '{}'", id);
                std::process::exit(EXIT_SCORING);
            };

            match calculator.explain(record) {
                Ok(result) => println!(
                    "{}",
                    lead_score::output::format_breakdown(record, &result, use_colors)
                ),
                Err(e) => {
                    eprintln!("Scoring error: {:#}", anyhow::Error::new(e));
                    std::process::exit(EXIT_SCORING);
                }
            }
        }
        Commands::Init { .. } => unreachable!("init is handled before rules are loaded"),
    }

    std::process::exit(EXIT_SUCCESS);
}

fn load_records_or_exit(path: &std::path::Path) -> Vec<Record> {
    match load_records(path) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Records error: {:#}", e);
            std::process::exit(EXIT_SCORING);
        }
    }
}
