#![forbid(unsafe_code)]

use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bracket_harness::tournament::judge::DEFAULT_JUDGE_MODEL;
use bracket_harness::tournament::{
    evaluate_trigger, run_tournament_with_trace, seed_candidates, JsonlTraceSink, LlmJudge, Rubric,
    RubricSpec, TournamentConfig, TournamentKind, TournamentRequest, TournamentResult, TraceSink,
    TriggerDecision,
};
use bracket_harness::OpenRouterAdapter;

#[derive(Parser)]
#[command(name = "bracket", version, about = "Tournament disambiguation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the trigger gate for a request (no LLM calls)
    Trigger {
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the rubric for a kind, or validate and normalize a rubric file
    Rubric {
        #[arg(long, default_value = "intent")]
        kind: TournamentKind,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Run a tournament from JSON input (LLM calls)
    Run {
        #[arg(long)]
        request: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = DEFAULT_JUDGE_MODEL)]
        model: String,
        /// Write one JSON line per match
        #[arg(long)]
        trace: Option<PathBuf>,
        /// Run even when the trigger gate says the candidates are not ambiguous
        #[arg(long)]
        force: bool,
    },
}

/// What `run` writes: the gate decision and, when it fired, the tournament.
#[derive(Serialize)]
struct RunOutput {
    decision: TriggerDecision,
    /// Tournament winner, or the top seed when no tournament ran.
    selected_id: Option<String>,
    result: Option<TournamentResult>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Trigger { request, config } => {
            let req: TournamentRequest = read_json(&request)?;
            let config = load_config(config.as_deref())?;
            let decision = evaluate_trigger(&req.candidates, &config.trigger);
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Commands::Rubric { kind, file } => {
            let rubric = match file {
                Some(path) => {
                    let spec: RubricSpec = read_json(&path)?;
                    Rubric::try_from(spec)?
                }
                None => Rubric::for_kind(kind),
            };
            println!("{}", serde_json::to_string_pretty(&rubric)?);
        }
        Commands::Run {
            request,
            out,
            config,
            model,
            trace,
            force,
        } => {
            let req: TournamentRequest = read_json(&request)?;
            let config = load_config(config.as_deref())?;
            let decision = evaluate_trigger(&req.candidates, &config.trigger);

            let output = if decision.trigger || force {
                let judge = LlmJudge::new(OpenRouterAdapter::from_env()?, model);
                let (sink, worker) = match trace {
                    Some(path) => {
                        let (sink, worker) = JsonlTraceSink::new(path)?;
                        (Some(sink), Some(worker))
                    }
                    None => (None, None),
                };
                let result = run_tournament_with_trace(
                    &judge,
                    &config,
                    req,
                    sink.as_ref().map(|s| s as &dyn TraceSink),
                    None,
                )
                .await?;
                drop(sink);
                if let Some(worker) = worker {
                    worker.join()?;
                }
                RunOutput {
                    decision,
                    selected_id: result.winner_or_top_seed().map(str::to_string),
                    result: Some(result),
                }
            } else {
                tracing::info!(reason = ?decision.reason, "trigger gate did not fire; keeping top seed");
                RunOutput {
                    decision,
                    selected_id: seed_candidates(&req.candidates)
                        .first()
                        .map(|s| s.candidate_id.clone()),
                    result: None,
                }
            };

            match out {
                Some(path) => write_json(&path, &output)?,
                None => println!("{}", serde_json::to_string_pretty(&output)?),
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays clean JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<TournamentConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(TournamentConfig::from_json_path(path)?),
        None => Ok(TournamentConfig::default()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
