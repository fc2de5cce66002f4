//! Tournament-based disambiguation.
//!
//! When an upstream matcher returns several close candidates, a single-elimination
//! bracket of bidirectional LLM comparisons picks the one that best fits the
//! user's input. Seeds come from the upstream scores; judge failures and ties
//! fall back to seed order, so a tournament always produces a winner.

pub mod bracket;
pub mod cancel;
pub mod config;
pub mod executor;
pub mod judge;
pub mod ledger;
pub mod orchestrator;
pub mod rubric;
pub mod seeding;
pub mod trace;
pub mod trigger;
pub mod types;

pub use bracket::{plan_round, Bracket, Entrant, Pairing, RoundPlan};
pub use cancel::{CancelHandle, CancelSignal};
pub use config::{ConfigError, TournamentConfig};
pub use executor::{MatchExecutor, MatchOutcome, MatchSettings};
pub use judge::{Judge, JudgeError, JudgeVerdict, LlmJudge};
pub use ledger::TournamentLedger;
pub use orchestrator::{
    run_tournament, run_tournament_blocking, run_tournament_with_trace,
    validate_tournament_request, TournamentError,
};
pub use rubric::{Dimension, Rubric, RubricError, RubricSpec};
pub use seeding::seed_candidates;
pub use trace::{JsonlTraceSink, MatchTrace, TraceError, TraceSink, TraceWorker};
pub use trigger::{evaluate_trigger, should_run_tournament, TriggerConfig, TriggerDecision, TriggerReason};
pub use types::*;
