#![forbid(unsafe_code)]

//! # bracket-harness
//!
//! Pick the right candidate when an upstream matcher can't.
//!
//! Intent matchers, tool retrievers and analysis generators often return a
//! handful of candidates whose scores are too close to trust. bracket-harness
//! runs a seeded single-elimination tournament over them: each match asks an
//! LLM judge to score both candidates on a weighted rubric, once in each order
//! so position bias cancels out. Ties, judge failures, deadlines and
//! cancellation all fall back to the upstream ranking, so a run always ends
//! with a winner and a full audit trail.
//!
//! The cheap [`should_run_tournament`] gate decides whether the candidates are
//! ambiguous enough to be worth the judge calls.

pub mod gateway;
pub mod prompts;
pub mod tournament;

pub use gateway::{ChatGateway, GatewayError, OpenRouterAdapter};
pub use tournament::{
    evaluate_trigger, run_tournament, run_tournament_blocking, run_tournament_with_trace,
    should_run_tournament, CancelHandle, CancelSignal, Candidate, Contender, Judge, JudgeError,
    JudgeVerdict, JsonlTraceSink, LlmJudge, Rubric, TournamentConfig, TournamentError,
    TournamentKind, TournamentLedger, TournamentRequest, TournamentResult, TraceSink,
};
