//! Tournament orchestrator.
//!
//! Wires together:
//! - Seeding (upstream score order)
//! - Bracket planning (byes, best-vs-worst pairing)
//! - Match execution (bidirectional judging with seed fallback)
//!
//! Core loop:
//! 1. Seed the candidates and build the bracket.
//! 2. Plan the round from the current field.
//! 3. Judge the round's matches concurrently, bounded by `max_concurrency`,
//!    racing the round against the deadline and the cancel signal.
//! 4. If interrupted, resolve every undecided match of this and later rounds
//!    by seed.
//! 5. Advance byes and winners; repeat until one entrant remains.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::bracket::{plan_round, Bracket, Entrant};
use super::cancel::CancelSignal;
use super::config::{ConfigError, TournamentConfig};
use super::executor::{resolve_by_seed, MatchExecutor, MatchOutcome, MatchSettings};
use super::judge::Judge;
use super::seeding::seed_candidates;
use super::trace::{hash_text, MatchTrace, TraceError, TraceSink};
use super::types::{
    Match, TournamentRequest, TournamentResult, TournamentStopReason,
};

/// Upper bound on bracket size.
pub const MAX_CANDIDATES: usize = 256;

// =============================================================================
// Error type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TournamentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<ConfigError> for TournamentError {
    fn from(err: ConfigError) -> Self {
        TournamentError::InvalidRequest(err.to_string())
    }
}

/// Reject requests that cannot produce a meaningful bracket.
pub fn validate_tournament_request(
    req: &TournamentRequest,
    config: &TournamentConfig,
) -> Result<(), TournamentError> {
    config.validate()?;

    if req.user_input.trim().is_empty() {
        return Err(TournamentError::InvalidRequest(
            "user_input must be non-empty".into(),
        ));
    }
    if req.candidates.len() > MAX_CANDIDATES {
        return Err(TournamentError::InvalidRequest(format!(
            "too many candidates: {} (max {MAX_CANDIDATES})",
            req.candidates.len()
        )));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for c in &req.candidates {
        if c.id.trim().is_empty() {
            return Err(TournamentError::InvalidRequest(
                "candidate id must be non-empty".into(),
            ));
        }
        if !seen.insert(c.id.as_str()) {
            return Err(TournamentError::InvalidRequest(format!(
                "duplicate candidate id: {}",
                c.id
            )));
        }
        if !(0.0..=1.0).contains(&c.original_score) {
            return Err(TournamentError::InvalidRequest(format!(
                "candidate {} has original_score {} outside [0, 1]",
                c.id, c.original_score
            )));
        }
    }
    Ok(())
}

// =============================================================================
// Entry points
// =============================================================================

/// Run a tournament.
///
/// Judge failures never surface here; they are recorded on the affected
/// matches. Only invalid requests and trace I/O return `Err`.
pub async fn run_tournament<J: Judge + ?Sized>(
    judge: &J,
    config: &TournamentConfig,
    req: TournamentRequest,
    cancel: Option<&CancelSignal>,
) -> Result<TournamentResult, TournamentError> {
    run_tournament_with_trace(judge, config, req, None, cancel).await
}

/// Blocking form of [`run_tournament`] on a private current-thread runtime.
///
/// Panics if called from inside a Tokio runtime; use the async form there.
pub fn run_tournament_blocking<J: Judge + ?Sized>(
    judge: &J,
    config: &TournamentConfig,
    req: TournamentRequest,
) -> Result<TournamentResult, TournamentError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TournamentError::Runtime(e.to_string()))?;
    runtime.block_on(run_tournament(judge, config, req, None))
}

/// Run a tournament with optional per-match trace output.
pub async fn run_tournament_with_trace<J: Judge + ?Sized>(
    judge: &J,
    config: &TournamentConfig,
    req: TournamentRequest,
    trace: Option<&dyn TraceSink>,
    cancel: Option<&CancelSignal>,
) -> Result<TournamentResult, TournamentError> {
    validate_tournament_request(&req, config)?;

    let tournament_id = uuid::Uuid::new_v4().to_string();
    let started = Instant::now();
    let start_time = Utc::now();
    let seed_rankings = seed_candidates(&req.candidates);

    info!(
        %tournament_id,
        kind = req.kind.as_str(),
        candidates = req.candidates.len(),
        "tournament start"
    );

    let mut result = TournamentResult {
        tournament_id: tournament_id.clone(),
        kind: req.kind,
        user_input: req.user_input.clone(),
        seed_rankings,
        matches: Vec::new(),
        winner_id: None,
        winner_confidence: 0.0,
        total_comparisons: 0,
        llm_calls: 0,
        retries: 0,
        judge_invocations: 0,
        total_latency_ms: 0,
        stop_reason: TournamentStopReason::InsufficientCandidates,
        success: false,
        error_message: None,
        start_time,
        end_time: start_time,
    };

    match req.candidates.as_slice() {
        [] => {
            result.error_message = Some("not applicable: no candidates".into());
            return Ok(finish(result, started));
        }
        [only] => {
            result.winner_id = Some(only.id.clone());
            result.winner_confidence = only.original_score;
            result.success = true;
            return Ok(finish(result, started));
        }
        _ => {}
    }

    let rubric = config.rubric_for(req.kind);
    let rubric_hash = rubric.content_hash();
    let user_input_hash = hash_text(&req.user_input);
    let executor = MatchExecutor::new(
        judge,
        &rubric,
        &req.user_input,
        MatchSettings::from(config),
    );

    let index_by_id: HashMap<&str, usize> = req
        .candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();
    let entrants: Vec<Entrant> = result
        .seed_rankings
        .iter()
        .filter_map(|s| {
            index_by_id.get(s.candidate_id.as_str()).map(|&index| Entrant {
                index,
                seed: s.seed_rank,
            })
        })
        .collect();
    let bracket = Bracket::new(entrants);
    debug!(
        %tournament_id,
        rounds = bracket.total_rounds(),
        rubric = rubric.name(),
        "bracket built"
    );

    let deadline = config
        .deadline()
        .map(|d| tokio::time::Instant::now() + d);
    let mut stop_reason = TournamentStopReason::Completed;
    let mut field: Vec<Entrant> = bracket.entrants().to_vec();
    let mut matches: Vec<Match> = Vec::new();
    let mut round = 0usize;

    while field.len() > 1 {
        let plan = plan_round(&field);
        debug!(
            %tournament_id,
            round,
            matches = plan.pairings.len(),
            byes = plan.byes.len(),
            "round start"
        );

        let mut outcomes: Vec<MatchOutcome> = Vec::with_capacity(plan.pairings.len());

        if stop_reason == TournamentStopReason::Completed {
            let round_stream = stream::iter(plan.pairings.iter().map(|p| {
                let a = &req.candidates[p.a.index];
                let b = &req.candidates[p.b.index];
                executor.run(round, *p, a, b)
            }))
            .buffer_unordered(config.max_concurrency);
            let mut round_stream = std::pin::pin!(round_stream);

            let interrupted = loop {
                tokio::select! {
                    biased;
                    _ = wait_for_cancel(cancel) => break Some(TournamentStopReason::Cancelled),
                    _ = wait_for_deadline(deadline) => break Some(TournamentStopReason::DeadlineExceeded),
                    next = round_stream.next() => match next {
                        Some(outcome) => outcomes.push(outcome),
                        None => break None,
                    },
                }
            };

            if let Some(reason) = interrupted {
                warn!(
                    %tournament_id,
                    round,
                    decided = outcomes.len(),
                    undecided = plan.pairings.len() - outcomes.len(),
                    reason = ?reason,
                    "tournament interrupted; resolving remaining matches by seed"
                );
                stop_reason = reason;
            }
        }

        if stop_reason != TournamentStopReason::Completed {
            let decided: HashSet<usize> =
                outcomes.iter().map(|o| o.record.match_index).collect();
            let why = interruption_message(stop_reason);
            for p in plan.pairings.iter().filter(|p| !decided.contains(&p.match_index)) {
                let a = &req.candidates[p.a.index];
                let b = &req.candidates[p.b.index];
                outcomes.push(resolve_by_seed(round, *p, a, b, why));
            }
        }

        outcomes.sort_by_key(|o| o.record.match_index);

        if let Some(trace) = trace {
            for o in &outcomes {
                trace.record(MatchTrace::from_match(
                    &tournament_id,
                    rubric.name(),
                    &rubric_hash,
                    &user_input_hash,
                    &o.record,
                ))?;
            }
        }

        field = Bracket::advance(&plan, outcomes.iter().map(|o| o.winner));
        matches.extend(outcomes.into_iter().map(|o| o.record));
        round += 1;
    }

    result.winner_id = field
        .first()
        .map(|e| req.candidates[e.index].id.clone());
    result.winner_confidence = matches.last().map(|m| m.win_confidence).unwrap_or(0.0);
    result.total_comparisons = matches.len();
    let judged = matches.iter().filter(|m| m.success).count() as u32;
    result.retries = matches.iter().map(|m| m.retries).sum();
    result.llm_calls = 2 * judged + result.retries;
    result.judge_invocations = matches.iter().map(|m| m.judge_calls).sum();
    result.matches = matches;
    result.stop_reason = stop_reason;
    result.success = true;

    let result = finish(result, started);
    info!(
        %tournament_id,
        winner = ?result.winner_id,
        confidence = result.winner_confidence,
        comparisons = result.total_comparisons,
        llm_calls = result.llm_calls,
        judge_invocations = result.judge_invocations,
        fallbacks = result.fallback_matches(),
        stop_reason = ?result.stop_reason,
        latency_ms = result.total_latency_ms,
        "tournament finished"
    );
    Ok(result)
}

fn finish(mut result: TournamentResult, started: Instant) -> TournamentResult {
    result.total_latency_ms = started.elapsed().as_millis() as u64;
    result.end_time = Utc::now();
    result
}

fn interruption_message(reason: TournamentStopReason) -> &'static str {
    match reason {
        TournamentStopReason::Cancelled => "cancelled before judging; advanced by seed",
        _ => "deadline exceeded before judging; advanced by seed",
    }
}

async fn wait_for_cancel(cancel: Option<&CancelSignal>) {
    match cancel {
        Some(signal) => signal.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn wait_for_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
