//! Cross-run totals. Owned by the caller; the orchestrator never touches it.

use serde::Serialize;

use super::types::{MatchDecision, TournamentResult, TournamentStopReason};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TournamentLedger {
    pub tournaments: u64,
    /// Runs that built a bracket (two or more candidates).
    pub bracketed: u64,
    pub matches: u64,
    pub judge_calls: u64,
    pub retries: u64,
    pub fallbacks: u64,
    pub ties: u64,
    /// Runs cut short by deadline or cancellation.
    pub degraded: u64,
    pub failed: u64,
    pub total_latency_ms: u64,
}

impl TournamentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &TournamentResult) {
        self.tournaments += 1;
        if result.stop_reason != TournamentStopReason::InsufficientCandidates {
            self.bracketed += 1;
        }
        if result.degraded() {
            self.degraded += 1;
        }
        if !result.success {
            self.failed += 1;
        }
        self.matches += result.matches.len() as u64;
        self.judge_calls += u64::from(result.judge_invocations);
        self.retries += u64::from(result.retries);
        for m in &result.matches {
            match m.decided_by {
                MatchDecision::Fallback => self.fallbacks += 1,
                MatchDecision::TieBreak => self.ties += 1,
                MatchDecision::Judge => {}
            }
        }
        self.total_latency_ms = self.total_latency_ms.saturating_add(result.total_latency_ms);
    }

    pub fn mean_latency_ms(&self) -> f64 {
        if self.tournaments == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.tournaments as f64
        }
    }

    /// Share of played matches that needed a seed fallback.
    pub fn fallback_rate(&self) -> f64 {
        if self.matches == 0 {
            0.0
        } else {
            self.fallbacks as f64 / self.matches as f64
        }
    }
}
