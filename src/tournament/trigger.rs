//! Decide whether a candidate list is ambiguous enough to pay for a tournament.

use serde::{Deserialize, Serialize};

use super::types::Candidate;

fn default_margin_threshold() -> f64 {
    0.15
}

fn default_high_confidence_ceiling() -> f64 {
    0.92
}

/// Thresholds for the trigger gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Fire only when the rank-1 to rank-2 gap is strictly below this.
    #[serde(default = "default_margin_threshold")]
    pub margin_threshold: f64,
    /// Never fire when the top score is at or above this.
    #[serde(default = "default_high_confidence_ceiling")]
    pub high_confidence_ceiling: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            margin_threshold: default_margin_threshold(),
            high_confidence_ceiling: default_high_confidence_ceiling(),
        }
    }
}

/// Why the gate did or did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Top two are close and the leader is not confident.
    Ambiguous,
    /// Fewer than two candidates.
    TooFewCandidates,
    /// Leader is clear of the runner-up.
    ClearMargin,
    /// Leader's score is already above the ceiling.
    ConfidentLeader,
}

/// Full gate output, for logging and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerDecision {
    pub trigger: bool,
    pub reason: TriggerReason,
    pub top_score: Option<f64>,
    /// Rank 1 minus rank 2.
    pub top_gap: Option<f64>,
    /// Rank 2 minus rank 3.
    pub second_gap: Option<f64>,
}

/// Evaluate the gate. Input order does not matter; scores are ranked here.
pub fn evaluate_trigger(candidates: &[Candidate], config: &TriggerConfig) -> TriggerDecision {
    let mut scores: Vec<f64> = candidates.iter().map(|c| c.original_score).collect();
    scores.sort_by(|a, b| b.total_cmp(a));

    let top_score = scores.first().copied();
    let top_gap = match scores.as_slice() {
        [first, second, ..] => Some(first - second),
        _ => None,
    };
    let second_gap = match scores.as_slice() {
        [_, second, third, ..] => Some(second - third),
        _ => None,
    };

    let (trigger, reason) = match (top_score, top_gap) {
        (Some(top), Some(gap)) => {
            if top.is_nan() || top >= config.high_confidence_ceiling {
                (false, TriggerReason::ConfidentLeader)
            } else if gap.is_nan() || gap >= config.margin_threshold {
                (false, TriggerReason::ClearMargin)
            } else {
                (true, TriggerReason::Ambiguous)
            }
        }
        _ => (false, TriggerReason::TooFewCandidates),
    };

    TriggerDecision {
        trigger,
        reason,
        top_score,
        top_gap,
        second_gap,
    }
}

/// Whether a tournament is worth running for these candidates.
pub fn should_run_tournament(candidates: &[Candidate], config: &TriggerConfig) -> bool {
    evaluate_trigger(candidates, config).trigger
}
