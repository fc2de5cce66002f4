//! Bidirectional match execution.
//!
//! Every match is judged twice, once per candidate order, and the two verdicts
//! are folded into a single score for the better seed (side A):
//!
//! ```text
//! scoreA[d] = w * forward[d] + (1 - w) * (1 - backward[d])
//! aggA      = sum(weight[d] * scoreA[d])
//! ```
//!
//! A judge that always prefers whichever candidate is listed first yields
//! `forward[d] = backward[d]`, which cancels to 0.5 at `w = 0.5`.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use super::bracket::{Entrant, Pairing};
use super::config::TournamentConfig;
use super::judge::{Judge, JudgeError, JudgeVerdict};
use super::rubric::Rubric;
use super::types::{Candidate, Match, MatchDecision};

/// Confidence reported when the winner came from seed order.
pub const SEED_TIEBREAK_CONFIDENCE: f64 = 0.5;

/// Knobs the executor reads from [`TournamentConfig`].
#[derive(Debug, Clone, Copy)]
pub struct MatchSettings {
    pub tie_epsilon: f64,
    pub forward_weight: f64,
    pub judge_timeout: Duration,
    pub retries_per_direction: u32,
}

impl From<&TournamentConfig> for MatchSettings {
    fn from(config: &TournamentConfig) -> Self {
        Self {
            tie_epsilon: config.tie_epsilon,
            forward_weight: config.forward_weight,
            judge_timeout: config.judge_timeout(),
            retries_per_direction: config.retries_per_direction,
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self::from(&TournamentConfig::default())
    }
}

/// Which side of a pairing won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

/// A decided match plus the entrant that advances.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub record: Match,
    pub winner: Entrant,
}

/// Result of one direction after retries.
struct DirectionOutcome {
    result: Result<JudgeVerdict, JudgeError>,
    attempts: u32,
}

// =============================================================================
// Scoring
// =============================================================================

/// Per-dimension combined score for A.
pub fn combine_directions(
    rubric: &Rubric,
    forward: &JudgeVerdict,
    backward: &JudgeVerdict,
    forward_weight: f64,
) -> BTreeMap<String, f64> {
    rubric
        .dimensions()
        .iter()
        .map(|d| {
            let f = forward.dimension_scores.get(&d.id).copied().unwrap_or(0.5);
            let b = backward.dimension_scores.get(&d.id).copied().unwrap_or(0.5);
            let s = forward_weight * f + (1.0 - forward_weight) * (1.0 - b);
            (d.id.clone(), s.clamp(0.0, 1.0))
        })
        .collect()
}

/// Winner for an aggregate, or `None` inside the tie band.
pub fn decide(aggregate_a: f64, tie_epsilon: f64) -> Option<Side> {
    if aggregate_a > 0.5 + tie_epsilon {
        Some(Side::A)
    } else if aggregate_a < 0.5 - tie_epsilon {
        Some(Side::B)
    } else {
        None
    }
}

// =============================================================================
// Executor
// =============================================================================

pub struct MatchExecutor<'a, J: Judge + ?Sized> {
    judge: &'a J,
    rubric: &'a Rubric,
    user_input: &'a str,
    settings: MatchSettings,
}

impl<'a, J: Judge + ?Sized> MatchExecutor<'a, J> {
    pub fn new(
        judge: &'a J,
        rubric: &'a Rubric,
        user_input: &'a str,
        settings: MatchSettings,
    ) -> Self {
        Self {
            judge,
            rubric,
            user_input,
            settings,
        }
    }

    /// Judge one pairing. Never fails: judge errors resolve by seed.
    pub async fn run(
        &self,
        round: usize,
        pairing: Pairing,
        a: &Candidate,
        b: &Candidate,
    ) -> MatchOutcome {
        let start_time = Utc::now();
        let match_id = match_id(round, pairing.match_index);
        debug!(%match_id, a = %a.id, b = %b.id, "match start");

        let (forward, backward) = tokio::join!(
            self.judge_direction(&match_id, "forward", a, b),
            self.judge_direction(&match_id, "backward", b, a),
        );
        let judge_calls = forward.attempts + backward.attempts;
        let retries = forward.attempts.saturating_sub(1) + backward.attempts.saturating_sub(1);

        let mut record = Match {
            match_id,
            round,
            match_index: pairing.match_index,
            candidate_a: a.id.clone(),
            candidate_b: b.id.clone(),
            seed_a: pairing.a.seed,
            seed_b: pairing.b.seed,
            winner_id: None,
            win_confidence: SEED_TIEBREAK_CONFIDENCE,
            aggregate_a: None,
            dimension_scores: BTreeMap::new(),
            reasoning: String::new(),
            decided_by: MatchDecision::Fallback,
            judge_calls,
            retries,
            success: false,
            error_message: None,
            start_time,
            end_time: start_time,
        };

        let winner = match (forward.result, backward.result) {
            (Ok(fwd), Ok(bwd)) => {
                let scores = combine_directions(self.rubric, &fwd, &bwd, self.settings.forward_weight);
                let aggregate = self.rubric.weighted_score_by(|id| scores.get(id).copied());
                record.aggregate_a = Some(aggregate);
                record.dimension_scores = scores;
                record.reasoning = format!(
                    "forward: {}\nbackward: {}",
                    fwd.reasoning.trim(),
                    bwd.reasoning.trim()
                );
                record.success = true;
                match decide(aggregate, self.settings.tie_epsilon) {
                    Some(Side::A) => {
                        record.decided_by = MatchDecision::Judge;
                        record.win_confidence = aggregate;
                        pairing.a
                    }
                    Some(Side::B) => {
                        record.decided_by = MatchDecision::Judge;
                        record.win_confidence = 1.0 - aggregate;
                        pairing.b
                    }
                    None => {
                        record.decided_by = MatchDecision::TieBreak;
                        pairing.better_seed()
                    }
                }
            }
            (fwd, bwd) => {
                let mut errors = Vec::new();
                if let Err(e) = fwd {
                    errors.push(format!("forward: {e}"));
                }
                if let Err(e) = bwd {
                    errors.push(format!("backward: {e}"));
                }
                let message = errors.join("; ");
                warn!(
                    match_id = %record.match_id,
                    error = %message,
                    "judge failed; advancing better seed"
                );
                record.error_message = Some(message);
                pairing.better_seed()
            }
        };

        record.winner_id = Some(if winner == pairing.a {
            a.id.clone()
        } else {
            b.id.clone()
        });
        record.end_time = Utc::now();
        debug!(
            match_id = %record.match_id,
            winner = ?record.winner_id,
            confidence = record.win_confidence,
            decided_by = ?record.decided_by,
            "match decided"
        );

        MatchOutcome { record, winner }
    }

    async fn judge_direction(
        &self,
        match_id: &str,
        direction: &'static str,
        first: &Candidate,
        second: &Candidate,
    ) -> DirectionOutcome {
        let max_attempts = self.settings.retries_per_direction.saturating_add(1);
        let timeout_ms = self.settings.judge_timeout.as_millis() as u64;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let call = self.judge.compare(self.user_input, first, second, self.rubric);
            let result = match tokio::time::timeout(self.settings.judge_timeout, call).await {
                Ok(Ok(verdict)) => verdict.validate(self.rubric).map(|_| verdict),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(JudgeError::Timeout(timeout_ms)),
            };
            match result {
                Ok(verdict) => {
                    return DirectionOutcome {
                        result: Ok(verdict),
                        attempts,
                    }
                }
                Err(e) if attempts < max_attempts && e.is_retryable() => {
                    warn!(
                        %match_id,
                        direction,
                        attempt = attempts,
                        kind = e.kind(),
                        error = %e,
                        "judge call failed; retrying"
                    );
                }
                Err(e) => {
                    return DirectionOutcome {
                        result: Err(e),
                        attempts,
                    }
                }
            }
        }
    }
}

/// Record a pairing decided by seed without judging (deadline or cancellation).
pub fn resolve_by_seed(
    round: usize,
    pairing: Pairing,
    a: &Candidate,
    b: &Candidate,
    reason: &str,
) -> MatchOutcome {
    let now = Utc::now();
    let winner = pairing.better_seed();
    let winner_id = if winner == pairing.a { &a.id } else { &b.id };
    MatchOutcome {
        record: Match {
            match_id: match_id(round, pairing.match_index),
            round,
            match_index: pairing.match_index,
            candidate_a: a.id.clone(),
            candidate_b: b.id.clone(),
            seed_a: pairing.a.seed,
            seed_b: pairing.b.seed,
            winner_id: Some(winner_id.clone()),
            win_confidence: SEED_TIEBREAK_CONFIDENCE,
            aggregate_a: None,
            dimension_scores: BTreeMap::new(),
            reasoning: String::new(),
            decided_by: MatchDecision::Fallback,
            judge_calls: 0,
            retries: 0,
            success: false,
            error_message: Some(reason.to_string()),
            start_time: now,
            end_time: now,
        },
        winner,
    }
}

pub fn match_id(round: usize, match_index: usize) -> String {
    format!("r{round}-m{match_index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::rubric::intent_disambiguation;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn verdict(rubric: &Rubric, score: f64) -> JudgeVerdict {
        JudgeVerdict {
            dimension_scores: rubric
                .dimensions()
                .iter()
                .map(|d| (d.id.clone(), score))
                .collect(),
            reasoning: "r".into(),
            latency_ms: 1,
        }
    }

    /// Scores FIRST with a fixed value regardless of content.
    struct PositionJudge(f64);

    #[async_trait]
    impl Judge for PositionJudge {
        async fn compare(
            &self,
            _: &str,
            _: &Candidate,
            _: &Candidate,
            rubric: &Rubric,
        ) -> Result<JudgeVerdict, JudgeError> {
            Ok(verdict(rubric, self.0))
        }
    }

    /// Prefers whichever candidate has the named id.
    struct FavoriteJudge(&'static str);

    #[async_trait]
    impl Judge for FavoriteJudge {
        async fn compare(
            &self,
            _: &str,
            first: &Candidate,
            _: &Candidate,
            rubric: &Rubric,
        ) -> Result<JudgeVerdict, JudgeError> {
            Ok(verdict(rubric, if first.id == self.0 { 0.9 } else { 0.1 }))
        }
    }

    /// Fails the first `fail_first` calls, then behaves like `FavoriteJudge`.
    struct FlakyJudge {
        calls: AtomicU32,
        fail_first: u32,
        favorite: &'static str,
    }

    #[async_trait]
    impl Judge for FlakyJudge {
        async fn compare(
            &self,
            input: &str,
            first: &Candidate,
            second: &Candidate,
            rubric: &Rubric,
        ) -> Result<JudgeVerdict, JudgeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(JudgeError::Unavailable("boom".into()));
            }
            FavoriteJudge(self.favorite)
                .compare(input, first, second, rubric)
                .await
        }
    }

    /// Fails whenever `failing` is listed first; otherwise strongly prefers FIRST.
    struct OneSidedJudge {
        failing: &'static str,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Judge for OneSidedJudge {
        async fn compare(
            &self,
            _: &str,
            first: &Candidate,
            _: &Candidate,
            rubric: &Rubric,
        ) -> Result<JudgeVerdict, JudgeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if first.id == self.failing {
                return Err(JudgeError::Timeout(5));
            }
            Ok(verdict(rubric, 1.0))
        }
    }

    struct HangingJudge;

    #[async_trait]
    impl Judge for HangingJudge {
        async fn compare(
            &self,
            _: &str,
            _: &Candidate,
            _: &Candidate,
            _: &Rubric,
        ) -> Result<JudgeVerdict, JudgeError> {
            std::future::pending().await
        }
    }

    struct PartialJudge;

    #[async_trait]
    impl Judge for PartialJudge {
        async fn compare(
            &self,
            _: &str,
            _: &Candidate,
            _: &Candidate,
            _: &Rubric,
        ) -> Result<JudgeVerdict, JudgeError> {
            let mut scores = HashMap::new();
            scores.insert("semantic_alignment".to_string(), 0.9);
            Ok(JudgeVerdict {
                dimension_scores: scores,
                reasoning: String::new(),
                latency_ms: 0,
            })
        }
    }

    fn setup() -> (Pairing, Candidate, Candidate) {
        let pairing = Pairing {
            match_index: 0,
            a: Entrant { index: 0, seed: 1 },
            b: Entrant { index: 1, seed: 4 },
        };
        (
            pairing,
            Candidate::new("top", "Top", 0.4),
            Candidate::new("low", "Low", 0.35),
        )
    }

    #[tokio::test]
    async fn position_bias_cancels_to_a_tie() {
        let rubric = intent_disambiguation();
        let (pairing, a, b) = setup();
        for bias in [0.0, 0.3, 0.7, 1.0] {
            let judge = PositionJudge(bias);
            let exec = MatchExecutor::new(&judge, &rubric, "q", MatchSettings::default());
            let out = exec.run(0, pairing, &a, &b).await;
            assert!((out.record.aggregate_a.unwrap() - 0.5).abs() < 1e-9);
            assert_eq!(out.record.decided_by, MatchDecision::TieBreak);
            assert_eq!(out.winner.seed, 1);
            assert_eq!(out.record.win_confidence, SEED_TIEBREAK_CONFIDENCE);
            assert!(out.record.success);
            assert_eq!(out.record.judge_calls, 2);
        }
    }

    #[tokio::test]
    async fn content_preference_survives_order_swap() {
        let rubric = intent_disambiguation();
        let (pairing, a, b) = setup();
        let judge = FavoriteJudge("low");
        let exec = MatchExecutor::new(&judge, &rubric, "q", MatchSettings::default());
        let out = exec.run(0, pairing, &a, &b).await;
        assert_eq!(out.record.winner_id.as_deref(), Some("low"));
        assert_eq!(out.winner.seed, 4);
        assert_eq!(out.record.decided_by, MatchDecision::Judge);
        // forward 0.1, backward 0.9 -> 0.5*0.1 + 0.5*0.1
        assert!((out.record.aggregate_a.unwrap() - 0.1).abs() < 1e-9);
        assert!((out.record.win_confidence - 0.9).abs() < 1e-9);
        assert_eq!(out.record.match_id, "r0-m0");
    }

    #[tokio::test]
    async fn one_retry_recovers_a_flaky_direction() {
        let rubric = intent_disambiguation();
        let (pairing, a, b) = setup();
        let judge = FlakyJudge {
            calls: AtomicU32::new(0),
            fail_first: 1,
            favorite: "top",
        };
        let exec = MatchExecutor::new(&judge, &rubric, "q", MatchSettings::default());
        let out = exec.run(0, pairing, &a, &b).await;
        assert!(out.record.success);
        assert_eq!(out.record.retries, 1);
        assert_eq!(out.record.judge_calls, 3);
        assert_eq!(out.record.winner_id.as_deref(), Some("top"));
    }

    #[tokio::test]
    async fn persistent_failure_falls_back_to_seed() {
        let rubric = intent_disambiguation();
        let (pairing, a, b) = setup();
        let judge = FlakyJudge {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
            favorite: "low",
        };
        let exec = MatchExecutor::new(&judge, &rubric, "q", MatchSettings::default());
        let out = exec.run(2, pairing, &a, &b).await;
        assert!(!out.record.success);
        assert_eq!(out.record.decided_by, MatchDecision::Fallback);
        assert_eq!(out.record.winner_id.as_deref(), Some("top"));
        assert_eq!(out.record.judge_calls, 4);
        assert_eq!(out.record.retries, 2);
        let msg = out.record.error_message.unwrap();
        assert!(msg.contains("forward") && msg.contains("backward"));
        assert_eq!(out.record.match_id, "r2-m0");
    }

    #[tokio::test]
    async fn one_failed_direction_discards_the_other_verdict() {
        let rubric = intent_disambiguation();
        let (pairing, a, b) = setup();
        // Forward lists "top" first and always fails; backward succeeds and
        // would hand the match to "low".
        let judge = OneSidedJudge {
            failing: "top",
            calls: AtomicU32::new(0),
        };
        let exec = MatchExecutor::new(&judge, &rubric, "q", MatchSettings::default());
        let out = exec.run(0, pairing, &a, &b).await;

        assert!(!out.record.success);
        assert_eq!(out.record.decided_by, MatchDecision::Fallback);
        assert_eq!(out.record.winner_id.as_deref(), Some("top"));
        assert_eq!(out.record.win_confidence, SEED_TIEBREAK_CONFIDENCE);
        assert!(out.record.aggregate_a.is_none());
        assert!(out.record.dimension_scores.is_empty());
        assert_eq!(out.record.judge_calls, 3);
        assert_eq!(out.record.retries, 1);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            out.record.error_message.as_deref(),
            Some("forward: judge call timed out after 5ms")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_fall_back_to_seed() {
        let rubric = intent_disambiguation();
        let (pairing, a, b) = setup();
        let judge = HangingJudge;
        let settings = MatchSettings {
            judge_timeout: Duration::from_millis(50),
            ..MatchSettings::default()
        };
        let exec = MatchExecutor::new(&judge, &rubric, "q", settings);
        let out = exec.run(0, pairing, &a, &b).await;
        assert!(!out.record.success);
        assert_eq!(out.winner.seed, 1);
        assert!(out.record.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn incomplete_verdict_counts_as_failure() {
        let rubric = intent_disambiguation();
        let (pairing, a, b) = setup();
        let judge = PartialJudge;
        let exec = MatchExecutor::new(&judge, &rubric, "q", MatchSettings::default());
        let out = exec.run(0, pairing, &a, &b).await;
        assert!(!out.record.success);
        assert!(out.record.error_message.unwrap().contains("malformed"));
    }

    #[test]
    fn tie_band_is_inclusive() {
        assert_eq!(decide(0.55, 0.05), None);
        assert_eq!(decide(0.45, 0.05), None);
        assert_eq!(decide(0.551, 0.05), Some(Side::A));
        assert_eq!(decide(0.449, 0.05), Some(Side::B));
        assert_eq!(decide(0.5, 0.0), None);
    }

    #[test]
    fn forward_weight_shifts_combination() {
        let rubric = intent_disambiguation();
        let fwd = verdict(&rubric, 1.0);
        let bwd = verdict(&rubric, 1.0);
        let only_forward = combine_directions(&rubric, &fwd, &bwd, 1.0);
        assert!(only_forward.values().all(|s| (*s - 1.0).abs() < 1e-12));
        let only_backward = combine_directions(&rubric, &fwd, &bwd, 0.0);
        assert!(only_backward.values().all(|s| s.abs() < 1e-12));
    }

    #[test]
    fn seed_resolution_records_reason() {
        let (pairing, a, b) = setup();
        let out = resolve_by_seed(1, pairing, &a, &b, "deadline exceeded");
        assert_eq!(out.record.winner_id.as_deref(), Some("top"));
        assert_eq!(out.record.judge_calls, 0);
        assert!(!out.record.success);
        assert_eq!(out.record.error_message.as_deref(), Some("deadline exceeded"));
    }
}
