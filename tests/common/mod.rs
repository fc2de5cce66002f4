#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bracket_harness::tournament::{Candidate, Judge, JudgeError, JudgeVerdict, Rubric};

pub fn uniform(rubric: &Rubric, score: f64) -> JudgeVerdict {
    JudgeVerdict {
        dimension_scores: rubric
            .dimensions()
            .iter()
            .map(|d| (d.id.clone(), score))
            .collect::<HashMap<_, _>>(),
        reasoning: format!("uniform {score}"),
        latency_ms: 1,
    }
}

pub fn candidates(scores: &[f64]) -> Vec<Candidate> {
    scores
        .iter()
        .enumerate()
        .map(|(i, s)| Candidate::new(format!("c{i}"), format!("Candidate {i}"), *s))
        .collect()
}

/// Prefers the candidate with the higher upstream score, whatever the order.
pub struct HigherScoreJudge;

#[async_trait]
impl Judge for HigherScoreJudge {
    async fn compare(
        &self,
        _: &str,
        first: &Candidate,
        second: &Candidate,
        rubric: &Rubric,
    ) -> Result<JudgeVerdict, JudgeError> {
        let s = if first.original_score > second.original_score {
            0.85
        } else {
            0.15
        };
        Ok(uniform(rubric, s))
    }
}

/// Prefers the candidate with the lower upstream score, whatever the order.
pub struct UnderdogJudge;

#[async_trait]
impl Judge for UnderdogJudge {
    async fn compare(
        &self,
        _: &str,
        first: &Candidate,
        second: &Candidate,
        rubric: &Rubric,
    ) -> Result<JudgeVerdict, JudgeError> {
        let s = if first.original_score < second.original_score {
            0.8
        } else {
            0.2
        };
        Ok(uniform(rubric, s))
    }
}

/// Scores whichever candidate is listed first with a fixed value.
pub struct FirstListedJudge(pub f64);

#[async_trait]
impl Judge for FirstListedJudge {
    async fn compare(
        &self,
        _: &str,
        _: &Candidate,
        _: &Candidate,
        rubric: &Rubric,
    ) -> Result<JudgeVerdict, JudgeError> {
        Ok(uniform(rubric, self.0))
    }
}

/// Never answers.
pub struct HangingJudge;

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

/// Fails the first `fail_first` calls, then defers to [`HigherScoreJudge`].
pub struct FlakyJudge {
    pub calls: AtomicU32,
    pub fail_first: u32,
}

impl FlakyJudge {
    pub fn new(fail_first: u32) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_first,
        }
    }
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
            return Err(JudgeError::Malformed(format!("garbled reply #{n}")));
        }
        HigherScoreJudge.compare(input, first, second, rubric).await
    }
}

/// Sleeps before answering like [`HigherScoreJudge`]; counts started and
/// finished calls.
pub struct SlowJudge {
    pub delay: Duration,
    pub started: AtomicU32,
    pub finished: AtomicU32,
}

impl SlowJudge {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicU32::new(0),
            finished: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Judge for SlowJudge {
    async fn compare(
        &self,
        input: &str,
        first: &Candidate,
        second: &Candidate,
        rubric: &Rubric,
    ) -> Result<JudgeVerdict, JudgeError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        HigherScoreJudge.compare(input, first, second, rubric).await
    }
}
