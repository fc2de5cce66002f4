//! Per-match audit trace for tournament runs.

use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;

use super::types::{Match, MatchDecision};

/// One line per decided match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchTrace {
    pub timestamp_ms: i64,
    pub tournament_id: String,
    pub match_id: String,
    pub round: usize,
    pub match_index: usize,
    pub rubric: String,
    pub rubric_hash: String,
    pub user_input_hash: String,
    pub candidate_a: String,
    pub candidate_b: String,
    pub seed_a: usize,
    pub seed_b: usize,
    pub winner_id: Option<String>,
    pub win_confidence: f64,
    pub aggregate_a: Option<f64>,
    pub decided_by: MatchDecision,
    pub judge_calls: u32,
    pub retries: u32,
    pub latency_ms: i64,
    pub error: Option<String>,
}

impl MatchTrace {
    pub fn from_match(
        tournament_id: &str,
        rubric: &str,
        rubric_hash: &str,
        user_input_hash: &str,
        m: &Match,
    ) -> Self {
        Self {
            timestamp_ms: m.end_time.timestamp_millis(),
            tournament_id: tournament_id.to_string(),
            match_id: m.match_id.clone(),
            round: m.round,
            match_index: m.match_index,
            rubric: rubric.to_string(),
            rubric_hash: rubric_hash.to_string(),
            user_input_hash: user_input_hash.to_string(),
            candidate_a: m.candidate_a.clone(),
            candidate_b: m.candidate_b.clone(),
            seed_a: m.seed_a,
            seed_b: m.seed_b,
            winner_id: m.winner_id.clone(),
            win_confidence: m.win_confidence,
            aggregate_a: m.aggregate_a,
            decided_by: m.decided_by,
            judge_calls: m.judge_calls,
            retries: m.retries,
            latency_ms: (m.end_time - m.start_time).num_milliseconds(),
            error: m.error_message.clone(),
        }
    }
}

pub fn hash_text(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("trace channel closed")]
    Closed,
    #[error("trace worker failed: {0}")]
    Join(String),
}

pub trait TraceSink: Send + Sync {
    fn record(&self, event: MatchTrace) -> Result<(), TraceError>;
}

#[derive(Clone)]
pub struct JsonlTraceSink {
    sender: mpsc::Sender<MatchTrace>,
}

/// Background writer; `join` after the last sink clone is dropped to flush.
pub struct TraceWorker {
    handle: Option<std::thread::JoinHandle<Result<(), TraceError>>>,
}

impl TraceWorker {
    pub fn join(mut self) -> Result<(), TraceError> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(TraceError::Join("trace worker panicked".to_string()))),
            None => Ok(()),
        }
    }
}

impl JsonlTraceSink {
    pub fn new(path: impl AsRef<Path>) -> Result<(Self, TraceWorker), TraceError> {
        let file = std::fs::File::create(path)?;
        let (sender, receiver) = mpsc::channel::<MatchTrace>();
        let handle = std::thread::spawn(move || write_trace_loop(file, receiver));
        Ok((
            Self { sender },
            TraceWorker {
                handle: Some(handle),
            },
        ))
    }
}

impl TraceSink for JsonlTraceSink {
    fn record(&self, event: MatchTrace) -> Result<(), TraceError> {
        self.sender.send(event).map_err(|_| TraceError::Closed)
    }
}

fn write_trace_loop(
    file: std::fs::File,
    receiver: mpsc::Receiver<MatchTrace>,
) -> Result<(), TraceError> {
    let mut writer = BufWriter::new(file);
    for event in receiver {
        let line = serde_json::to_string(&event).map_err(|e| TraceError::Serde(e.to_string()))?;
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}
