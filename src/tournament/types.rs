//! Request/response types for tournament runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form, ordered candidate metadata.
pub type Metadata = BTreeMap<String, serde_json::Value>;

// =============================================================================
// Candidates
// =============================================================================

/// Which family of candidates a tournament disambiguates.
///
/// Selects the rubric; nothing else in the engine branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentKind {
    /// Intent matching (which intent did the user mean?).
    Intent,
    /// Tool retrieval (which tool should handle the request?).
    Tool,
    /// Candidate analyses (which analysis best answers the request?).
    Analysis,
}

impl TournamentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentKind::Intent => "intent",
            TournamentKind::Tool => "tool",
            TournamentKind::Analysis => "analysis",
        }
    }

    pub const ALL: [TournamentKind; 3] = [
        TournamentKind::Intent,
        TournamentKind::Tool,
        TournamentKind::Analysis,
    ];
}

impl std::str::FromStr for TournamentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "intent" => Ok(TournamentKind::Intent),
            "tool" => Ok(TournamentKind::Tool),
            "analysis" => Ok(TournamentKind::Analysis),
            other => Err(format!(
                "unknown tournament kind '{other}' (expected intent, tool or analysis)"
            )),
        }
    }
}

/// A candidate as seen by the engine. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable identifier.
    pub id: String,
    /// Short human-readable name shown to the judge.
    pub name: String,
    /// Longer description shown to the judge.
    #[serde(default)]
    pub description: String,
    /// Upstream classifier score in [0, 1].
    pub original_score: f64,
    /// Extra context rendered into the judge prompt.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Candidate {
    pub fn new(id: impl Into<String>, name: impl Into<String>, original_score: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            original_score,
            metadata: Metadata::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Normalize any concrete candidate type into the engine's representation.
    pub fn from_contender<C: Contender + ?Sized>(c: &C) -> Self {
        Self {
            id: c.id().to_string(),
            name: c.name().to_string(),
            description: c.description().to_string(),
            original_score: c.score(),
            metadata: c.metadata(),
        }
    }
}

/// Shared capability of everything that can enter a tournament.
pub trait Contender {
    fn kind(&self) -> TournamentKind;
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn score(&self) -> f64;
    fn metadata(&self) -> Metadata {
        Metadata::new()
    }
}

/// An intent produced by an intent matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentCandidate {
    pub intent_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub confidence: f64,
    /// Parameter names the intent expects.
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

impl Contender for IntentCandidate {
    fn kind(&self) -> TournamentKind {
        TournamentKind::Intent
    }
    fn id(&self) -> &str {
        &self.intent_id
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn score(&self) -> f64 {
        self.confidence
    }
    fn metadata(&self) -> Metadata {
        let mut m = Metadata::new();
        if !self.parameters.is_empty() {
            m.insert("parameters".into(), serde_json::json!(self.parameters));
        }
        if let Some(domain) = &self.domain {
            m.insert("domain".into(), serde_json::json!(domain));
        }
        m
    }
}

/// A tool returned by a tool retriever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCandidate {
    pub tool_name: String,
    #[serde(default)]
    pub description: String,
    pub similarity: f64,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,
}

impl Contender for ToolCandidate {
    fn kind(&self) -> TournamentKind {
        TournamentKind::Tool
    }
    fn id(&self) -> &str {
        &self.tool_name
    }
    fn name(&self) -> &str {
        &self.tool_name
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn score(&self) -> f64 {
        self.similarity
    }
    fn metadata(&self) -> Metadata {
        let mut m = Metadata::new();
        if let Some(server) = &self.server {
            m.insert("server".into(), serde_json::json!(server));
        }
        if let Some(schema) = &self.input_schema {
            m.insert("input_schema".into(), schema.clone());
        }
        m
    }
}

/// A candidate analysis produced by a generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisCandidate {
    pub analysis_id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub score: f64,
    #[serde(default)]
    pub body: Option<String>,
}

impl Contender for AnalysisCandidate {
    fn kind(&self) -> TournamentKind {
        TournamentKind::Analysis
    }
    fn id(&self) -> &str {
        &self.analysis_id
    }
    fn name(&self) -> &str {
        &self.title
    }
    fn description(&self) -> &str {
        &self.summary
    }
    fn score(&self) -> f64 {
        self.score
    }
    fn metadata(&self) -> Metadata {
        let mut m = Metadata::new();
        if let Some(body) = &self.body {
            m.insert("body".into(), serde_json::json!(body));
        }
        m
    }
}

// =============================================================================
// Request
// =============================================================================

/// Input to a tournament run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentRequest {
    /// Candidate family; selects the rubric.
    pub kind: TournamentKind,
    /// The user input being disambiguated.
    pub user_input: String,
    /// Candidates, typically sorted by descending `original_score`.
    pub candidates: Vec<Candidate>,
}

impl TournamentRequest {
    pub fn new(
        kind: TournamentKind,
        user_input: impl Into<String>,
        candidates: Vec<Candidate>,
    ) -> Self {
        Self {
            kind,
            user_input: user_input.into(),
            candidates,
        }
    }

    /// Build a request from any concrete candidate type.
    pub fn from_contenders<C: Contender>(user_input: impl Into<String>, items: &[C]) -> Option<Self> {
        let kind = items.first()?.kind();
        Some(Self::new(
            kind,
            user_input,
            items.iter().map(Candidate::from_contender).collect(),
        ))
    }
}

// =============================================================================
// Results
// =============================================================================

/// A candidate's position in the seed list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRanking {
    pub candidate_id: String,
    pub original_score: f64,
    /// 1 = best.
    pub seed_rank: usize,
}

/// How a match winner was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchDecision {
    /// Aggregate score cleared the tie band.
    Judge,
    /// Both directions succeeded but the aggregate fell inside the tie band.
    TieBreak,
    /// A direction failed (or the run was cut short); the better seed advanced.
    Fallback,
}

/// One pairwise comparison in the bracket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub match_id: String,
    pub round: usize,
    pub match_index: usize,
    /// Better-seeded side.
    pub candidate_a: String,
    pub candidate_b: String,
    pub seed_a: usize,
    pub seed_b: usize,
    pub winner_id: Option<String>,
    /// In [0.5, 1.0]; exactly 0.5 when the winner came from a seed tie-break.
    pub win_confidence: f64,
    /// Weighted aggregate for A, when both directions succeeded.
    pub aggregate_a: Option<f64>,
    /// Per-dimension combined score for A.
    pub dimension_scores: BTreeMap<String, f64>,
    pub reasoning: String,
    pub decided_by: MatchDecision,
    /// Judge invocations issued for this match, retries included.
    pub judge_calls: u32,
    pub retries: u32,
    pub success: bool,
    pub error_message: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Why the tournament loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStopReason {
    /// Every round was played.
    Completed,
    /// The deadline passed; the rest of the bracket was resolved by seed.
    DeadlineExceeded,
    /// Cancellation requested; the rest of the bracket was resolved by seed.
    Cancelled,
    /// Fewer than two candidates; no bracket was built.
    InsufficientCandidates,
}

/// Outcome of a tournament run, including its full audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentResult {
    pub tournament_id: String,
    pub kind: TournamentKind,
    pub user_input: String,
    pub seed_rankings: Vec<SeedRanking>,
    /// Ordered by (round, match_index).
    pub matches: Vec<Match>,
    pub winner_id: Option<String>,
    pub winner_confidence: f64,
    pub total_comparisons: usize,
    /// `2 × matches judged in both directions + retries`.
    pub llm_calls: u32,
    pub retries: u32,
    /// Every judge attempt that completed, failed ones included.
    #[serde(default)]
    pub judge_invocations: u32,
    pub total_latency_ms: u64,
    pub stop_reason: TournamentStopReason,
    pub success: bool,
    pub error_message: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TournamentResult {
    /// The winner, or the top seed when the run produced none.
    pub fn winner_or_top_seed(&self) -> Option<&str> {
        self.winner_id.as_deref().or_else(|| {
            self.seed_rankings
                .iter()
                .find(|s| s.seed_rank == 1)
                .map(|s| s.candidate_id.as_str())
        })
    }

    /// Matches resolved without a judge verdict.
    pub fn fallback_matches(&self) -> usize {
        self.matches
            .iter()
            .filter(|m| m.decided_by == MatchDecision::Fallback)
            .count()
    }

    pub fn degraded(&self) -> bool {
        matches!(
            self.stop_reason,
            TournamentStopReason::DeadlineExceeded | TournamentStopReason::Cancelled
        )
    }
}
