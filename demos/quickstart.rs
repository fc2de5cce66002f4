//! Minimal end-to-end example for `bracket-harness`.
//!
//! Four intents came back from an intent matcher with nearly identical
//! scores. The trigger gate flags the list as ambiguous and a tournament of
//! bidirectional LLM judgements picks the intent that best fits the input.
//!
//! To run:
//! - Set `OPENROUTER_API_KEY`
//! - `cargo run --example quickstart`

use bracket_harness::tournament::{IntentCandidate, TournamentLedger};
use bracket_harness::{
    evaluate_trigger, run_tournament, LlmJudge, OpenRouterAdapter, TournamentConfig,
    TournamentRequest,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // -- Candidates from upstream ----------------------------------------------

    let intent = |id: &str, name: &str, description: &str, confidence: f64, params: &[&str]| {
        IntentCandidate {
            intent_id: id.into(),
            name: name.into(),
            description: description.into(),
            confidence,
            parameters: params.iter().map(|p| p.to_string()).collect(),
            domain: Some("travel".into()),
        }
    };
    let intents = vec![
        intent("book_flight", "Book flight", "Reserve a seat on a flight", 0.40, &["origin", "destination", "date"]),
        intent("change_flight", "Change flight", "Move an existing booking to another date", 0.38, &["booking_ref", "date"]),
        intent("flight_status", "Flight status", "Check whether a flight is on time", 0.37, &["flight_number"]),
        intent("cancel_flight", "Cancel flight", "Cancel an existing booking", 0.35, &["booking_ref"]),
    ];

    let req = TournamentRequest::from_contenders(
        "I need to get to Lisbon on Friday instead, my booking is ABC123",
        &intents,
    )
    .ok_or("no candidates")?;

    // -- Is a tournament worth it? ---------------------------------------------

    let config = TournamentConfig::default();
    let decision = evaluate_trigger(&req.candidates, &config.trigger);
    println!(
        "trigger: {} ({:?}, gap {:.3})",
        decision.trigger,
        decision.reason,
        decision.top_gap.unwrap_or_default()
    );
    if !decision.trigger {
        return Ok(());
    }

    // -- Run it ----------------------------------------------------------------

    let judge = LlmJudge::new(OpenRouterAdapter::from_env()?, "openai/gpt-5-mini");
    let result = run_tournament(&judge, &config, req, None).await?;

    // -- Interpret results -----------------------------------------------------

    for m in &result.matches {
        println!(
            "  round {} {}: {} (seed {}) vs {} (seed {}) -> {} [{:?}, {:.2}]",
            m.round,
            m.match_id,
            m.candidate_a,
            m.seed_a,
            m.candidate_b,
            m.seed_b,
            m.winner_id.as_deref().unwrap_or("-"),
            m.decided_by,
            m.win_confidence,
        );
    }
    println!(
        "winner: {} (confidence {:.2}, {} judge calls, {} ms)",
        result.winner_or_top_seed().unwrap_or("-"),
        result.winner_confidence,
        result.llm_calls,
        result.total_latency_ms
    );

    let mut ledger = TournamentLedger::new();
    ledger.record(&result);
    println!("fallback rate: {:.2}", ledger.fallback_rate());

    Ok(())
}
