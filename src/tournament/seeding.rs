//! Deterministic seed assignment.

use super::types::{Candidate, SeedRanking};

/// Seed candidates 1..=N by descending `original_score`.
///
/// Equal scores keep their input order (stable sort), so the result never
/// depends on id ordering. NaN scores sort last.
pub fn seed_candidates(candidates: &[Candidate]) -> Vec<SeedRanking> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        let sa = sort_key(candidates[a].original_score);
        let sb = sort_key(candidates[b].original_score);
        sb.total_cmp(&sa)
    });

    order
        .into_iter()
        .enumerate()
        .map(|(rank, idx)| SeedRanking {
            candidate_id: candidates[idx].id.clone(),
            original_score: candidates[idx].original_score,
            seed_rank: rank + 1,
        })
        .collect()
}

fn sort_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}
