//! Single-elimination bracket construction.
//!
//! Each round is planned from the current field: when the field is not a power
//! of two the best seeds sit the round out (byes) until the rest is; the
//! remaining entrants pair best-vs-worst (1 v N, 2 v N-1, ...). The opening
//! round therefore absorbs every bye and all later rounds are clean halvings.

use serde::Serialize;

/// A candidate's slot in the bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Entrant {
    /// Index into the request's candidate list.
    pub index: usize,
    /// Seed rank, 1 = best.
    pub seed: usize,
}

/// One scheduled match. `a` always carries the better seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pairing {
    pub match_index: usize,
    pub a: Entrant,
    pub b: Entrant,
}

impl Pairing {
    /// The entrant that advances when the judge cannot separate the pair.
    pub fn better_seed(&self) -> Entrant {
        if self.a.seed <= self.b.seed {
            self.a
        } else {
            self.b
        }
    }
}

/// Byes and matches for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundPlan {
    pub byes: Vec<Entrant>,
    pub pairings: Vec<Pairing>,
}

/// Plan a round for the given field.
pub fn plan_round(field: &[Entrant]) -> RoundPlan {
    let mut sorted = field.to_vec();
    sorted.sort_by_key(|e| e.seed);

    let n = sorted.len();
    if n < 2 {
        return RoundPlan {
            byes: sorted,
            pairings: Vec::new(),
        };
    }

    let bye_count = n.next_power_of_two() - n;
    let playing = sorted.split_off(bye_count);
    let byes = sorted;

    let half = playing.len() / 2;
    let pairings = (0..half)
        .map(|i| Pairing {
            match_index: i,
            a: playing[i],
            b: playing[playing.len() - 1 - i],
        })
        .collect();

    RoundPlan { byes, pairings }
}

/// Number of rounds needed to reduce `n` entrants to one.
pub fn total_rounds(n: usize) -> usize {
    if n < 2 {
        0
    } else {
        n.next_power_of_two().trailing_zeros() as usize
    }
}

/// A seeded bracket over a fixed set of entrants.
#[derive(Debug, Clone)]
pub struct Bracket {
    entrants: Vec<Entrant>,
}

impl Bracket {
    pub fn new(mut entrants: Vec<Entrant>) -> Self {
        entrants.sort_by_key(|e| e.seed);
        Self { entrants }
    }

    pub fn entrants(&self) -> &[Entrant] {
        &self.entrants
    }

    pub fn total_rounds(&self) -> usize {
        total_rounds(self.entrants.len())
    }

    /// Field for the next round: this round's byes plus its winners.
    pub fn advance(plan: &RoundPlan, winners: impl IntoIterator<Item = Entrant>) -> Vec<Entrant> {
        let mut field: Vec<Entrant> = plan.byes.clone();
        field.extend(winners);
        field.sort_by_key(|e| e.seed);
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(n: usize) -> Vec<Entrant> {
        (1..=n).map(|seed| Entrant { index: seed - 1, seed }).collect()
    }

    fn seeds(pairings: &[Pairing]) -> Vec<(usize, usize)> {
        pairings.iter().map(|p| (p.a.seed, p.b.seed)).collect()
    }

    #[test]
    fn four_entrants_pair_one_v_four_and_two_v_three() {
        let plan = plan_round(&field(4));
        assert!(plan.byes.is_empty());
        assert_eq!(seeds(&plan.pairings), [(1, 4), (2, 3)]);
        assert_eq!(plan.pairings[1].match_index, 1);
    }

    #[test]
    fn eight_entrants_standard_pairing() {
        let plan = plan_round(&field(8));
        assert_eq!(seeds(&plan.pairings), [(1, 8), (2, 7), (3, 6), (4, 5)]);
    }

    #[test]
    fn byes_go_to_highest_seeds() {
        let plan = plan_round(&field(5));
        let bye_seeds: Vec<usize> = plan.byes.iter().map(|e| e.seed).collect();
        assert_eq!(bye_seeds, [1, 2, 3]);
        assert_eq!(seeds(&plan.pairings), [(4, 5)]);

        let plan = plan_round(&field(6));
        let bye_seeds: Vec<usize> = plan.byes.iter().map(|e| e.seed).collect();
        assert_eq!(bye_seeds, [1, 2]);
        assert_eq!(seeds(&plan.pairings), [(3, 6), (4, 5)]);

        let plan = plan_round(&field(3));
        assert_eq!(plan.byes.len(), 1);
        assert_eq!(plan.byes[0].seed, 1);
        assert_eq!(seeds(&plan.pairings), [(2, 3)]);
    }

    #[test]
    fn field_after_opening_round_is_power_of_two() {
        for n in 2..=40 {
            let plan = plan_round(&field(n));
            let next = plan.byes.len() + plan.pairings.len();
            assert!(next.is_power_of_two(), "n={n} next={next}");
        }
    }

    #[test]
    fn better_seed_always_wins_gives_n_minus_one_matches() {
        for n in 2..=40 {
            let bracket = Bracket::new(field(n));
            let mut current = bracket.entrants().to_vec();
            let mut matches = 0;
            let mut rounds = 0;
            while current.len() > 1 {
                let plan = plan_round(&current);
                matches += plan.pairings.len();
                let winners: Vec<Entrant> = plan.pairings.iter().map(|p| p.better_seed()).collect();
                current = Bracket::advance(&plan, winners);
                rounds += 1;
            }
            assert_eq!(matches, n - 1, "n={n}");
            assert_eq!(rounds, bracket.total_rounds(), "n={n}");
            assert_eq!(current[0].seed, 1);
        }
    }

    #[test]
    fn degenerate_fields() {
        assert_eq!(total_rounds(0), 0);
        assert_eq!(total_rounds(1), 0);
        assert_eq!(total_rounds(2), 1);
        assert_eq!(total_rounds(5), 3);
        let plan = plan_round(&field(1));
        assert_eq!(plan.byes.len(), 1);
        assert!(plan.pairings.is_empty());
    }

    #[test]
    fn input_order_does_not_matter() {
        let mut shuffled = field(6);
        shuffled.reverse();
        assert_eq!(plan_round(&shuffled), plan_round(&field(6)));
    }
}
