use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::Ballot;

/// `prefer(a, b)`: how many ballots ranked `a` strictly ahead of `b`,
/// treating a candidate absent from a ballot as ranked after every
/// candidate the ballot does rank.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PairwiseMatrix {
    /// `(a, b) -> prefer(a, b)` for every ordered pair of distinct
    /// candidates.
    pub prefer: BTreeMap<(String, String), u32>,
}

impl PairwiseMatrix {
    pub fn prefer(&self, a: &str, b: &str) -> u32 {
        self.prefer
            .get(&(a.to_string(), b.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn beats(&self, a: &str, b: &str) -> bool {
        self.prefer(a, b) > self.prefer(b, a)
    }
}

/// One or more candidates sharing a dense rank in the final result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub rank: u32,
    pub candidates: Vec<String>,
}

/// The full output of a Condorcet tally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyResult {
    pub places: Vec<Place>,
    pub matrix: PairwiseMatrix,
}

/// Effective rank for pairwise comparison: a candidate absent from the
/// ballot compares as worse than any candidate the ballot does rank.
fn effective_rank(rankings: &HashMap<&str, u32>, candidate: &str) -> (u8, u32) {
    match rankings.get(candidate) {
        Some(&rank) => (0, rank),
        None => (1, 0),
    }
}

/// Run the Condorcet pairwise computation and Smith-set ranking over
/// `ballots` restricted to `candidates`. Deterministic: tallying the same
/// ballot set twice yields equal [`Place`]s.
pub fn compute_tally(ballots: &[Ballot], candidates: &[String]) -> TallyResult {
    let per_ballot_rankings: Vec<HashMap<&str, u32>> = ballots
        .iter()
        .map(|ballot| {
            ballot
                .rankings
                .iter()
                .map(|rank| (rank.candidate_name.as_str(), rank.rank))
                .collect()
        })
        .collect();

    let mut matrix = PairwiseMatrix::default();
    for a in candidates {
        for b in candidates {
            if a == b {
                continue;
            }
            let mut prefer_a = 0u32;
            for rankings in &per_ballot_rankings {
                let ra = effective_rank(rankings, a);
                let rb = effective_rank(rankings, b);
                if ra < rb {
                    prefer_a += 1;
                }
            }
            matrix.prefer.insert((a.clone(), b.clone()), prefer_a);
        }
    }

    let places = rank_by_smith_set(candidates, &matrix);

    TallyResult { places, matrix }
}

/// Recursively peel off Smith sets, assigning dense ranks.
fn rank_by_smith_set(candidates: &[String], matrix: &PairwiseMatrix) -> Vec<Place> {
    let mut remaining: Vec<String> = candidates.to_vec();
    remaining.sort();
    let mut places = Vec::new();
    let mut rank = 0u32;

    while !remaining.is_empty() {
        rank += 1;
        let smith = smith_set(&remaining, matrix);
        remaining.retain(|c| !smith.contains(c));
        places.push(Place {
            rank,
            candidates: smith,
        });
    }

    places
}

/// The smallest non-empty subset of `candidates` such that every member
/// beats every non-member.
fn smith_set(candidates: &[String], matrix: &PairwiseMatrix) -> Vec<String> {
    if candidates.len() <= 1 {
        return candidates.to_vec();
    }

    // Seed the closure from the candidate with the most pairwise wins
    // (ties broken by name for determinism); the closure below converges
    // to the same set regardless of seed.
    let seed = candidates
        .iter()
        .max_by_key(|c| {
            let wins = candidates
                .iter()
                .filter(|o| *o != *c && matrix.beats(c, o))
                .count();
            (wins, std::cmp::Reverse(c.clone()))
        })
        .cloned()
        .expect("candidates is non-empty");

    let mut set: Vec<String> = vec![seed];

    loop {
        let mut grew = false;
        for outsider in candidates {
            if set.contains(outsider) {
                continue;
            }
            // If the current set fails to beat this outsider from any
            // member, the outsider must join the dominant set.
            let dominated_by_all = set.iter().all(|member| matrix.beats(member, outsider));
            if !dominated_by_all {
                set.push(outsider.clone());
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }

    set.sort();
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Rank;
    use chrono::Utc;

    fn ballot(voter: &str, rankings: &[(&str, u32)]) -> Ballot {
        Ballot {
            election_name: "e".to_string(),
            voter_name: voter.to_string(),
            confirmation: format!("conf-{voter}"),
            when_cast: Utc::now(),
            rankings: rankings
                .iter()
                .map(|(name, rank)| Rank {
                    candidate_name: name.to_string(),
                    rank: *rank,
                })
                .collect(),
        }
    }

    #[test]
    fn condorcet_winner_is_rank_one() {
        let candidates = vec![
            "Apple".to_string(),
            "Banana".to_string(),
            "Cherry".to_string(),
        ];
        let ballots = vec![
            ballot("B", &[("Apple", 1), ("Banana", 2), ("Cherry", 3)]),
            ballot("C", &[("Apple", 1), ("Cherry", 2), ("Banana", 3)]),
            ballot("D", &[("Banana", 1), ("Apple", 2), ("Cherry", 3)]),
        ];

        let result = compute_tally(&ballots, &candidates);

        assert_eq!(result.places[0].rank, 1);
        assert_eq!(result.places[0].candidates, vec!["Apple".to_string()]);
    }

    #[test]
    fn cyclic_preferences_tie_at_rank_one() {
        // Rock-paper-scissors cycle: no Condorcet winner, all three tie.
        let candidates = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let ballots = vec![
            ballot("1", &[("A", 1), ("B", 2), ("C", 3)]),
            ballot("2", &[("B", 1), ("C", 2), ("A", 3)]),
            ballot("3", &[("C", 1), ("A", 2), ("B", 3)]),
        ];

        let result = compute_tally(&ballots, &candidates);

        assert_eq!(result.places.len(), 1);
        assert_eq!(result.places[0].rank, 1);
        let mut tied = result.places[0].candidates.clone();
        tied.sort();
        assert_eq!(tied, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    }

    #[test]
    fn absent_candidate_ranked_last_on_that_ballot() {
        let candidates = vec!["A".to_string(), "B".to_string()];
        // Two ballots rank only A; A must beat B.
        let ballots = vec![
            ballot("1", &[("A", 1)]),
            ballot("2", &[("A", 1)]),
        ];

        let result = compute_tally(&ballots, &candidates);

        assert!(result.matrix.beats("A", "B"));
        assert_eq!(result.places[0].candidates, vec!["A".to_string()]);
        assert_eq!(result.places[1].candidates, vec!["B".to_string()]);
    }

    #[test]
    fn idempotent_on_repeat_tally() {
        let candidates = vec!["A".to_string(), "B".to_string()];
        let ballots = vec![ballot("1", &[("A", 1), ("B", 2)])];

        let first = compute_tally(&ballots, &candidates);
        let second = compute_tally(&ballots, &candidates);

        assert_eq!(
            first.places.iter().map(|p| &p.candidates).collect::<Vec<_>>(),
            second.places.iter().map(|p| &p.candidates).collect::<Vec<_>>()
        );
    }
}
