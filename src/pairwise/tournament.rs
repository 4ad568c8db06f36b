//! Round-robin score accumulation.

use super::types::Winner;

/// Every unordered pair `(i, j)` with `i < j`, in row-major order.
pub fn round_robin_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect()
}

/// Tournament scores: A win gives `i` a point, B win gives `j` a point, a tie
/// splits it. Returns `(index, score)` sorted by descending score; equal
/// scores keep index order.
pub fn tally(n: usize, outcomes: &[(usize, usize, Winner)]) -> Vec<(usize, f64)> {
    let mut scores = vec![0.0; n];
    for &(i, j, winner) in outcomes {
        match winner {
            Winner::A => scores[i] += 1.0,
            Winner::B => scores[j] += 1.0,
            Winner::Tie => {
                scores[i] += 0.5;
                scores[j] += 0.5;
            }
        }
    }

    let mut ranked: Vec<(usize, f64)> = scores.into_iter().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}
