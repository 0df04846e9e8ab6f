use crate::model::Second;
use std::collections::BTreeSet;

/// Indices to keep out of `n`, ascending and unique
pub fn sample_indices(n: usize, k: usize) -> Vec<usize> {
    if n == 0 || k == 0 {
        return Vec::new();
    }
    if n <= k {
        return (0..n).collect();
    }
    if k == 1 {
        return vec![0];
    }

    let span = (n - 1) as u64;
    let steps = (k - 1) as u64;

    let mut chosen: BTreeSet<usize> = (0..k as u64)
        .map(|i| ((2 * i * span + steps) / (2 * steps)) as usize)
        .collect();

    // Fill slots lost to rounding collisions with the smallest unused indices
    let mut next = 0;
    while chosen.len() < k && next < n {
        chosen.insert(next);
        next += 1;
    }

    chosen.into_iter().collect()
}

/// Evenly spread subset of an ascending sequence
pub fn sample<T: Copy>(items: &[T], k: usize) -> Vec<T> {
    sample_indices(items.len(), k)
        .into_iter()
        .map(|idx| items[idx])
        .collect()
}

/// Representative seconds of one acquisition
pub fn sample_seconds(seconds: &BTreeSet<Second>, k: usize) -> Vec<Second> {
    let ordered: Vec<Second> = seconds.iter().copied().collect();
    sample(&ordered, k)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sequence_unchanged() {
        assert_eq!(sample(&[3, 8, 9], 5), vec![3, 8, 9]);
        assert_eq!(sample(&[1, 2, 3, 4, 5], 5), vec![1, 2, 3, 4, 5]);
        assert!(sample::<i64>(&[], 5).is_empty());
    }

    #[test]
    fn test_fifty_seconds_to_five() {
        let seconds: Vec<Second> = (1..=50).collect();
        assert_eq!(sample(&seconds, 5), vec![1, 13, 26, 38, 50]);
    }

    #[test]
    fn test_size_bounds() {
        for n in 0..60 {
            for k in 1..9 {
                let items: Vec<usize> = (0..n).map(|i| i * 3).collect();
                let picked = sample(&items, k);

                assert_eq!(picked.len(), n.min(k), "n={n} k={k}");
                assert!(picked.windows(2).all(|w| w[0] < w[1]), "n={n} k={k}");
                assert!(picked.iter().all(|p| items.contains(p)));
            }
        }
    }

    #[test]
    fn test_boundary_coverage() {
        for n in 3..80 {
            for k in 2..n {
                let items: Vec<usize> = (0..n).collect();
                let picked = sample(&items, k);

                assert_eq!(picked.first(), items.first(), "n={n} k={k}");
                assert_eq!(picked.last(), items.last(), "n={n} k={k}");
            }
        }
    }

    #[test]
    fn test_single_pick_takes_first() {
        assert_eq!(sample(&[4, 5, 6], 1), vec![4]);
    }

    #[test]
    fn test_deterministic() {
        let seconds: BTreeSet<Second> = (0..1000).step_by(7).collect();
        assert_eq!(sample_seconds(&seconds, 5), sample_seconds(&seconds, 5));
    }
}
