use crate::model::{AcqId, Second};
use std::collections::{BTreeSet, HashMap};

/// Acquisition → matching seconds
///
/// Acquisitions never map to an empty set; they are pruned as soon as their
/// last second disappears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondSet {
    seconds: HashMap<AcqId, BTreeSet<Second>>,
}

impl SecondSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, acq_id: &str, sec: Second) {
        match self.seconds.get_mut(acq_id) {
            Some(set) => {
                set.insert(sec);
            }
            None => {
                self.seconds
                    .insert(acq_id.to_string(), BTreeSet::from([sec]));
            }
        }
    }

    /// Number of acquisitions with at least one second
    pub fn len(&self) -> usize {
        self.seconds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seconds.is_empty()
    }

    /// Number of (acquisition, second) pairs
    pub fn total_seconds(&self) -> usize {
        self.seconds.values().map(BTreeSet::len).sum()
    }

    pub fn seconds(&self, acq_id: &str) -> Option<&BTreeSet<Second>> {
        self.seconds.get(acq_id)
    }

    pub fn acquisitions(&self) -> impl Iterator<Item = &AcqId> {
        self.seconds.keys()
    }

    /// Per-acquisition, per-second AND
    ///
    /// Acquisitions missing from either side or left without seconds are dropped.
    pub fn intersect(&self, other: &SecondSet) -> SecondSet {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };

        let seconds = small
            .seconds
            .iter()
            .filter_map(|(acq_id, secs)| {
                let theirs = large.seconds.get(acq_id)?;
                let common: BTreeSet<Second> = secs.intersection(theirs).copied().collect();
                (!common.is_empty()).then(|| (acq_id.clone(), common))
            })
            .collect();

        SecondSet { seconds }
    }
}

impl<A: AsRef<str>> FromIterator<(A, Second)> for SecondSet {
    fn from_iter<I: IntoIterator<Item = (A, Second)>>(iter: I) -> Self {
        let mut set = SecondSet::new();
        for (acq_id, sec) in iter {
            set.insert(acq_id.as_ref(), sec);
        }
        set
    }
}

/// Fold the SecondSets of all active modalities into one
///
/// Returns `None` when no modality contributed a set, so the caller can pick a
/// fallback universe. Smallest sets fold first; the result does not depend on
/// the order. Folding stops early once the accumulator is empty.
pub fn intersect_all(mut sets: Vec<SecondSet>) -> Option<SecondSet> {
    sets.sort_by_key(SecondSet::total_seconds);

    let mut sets = sets.into_iter();
    let mut acc = sets.next()?;

    for next in sets {
        if acc.is_empty() {
            break;
        }
        acc = acc.intersect(&next);
    }

    Some(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pairs: &[(&str, Second)]) -> SecondSet {
        pairs.iter().map(|(acq, sec)| (*acq, *sec)).collect()
    }

    #[test]
    fn test_intersection_per_acquisition() {
        let a = set(&[("D", 5), ("D", 10), ("D", 15)]);
        let b = set(&[("D", 10), ("D", 15), ("D", 20)]);

        let result = a.intersect(&b);
        assert_eq!(result.seconds("D"), Some(&BTreeSet::from([10, 15])));
    }

    #[test]
    fn test_intersection_is_commutative() {
        let a = set(&[("1", 1), ("1", 2), ("2", 3), ("3", 9)]);
        let b = set(&[("1", 2), ("2", 4), ("3", 9), ("4", 1)]);

        assert_eq!(a.intersect(&b), b.intersect(&a));
    }

    #[test]
    fn test_empty_intersections_are_pruned() {
        let a = set(&[("1", 1), ("2", 3)]);
        let b = set(&[("1", 2), ("2", 3)]);

        let result = a.intersect(&b);
        assert_eq!(result.len(), 1);
        assert!(result.seconds("1").is_none());
        assert_eq!(result.total_seconds(), 1);
    }

    #[test]
    fn test_intersect_all_order_independent() {
        let a = set(&[("1", 1), ("1", 2), ("1", 3), ("2", 5)]);
        let b = set(&[("1", 2), ("1", 3), ("2", 5), ("2", 6)]);
        let c = set(&[("1", 3), ("2", 5), ("9", 1)]);

        let forward = intersect_all(vec![a.clone(), b.clone(), c.clone()]).unwrap();
        let backward = intersect_all(vec![c, b, a]).unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward, set(&[("1", 3), ("2", 5)]));
    }

    #[test]
    fn test_intersect_all_without_sets() {
        assert!(intersect_all(Vec::new()).is_none());
    }

    #[test]
    fn test_intersect_all_short_circuits_to_empty() {
        let a = set(&[("1", 1)]);
        let b = set(&[("2", 1)]);
        let c = set(&[("1", 1), ("2", 1)]);

        let result = intersect_all(vec![a, b, c]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut set = SecondSet::new();
        set.insert("7", 3);
        set.insert("7", 3);
        set.insert("7", 1);

        assert_eq!(set.total_seconds(), 2);
        assert_eq!(
            set.seconds("7").unwrap().iter().copied().collect::<Vec<_>>(),
            vec![1, 3]
        );
    }
}
