//! # Bus Set Diff
//!
//! Computes which buses an intervening create call introduced, and the base
//! bus number of the new adapter.

use std::collections::BTreeSet;

use crate::domain::BusNumber;

/// Buses present in `after` but not in `before`, ascending and unique.
pub fn diff(before: &BTreeSet<BusNumber>, after: &BTreeSet<BusNumber>) -> Vec<BusNumber> {
    after.difference(before).copied().collect()
}

/// Buses present in `before` but gone from `after`.
pub fn vanished(before: &BTreeSet<BusNumber>, after: &BTreeSet<BusNumber>) -> Vec<BusNumber> {
    before.difference(after).copied().collect()
}

/// Base bus number: the smallest newly appeared bus.
pub fn base_of(new_buses: &[BusNumber]) -> Option<BusNumber> {
    new_buses.iter().min().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn set(values: &[BusNumber]) -> BTreeSet<BusNumber> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_diff_new_buses() {
        let before = set(&[0, 1, 2]);
        let after = set(&[0, 1, 2, 5, 3, 4]);
        assert_eq!(diff(&before, &after), vec![3, 4, 5]);
        assert_eq!(base_of(&diff(&before, &after)), Some(3));
    }

    #[test]
    fn test_diff_ignores_vanished() {
        let before = set(&[0, 1, 7]);
        let after = set(&[0, 8, 9]);
        assert_eq!(diff(&before, &after), vec![8, 9]);
        assert_eq!(vanished(&before, &after), vec![1, 7]);
    }

    #[test]
    fn test_base_of_empty() {
        assert_eq!(base_of(&[]), None);
    }

    #[test]
    fn test_diff_ascending_unique_randomized() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let before: BTreeSet<BusNumber> = (0..rng.gen_range(0..20))
                .map(|_| rng.gen_range(0..64))
                .collect();
            let mut after = before.clone();
            for _ in 0..rng.gen_range(0..10) {
                after.insert(rng.gen_range(0..64));
            }

            let new_buses = diff(&before, &after);
            assert!(new_buses.windows(2).all(|w| w[0] < w[1]));
            assert!(new_buses.iter().all(|b| !before.contains(b)));
            if let Some(base) = base_of(&new_buses) {
                assert_eq!(Some(&base), new_buses.first());
            }
        }
    }
}
