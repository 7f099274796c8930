//! Order-preserving deduplication.

use ahash::AHashSet as HashSet;
use std::hash::Hash;

/// Removes repeated elements in place, keeping the first occurrence of each
/// value and the relative order of the survivors.
pub fn dedup_in_place<T>(items: &mut Vec<T>)
where
    T: Eq + Hash,
{
    let keep: Vec<bool> = {
        let mut seen: HashSet<&T> = HashSet::with_capacity(items.len());
        items.iter().map(|item| seen.insert(item)).collect()
    };
    // retain visits every element exactly once, in order.
    let mut keep = keep.into_iter();
    items.retain(|_| keep.next().unwrap_or(true));
}

/// Collects `items` into a vector of unique values in first-occurrence order.
pub fn unique<T, I>(items: I) -> Vec<T>
where
    T: Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let mut out: Vec<T> = items.into_iter().collect();
    dedup_in_place(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        let mut v = vec!["a", "b", "a", "c", "b"];
        dedup_in_place(&mut v);
        assert_eq!(v, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dedup_moves_values_without_cloning() {
        #[derive(Debug, PartialEq, Eq, Hash)]
        struct Owned(String);

        let mut v = vec![
            Owned("/lib/a.so".into()),
            Owned("/lib/b.so".into()),
            Owned("/lib/a.so".into()),
        ];
        dedup_in_place(&mut v);
        assert_eq!(v, vec![Owned("/lib/a.so".into()), Owned("/lib/b.so".into())]);
    }

    #[test]
    fn test_dedup_all_equal() {
        assert_eq!(unique(vec![3, 3, 3, 3]), vec![3]);
    }

    #[test]
    fn test_dedup_reverse_runs() {
        assert_eq!(unique(vec![5, 4, 3, 3, 4, 5, 1]), vec![5, 4, 3, 1]);
    }

    #[test]
    fn test_dedup_empty_and_unique_inputs() {
        assert!(unique(Vec::<String>::new()).is_empty());
        assert_eq!(unique(vec![1, 2, 3]), vec![1, 2, 3]);
    }
}
