//! Reorder batch results to match the requested keys
//!
//! Data stores rarely return rows in the order they were asked for, while a
//! [`BatchFetch`](crate::BatchFetch) must answer positionally. These helpers do
//! the conversion inside a fetch function.

use std::collections::HashMap;
use std::hash::Hash;

/// Arrange `items` in the order of `keys`
///
/// Keys with no matching item yield `None`. If several items share a key the
/// last one wins.
///
/// # Example
///
/// ```rust
/// use lazy_resolve::align_by_key;
///
/// let rows = vec![(3, "c"), (1, "a")];
/// let aligned = align_by_key(rows, &[1, 2, 3], |row| row.0);
/// assert_eq!(aligned, vec![Some((1, "a")), None, Some((3, "c"))]);
/// ```
pub fn align_by_key<T, K, F>(items: Vec<T>, keys: &[K], key_of: F) -> Vec<Option<T>>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let by_key = index(items, key_of);
    keys.iter().map(|key| by_key.get(key).cloned()).collect()
}

/// Arrange `items` in the order of `keys`, using `fallback` for missing keys
pub fn align_by_key_or<T, K, F>(items: Vec<T>, keys: &[K], key_of: F, fallback: T) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let by_key = index(items, key_of);
    keys.iter()
        .map(|key| by_key.get(key).cloned().unwrap_or_else(|| fallback.clone()))
        .collect()
}

fn index<T, K, F>(items: Vec<T>, key_of: F) -> HashMap<K, T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    items.into_iter().map(|item| (key_of(&item), item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct User {
        id: u32,
        name: &'static str,
    }

    fn user(id: u32, name: &'static str) -> User {
        User { id, name }
    }

    fn unknown() -> User {
        user(0, "unknown")
    }

    #[test]
    fn test_align_any_result_order() {
        let keys = [1, 2, 3];
        let orders = [
            vec![user(1, "a"), user(2, "b"), user(3, "c")],
            vec![user(3, "c"), user(1, "a"), user(2, "b")],
            vec![user(2, "b"), user(3, "c"), user(1, "a")],
            vec![user(3, "c"), user(2, "b"), user(1, "a")],
        ];

        for rows in orders {
            let aligned = align_by_key(rows, &keys, |u| u.id);
            assert_eq!(
                aligned,
                vec![Some(user(1, "a")), Some(user(2, "b")), Some(user(3, "c"))]
            );
        }
    }

    #[test]
    fn test_align_repeated_keys() {
        let aligned = align_by_key(vec![user(7, "g")], &[7, 7], |u| u.id);
        assert_eq!(aligned, vec![Some(user(7, "g")), Some(user(7, "g"))]);
    }

    #[test]
    fn test_fallback_for_every_missing_subset() {
        let keys = [1, 2, 3];
        let all = [user(1, "a"), user(2, "b"), user(3, "c")];

        // Each bit of `mask` marks a key present in the result set.
        for mask in 0u8..8 {
            let rows: Vec<User> = all
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1u8 << i) != 0)
                .map(|(_, u)| u.clone())
                .rev()
                .collect();

            let aligned = align_by_key_or(rows, &keys, |u| u.id, unknown());

            let expected: Vec<User> = all
                .iter()
                .enumerate()
                .map(|(i, u)| if mask & (1u8 << i) != 0 { u.clone() } else { unknown() })
                .collect();
            assert_eq!(aligned, expected, "mask {:03b}", mask);
        }
    }

    #[test]
    fn test_empty_keys() {
        let aligned = align_by_key_or(vec![user(1, "a")], &[], |u| u.id, unknown());
        assert!(aligned.is_empty());
    }
}
