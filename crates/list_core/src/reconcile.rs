//! The two merge primitives every controller merge is built from. Keeping
//! them here gives a single answer to "is this item new" and "is this item
//! gone".

/// Keeps only the incoming items whose identity does not already appear in
/// `existing`, preserving incoming order.
pub fn patch_items<T, K, F>(existing: &[T], incoming: Vec<T>, identity: &F) -> Vec<T>
where
    F: Fn(&T) -> K + ?Sized,
    K: PartialEq,
{
    incoming
        .into_iter()
        .filter(|item| {
            let key = identity(item);
            !existing.iter().any(|old| identity(old) == key)
        })
        .collect()
}

/// Drops every item whose identity equals `removed_key`.
pub fn remove_items<T, K, F>(existing: Vec<T>, removed_key: &K, identity: &F) -> Vec<T>
where
    F: Fn(&T) -> K + ?Sized,
    K: PartialEq,
{
    existing
        .into_iter()
        .filter(|item| identity(item) != *removed_key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_char(s: &&str) -> char {
        s.chars().next().unwrap_or_default()
    }

    #[test]
    fn patch_keeps_only_unseen_identities_in_incoming_order() {
        let existing = vec!["alpha", "beta"];
        let incoming = vec!["apple", "gamma", "banana", "delta"];

        let fresh = patch_items(&existing, incoming, &first_char);
        assert_eq!(fresh, vec!["gamma", "delta"]);
    }

    #[test]
    fn patch_of_empty_existing_keeps_everything() {
        let fresh = patch_items(&[], vec!["a", "b"], &first_char);
        assert_eq!(fresh, vec!["a", "b"]);
    }

    #[test]
    fn remove_drops_every_match() {
        let existing = vec!["alpha", "beta", "apricot"];
        let remaining = remove_items(existing, &'a', &first_char);
        assert_eq!(remaining, vec!["beta"]);
    }

    #[test]
    fn remove_of_absent_key_is_a_no_op() {
        let existing = vec!["alpha", "beta"];
        let remaining = remove_items(existing.clone(), &'z', &first_char);
        assert_eq!(remaining, existing);
    }
}
