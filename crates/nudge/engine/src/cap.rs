//! Session cap.

/// Keep at most `max` leading entries of an already-ordered sequence.
///
/// Position is the only criterion; nothing is re-sorted. Zero or negative
/// `max` yields an empty result.
pub fn cap_session<T>(mut items: Vec<T>, max: i64) -> Vec<T> {
    if max <= 0 {
        return Vec::new();
    }
    let max = usize::try_from(max).unwrap_or(usize::MAX);
    items.truncate(max);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn truncates_from_the_front() {
        assert_eq!(cap_session(vec![1, 2, 3, 4, 5], 3), vec![1, 2, 3]);
    }

    #[test]
    fn shorter_input_unchanged() {
        assert_eq!(cap_session(vec![9, 1], 3), vec![9, 1]);
    }

    #[test]
    fn non_positive_cap_is_empty() {
        assert!(cap_session(vec![1, 2], 0).is_empty());
        assert!(cap_session(vec![1, 2], -4).is_empty());
    }

    proptest! {
        #[test]
        fn never_exceeds_cap(items in prop::collection::vec(any::<u8>(), 0..20), max in -5i64..10) {
            let out = cap_session(items.clone(), max);
            prop_assert!(out.len() as i64 <= max.max(0));
            prop_assert_eq!(&items[..out.len()], &out[..]);
        }
    }
}
