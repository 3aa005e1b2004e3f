use std::ops::Range;

/// What to do with the trailing elements that do not fill a whole group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialGroup {
    /// Discard them; they are never processed. This is the default.
    #[default]
    Drop,

    /// Emit them as a final, shorter group.
    Emit,
}

/// Chunks `items` into groups of `split` elements, in encounter order.
///
/// Returns the groups and the number of trailing elements dropped.
pub(crate) fn chunk<I>(
    items: impl IntoIterator<Item = I>,
    split: usize,
    policy: PartialGroup,
) -> (Vec<Vec<I>>, usize) {
    assert!(split > 0, "split must be > 0");

    let items = items.into_iter();

    // Bounded by the input; `split` may exceed any real collection.
    let capacity = split.min(items.size_hint().0);
    let mut groups = Vec::new();
    let mut current = Vec::with_capacity(capacity);

    for item in items {
        current.push(item);

        if current.len() == split {
            groups.push(std::mem::replace(&mut current, Vec::with_capacity(capacity)));
        }
    }

    let remainder = current.len();
    match policy {
        PartialGroup::Emit if remainder > 0 => {
            groups.push(current);
            (groups, 0)
        }
        _ => (groups, remainder),
    }
}

/// Index ranges covering `0..len` in blocks of `split`; the last block may
/// be shorter.
pub(crate) fn blocks(len: usize, split: usize) -> Vec<Range<usize>> {
    assert!(split > 0, "split must be > 0");

    (0..len)
        .step_by(split)
        .map(|start| start..start.saturating_add(split).min(len))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_drops_trailing_partial_group() {
        let (groups, dropped) = chunk(1..=7, 3, PartialGroup::Drop);

        assert_eq!(groups, vec![vec![1, 2, 3], vec![4, 5, 6]]);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_chunk_emits_trailing_partial_group() {
        let (groups, dropped) = chunk(1..=7, 3, PartialGroup::Emit);

        assert_eq!(groups, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_chunk_exact_multiple() {
        for policy in [PartialGroup::Drop, PartialGroup::Emit] {
            let (groups, dropped) = chunk(0..6, 2, policy);
            assert_eq!(groups.len(), 3);
            assert_eq!(dropped, 0);
        }
    }

    #[test]
    fn test_chunk_shorter_than_split() {
        let (groups, dropped) = chunk(["a", "b"], 5, PartialGroup::Drop);
        assert!(groups.is_empty());
        assert_eq!(dropped, 2);
    }

    #[test]
    fn test_chunk_split_larger_than_any_input() {
        let (groups, dropped) = chunk(0u64..7, usize::MAX, PartialGroup::Drop);
        assert!(groups.is_empty());
        assert_eq!(dropped, 7);

        let (groups, dropped) = chunk(0u64..7, 1 << 40, PartialGroup::Emit);
        assert_eq!(groups, vec![(0..7).collect::<Vec<_>>()]);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_blocks_with_huge_split() {
        assert_eq!(blocks(3, usize::MAX), vec![0..3]);
    }

    #[test]
    fn test_blocks_keep_short_tail() {
        assert_eq!(blocks(5, 2), vec![0..2, 2..4, 4..5]);
        assert_eq!(blocks(4, 2), vec![0..2, 2..4]);
        assert!(blocks(0, 3).is_empty());
    }

    #[test]
    #[should_panic(expected = "split must be > 0")]
    fn test_zero_split_panics() {
        let _ = blocks(3, 0);
    }
}
