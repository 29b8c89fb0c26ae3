#[cfg(test)]
mod tests {
    use engine::progress::{Progress, Record};

    /// Every permutation of `items`, by Heap's algorithm.
    fn permutations(items: &[u64]) -> Vec<Vec<u64>> {
        fn heap(k: usize, items: &mut Vec<u64>, out: &mut Vec<Vec<u64>>) {
            if k <= 1 {
                out.push(items.clone());
                return;
            }
            heap(k - 1, items, out);
            for i in 0..k - 1 {
                if k % 2 == 0 {
                    items.swap(i, k - 1);
                } else {
                    items.swap(0, k - 1);
                }
                heap(k - 1, items, out);
            }
        }
        let mut items = items.to_vec();
        let mut out = Vec::new();
        heap(items.len(), &mut items, &mut out);
        out
    }

    #[test]
    fn test_in_order_completions_advance_one_by_one() {
        let mut progress = Progress::new(100);

        assert_eq!(progress.record(101), Record::Advanced(101));
        assert_eq!(progress.record(102), Record::Advanced(102));
        assert_eq!(progress.confirmed(), 102);
    }

    #[test]
    fn test_gap_holds_the_cursor() {
        let mut progress = Progress::new(100);

        assert_eq!(progress.record(103), Record::Held);
        assert_eq!(progress.record(102), Record::Held);
        assert_eq!(progress.held(), 2);
        assert_eq!(progress.confirmed(), 100);

        assert_eq!(progress.record(101), Record::Advanced(103));
        assert_eq!(progress.held(), 0);
    }

    #[test]
    fn test_stale_and_duplicate_notices() {
        let mut progress = Progress::new(100);

        assert_eq!(progress.record(99), Record::Stale);
        assert_eq!(progress.record(100), Record::Stale);
        assert_eq!(progress.record(105), Record::Held);
        assert_eq!(progress.record(105), Record::Stale);
        assert_eq!(progress.confirmed(), 100);
    }

    #[test]
    fn test_cursor_is_monotonic_for_any_arrival_order() {
        // duplicates and stale numbers mixed in
        let notices = [101, 102, 103, 104, 102, 99];

        for order in permutations(&notices) {
            let mut progress = Progress::new(100);
            let mut persisted = progress.confirmed();

            for number in &order {
                if let Record::Advanced(to) = progress.record(*number) {
                    assert!(to > persisted, "cursor regressed from {persisted} to {to} in {order:?}");
                    persisted = to;
                }
                assert_eq!(progress.confirmed(), persisted);
            }

            assert_eq!(persisted, 104, "order {order:?}");
        }
    }
}
