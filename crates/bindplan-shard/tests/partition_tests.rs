use super::*;
use proptest::prelude::*;

fn bound(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn components(groups: &[&[&'static str]]) -> FxHashMap<&'static str, u32> {
    let mut map = FxHashMap::default();
    for (id, group) in groups.iter().enumerate() {
        for key in *group {
            map.insert(*key, id as u32);
        }
    }
    map
}

fn shard_keys<K: Clone>(partition: &Partition<K>) -> Vec<Vec<K>> {
    partition.shards.iter().map(|s| s.keys.clone()).collect()
}

#[test]
fn test_chain_fills_shards_in_order() {
    let sorted = ["S1", "S2", "S3"];
    let map = components(&[&["S1"], &["S2"], &["S3"]]);
    let result = partition(&sorted, &map, bound(2)).unwrap();
    assert_eq!(shard_keys(&result), vec![vec!["S1", "S2"], vec!["S3"]]);
    assert_eq!(result.shards[1].index, 1);
    assert!(result.oversized.is_empty());
}

#[test]
fn test_cycle_stays_in_one_shard() {
    let sorted = ["A", "B", "C", "D", "E"];
    let map = components(&[&["A"], &["B"], &["C", "D"], &["E"]]);
    let result = partition(&sorted, &map, bound(2)).unwrap();
    assert_eq!(
        shard_keys(&result),
        vec![vec!["A", "B"], vec!["C", "D"], vec!["E"]]
    );
    assert_eq!(result.clone().into_keys(), sorted.to_vec());
    assert_eq!(result.shard_sizes(), vec![2, 2, 1]);
}

#[test]
fn test_oversized_component_gets_own_shard() {
    let sorted = ["A", "B", "C", "D", "E"];
    let map = components(&[&["A"], &["B", "C", "D"], &["E"]]);
    let result = partition(&sorted, &map, bound(2)).unwrap();
    assert_eq!(
        shard_keys(&result),
        vec![vec!["A"], vec!["B", "C", "D"], vec!["E"]]
    );
    assert_eq!(
        result.oversized,
        vec![OversizedComponent {
            shard: 1,
            size: 3,
            bound: 2
        }]
    );
    let diagnostic = result.oversized[0].to_diagnostic("AppGraph");
    assert!(!diagnostic.is_error());
    assert_eq!(diagnostic.code, 2001);
}

#[test]
fn test_small_input_is_one_shard() {
    let sorted = ["A", "B", "C"];
    let map = components(&[&["A", "B"], &["C"]]);
    let result = partition(&sorted, &map, bound(3)).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.shards[0].keys, sorted.to_vec());
}

#[test]
fn test_empty_input() {
    let sorted: [&str; 0] = [];
    let result = partition(&sorted, &FxHashMap::<&str, u32>::default(), bound(4)).unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_keys_without_component_are_singletons() {
    let sorted = ["A", "B", "C"];
    let map = components(&[&["B"]]);
    let result = partition(&sorted, &map, bound(1)).unwrap();
    assert_eq!(shard_keys(&result), vec![vec!["A"], vec!["B"], vec!["C"]]);
}

#[test]
fn test_non_contiguous_component_is_rejected() {
    let sorted = ["C", "A", "D"];
    let map = components(&[&["A"], &["C", "D"]]);
    let err = partition(&sorted, &map, bound(2)).unwrap_err();
    assert_eq!(err, PartitionError::NonContiguousComponent { component: 1 });
    assert_eq!(err.to_diagnostic("G").code, 1012);
}

#[test]
fn test_chunk_statements() {
    let statements: Vec<u32> = (0..7).collect();
    let chunks = chunk_statements(&statements, bound(3));
    assert_eq!(chunks, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
    assert!(chunk_statements::<u32>(&[], bound(3)).is_empty());
}

/// Sorted keys `0..n` where consecutive runs share a component.
fn layout(sizes: &[usize]) -> (Vec<usize>, FxHashMap<usize, u32>) {
    let mut sorted = Vec::new();
    let mut map = FxHashMap::default();
    for (component, &size) in sizes.iter().enumerate() {
        for _ in 0..size {
            map.insert(sorted.len(), component as u32);
            sorted.push(sorted.len());
        }
    }
    (sorted, map)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: shards concatenate back to the input and never split a component.
    #[test]
    fn property_partition_preserves_order_and_components(
        sizes in proptest::collection::vec(1usize..=5, 0..40),
        max in 1usize..=8,
    ) {
        let (sorted, map) = layout(&sizes);
        let result = partition(&sorted, &map, bound(max)).unwrap();

        prop_assert_eq!(result.clone().into_keys(), sorted.clone());

        let mut shard_of = FxHashMap::default();
        for shard in &result.shards {
            prop_assert!(!shard.is_empty());
            for key in &shard.keys {
                shard_of.insert(*key, shard.index);
            }
        }
        for key in &sorted {
            let first = sorted.iter().find(|k| map[*k] == map[key]).unwrap();
            prop_assert_eq!(shard_of[key], shard_of[first]);
        }

        let oversized_shards: FxHashSet<usize> =
            result.oversized.iter().map(|o| o.shard).collect();
        for shard in &result.shards {
            if !oversized_shards.contains(&shard.index) {
                prop_assert!(shard.len() <= max);
            }
        }
    }

    /// PROPERTY: input no larger than the bound always yields one shard.
    #[test]
    fn property_small_input_single_shard(
        sizes in proptest::collection::vec(1usize..=3, 1..6),
    ) {
        let (sorted, map) = layout(&sizes);
        let result = partition(&sorted, &map, bound(sorted.len())).unwrap();
        prop_assert_eq!(result.len(), 1);
        prop_assert!(result.oversized.is_empty());
    }
}
