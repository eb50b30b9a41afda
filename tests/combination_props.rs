use std::collections::HashSet;

use proptest::prelude::*;

use napp::index::{binomial, CombinationSpace};

fn subset(num_pivot: usize, arity: usize) -> impl Strategy<Value = Vec<u32>> {
    proptest::sample::subsequence((0..num_pivot as u32).collect::<Vec<u32>>(), arity)
}

proptest! {
    #[test]
    fn prop_ids_decode_to_their_subset(
        (num_pivot, arity, pivots) in (3usize..64, 1usize..=3)
            .prop_flat_map(|(n, k)| (Just(n), Just(k), subset(n, k)))
            .prop_flat_map(|(n, k, s)| (Just(n), Just(k), Just(s).prop_shuffle()))
    ) {
        let space = CombinationSpace::new(num_pivot, arity).unwrap();
        let id = match arity {
            1 => space.id1(pivots[0]),
            2 => space.id2(pivots[0], pivots[1]),
            _ => space.id3(pivots[0], pivots[1], pivots[2]),
        }
        .unwrap();
        prop_assert!((id as usize) < space.size());

        let mut sorted = pivots.clone();
        sorted.sort_unstable();
        prop_assert_eq!(space.decode(id).unwrap(), sorted);
    }

    #[test]
    fn prop_prefix_ids_are_distinct(
        (num_pivot, arity, prefix, perm) in (3usize..40, 1usize..=3)
            .prop_flat_map(|(n, k)| {
                let perm = Just((0..n as u32).collect::<Vec<u32>>()).prop_shuffle();
                (Just(n), Just(k), k..=n, perm)
            })
    ) {
        let space = CombinationSpace::new(num_pivot, arity).unwrap();
        let mut ids = Vec::new();
        let n = space.fill_ids(&perm, prefix, &mut ids).unwrap();
        prop_assert_eq!(n as u64, binomial(prefix, arity));

        let distinct: HashSet<u32> = ids[..n].iter().copied().collect();
        prop_assert_eq!(distinct.len(), n);
        for id in &ids[..n] {
            let pivots = space.decode(*id).unwrap();
            prop_assert!(pivots.iter().all(|p| perm[..prefix].contains(p)));
        }
    }
}

#[test]
fn test_image_is_the_full_range() {
    for (num_pivot, arity) in [(7, 1), (12, 2), (11, 3)] {
        let space = CombinationSpace::new(num_pivot, arity).unwrap();
        let mut ids = Vec::new();
        let perm: Vec<u32> = (0..num_pivot as u32).rev().collect();
        let n = space.fill_ids(&perm, num_pivot, &mut ids).unwrap();
        let mut image: Vec<u32> = ids[..n].to_vec();
        image.sort_unstable();
        let expected: Vec<u32> = (0..space.size() as u32).collect();
        assert_eq!(image, expected);
    }
}
