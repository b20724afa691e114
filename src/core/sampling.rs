use rand::seq::SliceRandom;

/// Bound `nodes` to at most `max` elements, rotating which of the far ones get picked.
///
/// If `nodes` fits, it is returned unchanged. Otherwise the result is the first
/// `max - random_count` elements followed by `random_count` elements sampled
/// uniformly, without replacement, from the rest.
pub fn randomize_limited_list<T: Clone>(nodes: &[T], max: usize, random_count: usize) -> Vec<T> {
    if nodes.len() <= max {
        return nodes.to_vec();
    }

    let random_count = random_count.min(max);
    let prefix = max - random_count;

    let mut result = nodes[..prefix].to_vec();
    result.extend(
        nodes[prefix..]
            .choose_multiple(&mut rand::thread_rng(), random_count)
            .cloned(),
    );

    result
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn short_list_unchanged() {
        let nodes: Vec<u32> = (0..10).collect();

        assert_eq!(randomize_limited_list(&nodes, 10, 5), nodes);
        assert_eq!(randomize_limited_list(&nodes, 20, 5), nodes);
    }

    #[test]
    fn prefix_then_random_sample() {
        let nodes: Vec<u32> = (0..100).collect();

        for _ in 0..20 {
            let sample = randomize_limited_list(&nodes, 24, 5);

            assert_eq!(sample.len(), 24);
            assert_eq!(&sample[..19], &nodes[..19]);

            let tail: HashSet<u32> = sample[19..].iter().copied().collect();
            assert_eq!(tail.len(), 5);
            assert!(tail.iter().all(|n| *n >= 19));
        }
    }

    #[test]
    fn random_count_larger_than_max() {
        let nodes: Vec<u32> = (0..10).collect();

        let sample = randomize_limited_list(&nodes, 3, 5);

        assert_eq!(sample.len(), 3);
    }

    #[test]
    fn rotates_far_nodes() {
        let nodes: Vec<u32> = (0..1000).collect();

        let seen: HashSet<u32> = (0..50)
            .flat_map(|_| randomize_limited_list(&nodes, 16, 10).into_iter().skip(6))
            .collect();

        assert!(seen.len() > 10);
    }
}
