//! Longest increasing subsequence over the keyed-diff `source` array.
//!
//! `source[i]` is the old index of the node now at new position `i`, or
//! `None` for nodes that must be freshly mounted. Positions in the LIS keep
//! their relative order and never move; everything else is moved.
//!
//! Patience sorting with predecessor links: O(n log n).

/// Positions (ascending) of one longest strictly increasing subsequence of
/// the filled slots of `source`.
pub fn longest_increasing_subsequence(source: &[Option<usize>]) -> Vec<usize> {
    // tails[k] = (position, value) of the smallest tail of a run of length k+1.
    let mut tails: Vec<(usize, usize)> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; source.len()];

    for (pos, slot) in source.iter().enumerate() {
        let Some(value) = *slot else {
            continue;
        };
        let at = tails.partition_point(|&(_, tail)| tail < value);
        if at > 0 {
            prev[pos] = Some(tails[at - 1].0);
        }
        if at == tails.len() {
            tails.push((pos, value));
        } else {
            tails[at] = (pos, value);
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().map(|&(pos, _)| pos);
    while let Some(pos) = cursor {
        result.push(pos);
        cursor = prev[pos];
    }
    result.reverse();
    result
}
