//! Group Partitioning
//!
//! Splits a number of plotted items into groups of bounded size.

/// Partition `n` items into groups of at most `max` items.
///
/// Full groups of `max` come first. An uneven remainder larger than `max`
/// is split into two halves so no trailing group falls below half the
/// maximum; a remainder that fits is emitted as the last group.
///
/// `calculate_group_sizes(21, 5) == [5, 5, 5, 3, 3]`
pub fn calculate_group_sizes(n: usize, max: usize) -> Vec<usize> {
    if max == 0 || n <= max {
        return vec![n];
    }

    let full = (n - max) / max;
    let remainder = n - full * max;

    let mut sizes = vec![max; full];
    if remainder <= max {
        sizes.push(remainder);
    } else {
        let first = remainder.div_ceil(2);
        sizes.push(first);
        sizes.push(remainder - first);
    }
    sizes
}
