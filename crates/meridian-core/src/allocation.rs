//! # Allocation
//!
//! Distributes an order-level amount across line items with the
//! largest-remainder method.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  total = 100¢, weights = [1, 1, 1]                                      │
//! │                                                                         │
//! │  exact shares     33.33   33.33   33.33                                 │
//! │  floor            33      33      33        (sum 99, 1¢ left over)      │
//! │  remainders       .33     .33     .33                                   │
//! │  leftover → largest remainder, ties broken by list order               │
//! │  result           34      33      33        (sum 100 ✓)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sum of the result always equals `total` exactly.

/// Splits `total` proportionally to `weights`.
///
/// Negative weights count as zero. When every weight is zero the total is
/// split evenly. Returns an empty vector for empty weights.
///
/// ```rust
/// use meridian_core::allocation::allocate;
///
/// assert_eq!(allocate(100, &[1, 1, 1]), vec![34, 33, 33]);
/// assert_eq!(allocate(30, &[100, 100, 100]), vec![10, 10, 10]);
/// assert_eq!(allocate(10, &[500, 650]).iter().sum::<i64>(), 10);
/// ```
pub fn allocate(total: i64, weights: &[i64]) -> Vec<i64> {
    if weights.is_empty() {
        return Vec::new();
    }

    let mut clamped: Vec<i128> = weights.iter().map(|w| (*w).max(0) as i128).collect();
    if clamped.iter().all(|w| *w == 0) {
        clamped.iter_mut().for_each(|w| *w = 1);
    }
    let weight_sum: i128 = clamped.iter().sum();

    // Work on the magnitude so floor/remainder behave the same for refunds.
    let sign: i64 = if total < 0 { -1 } else { 1 };
    let magnitude = (total as i128).abs();

    let mut shares = Vec::with_capacity(clamped.len());
    let mut remainders = Vec::with_capacity(clamped.len());
    for (idx, w) in clamped.iter().enumerate() {
        let scaled = magnitude * w;
        shares.push(scaled / weight_sum);
        remainders.push((idx, scaled % weight_sum));
    }

    let allocated: i128 = shares.iter().sum();
    let leftover = (magnitude - allocated) as usize;

    // Stable sort keeps list order among equal remainders.
    remainders.sort_by(|a, b| b.1.cmp(&a.1));
    for (idx, _) in remainders.into_iter().take(leftover) {
        shares[idx] += 1;
    }

    shares.into_iter().map(|s| sign * s as i64).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        assert_eq!(allocate(30, &[100, 100, 100]), vec![10, 10, 10]);
        assert_eq!(allocate(99, &[100, 100, 100]), vec![33, 33, 33]);
    }

    #[test]
    fn test_leftover_goes_to_largest_remainder() {
        // exact: 2.5, 7.5 -> floor 2, 7 -> leftover 1 -> tie on .5, first wins
        assert_eq!(allocate(10, &[1, 3]), vec![3, 7]);
        // exact: 1.2, 2.4, 3.6 -> floor 1,2,3 (6) -> 1 leftover -> .6 wins
        assert_eq!(allocate(7, &[1, 2, 3]), vec![1, 2, 4]);
    }

    #[test]
    fn test_ties_prefer_list_order() {
        assert_eq!(allocate(2, &[1, 1, 1]), vec![1, 1, 0]);
    }

    #[test]
    fn test_sum_is_conserved_for_awkward_weights() {
        let weights = [333, 1, 7919, 12, 0, 5_000_000];
        for total in [0, 1, 17, 999, 123_457, 10_000_001] {
            let shares = allocate(total, &weights);
            assert_eq!(shares.iter().sum::<i64>(), total, "total {}", total);
            assert_eq!(shares[4], 0, "zero weight receives nothing");
        }
    }

    #[test]
    fn test_zero_weights_split_evenly() {
        assert_eq!(allocate(5, &[0, 0]), vec![3, 2]);
        assert_eq!(allocate(0, &[0, 0]), vec![0, 0]);
    }

    #[test]
    fn test_negative_total() {
        let shares = allocate(-100, &[1, 1, 1]);
        assert_eq!(shares, vec![-34, -33, -33]);
    }

    #[test]
    fn test_empty_weights() {
        assert!(allocate(100, &[]).is_empty());
    }
}
