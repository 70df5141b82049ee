//! Deterministic reductions across realizations.
//!
//! Ensemble statistics sum one value per realization. Floating-point addition
//! is not associative, so a left fold gives results that depend on the order
//! realizations were listed or loaded. Values are instead combined pairwise by
//! index, halving the row each round:
//!
//! ```text
//! [r0, r1, r2, r3, r4]
//!   -> [r0+r1, r2+r3, r4]
//!   -> [(r0+r1)+(r2+r3), r4]
//!   -> [((r0+r1)+(r2+r3))+r4]
//! ```
//!
//! [`ordered_mean`] sorts the row first, so the mean of an ensemble is the
//! same bit for bit however its members are ordered.

/// Pairwise reduction of `values` by index. `None` when empty.
///
/// ```
/// use enkf_node::reductions::pairwise;
///
/// assert_eq!(pairwise(&[1.0, 2.0, 3.0, 4.0, 5.0], |a, b| a + b), Some(15.0));
/// ```
pub fn pairwise<T, F>(values: &[T], op: F) -> Option<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let mut row = values.to_vec();
    let mut len = row.len();
    while len > 1 {
        let half = len / 2;
        for i in 0..half {
            row[i] = op(row[2 * i], row[2 * i + 1]);
        }
        if len % 2 == 1 {
            row[half] = row[len - 1];
        }
        len = half + len % 2;
    }
    row.first().copied()
}

/// Mean of one row of the ensemble, independent of the order of `values`.
/// `0.0` for an empty row.
pub fn ordered_mean(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    match pairwise(&sorted, |a, b| a + b) {
        Some(total) => total / values.len() as f64,
        None => 0.0,
    }
}
