//! Crossover flags between two series.
//!
//! +1 when `a` moves from at-or-below `b` to above it, -1 for the mirror
//! move, 0 otherwise. NaN where either bar of either series is NaN.

pub fn crossover(a: &[f64], b: &[f64]) -> Vec<f64> {
    let n = a.len().min(b.len());
    let mut result = vec![f64::NAN; n];
    for i in 1..n {
        let prev = a[i - 1] - b[i - 1];
        let curr = a[i] - b[i];
        if prev.is_nan() || curr.is_nan() {
            continue;
        }
        result[i] = if prev <= 0.0 && curr > 0.0 {
            1.0
        } else if prev >= 0.0 && curr < 0.0 {
            -1.0
        } else {
            0.0
        };
    }
    result
}
