//! Percentile estimation and the data-sufficiency guard shared by the
//! history test and the peer test.
//!
//! The estimation method is Apache Commons Math's "legacy" percentile type,
//! chosen to match the reference detector this crate's behavior is
//! specified against (see `SPEC_FULL.md` §4.2 and the GLOSSARY in
//! `spec.md`). Pinning one definition here keeps the two classifier tests
//! from silently drifting apart if one of them is later rewritten.

/// Returns `true` when a sample of size `n` has enough points for the
/// requested percentile `p` (0..=100) to be statistically meaningful.
///
/// Same rule used by both the history test and the peer test:
/// `n * p/100 >= 1` and `n * (1 - p/100) >= 1`.
pub fn has_sufficient_data(n: usize, p: f64) -> bool {
    let n = n as f64;
    n * (p / 100.0) >= 1.0 && n * (1.0 - p / 100.0) >= 1.0
}

/// Apache Commons Math "legacy" percentile estimate over `values`.
///
/// `values` need not be sorted; this function sorts a local copy. Callers
/// must check `has_sufficient_data` first — this function does not
/// re-validate sufficiency, it only guards against the degenerate empty
/// case by returning `None`.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let pos = (p / 100.0) * (n as f64 + 1.0);

    if pos < 1.0 {
        return Some(sorted[0]);
    }
    if pos >= n as f64 {
        return Some(sorted[n - 1]);
    }

    let lower = pos.floor() as usize - 1;
    let frac = pos - pos.floor();
    Some(sorted[lower] + frac * (sorted[lower + 1] - sorted[lower]))
}
