//! Local-maximum detection on a sampled series.

/// Two samples closer than this are treated as equal, so floating-point noise
/// on a flat stretch does not read as a ripple of tiny peaks.
const FLAT_TOLERANCE: f64 = 1e-9;

/// Find local maxima of `values` that are at least `min_height`.
///
/// A peak is a sample strictly higher than its left neighbour followed by a
/// (possibly flat) run and then a strictly lower sample. For flat tops the
/// middle index of the plateau is reported, rounding down. The first and last
/// samples are never peaks. Indices are written to `out` in ascending order.
pub fn find_peaks(values: &[f64], min_height: f64, out: &mut Vec<usize>) {
    out.clear();
    let n = values.len();
    if n < 3 {
        return;
    }

    let last = n - 1;
    let mut i = 1;
    while i < last {
        if values[i] - values[i - 1] > FLAT_TOLERANCE {
            let mut ahead = i + 1;
            while ahead < last && (values[ahead] - values[i]).abs() <= FLAT_TOLERANCE {
                ahead += 1;
            }
            if values[i] - values[ahead] > FLAT_TOLERANCE {
                let mid = (i + ahead - 1) / 2;
                if values[mid] >= min_height {
                    out.push(mid);
                }
                i = ahead;
            }
        }
        i += 1;
    }
}
