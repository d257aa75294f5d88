use crate::CoreError;

/// Maximum relative deviation of consecutive spacings from their mean.
///
/// Returns 0.0 for fewer than three points (any two points are trivially
/// equally spaced).
pub fn max_spacing_deviation(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let n = (values.len() - 1) as f64;
    let mean = (values[values.len() - 1] - values[0]) / n;
    if mean == 0.0 {
        return f64::INFINITY;
    }
    values
        .windows(2)
        .map(|w| ((w[1] - w[0]) - mean).abs() / mean.abs())
        .fold(0.0, f64::max)
}

/// Resolve a Python-style index (negative counts from the end) against a
/// length. `-1` maps to `len - 1`.
pub fn resolve_index(index: isize, len: usize, what: &'static str) -> Result<usize, CoreError> {
    let resolved = if index < 0 {
        index + len as isize
    } else {
        index
    };
    if resolved < 0 || resolved as usize >= len {
        return Err(CoreError::IndexOutOfRange { what, index, len });
    }
    Ok(resolved as usize)
}
