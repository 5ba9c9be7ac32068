//! Human-readable byte-size formatting.

/// Bytes per GiB.
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Format a byte total as a human-readable `"<value> GB"` or `"<value> MB"`
/// string.
///
/// The total is converted to GiB and rounded to 2 decimals; if the result is
/// under 1.0 it is re-expressed in MiB instead. Values are printed with at
/// least one decimal place (e.g. `"300.0 MB"`, `"1.5 GB"`).
///
/// # Arguments
/// * `total_bytes` - Aggregate size in bytes
pub fn format_directory_size(total_bytes: u64) -> String {
    let mut value: f64 = total_bytes as f64 / GIB;
    let mut unit: &str = "GB";
    if value < 1.0 {
        value *= 1024.0;
        unit = "MB";
    }
    format!("{} {}", format_rounded(value), unit)
}

/// Round to 2 decimals, keeping at least one decimal place in the output.
fn format_rounded(value: f64) -> String {
    let rounded: f64 = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{:.1}", rounded)
    } else {
        format!("{}", rounded)
    }
}
