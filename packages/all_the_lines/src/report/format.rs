//! Number formatting shared by the report columns.

/// Formats a number the way C's `%g` conversion does with the default precision of six
/// significant digits.
///
/// Exponential notation is used when the decimal exponent is below -4 or at least 6, with a
/// signed exponent of at least two digits. Trailing zeros of the fraction are removed.
pub(crate) fn format_general(value: f64) -> String {
    const PRECISION: i32 = 6;

    if !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value.is_sign_negative() {
            "-inf".to_string()
        } else {
            "inf".to_string()
        };
    }

    if value == 0.0 {
        return "0".to_string();
    }

    // Rounding to six significant digits first determines the exponent that %g uses.
    let scientific = format!("{value:.5e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .expect("scientific formatting always contains an exponent marker");
    let exponent: i32 = exponent
        .parse()
        .expect("scientific formatting always produces an integer exponent");

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = usize::try_from(PRECISION - 1 - exponent)
            .expect("exponent is at most PRECISION - 1 in fixed notation");
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

/// Formats a number with one decimal in a field five characters wide, like `%5.1f`.
pub(crate) fn format_tenths(value: f64) -> String {
    format!("{value:5.1}")
}

/// The share of `part` in `total` as a percentage, or zero if the total is zero.
#[expect(
    clippy::cast_precision_loss,
    reason = "percentages only need approximate values"
)]
pub(crate) fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// The mean of `total` over `count`, or `None` if the count is zero.
#[expect(
    clippy::cast_precision_loss,
    reason = "per-hit averages only need approximate values"
)]
pub(crate) fn mean(total: u64, count: u64) -> Option<f64> {
    (count != 0).then(|| total as f64 / count as f64)
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}
