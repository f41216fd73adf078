/// Format a floating-point number to a given number of significant digits,
/// in the style of `printf("%.Ng")`: fixed notation for moderate exponents,
/// scientific notation otherwise, trailing zeros trimmed.
///
/// # Examples
///
/// ```
/// use audit_core::formatting::format_sig;
///
/// assert_eq!(format_sig(1234.5, 15), "1234.5");
/// assert_eq!(format_sig(100.0, 15), "100");
/// assert_eq!(format_sig(0.1 + 0.2, 15), "0.3");
/// assert_eq!(format_sig(1e20, 15), "1e+20");
/// ```
pub fn format_sig(value: f64, sig_digits: u32) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let sig = sig_digits.max(1) as usize;

    // Round in scientific notation first so the decision between fixed and
    // scientific output uses the post-rounding exponent (999.99 at 3 digits
    // is 1e+03, not 1000).
    let sci = format!("{:.*e}", sig - 1, value);
    let (mantissa, exp) = split_scientific(&sci);

    if exp >= -4 && exp < sig as i32 {
        let decimals = (sig as i32 - 1 - exp).max(0) as usize;
        trim_trailing_zeros(&format!("{:.*}", decimals, value))
    } else {
        let mantissa = trim_trailing_zeros(mantissa);
        if exp < 0 {
            format!("{}e-{:02}", mantissa, -exp)
        } else {
            format!("{}e+{:02}", mantissa, exp)
        }
    }
}

/// Render a numeric value the way report artifacts expect: 15 significant
/// digits, the precision the downstream consumers were built against.
pub fn format_value(value: f64) -> String {
    format_sig(value, 15)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Split Rust's `LowerExp` output (`"1.5e-3"`) into mantissa and exponent.
fn split_scientific(sci: &str) -> (&str, i32) {
    match sci.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse().unwrap_or(0)),
        None => (sci, 0),
    }
}

/// Drop trailing fractional zeros, and the decimal point if nothing remains
/// after it.
fn trim_trailing_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
