/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Integer division that rounds to the nearest integer, with ties going to the even neighbour (banker's rounding).
///
/// Panics if `denominator` is zero.
pub fn div_round_half_even(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder == 0 {
        return quotient;
    }
    let step = if (numerator < 0) == (denominator < 0) { 1 } else { -1 };
    let twice_remainder = 2 * remainder.abs();
    let divisor = denominator.abs();
    match twice_remainder.cmp(&divisor) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + step,
        std::cmp::Ordering::Equal if quotient % 2 == 0 => quotient,
        std::cmp::Ordering::Equal => quotient + step,
    }
}

/// Parses a decimal string such as `"150"`, `"150.5"` or `"-0.25"` into an integer scaled by `10^scale`.
///
/// Strings with more fraction digits than `scale` are rejected rather than rounded.
pub fn parse_fixed_point(value: &str, scale: u32) -> Result<i64, String> {
    let s = value.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (whole, fraction) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };
    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("'{value}' is not a decimal number"));
    }
    if !fraction.chars().all(|c| c.is_ascii_digit()) || (digits.contains('.') && fraction.is_empty()) {
        return Err(format!("'{value}' is not a decimal number"));
    }
    if fraction.len() > scale as usize {
        return Err(format!("'{value}' has more than {scale} decimal places"));
    }
    let overflow = || format!("'{value}' is too large");
    let multiplier = 10i64.checked_pow(scale).ok_or_else(overflow)?;
    let whole = whole.parse::<i64>().map_err(|_| overflow())?;
    let padded = format!("{fraction:0<width$}", width = scale as usize);
    let fraction = if padded.is_empty() { 0 } else { padded.parse::<i64>().map_err(|_| overflow())? };
    let magnitude = whole.checked_mul(multiplier).and_then(|w| w.checked_add(fraction)).ok_or_else(overflow)?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// The inverse of [`parse_fixed_point`]. `format_fixed_point(15000, 2)` is `"150.00"`.
pub fn format_fixed_point(value: i64, scale: u32) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    if scale == 0 {
        return format!("{sign}{magnitude}");
    }
    let divisor = 10u64.pow(scale);
    let whole = magnitude / divisor;
    let fraction = magnitude % divisor;
    format!("{sign}{whole}.{fraction:0width$}", width = scale as usize)
}
