/// Drop non-breaking spaces, trim, and collapse internal whitespace runs to one space.
pub fn clean_str(raw: &str) -> String {
    let without_nbsp: String = raw.chars().filter(|&c| c != '\u{00A0}').collect();
    without_nbsp.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Integer prefix parse: optional sign, then leading digits. `"5 fish"` → 5,
/// `"3.7"` → 3, `"abc"` → None.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    // saturate rather than fail on absurdly long digit runs
    let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}

/// Parse a cell as a finite number, ignoring surrounding whitespace.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}
