//! Internal helpers for parsing and normalization.
//!
//! These utilities are **not** part of the public API.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{EngineError, ResultEngine};

/// Parse a decimal string with at most two fraction digits into an integer
/// scaled by 100.
///
/// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
/// `label` names the value in error messages ("amount", "percent").
pub(crate) fn parse_hundredths(s: &str, label: &str) -> ResultEngine<i64> {
    let empty = || EngineError::InvalidAmount(format!("empty {label}"));
    let invalid = || EngineError::InvalidAmount(format!("invalid {label}"));
    let overflow = || EngineError::InvalidAmount(format!("{label} too large"));

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(empty());
    }

    let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
        (true, stripped)
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        (false, stripped)
    } else {
        (false, trimmed)
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Err(empty());
    }

    let rest = rest.replace(',', ".");
    let mut parts = rest.split('.');
    let units_str = parts.next().ok_or_else(invalid)?;
    let fraction_str = parts.next();

    if parts.next().is_some() {
        return Err(invalid());
    }

    if units_str.is_empty() || !units_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let units: i64 = units_str.parse().map_err(|_| overflow())?;

    let hundredths: i64 = match fraction_str {
        None | Some("") => 0,
        Some(frac) => {
            if !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            match frac.len() {
                1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
                2 => frac.parse::<i64>().map_err(|_| invalid())?,
                _ => {
                    return Err(EngineError::InvalidAmount(format!(
                        "too many decimals in {label}"
                    )));
                }
            }
        }
    };

    let total = units
        .checked_mul(100)
        .and_then(|v| v.checked_add(hundredths))
        .ok_or_else(overflow)?;

    if negative {
        total.checked_neg().ok_or_else(overflow)
    } else {
        Ok(total)
    }
}

/// Format an integer scaled by 100 as `units.hundredths`.
pub(crate) fn format_hundredths(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Collapse whitespace in a display name; `None` when nothing is left.
pub(crate) fn normalize_display(input: &str) -> Option<String> {
    let out = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if out.is_empty() { None } else { Some(out) }
}

/// Build an accent and case insensitive search key.
pub(crate) fn normalize_key(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut out = String::new();
    let mut prev_space = false;
    for ch in trimmed.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            prev_space = false;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    let normalized = out.trim();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signed_and_comma_values() {
        assert_eq!(parse_hundredths("-0,5", "amount").unwrap(), -50);
        assert_eq!(parse_hundredths(" +3 ", "amount").unwrap(), 300);
        assert!(parse_hundredths("1.2.3", "amount").is_err());
        assert!(parse_hundredths("-", "amount").is_err());
    }

    #[test]
    fn formats_hundredths() {
        assert_eq!(format_hundredths(5), "0.05");
        assert_eq!(format_hundredths(-1234), "-12.34");
    }

    #[test]
    fn search_key_ignores_accents_and_case() {
        assert_eq!(normalize_key("  Niccolò  Rossi ").as_deref(), Some("niccolo rossi"));
        assert_eq!(normalize_key("--"), None);
        assert_eq!(normalize_display("  Ann   Lee ").as_deref(), Some("Ann Lee"));
    }
}
