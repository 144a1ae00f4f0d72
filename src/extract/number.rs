use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

/// How `.` and `,` are read in a displayed number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecimalConvention {
    /// Decide per token from the position and count of the separators.
    #[default]
    Auto,
    /// `1.823,45`: dot groups thousands, comma is the decimal point.
    Comma,
    /// `1,823.45`: comma groups thousands, dot is the decimal point.
    Dot,
}

// Either space-grouped thousands (`1 823,45`) or a run of digits interleaved
// with separators, starting and ending on a digit.
static NUMERIC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\d{1,3}(?:[ \x{00A0}\x{202F}]\d{3})+\b(?:[.,]\d+)?|\d(?:[\d.,\x{00A0}\x{202F}]*\d)?",
    )
    .expect("numeric token regex is valid")
});

/// Normalize the first number found in `text` to a canonical decimal string.
///
/// The canonical form uses `.` as decimal point, has no grouping, no
/// leading zeros in the integer part and no trailing zeros in the fraction
/// (`"1.700,50"` becomes `"1700.5"`). Returns `None` when `text` holds no
/// number or the separators are inconsistent with `convention`.
pub fn normalize(text: &str, convention: DecimalConvention) -> Option<String> {
    let token: String = NUMERIC_TOKEN
        .find(text)?
        .as_str()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let decimal = match convention {
        DecimalConvention::Comma => Some(','),
        DecimalConvention::Dot => Some('.'),
        DecimalConvention::Auto => infer_decimal_separator(&token),
    };

    let (int_part, frac_part) = match decimal.and_then(|d| token.rfind(d).map(|i| (d, i))) {
        Some((sep, idx)) => {
            if token[..idx].contains(sep) {
                return None;
            }
            (&token[..idx], Some(&token[idx + 1..]))
        }
        None => (token.as_str(), None),
    };

    if frac_part.is_some_and(|f| f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    let digits = ungroup(int_part)?;
    let int = match digits.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };

    match frac_part.map(|f| f.trim_end_matches('0')) {
        Some(frac) if !frac.is_empty() => Some(format!("{int}.{frac}")),
        _ => Some(int.to_owned()),
    }
}

/// [`normalize`] and parse into an `f64`.
pub fn parse_decimal(text: &str, convention: DecimalConvention) -> Option<f64> {
    normalize(text, convention)?.parse().ok()
}

fn infer_decimal_separator(token: &str) -> Option<char> {
    match (token.rfind('.'), token.rfind(',')) {
        (Some(dot), Some(comma)) => Some(if dot > comma { '.' } else { ',' }),
        (Some(_), None) => single_separator_role(token, '.'),
        (None, Some(_)) => single_separator_role(token, ','),
        (None, None) => None,
    }
}

/// With only one kind of separator: repeated means grouping, and a lone one
/// is grouping only when it looks like `d.ddd` / `ddd,ddd`.
fn single_separator_role(token: &str, sep: char) -> Option<char> {
    if token.matches(sep).count() > 1 {
        return None;
    }
    let (before, after) = token.split_once(sep)?;
    let looks_grouped =
        after.len() == 3 && (1..=3).contains(&before.len()) && !before.starts_with('0');
    if looks_grouped { None } else { Some(sep) }
}

/// Strip thousands separators, checking that groups after the first have three digits.
fn ungroup(int_part: &str) -> Option<String> {
    if int_part.bytes().all(|b| b.is_ascii_digit()) {
        return Some(int_part.to_owned());
    }

    let sep = if int_part.contains('.') { '.' } else { ',' };
    let mut groups = int_part.split(sep);
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut digits = first.to_owned();
    for group in groups {
        if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}
