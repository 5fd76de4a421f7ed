use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lower-cases and strips combining marks so "Ó" and "o" compare equal.
pub fn normalize<'a>(text: impl Into<Option<&'a str>>) -> String {
    match text.into() {
        Some(text) if !text.is_empty() => text
            .to_lowercase()
            .nfd()
            .filter(|ch| !is_combining_mark(*ch))
            .collect(),
        _ => String::new(),
    }
}

/// Day/month(/year) typed into the search bar, e.g. `25/12` or `25-12-24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchDate {
    pub day: u32,
    pub month: u32,
    pub year: Option<i32>,
}

impl SearchDate {
    pub fn matches(&self, year: i32, month: u32, day: u32) -> bool {
        self.day == day && self.month == month && self.year.map_or(true, |y| y == year)
    }
}

static SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[/-]").expect("valid date separator pattern"));

/// Reads a loose date token. Values are not range-checked: `40/13` parses and
/// simply never matches a real date.
pub fn parse_search_token(term: &str) -> Option<SearchDate> {
    let mut parts = SEPARATOR.split(term);
    let day = parts.next()?;
    let month = parts.next()?;
    let year = parts.next();

    let day = u32::try_from(leading_int(day)?).ok()?;
    let month = u32::try_from(leading_int(month)?).ok()?;
    let year = year
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| {
            let value = leading_int(raw)?;
            let value = if raw.chars().count() == 2 { 2000 + value } else { value };
            i32::try_from(value).ok()
        })
        .filter(|year| *year != 0);

    Some(SearchDate { day, month, year })
}

/// Integer prefix of `raw` (optional sign, then digits); trailing text is ignored.
fn leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let (sign, digits) = match raw.as_bytes().first() {
        Some(b'-') => (-1, &raw[1..]),
        Some(b'+') => (1, &raw[1..]),
        _ => (1, raw),
    };
    let end = digits
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|value| sign * value)
}
