//! Journal name and publication date from a manifest citation string
//!
//! Citations look like `PLoS One. 2010 Jan 5; 5(1):e8589`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static JOURNAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z\s().,-]+?)[.;]").expect("valid journal regex"));

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})\b(?:\s+([A-Za-z]{3,9}))?(?:\s+(\d{1,2})\b)?").expect("valid date regex")
});

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Leading journal name, up to the first `.` or `;`.
pub fn journal(citation: &str) -> Option<String> {
    JOURNAL_RE
        .captures(citation)
        .map(|c| c[1].trim().to_string())
        .filter(|j| !j.is_empty())
}

/// Publication date as `YYYY-MM-DD`.
///
/// Missing month or day default to 1; an impossible date gives `None`.
pub fn date(citation: &str) -> Option<String> {
    let (_, rest) = citation.split_once(". ")?;
    let caps = DATE_RE.captures(rest)?;
    let year: i32 = caps[1].parse().ok()?;
    let month = caps.get(2).map_or(1, |m| month_number(m.as_str()));
    let day = match caps.get(3) {
        Some(d) => d.as_str().parse().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Month or season word to month number; anything else is January.
fn month_number(word: &str) -> u32 {
    let lower = word.to_ascii_lowercase();
    match lower.as_str() {
        "spring" => return 3,
        "summer" => return 6,
        "fall" | "autumn" => return 9,
        "winter" => return 12,
        _ => {}
    }
    lower
        .get(..3)
        .and_then(|prefix| MONTHS.iter().position(|m| *m == prefix))
        .map_or(1, |i| i as u32 + 1)
}
