//! Heuristic argument extraction from instruction text
//!
//! Everything here is deterministic and offline: email addresses, relative
//! and ISO dates, times of day, durations, quoted spans and marker phrases.
//! Relative expressions ("tomorrow", "friday") resolve against the
//! instruction's reference time.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;
use std::sync::LazyLock;

/// Output format for extracted datetimes
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Output format for extracted dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}")
        .expect("valid email regex")
});

static ISO_DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4}-\d{2}-\d{2})[T ](\d{2}:\d{2}(?::\d{2})?)").expect("valid datetime regex")
});

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("valid date regex"));

static TIME_12H_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(a\.?m\.?|p\.?m\.?)(?:\W|$)").expect("valid time regex")
});

static TIME_24H_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)\b").expect("valid time regex"));

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*(minutes?|mins?|hours?|hrs?)\b").expect("valid duration regex")
});

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"|“([^”]+)”"#).expect("valid quote regex"));

/// Words that end a marker phrase capture
const STOP_WORDS: &[&str] = &[
    "from", "to", "for", "on", "at", "with", "and", "between", "since", "as", "in", "by",
    "during", "until", "before", "after", "please", "today", "tomorrow", "yesterday",
];

/// Lower-case tokens; `@ . - _ + :` stay inside tokens so addresses and
/// times survive, but are trimmed from token edges.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || "@.-_+:".contains(c)))
        .map(|t| t.trim_matches(|c: char| ".-:_+".contains(c)))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `phrase` occurs as a contiguous token run in `tokens`
pub fn contains_phrase(tokens: &[String], phrase: &str) -> bool {
    let needle = tokenize(phrase);
    if needle.is_empty() || needle.len() > tokens.len() {
        return false;
    }
    tokens.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// All email addresses, in order of appearance, without duplicates
pub fn emails(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in EMAIL_RE.find_iter(text) {
        let addr = m.as_str().trim_end_matches('.').to_string();
        if !found.iter().any(|f| f.eq_ignore_ascii_case(&addr)) {
            found.push(addr);
        }
    }
    found
}

pub fn is_email(s: &str) -> bool {
    EMAIL_RE
        .find(s.trim())
        .is_some_and(|m| m.start() == 0 && m.end() == s.trim().len())
}

/// Resolve a date and a time of day from natural text.
///
/// A date without a time resolves to 09:00; a time without a date resolves
/// to the reference day. Returns `None` when neither is present.
pub fn datetime(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if let Some(caps) = ISO_DATETIME_RE.captures(text) {
        let date = NaiveDate::parse_from_str(&caps[1], DATE_FORMAT).ok()?;
        let time = parse_clock(&caps[2])?;
        return Some(date.and_time(time));
    }

    let date = relative_date(text, now.date()).or_else(|| {
        ISO_DATE_RE
            .find(text)
            .and_then(|m| NaiveDate::parse_from_str(m.as_str(), DATE_FORMAT).ok())
    });
    let time = time_of_day(text);

    match (date, time) {
        (Some(d), Some(t)) => Some(d.and_time(t)),
        (Some(d), None) => Some(d.and_time(NaiveTime::from_hms_opt(9, 0, 0)?)),
        (None, Some(t)) => Some(now.date().and_time(t)),
        (None, None) => None,
    }
}

/// Dates mentioned in the text, in order of appearance
pub fn dates(text: &str, today: NaiveDate) -> Vec<NaiveDate> {
    let lower = text.to_ascii_lowercase();
    let mut found: Vec<(usize, NaiveDate)> = ISO_DATE_RE
        .find_iter(text)
        .filter_map(|m| {
            NaiveDate::parse_from_str(m.as_str(), DATE_FORMAT)
                .ok()
                .map(|d| (m.start(), d))
        })
        .collect();

    for (word, offset) in [("yesterday", -1), ("today", 0), ("tomorrow", 1)] {
        if let Some(pos) = find_word(&lower, word) {
            found.push((pos, today + Duration::days(offset)));
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, d)| d).collect()
}

/// Relative day words: today, tomorrow, day after tomorrow, weekday names,
/// "in N days"
fn relative_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = text.to_ascii_lowercase();

    if lower.contains("day after tomorrow") {
        return Some(today + Duration::days(2));
    }
    if find_word(&lower, "tomorrow").is_some() {
        return Some(today + Duration::days(1));
    }
    if find_word(&lower, "today").is_some() || find_word(&lower, "tonight").is_some() {
        return Some(today);
    }

    static IN_DAYS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\bin (\d{1,3}) days?\b").expect("valid regex"));
    if let Some(caps) = IN_DAYS_RE.captures(&lower) {
        let days: i64 = caps[1].parse().ok()?;
        return Some(today + Duration::days(days));
    }

    const WEEKDAYS: [(&str, Weekday); 7] = [
        ("monday", Weekday::Mon),
        ("tuesday", Weekday::Tue),
        ("wednesday", Weekday::Wed),
        ("thursday", Weekday::Thu),
        ("friday", Weekday::Fri),
        ("saturday", Weekday::Sat),
        ("sunday", Weekday::Sun),
    ];
    WEEKDAYS
        .iter()
        .filter_map(|(name, wd)| find_word(&lower, name).map(|pos| (pos, *wd)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, wd)| next_weekday(today, wd))
}

/// Next occurrence of `weekday` strictly after `today`
fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut delta = (target - current).rem_euclid(7);
    if delta == 0 {
        delta = 7;
    }
    today + Duration::days(delta)
}

/// Time of day: "2 PM", "2:30pm", "14:30", "noon"
pub fn time_of_day(text: &str) -> Option<NaiveTime> {
    if let Some(caps) = TIME_12H_RE.captures(text) {
        let mut hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
        let pm = caps[3].to_ascii_lowercase().starts_with('p');
        if hour == 0 || hour > 12 {
            return None;
        }
        if hour == 12 {
            hour = 0;
        }
        if pm {
            hour += 12;
        }
        return NaiveTime::from_hms_opt(hour, minute, 0);
    }
    if let Some(caps) = TIME_24H_RE.captures(text) {
        return NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0);
    }
    let lower = text.to_ascii_lowercase();
    if find_word(&lower, "noon").is_some() || find_word(&lower, "midday").is_some() {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }
    None
}

fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Duration in minutes: "45 minutes", "1 hour", "2 hrs", "half an hour"
pub fn duration_minutes(text: &str) -> Option<i64> {
    if let Some(caps) = DURATION_RE.captures(text) {
        let amount: i64 = caps[1].parse().ok()?;
        let unit = caps[2].to_ascii_lowercase();
        return if unit.starts_with('h') {
            amount.checked_mul(60)
        } else {
            Some(amount)
        };
    }
    let lower = text.to_ascii_lowercase();
    if lower.contains("half an hour") {
        return Some(30);
    }
    if lower.contains("an hour") {
        return Some(60);
    }
    None
}

/// First double-quoted span
pub fn quoted(text: &str) -> Option<String> {
    QUOTED_RE.captures(text).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Words after the first marker found, until a stop word or punctuation.
/// Case of the original text is preserved.
pub fn after_marker(text: &str, markers: &[String]) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let (_, end) = markers
        .iter()
        .filter_map(|m| find_word(&lower, m).map(|pos| (pos, pos + m.len())))
        .min_by_key(|(pos, _)| *pos)?;

    let mut words = Vec::new();
    for raw in text[end..].split_whitespace() {
        let word = raw.trim_matches(|c: char| c == '"' || c == '\'' || c == '(' || c == ')');
        if STOP_WORDS.contains(&word.to_ascii_lowercase().as_str()) {
            break;
        }
        let stripped = word.trim_end_matches(|c: char| ",.;?!:".contains(c));
        if stripped.is_empty() {
            // punctuation right after the marker ("location: ...")
            if words.is_empty() {
                continue;
            }
            break;
        }
        words.push(stripped);
        if stripped.len() != word.len() {
            break;
        }
    }
    let phrase = words.join(" ");
    if phrase.is_empty() { None } else { Some(phrase) }
}

/// Text after the first marker found, up to the end; surrounding quotes and
/// a leading colon are dropped
pub fn rest_after(text: &str, markers: &[String]) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let (_, end) = markers
        .iter()
        .filter_map(|m| find_word(&lower, m).map(|pos| (pos, pos + m.len())))
        .min_by_key(|(pos, _)| *pos)?;
    let rest = text[end..]
        .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
        .trim()
        .trim_matches(|c: char| c == '"' || c == '“' || c == '”')
        .trim();
    if rest.is_empty() { None } else { Some(rest.to_string()) }
}

/// Integer right after one of the markers ("top 5", "last 3")
pub fn integer_after(text: &str, markers: &[String]) -> Option<i64> {
    let lower = text.to_ascii_lowercase();
    markers
        .iter()
        .filter_map(|m| {
            let pos = find_word(&lower, m)?;
            let rest = lower[pos + m.len()..].trim_start();
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<i64>().ok().map(|n| (pos, n))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, n)| n)
}

/// Byte position of `word` in `haystack` at word boundaries.
/// Both sides must already be ASCII-lowercased.
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let mut start = 0;
    while let Some(rel) = haystack[start..].find(word) {
        let pos = start + rel;
        let end = pos + word.len();
        let before_ok = pos == 0 || !bytes[pos - 1].is_ascii_alphanumeric();
        let after_ok = end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(pos);
        }
        start = pos + word.len().max(1);
        if start >= haystack.len() {
            break;
        }
    }
    None
}
