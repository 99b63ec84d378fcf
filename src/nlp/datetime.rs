//! Japanese date/time expression parsing.
//!
//! Dates and times are resolved independently. Date rules are tried in
//! a fixed order and the first one that resolves wins:
//!
//! 1. day keywords (今日, 明日, 明後日, 昨日 and their kana forms)
//! 2. weekday names (金曜日, 金曜, or a free-standing 金)
//! 3. month/day numerals (12月25日, 12/25)
//! 4. relative periods (来週, 今週, 来月)
//!
//! Times come from explicit numerals first (午後3時, 15時30分, 15:30)
//! and fall back to named periods of the day (朝, 昼, 午後, 夕方, 夜).
use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::{Captures, Regex};
use serde::Serialize;

use super::normalize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParsedDateTime {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    /// Set whenever a date resolved. A date without a time falls back
    /// to `default_time()`, a time without a date leaves this empty.
    pub datetime: Option<NaiveDateTime>,
}

impl ParsedDateTime {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none()
    }
}

pub fn default_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

const DAY_KEYWORDS: &[(&[&str], i64)] = &[
    (&["今日", "本日", "きょう"], 0),
    (&["明日", "あした"], 1),
    (&["明後日", "あさって"], 2),
    (&["昨日", "きのう"], -1),
];

const WEEKDAY_NAMES: &[(char, Weekday)] = &[
    ('月', Weekday::Mon),
    ('火', Weekday::Tue),
    ('水', Weekday::Wed),
    ('木', Weekday::Thu),
    ('金', Weekday::Fri),
    ('土', Weekday::Sat),
    ('日', Weekday::Sun),
];

const NEXT_WEEK: &str = "来週";
const THIS_WEEK: &str = "今週";
const NEXT_MONTH: &str = "来月";

const NAMED_TIMES: &[(&[&str], u32)] = &[
    (&["朝", "午前"], 9),
    (&["昼", "正午"], 12),
    (&["午後"], 15),
    (&["夕方"], 18),
    (&["夜"], 20),
];

static WEEKDAY_SUFFIXED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([月火水木金土日])曜日?").expect("weekday pattern"));

static MONTH_DAY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"(\d{1,2})月(\d{1,2})日", r"(\d{1,2})/(\d{1,2})"]
        .iter()
        .map(|p| Regex::new(p).expect("month/day pattern"))
        .collect()
});

// Groups: 1 marker, 2 hour, 3 minute, 4 half hour, 5 minute after a colon
static MERIDIEM_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(午前|午後)\s*(\d{1,2})(?:時(?:(\d{1,2})分?|(半))?|:(\d{2}))")
        .expect("meridiem time pattern")
});

// Groups: 1 hour, 2 minute, 3 half hour, 4 trailing 間 (a duration, not a time)
static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2})時(?:(\d{1,2})分?|(半))?(間)?").expect("clock time pattern")
});

static COLON_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("colon time pattern"));

/// Parse the date and time expressed in `text` relative to the local
/// wall-clock time `now`.
pub fn parse(text: &str, now: NaiveDateTime) -> ParsedDateTime {
    let text = normalize(text);
    let date = parse_date(&text, now.date());
    let time = parse_time(&text);

    let datetime = match (date, time) {
        (Some(d), Some(t)) => Some(d.and_time(t)),
        (Some(d), None) => Some(d.and_time(default_time())),
        _ => None,
    };

    ParsedDateTime {
        date,
        time,
        datetime,
    }
}

pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    parse_day_keyword(text, today)
        .or_else(|| parse_weekday(text, today))
        .or_else(|| parse_month_day(text, today))
        .or_else(|| parse_relative(text, today))
}

fn parse_day_keyword(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    DAY_KEYWORDS
        .iter()
        .find(|(words, _)| words.iter().any(|w| text.contains(w)))
        .map(|(_, offset)| today + Duration::days(*offset))
}

fn weekday_for(c: char) -> Option<Weekday> {
    WEEKDAY_NAMES
        .iter()
        .find(|(name, _)| *name == c)
        .map(|(_, wd)| *wd)
}

fn is_compound_neighbor(c: char) -> bool {
    c.is_ascii_digit() || c == '々' || ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// Find the weekday named in `text`.
///
/// The suffixed form (金曜, 金曜日) is searched across the whole text
/// before any single-character form is considered. A single character
/// only counts when it stands on its own, i.e. it is not glued to a
/// digit or another kanji, so 3月, 今日 and 日程 are never weekdays.
pub fn find_weekday(text: &str) -> Option<Weekday> {
    if let Some(caps) = WEEKDAY_SUFFIXED.captures(text) {
        return caps[1].chars().next().and_then(weekday_for);
    }

    let chars: Vec<char> = text.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        let Some(weekday) = weekday_for(*c) else {
            continue;
        };
        let prev = i.checked_sub(1).map(|j| chars[j]);
        let next = chars.get(i + 1).copied();
        if prev.is_some_and(is_compound_neighbor) || next.is_some_and(is_compound_neighbor) {
            continue;
        }
        return Some(weekday);
    }
    None
}

fn parse_weekday(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let target = find_weekday(text)?;
    let current = today.weekday().num_days_from_monday() as i64;
    let mut days_ahead = target.num_days_from_monday() as i64 - current;
    if text.contains(NEXT_WEEK) || days_ahead <= 0 {
        days_ahead += 7;
    }
    Some(today + Duration::days(days_ahead))
}

fn resolve_month_day(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if candidate < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(candidate)
    }
}

fn parse_month_day(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    MONTH_DAY_PATTERNS.iter().find_map(|re| {
        re.captures_iter(text).find_map(|caps| {
            let month = caps[1].parse().ok()?;
            let day = caps[2].parse().ok()?;
            resolve_month_day(today, month, day)
        })
    })
}

pub fn first_of_next_month(today: NaiveDate) -> Option<NaiveDate> {
    if today.month() == 12 {
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
    }
}

fn parse_relative(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let from_monday = today.weekday().num_days_from_monday() as i64;
    if text.contains(NEXT_WEEK) {
        Some(today + Duration::days(7 - from_monday))
    } else if text.contains(THIS_WEEK) {
        Some(today - Duration::days(from_monday))
    } else if text.contains(NEXT_MONTH) {
        first_of_next_month(today)
    } else {
        None
    }
}

fn to_time(hour: u32, minute: u32, marker: Option<&str>) -> Option<NaiveTime> {
    let hour = match marker {
        Some("午後") if hour < 12 => hour + 12,
        Some("午前") if hour == 12 => 0,
        _ => hour,
    };
    if hour > 23 || minute > 59 {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn minute_of(caps: &Captures, minute: usize, half: usize) -> Option<u32> {
    if caps.get(half).is_some() {
        return Some(30);
    }
    match caps.get(minute) {
        Some(m) => m.as_str().parse().ok(),
        None => Some(0),
    }
}

pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let meridiem = MERIDIEM_TIME.captures_iter(text).find_map(|caps| {
        let hour = caps[2].parse().ok()?;
        let minute = match caps.get(5) {
            Some(m) => m.as_str().parse().ok()?,
            None => minute_of(&caps, 3, 4)?,
        };
        to_time(hour, minute, caps.get(1).map(|m| m.as_str()))
    });

    let clock = || {
        CLOCK_TIME.captures_iter(text).find_map(|caps| {
            if caps.get(4).is_some() {
                return None;
            }
            let hour = caps[1].parse().ok()?;
            to_time(hour, minute_of(&caps, 2, 3)?, None)
        })
    };

    let colon = || {
        COLON_TIME.captures_iter(text).find_map(|caps| {
            to_time(caps[1].parse().ok()?, caps[2].parse().ok()?, None)
        })
    };

    meridiem.or_else(clock).or_else(colon).or_else(|| {
        NAMED_TIMES
            .iter()
            .find(|(words, _)| words.iter().any(|w| text.contains(w)))
            .and_then(|(_, hour)| NaiveTime::from_hms_opt(*hour, 0, 0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Wednesday
    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 29)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_tomorrow_afternoon() {
        let parsed = parse("明日の午後3時に会議", now());
        assert_eq!(parsed.date, Some(date(2025, 1, 30)));
        assert_eq!(parsed.time, Some(time(15, 0)));
        assert_eq!(parsed.datetime, Some(date(2025, 1, 30).and_time(time(15, 0))));
    }

    #[test]
    fn test_day_keywords() {
        assert_eq!(parse("今日", now()).date, Some(date(2025, 1, 29)));
        assert_eq!(parse("あした", now()).date, Some(date(2025, 1, 30)));
        assert_eq!(parse("明後日の予定", now()).date, Some(date(2025, 1, 31)));
        assert_eq!(parse("昨日", now()).date, Some(date(2025, 1, 28)));
    }

    #[test]
    fn test_date_only_defaults_to_nine() {
        let parsed = parse("明日", now());
        assert_eq!(parsed.time, None);
        assert_eq!(parsed.datetime, Some(date(2025, 1, 30).and_time(time(9, 0))));
    }

    #[test]
    fn test_time_only_has_no_date() {
        let parsed = parse("15:30から", now());
        assert_eq!(parsed.date, None);
        assert_eq!(parsed.time, Some(time(15, 30)));
        assert_eq!(parsed.datetime, None);
    }

    #[test]
    fn test_weekday_always_in_future() {
        let base = now();
        for offset in 0..7 {
            let current = base + Duration::days(offset);
            for (name, weekday) in WEEKDAY_NAMES {
                for text in [format!("{}曜日に", name), format!("{}曜", name)] {
                    let resolved = parse(&text, current).date.unwrap();
                    assert_eq!(resolved.weekday(), *weekday, "{}", text);
                    assert!(resolved > current.date(), "{}", text);
                    assert!(resolved <= current.date() + Duration::days(7));
                }
            }
        }
    }

    #[test]
    fn test_same_weekday_rolls_a_week() {
        // 2025-01-29 is a Wednesday
        assert_eq!(parse("水曜", now()).date, Some(date(2025, 2, 5)));
        assert_eq!(parse("金曜日", now()).date, Some(date(2025, 1, 31)));
    }

    #[test]
    fn test_next_week_monday_is_after_this_weeks_monday() {
        let base = now();
        for offset in 0..14 {
            let current = base + Duration::days(offset);
            let this_monday = current.date()
                - Duration::days(current.weekday().num_days_from_monday() as i64);
            let resolved = parse("来週の月曜", current).date.unwrap();
            assert_eq!(resolved.weekday(), Weekday::Mon);
            assert!(resolved > this_monday);
            assert_eq!(resolved, this_monday + Duration::days(7));
        }
    }

    #[test]
    fn test_next_week_with_later_weekday() {
        assert_eq!(parse("来週の金曜", now()).date, Some(date(2025, 2, 7)));
    }

    #[test]
    fn test_bare_weekday() {
        assert_eq!(find_weekday("金の夜"), Some(Weekday::Fri));
        assert_eq!(find_weekday("3月5日"), None);
        assert_eq!(find_weekday("日程を教えて"), None);
        assert_eq!(find_weekday("誕生日に"), None);
    }

    #[test]
    fn test_suffixed_weekday_takes_priority() {
        // The free-standing 月 appears first but 金曜 is the richer form
        assert_eq!(find_weekday("月 いや金曜"), Some(Weekday::Fri));
    }

    #[test]
    fn test_month_day() {
        assert_eq!(parse("3月5日", now()).date, Some(date(2025, 3, 5)));
        assert_eq!(parse("2/14", now()).date, Some(date(2025, 2, 14)));
        assert_eq!(parse("1月29日", now()).date, Some(date(2025, 1, 29)));
    }

    #[test]
    fn test_month_day_rolls_to_next_year() {
        assert_eq!(parse("1/10", now()).date, Some(date(2026, 1, 10)));
        assert_eq!(parse("1月28日", now()).date, Some(date(2026, 1, 28)));
    }

    #[test]
    fn test_invalid_month_day_is_ignored() {
        assert_eq!(parse("4月31日", now()).date, None);
        assert_eq!(parse("13/40", now()).date, None);
    }

    #[test]
    fn test_relative_periods() {
        assert_eq!(parse("来週", now()).date, Some(date(2025, 2, 3)));
        assert_eq!(parse("今週", now()).date, Some(date(2025, 1, 27)));
        assert_eq!(parse("来月", now()).date, Some(date(2025, 2, 1)));
        let december = date(2025, 12, 15).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(parse("来月", december).date, Some(date(2026, 1, 1)));
    }

    #[test]
    fn test_meridiem_markers() {
        assert_eq!(parse_time("午後3時"), Some(time(15, 0)));
        assert_eq!(parse_time("午後12時"), Some(time(12, 0)));
        assert_eq!(parse_time("午前12時"), Some(time(0, 0)));
        assert_eq!(parse_time("午前10時30分"), Some(time(10, 30)));
        assert_eq!(parse_time("午後2:45"), Some(time(14, 45)));
    }

    #[test]
    fn test_numeric_times() {
        assert_eq!(parse_time("15時"), Some(time(15, 0)));
        assert_eq!(parse_time("15時30分"), Some(time(15, 30)));
        assert_eq!(parse_time("3時半"), Some(time(3, 30)));
        assert_eq!(parse_time("9:05"), Some(time(9, 5)));
        assert_eq!(parse_time("１８：００"), None);
        assert_eq!(parse("１８：００", now()).time, Some(time(18, 0)));
    }

    #[test]
    fn test_out_of_range_times_are_discarded() {
        assert_eq!(parse_time("25時"), None);
        assert_eq!(parse_time("10:75"), None);
        // The invalid match is skipped in favour of a later valid one
        assert_eq!(parse_time("25時じゃなくて18時"), Some(time(18, 0)));
    }

    #[test]
    fn test_duration_is_not_a_time() {
        assert_eq!(parse_time("2時間"), None);
        assert_eq!(parse_time("2時間の会議を15時から"), Some(time(15, 0)));
    }

    #[test]
    fn test_named_periods() {
        assert_eq!(parse_time("朝"), Some(time(9, 0)));
        assert_eq!(parse_time("昼に"), Some(time(12, 0)));
        assert_eq!(parse_time("午後から"), Some(time(15, 0)));
        assert_eq!(parse_time("夕方"), Some(time(18, 0)));
        assert_eq!(parse_time("今夜"), Some(time(20, 0)));
    }

    #[test]
    fn test_nothing_recognized() {
        let parsed = parse("こんにちは", now());
        assert!(parsed.is_empty());
        assert_eq!(parsed.datetime, None);
    }
}
