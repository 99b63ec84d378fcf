//! Entity extraction for the pattern-matching path.
use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::datetime::{self, find_weekday, first_of_next_month};
use super::{Intent, normalize};

/// Named slots extracted from a message. Nothing is mandatory here;
/// consumers check for what they need with `require_*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityBag {
    pub title: Option<String>,
    pub datetime: Option<NaiveDateTime>,
    pub time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub location: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub keyword: Option<String>,
    pub event_id: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntityError {
    #[error("missing required entity: {0}")]
    Missing(&'static str),
}

impl EntityBag {
    /// The start instant of an event. A bare time is pinned to `today`.
    pub fn require_start(&self, today: NaiveDate) -> Result<NaiveDateTime, EntityError> {
        match (self.datetime, self.time) {
            (Some(dt), _) => Ok(dt),
            (None, Some(t)) => Ok(today.and_time(t)),
            (None, None) => Err(EntityError::Missing("datetime")),
        }
    }

    pub fn require_range(&self) -> Result<(NaiveDate, NaiveDate), EntityError> {
        let start = self.start_date.ok_or(EntityError::Missing("start_date"))?;
        let end = self.end_date.unwrap_or(start);
        Ok((start, end))
    }
}

const MIN_TITLE_CHARS: usize = 3;
const MIN_LOCATION_CHARS: usize = 2;

// Location markers in priority order. Only group 1 is the location;
// `consume_match` says whether the whole match or only the location
// and its trailing particle is cut from the title.
struct LocationPattern {
    re: Regex,
    consume_match: bool,
}

static LOCATION_PATTERNS: LazyLock<Vec<LocationPattern>> = LazyLock::new(|| {
    [
        (r"@\s*([^\s、。]+)", true),
        (r"場所(?:は|:)\s*([^\s、。]+)", true),
        (r"([^\s、。のにをでは]+)にて", true),
        (
            r"([^\s、。のにをでは]+)で(?:会議|ミーティング|打ち合わせ|アポ|面談|ランチ|食事|飲み会)",
            false,
        ),
    ]
    .iter()
    .map(|(p, consume_match)| LocationPattern {
        re: Regex::new(p).expect("Invalid location pattern"),
        consume_match: *consume_match,
    })
    .collect()
});

static TITLE_NOISE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\d{1,2}月\d{1,2}日",
        r"\d{1,2}/\d{1,2}",
        r"(明後日|明日|今日|昨日|本日|あさって|あした|きょう|きのう|来週|今週|来月|今月)",
        r"[月火水木金土日]曜日?",
        r"(午前|午後)",
        r"\d+(分間|時間|分)",
        r"\d{1,2}時(\d{1,2}分|半)?",
        r"\d{1,2}:\d{2}",
        r"(正午|夕方|朝|昼|夜)",
        r"(追加|作成|登録|予約|予定|スケジュール|入れて|削除|キャンセル|取り消し|変更|修正|更新)",
        r"(教えて|見せて|して|しといて|ください|下さい|お願い|したい)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid title pattern"))
    .collect()
});

const EDGE_PARTICLES: &[&str] = &["から", "まで", "の", "に", "を", "で", "は", "と", "、", "。", "!", "！", "?"];

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*(分間|時間)").expect("Invalid duration pattern"));

const ACTIVITY_TITLES: &[&str] = &["ミーティング", "打ち合わせ", "会議", "アポ", "面談"];

/// Pull the entities relevant to `intent` out of `text`.
pub fn extract(intent: Intent, text: &str, now: NaiveDateTime) -> EntityBag {
    let text = normalize(text);
    match intent {
        Intent::AddEvent | Intent::UpdateEvent => event_entities(&text, now),
        Intent::ListEvents => query_entities(&text, now, false),
        Intent::DeleteEvent => query_entities(&text, now, true),
        _ => EntityBag::default(),
    }
}

fn event_entities(text: &str, now: NaiveDateTime) -> EntityBag {
    let parsed = datetime::parse(text, now);
    let location = extract_location(text);

    let mut title_source = text.to_string();
    if let Some((_, span)) = &location {
        title_source.replace_range(span.clone(), " ");
    }

    EntityBag {
        title: extract_title(&title_source),
        datetime: parsed.datetime,
        time: parsed.time,
        date: parsed.date,
        duration_minutes: extract_duration(text),
        location: location.map(|(loc, _)| loc),
        ..Default::default()
    }
}

fn query_entities(text: &str, now: NaiveDateTime, with_keyword: bool) -> EntityBag {
    let parsed = datetime::parse(text, now);
    let start = parsed.date.unwrap_or(now.date());
    let end = if parsed.date.is_some() {
        period_end(text, start)
    } else {
        start
    };

    EntityBag {
        date: parsed.date,
        time: parsed.time,
        datetime: parsed.datetime,
        start_date: Some(start),
        end_date: Some(end),
        keyword: if with_keyword {
            strip_noise(text).filter(|k| k.chars().count() >= 2)
        } else {
            None
        },
        ..Default::default()
    }
}

/// A bare "next week"/"this week"/"next month" spans the whole period
/// instead of only its first day.
fn period_end(text: &str, start: NaiveDate) -> NaiveDate {
    if find_weekday(text).is_some() {
        return start;
    }
    if text.contains("来週") || text.contains("今週") {
        return start + Duration::days(6);
    }
    if text.contains("来月") {
        if let Some(next) = first_of_next_month(start) {
            return next - Duration::days(1);
        }
    }
    start
}

fn strip_noise(text: &str) -> Option<String> {
    let mut cleaned = text.to_string();
    for re in TITLE_NOISE.iter() {
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }

    // Collapse the gaps left behind and peel particles off both ends
    let mut cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join("");
    loop {
        let before = cleaned.len();
        for p in EDGE_PARTICLES {
            if let Some(rest) = cleaned.strip_prefix(p) {
                cleaned = rest.to_string();
            }
            if let Some(rest) = cleaned.strip_suffix(p) {
                cleaned = rest.to_string();
            }
        }
        if cleaned.len() == before {
            break;
        }
    }

    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

pub fn extract_title(text: &str) -> Option<String> {
    strip_noise(text).filter(|t| t.chars().count() >= MIN_TITLE_CHARS)
}

/// The location and the byte span that should be cut from the title.
pub fn extract_location(text: &str) -> Option<(String, Range<usize>)> {
    for pattern in LOCATION_PATTERNS.iter() {
        for caps in pattern.re.captures_iter(text) {
            let (Some(whole), Some(loc)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let location = loc.as_str().trim();
            if location.chars().count() < MIN_LOCATION_CHARS {
                continue;
            }
            let span = if pattern.consume_match {
                whole.range()
            } else {
                // Keep the activity word, it is usually the title
                loc.start()..loc.end() + "で".len()
            };
            return Some((location.to_string(), span));
        }
    }
    None
}

fn extract_duration(text: &str) -> Option<u32> {
    let caps = DURATION.captures(text)?;
    let amount: u32 = caps[1].parse().ok()?;
    match &caps[2] {
        "時間" => amount.checked_mul(60),
        _ => Some(amount),
    }
}

/// Fallback title for an event whose text was too short to yield one.
pub fn default_title(text: &str) -> String {
    ACTIVITY_TITLES
        .iter()
        .find(|w| text.contains(*w))
        .map(|w| w.to_string())
        .unwrap_or_else(|| String::from("予定"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 29)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_add_event_entities() {
        let bag = extract(Intent::AddEvent, "明日の15時にプロジェクト定例を追加", now());
        assert_eq!(bag.title.as_deref(), Some("プロジェクト定例"));
        assert_eq!(bag.datetime.unwrap().to_string(), "2025-01-30 15:00:00");
        assert_eq!(bag.location, None);
    }

    #[test]
    fn test_short_title_is_absent() {
        let bag = extract(Intent::AddEvent, "明日の午後3時に会議", now());
        assert_eq!(bag.title, None);
        assert_eq!(default_title("明日の午後3時に会議"), "会議");
        assert_eq!(default_title("明日の15時"), "予定");
    }

    #[test]
    fn test_location_before_activity() {
        let bag = extract(Intent::AddEvent, "明日15時に渋谷オフィスで打ち合わせ", now());
        assert_eq!(bag.location.as_deref(), Some("渋谷オフィス"));
        assert_eq!(bag.title.as_deref(), Some("打ち合わせ"));
    }

    #[test]
    fn test_location_at_marker() {
        let bag = extract(Intent::AddEvent, "金曜18時 歓迎会 @新宿", now());
        assert_eq!(bag.location.as_deref(), Some("新宿"));
        assert_eq!(bag.title.as_deref(), Some("歓迎会"));
    }

    #[test]
    fn test_single_char_location_rejected() {
        assert_eq!(extract_location("@x"), None);
    }

    #[test]
    fn test_duration() {
        let bag = extract(Intent::AddEvent, "明日10時から2時間の社内研修を登録", now());
        assert_eq!(bag.duration_minutes, Some(120));
        assert_eq!(bag.time, NaiveTime::from_hms_opt(10, 0, 0));
        assert_eq!(bag.title.as_deref(), Some("社内研修"));
    }

    #[test]
    fn test_oversized_duration_is_dropped() {
        let bag = extract(Intent::AddEvent, "明日10時から99999999時間の会議を追加", now());
        assert_eq!(bag.duration_minutes, None);
        assert_eq!(bag.time, NaiveTime::from_hms_opt(10, 0, 0));

        let bag = extract(Intent::AddEvent, "明日10時から99999999999分間の会議を追加", now());
        assert_eq!(bag.duration_minutes, None);
    }

    #[test]
    fn test_list_defaults_to_today() {
        let bag = extract(Intent::ListEvents, "予定を教えて", now());
        assert_eq!(bag.date, None);
        assert_eq!(bag.start_date, Some(date(2025, 1, 29)));
        assert_eq!(bag.end_date, Some(date(2025, 1, 29)));
        assert_eq!(bag.keyword, None);
    }

    #[test]
    fn test_list_resolved_date() {
        let bag = extract(Intent::ListEvents, "明日の予定は？", now());
        assert_eq!(bag.start_date, Some(date(2025, 1, 30)));
        assert_eq!(bag.end_date, Some(date(2025, 1, 30)));
    }

    #[test]
    fn test_list_next_week_spans_the_week() {
        let bag = extract(Intent::ListEvents, "来週の予定は？", now());
        assert_eq!(bag.start_date, Some(date(2025, 2, 3)));
        assert_eq!(bag.end_date, Some(date(2025, 2, 9)));
    }

    #[test]
    fn test_delete_keyword() {
        let bag = extract(Intent::DeleteEvent, "明日の歯医者をキャンセル", now());
        assert_eq!(bag.start_date, Some(date(2025, 1, 30)));
        assert_eq!(bag.keyword.as_deref(), Some("歯医者"));
    }

    #[test]
    fn test_require_start() {
        let mut bag = EntityBag::default();
        assert_eq!(
            bag.require_start(date(2025, 1, 29)),
            Err(EntityError::Missing("datetime"))
        );
        bag.time = NaiveTime::from_hms_opt(15, 0, 0);
        assert_eq!(
            bag.require_start(date(2025, 1, 29)).unwrap().to_string(),
            "2025-01-29 15:00:00"
        );
    }

    #[test]
    fn test_other_intents_have_no_entities() {
        assert_eq!(
            extract(Intent::CheckSubscription, "プランは？", now()),
            EntityBag::default()
        );
    }
}
