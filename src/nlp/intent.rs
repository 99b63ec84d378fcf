//! Intent classification by weighted pattern scoring.
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AddEvent,
    ListEvents,
    DeleteEvent,
    UpdateEvent,
    CheckSubscription,
    UpgradePlan,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::AddEvent => "add_event",
            Intent::ListEvents => "list_events",
            Intent::DeleteEvent => "delete_event",
            Intent::UpdateEvent => "update_event",
            Intent::CheckSubscription => "check_subscription",
            Intent::UpgradePlan => "upgrade_plan",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Declaration order doubles as the tie-break order. Patterns are
// matched against lower-cased text.
const INTENT_PATTERNS: &[(Intent, &[&str])] = &[
    (
        Intent::AddEvent,
        &[
            r"(追加|作成|登録|予約)",
            r"(入れて|入れといて|押さえて)",
            r"\d+(時|:\d+).*(ミーティング|会議|アポ|打ち合わせ)",
            r"(明日|今日|明後日).*(ミーティング|会議|アポ|打ち合わせ)",
        ],
    ),
    (
        Intent::ListEvents,
        &[
            r"(予定|スケジュール).*?(教えて|見せて|確認|一覧)",
            r"(今日|明日|明後日|今週|来週).*?(予定|スケジュール).*?(は|\?)",
            r"(何|なに).*?(予定|スケジュール)",
            r"(予定|スケジュール).*?(ある|あります)",
        ],
    ),
    (
        Intent::DeleteEvent,
        &[
            r"(削除|キャンセル|取り消し)",
            r"(予定|スケジュール).*?(削除|キャンセル|取り消し)",
            r"(ミーティング|会議|アポ|打ち合わせ).*?(削除|キャンセル|取り消し)",
        ],
    ),
    (
        Intent::UpdateEvent,
        &[
            r"(変更|修正|更新)",
            r"(予定|スケジュール).*?(変更|修正|更新)",
            r"(時間|日時).*?(変更|修正)",
        ],
    ),
    (
        Intent::CheckSubscription,
        &[
            r"(プラン|課金|契約)",
            r"(aiモード|aiエージェント).*?(使える|使えない|利用)",
            r"(残り|利用).*?(回数|使用)",
        ],
    ),
    (
        Intent::UpgradePlan,
        &[
            r"(プラン|課金).*?(アップグレード|変更|申し込み)",
            r"(ベーシック|プレミアム).*?(プラン|契約)",
            r"aiモード.*?(使いたい|利用したい)",
            r"アップグレード",
        ],
    ),
];

static COMPILED_PATTERNS: LazyLock<Vec<(Intent, Vec<Regex>)>> = LazyLock::new(|| {
    INTENT_PATTERNS
        .iter()
        .map(|(intent, patterns)| {
            let compiled = patterns
                .iter()
                .map(|p| Regex::new(p).expect("Invalid intent pattern"))
                .collect();
            (*intent, compiled)
        })
        .collect()
});

const ACTIVITY_WORDS: &[&str] = &["ミーティング", "会議", "アポ", "打ち合わせ", "予定"];
const SCHEDULE_NOUNS: &[&str] = &["予定", "スケジュール"];
const QUESTION_WORDS: &[&str] = &["何", "なに", "いつ", "どこ"];

static TIME_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(時|:\d+)").expect("Invalid time pattern"));

/// Score every intent by how many of its patterns match and return the
/// strict maximum, falling back to keyword heuristics when nothing
/// matches at all.
pub fn classify(text: &str) -> Intent {
    let text = normalize(text).trim().to_lowercase();

    let mut best: Option<(Intent, usize)> = None;
    for (intent, patterns) in COMPILED_PATTERNS.iter() {
        let score = patterns.iter().filter(|re| re.is_match(&text)).count();
        if score > 0 && best.is_none_or(|(_, top)| score > top) {
            best = Some((*intent, score));
        }
    }

    match best {
        Some((intent, _)) => intent,
        None => fallback(&text),
    }
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

fn fallback(text: &str) -> Intent {
    if TIME_EXPRESSION.is_match(text) && contains_any(text, ACTIVITY_WORDS) {
        return Intent::AddEvent;
    }
    if contains_any(text, SCHEDULE_NOUNS) && text.ends_with('?') {
        return Intent::ListEvents;
    }
    if contains_any(text, QUESTION_WORDS) {
        return Intent::ListEvents;
    }
    Intent::Unknown
}
