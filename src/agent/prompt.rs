//! System prompt for the calendar agent. Rendered with Handlebars so
//! only the values registered here can reach the prompt.
use std::sync::LazyLock;

use anyhow::{Error, Result};
use chrono::{Datelike, NaiveDateTime};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;

const SYSTEM_PROMPT_NAME: &str = "CalendarSystem";

const SYSTEM_PROMPT: &str = r"あなたは優秀なカレンダー管理アシスタントです。
ユーザーの自然な日本語を理解し、適切にカレンダーを操作します。

現在の日時: {{now}}（{{weekday}}曜日）
タイムゾーン: UTC{{offset}}

重要なルール：
1. 日時はすべて上記のタイムゾーンで解釈し、ISO 8601形式(YYYY-MM-DDTHH:MM:SS)で関数に渡す
2. 「明日」「来週」などの相対的な表現は現在の日時を基準に正確に解釈する
3. 不明な点は確認を求める
4. 操作結果を分かりやすく説明する
5. 「さっきの」「その」などの指示代名詞は文脈から理解する
6. 関数は1回の発言につき1つだけ呼び出す

会話の例：
- 「明日の午後3時に会議」→ 明日の15:00に会議を追加
- 「来週の予定は？」→ 来週の予定を検索
- 「さっきの会議キャンセル」→ 直前に話題になった会議を削除
{{#if last_event}}

直前に話題になった予定: {{last_event}}
{{/if}}";

const WEEKDAYS_JA: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

static TEMPLATES: LazyLock<Handlebars<'static>> = LazyLock::new(templates);

fn templates() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text, never HTML
    registry.register_escape_fn(handlebars::no_escape);
    if let Err(e) = registry.register_template_string(SYSTEM_PROMPT_NAME, SYSTEM_PROMPT) {
        tracing::error!("Failed to register system prompt template: {}", e);
    }
    registry
}

#[derive(Serialize)]
struct SystemPromptContext {
    now: String,
    weekday: &'static str,
    offset: String,
    last_event: Option<String>,
}

pub fn system_prompt(
    now: NaiveDateTime,
    offset_hours: i32,
    last_event: Option<&Value>,
) -> Result<String, Error> {
    let context = SystemPromptContext {
        now: now.format("%Y-%m-%d %H:%M").to_string(),
        weekday: WEEKDAYS_JA[now.weekday().num_days_from_monday() as usize],
        offset: format!("{:+03}:00", offset_hours),
        last_event: last_event.map(Value::to_string),
    };
    let prompt = TEMPLATES.render(SYSTEM_PROMPT_NAME, &context)?;
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 29)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_system_prompt_includes_current_date() {
        let prompt = system_prompt(now(), 9, None).unwrap();
        assert!(prompt.contains("現在の日時: 2025-01-29 12:00（水曜日）"));
        assert!(prompt.contains("UTC+09:00"));
        assert!(!prompt.contains("直前に話題になった予定:"));
    }

    #[test]
    fn test_system_prompt_last_event_is_not_escaped() {
        let event = json!({"title": "会議", "datetime": "2025-01-30T15:00:00"});
        let prompt = system_prompt(now(), 9, Some(&event)).unwrap();
        assert!(prompt.contains("直前に話題になった予定: {"));
        assert!(prompt.contains(r#""title":"会議""#));
        assert!(!prompt.contains("&quot;"));
    }
}
