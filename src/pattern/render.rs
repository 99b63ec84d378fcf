//! Reply text for the pattern path.
use crate::calendar::{CalendarEvent, UNTITLED};
use crate::subscription::{PLAN_CATALOG, PlanConfig, SubscriptionInfo};

pub const HELP_MESSAGE: &str = "申し訳ございません。理解できませんでした。\n以下のような形式でお試しください：\n・「明日の15時に会議」\n・「今日の予定は？」\n・「明日の予定を教えて」";

pub const NO_EVENTS: &str = "予定はありません。";

const PLAN_BADGES: [&str; 3] = ["🥉", "🥈", "🥇"];

/// One header line, then one line per event in the given order.
pub fn format_events_list(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return NO_EVENTS.to_string();
    }
    let mut lines = vec![String::from("📅 予定一覧：\n")];
    lines.extend(events.iter().map(event_line));
    lines.join("\n")
}

pub fn event_line(event: &CalendarEvent) -> String {
    let title = if event.title.is_empty() {
        UNTITLED
    } else {
        event.title.as_str()
    };
    match (event.start_time.as_deref(), event.end_time.as_deref()) {
        (Some(start), Some(end)) if start != end => format!("• {} - {}: {}", start, end, title),
        (Some(start), _) => format!("• {}: {}", start, title),
        (None, _) => format!("• {}", title),
    }
}

/// Yen with thousands separators, e.g. 1,500
pub fn format_yen(amount: u32) -> String {
    let digits = amount.to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn limit_label(limit: Option<u32>) -> String {
    limit.map_or_else(|| String::from("無制限"), |l| l.to_string())
}

fn check(enabled: bool) -> &'static str {
    if enabled { "✅" } else { "❌" }
}

pub fn render_subscription_info(info: &SubscriptionInfo) -> String {
    format!(
        "📊 **現在のプラン情報**\n\nプラン: {}\n料金: {}円/月\nAI利用回数: {}/{}\n残り回数: {}\n\n{} AIエージェントモード\n✅ パターン認識モード",
        info.plan_name,
        format_yen(info.price),
        info.ai_calls_used,
        limit_label(info.ai_calls_limit),
        limit_label(info.ai_calls_remaining),
        check(info.ai_agent_feature),
    )
}

fn plan_entry(badge: &str, config: &PlanConfig) -> String {
    let mode = if config.use_ai_agent {
        "AIエージェントモード"
    } else {
        "パターン認識モード"
    };
    let usage = match config.ai_calls_limit {
        Some(limit) => format!("月{}回まで", limit),
        None => String::from("無制限"),
    };
    format!(
        "{} **{}** ({}円/月)\n- {}\n- AI利用: {}",
        badge,
        config.name,
        format_yen(config.price),
        mode,
        usage
    )
}

pub fn render_plan_catalog() -> String {
    let entries: Vec<String> = PLAN_CATALOG
        .iter()
        .zip(PLAN_BADGES)
        .map(|(config, badge)| plan_entry(badge, config))
        .collect();
    format!(
        "アップグレード可能なプラン：\n\n{}\n\n「ベーシックプランに変更」または「プレミアムプランに変更」と入力してください。",
        entries.join("\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::Plan;

    fn event(start: Option<&str>, end: Option<&str>, title: &str) -> CalendarEvent {
        CalendarEvent {
            id: None,
            title: title.to_string(),
            date: None,
            start_time: start.map(String::from),
            end_time: end.map(String::from),
            location: None,
        }
    }

    #[test]
    fn test_format_events_list_keeps_order() {
        let events = vec![
            event(Some("15:00"), Some("16:00"), "会議"),
            event(Some("09:00"), Some("09:30"), "朝会"),
        ];
        let text = format_events_list(&events);
        let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "📅 予定一覧：");
        assert!(lines[1].contains("15:00") && lines[1].contains("会議"));
        assert!(lines[2].contains("09:00") && lines[2].contains("朝会"));
    }

    #[test]
    fn test_event_line_variants() {
        assert_eq!(event_line(&event(Some("終日"), Some("終日"), "休暇")), "• 終日: 休暇");
        assert_eq!(event_line(&event(None, None, "")), "• (タイトルなし)");
        assert_eq!(event_line(&event(Some("10:00"), None, "歯医者")), "• 10:00: 歯医者");
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(format_events_list(&[]), NO_EVENTS);
    }

    #[test]
    fn test_format_yen() {
        assert_eq!(format_yen(0), "0");
        assert_eq!(format_yen(500), "500");
        assert_eq!(format_yen(1500), "1,500");
        assert_eq!(format_yen(1234567), "1,234,567");
    }

    #[test]
    fn test_render_subscription_info_unlimited() {
        let config = Plan::Premium.config();
        let info = SubscriptionInfo {
            plan: Plan::Premium,
            plan_name: config.name,
            price: config.price,
            is_active: true,
            expires_at: None,
            ai_calls_used: 42,
            ai_calls_limit: None,
            ai_calls_remaining: None,
            ai_agent_feature: true,
        };
        let text = render_subscription_info(&info);
        assert!(text.contains("料金: 1,500円/月"));
        assert!(text.contains("AI利用回数: 42/無制限"));
        assert!(text.contains("✅ AIエージェントモード"));
    }

    #[test]
    fn test_plan_catalog_lists_every_plan() {
        let text = render_plan_catalog();
        for config in PLAN_CATALOG.iter() {
            assert!(text.contains(config.name));
        }
        assert!(text.contains("🥇 **プレミアムプラン** (1,500円/月)"));
    }
}
