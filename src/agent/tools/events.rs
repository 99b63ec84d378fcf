use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ToolContext, ToolFailure};
use crate::calendar::{EventSelector, NewEvent};
use crate::openai::{Function, Parameters, Property, ToolCall, ToolType};

const DEFAULT_DURATION_MINUTES: u32 = 60;

#[derive(Serialize)]
pub struct SearchEventsProps {
    pub date: Property,
    pub keyword: Property,
}

#[derive(Deserialize)]
pub struct SearchEventsArgs {
    pub date: Option<String>,
    pub keyword: Option<String>,
}

#[derive(Serialize)]
pub struct SearchEventsTool {
    pub r#type: ToolType,
    pub function: Function<SearchEventsProps>,
    #[serde(skip)]
    ctx: ToolContext,
}

#[async_trait]
impl ToolCall for SearchEventsTool {
    async fn call(&self, args: &str) -> Result<Value, Error> {
        let fn_args: SearchEventsArgs = serde_json::from_str(args)?;
        let date = self.ctx.parse_date_or_today(fn_args.date.as_deref());

        let mut events = self
            .ctx
            .services
            .calendar
            .list(&self.ctx.user_id, date, date)
            .await;
        if let Some(keyword) = fn_args.keyword.filter(|k| !k.trim().is_empty()) {
            let keyword = keyword.to_lowercase();
            events.retain(|e| e.title.to_lowercase().contains(&keyword));
        }

        Ok(json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "count": events.len(),
            "events": events,
        }))
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl SearchEventsTool {
    pub fn new(ctx: ToolContext) -> Self {
        let function = Function {
            name: String::from("search_events"),
            description: String::from("カレンダーから予定を検索します"),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: SearchEventsProps {
                    date: Property::new("string", "検索する日付 (YYYY-MM-DD形式)"),
                    keyword: Property::new("string", "検索キーワード（オプション）"),
                },
                required: vec![String::from("date")],
                additional_properties: false,
            },
            strict: false,
        };
        Self {
            r#type: ToolType::Function,
            function,
            ctx,
        }
    }
}

#[derive(Serialize)]
pub struct AddEventProps {
    pub title: Property,
    pub datetime: Property,
    pub duration_minutes: Property,
    pub location: Property,
}

#[derive(Deserialize)]
pub struct AddEventArgs {
    pub title: String,
    pub datetime: String,
    pub duration_minutes: Option<u32>,
    pub location: Option<String>,
}

#[derive(Serialize)]
pub struct AddEventTool {
    pub r#type: ToolType,
    pub function: Function<AddEventProps>,
    #[serde(skip)]
    ctx: ToolContext,
}

#[async_trait]
impl ToolCall for AddEventTool {
    async fn call(&self, args: &str) -> Result<Value, Error> {
        let fn_args: AddEventArgs = serde_json::from_str(args)?;
        let Some(start) = self.ctx.parse_datetime(&fn_args.datetime) else {
            return Ok(ToolFailure::InvalidDatetime {
                value: fn_args.datetime,
            }
            .to_value());
        };
        let duration = fn_args.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        let location = fn_args.location.filter(|l| !l.trim().is_empty());

        let event = NewEvent {
            title: fn_args.title.clone(),
            start,
            duration_minutes: duration,
            location: location.clone(),
        };
        let result = self.ctx.services.calendar.add(&self.ctx.user_id, &event).await;

        let mut out = json!({
            "success": result.success,
            "message": result.message,
        });
        if result.success {
            // Remembered so later turns can refer back to it
            out["event"] = json!({
                "event_id": result.event_id,
                "title": fn_args.title,
                "datetime": start.to_rfc3339(),
                "duration": duration,
                "location": location,
            });
        }
        Ok(out)
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl AddEventTool {
    pub fn new(ctx: ToolContext) -> Self {
        let function = Function {
            name: String::from("add_event"),
            description: String::from("カレンダーに新しい予定を追加します"),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: AddEventProps {
                    title: Property::new("string", "予定のタイトル"),
                    datetime: Property::new("string", "予定の開始日時 (ISO 8601形式)"),
                    duration_minutes: Property::new("integer", "予定の長さ（分）。省略時は60分"),
                    location: Property::new("string", "場所（オプション）"),
                },
                required: vec![String::from("title"), String::from("datetime")],
                additional_properties: false,
            },
            strict: false,
        };
        Self {
            r#type: ToolType::Function,
            function,
            ctx,
        }
    }
}

#[derive(Serialize)]
pub struct DeleteEventProps {
    pub event_id: Property,
    pub title: Property,
    pub date: Property,
}

#[derive(Deserialize)]
pub struct DeleteEventArgs {
    pub event_id: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct DeleteEventTool {
    pub r#type: ToolType,
    pub function: Function<DeleteEventProps>,
    #[serde(skip)]
    ctx: ToolContext,
}

impl DeleteEventTool {
    pub fn new(ctx: ToolContext) -> Self {
        let function = Function {
            name: String::from("delete_event"),
            description: String::from(
                "予定を削除します。IDが分かる場合はevent_id、分からない場合はtitleとdateを指定します",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: DeleteEventProps {
                    event_id: Property::new("string", "削除する予定のID"),
                    title: Property::new("string", "削除する予定のタイトル（IDが不明な場合）"),
                    date: Property::new("string", "予定の日付 YYYY-MM-DD（タイトルで検索する場合）"),
                },
                required: vec![],
                additional_properties: false,
            },
            strict: false,
        };
        Self {
            r#type: ToolType::Function,
            function,
            ctx,
        }
    }

    fn selector(&self, args: DeleteEventArgs) -> Option<EventSelector> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        if let Some(id) = non_empty(args.event_id) {
            return Some(EventSelector::Id(id));
        }
        match (non_empty(args.title), non_empty(args.date)) {
            (Some(title), Some(date)) => Some(EventSelector::TitleOnDate {
                title,
                date: self.ctx.parse_date_or_today(Some(&date)),
            }),
            _ => None,
        }
    }
}

#[async_trait]
impl ToolCall for DeleteEventTool {
    async fn call(&self, args: &str) -> Result<Value, Error> {
        let fn_args: DeleteEventArgs = serde_json::from_str(args)?;
        let Some(selector) = self.selector(fn_args) else {
            return Ok(ToolFailure::TargetNotIdentified.to_value());
        };
        let result = self
            .ctx
            .services
            .calendar
            .delete(&self.ctx.user_id, &selector)
            .await;
        Ok(json!({
            "success": result.success,
            "message": result.message,
        }))
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}
