use std::env;

use chrono::{FixedOffset, Offset, Utc};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub base_url: String,
    pub line_api_hostname: String,
    pub line_channel_access_token: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_oauth_hostname: String,
    pub google_calendar_hostname: String,
    pub openai_model: String,
    pub openai_api_hostname: String,
    // `None` means the AI path is not configured at all
    pub openai_api_key: Option<String>,
    pub use_ai_agent: bool,
    pub timezone_offset_hours: i32,
    pub conversation_retention_days: i64,
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let host = "127.0.0.1";
        let port = "2222";
        let storage_path = env::var("CHATCAL_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/db", storage_path);
        let base_url =
            env::var("CHATCAL_BASE_URL").unwrap_or(format!("http://{}:{}", host, port));
        let line_api_hostname = env::var("CHATCAL_LINE_API_HOST")
            .unwrap_or_else(|_| "https://api.line.me".to_string());
        let line_channel_access_token =
            env::var("LINE_CHANNEL_ACCESS_TOKEN").unwrap_or_default();
        let google_client_id = env::var("CHATCAL_GOOGLE_CLIENT_ID").unwrap_or_default();
        let google_client_secret = env::var("CHATCAL_GOOGLE_CLIENT_SECRET").unwrap_or_default();
        let google_oauth_hostname = env::var("CHATCAL_GOOGLE_OAUTH_HOST")
            .unwrap_or_else(|_| "https://oauth2.googleapis.com".to_string());
        let google_calendar_hostname = env::var("CHATCAL_GOOGLE_CALENDAR_HOST")
            .unwrap_or_else(|_| "https://www.googleapis.com".to_string());
        let openai_api_hostname = env::var("CHATCAL_LLM_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        let openai_model =
            env::var("CHATCAL_LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let use_ai_agent = env_flag("CHATCAL_USE_AI_AGENT", true);
        let timezone_offset_hours = env::var("CHATCAL_TZ_OFFSET_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9);
        let conversation_retention_days = env::var("CHATCAL_CONVERSATION_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7);

        Self {
            storage_path,
            db_path,
            base_url,
            line_api_hostname,
            line_channel_access_token,
            google_client_id,
            google_client_secret,
            google_oauth_hostname,
            google_calendar_hostname,
            openai_model,
            openai_api_hostname,
            openai_api_key,
            use_ai_agent,
            timezone_offset_hours,
            conversation_retention_days,
        }
    }
}

impl AppConfig {
    /// The AI path is only reachable when the global toggle is on and
    /// model credentials are present.
    pub fn ai_available(&self) -> bool {
        self.use_ai_agent && self.openai_api_key.is_some()
    }

    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone_offset_hours * 3600).unwrap_or(Utc.fix())
    }

    pub fn linking_url(&self) -> String {
        format!(
            "{}/liff?openExternalBrowser=1",
            self.base_url.trim_end_matches('/')
        )
    }
}
