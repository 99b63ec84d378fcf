use std::sync::Arc;

use tokio_rusqlite::Connection;

use crate::core::{AppConfig, Services};
use crate::dispatch::Dispatcher;
use crate::jobs::JobContext;
use crate::messaging::{LineMessaging, Transport};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub db: Connection,
    pub config: AppConfig,
    pub services: Services,
    pub transport: Arc<dyn Transport>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(
        db: Connection,
        config: AppConfig,
        services: Services,
        transport: Arc<dyn Transport>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            db,
            config,
            services,
            transport,
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Production wiring: Google Calendar, LINE messaging and, when
    /// configured, the OpenAI agent.
    pub fn from_config(db: Connection, config: AppConfig) -> Self {
        let services = Services::from_config(&config, db.clone());
        let transport: Arc<dyn Transport> = Arc::new(LineMessaging::new(
            &config.line_api_hostname,
            &config.line_channel_access_token,
        ));
        let dispatcher = Dispatcher::from_config(&config, services.clone(), transport.clone());
        Self::new(db, config, services, transport, dispatcher)
    }

    pub fn job_context(&self) -> JobContext {
        JobContext {
            config: self.config.clone(),
            services: self.services.clone(),
            transport: self.transport.clone(),
        }
    }
}
