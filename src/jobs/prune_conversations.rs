use std::time::Duration;

use anyhow::{Error, Result};
use async_trait::async_trait;

use super::{JobContext, PeriodicJob};

/// Deletes conversation turns older than the configured retention.
#[derive(Debug)]
pub struct PruneConversations;

#[async_trait]
impl PeriodicJob for PruneConversations {
    fn interval(&self) -> Duration {
        Duration::from_secs(60 * 60 * 24)
    }

    async fn run_job(&self, ctx: &JobContext) -> Result<usize, Error> {
        ctx.services
            .conversations
            .prune(ctx.config.conversation_retention_days)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::conversation::{ConversationTurn, TurnRole};
    use crate::core::config::tests::test_config;
    use crate::core::services::tests::{test_now, test_services};
    use crate::messaging::tests::RecordingTransport;

    #[tokio::test]
    async fn test_prunes_by_retention() {
        let (services, _) = test_services().await;
        let store = services.conversations.clone();
        let old = ConversationTurn::new(
            "U1",
            TurnRole::User,
            "old",
            test_now() - ChronoDuration::days(8),
        );
        let recent = ConversationTurn::new(
            "U1",
            TurnRole::User,
            "recent",
            test_now() - ChronoDuration::days(6),
        );
        store.append(&old).await.unwrap();
        store.append(&recent).await.unwrap();

        let ctx = JobContext {
            config: test_config(),
            services,
            transport: Arc::new(RecordingTransport::default()),
        };
        assert_eq!(PruneConversations.run_job(&ctx).await.unwrap(), 1);

        let left = store.recent("U1", 10, 24 * 30).await.unwrap();
        assert_eq!(left, vec![recent]);
    }
}
