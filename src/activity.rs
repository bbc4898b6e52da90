use crate::models::{ActivityDetails, ActivityRecord};
use crate::storage::{read_as, Store, ACTIVITIES_KEY};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct ActivityLog {
    store: Arc<dyn Store>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(&self, user_id: &str, details: ActivityDetails) -> Option<ActivityRecord> {
        let activity = ActivityRecord {
            id: format!("activity-{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            details,
            created_at: Utc::now(),
        };

        let value = match serde_json::to_value(&activity) {
            Ok(value) => value,
            Err(err) => {
                error!(user_id, "failed to encode activity: {err}");
                return None;
            }
        };

        match self.store.append(ACTIVITIES_KEY, value).await {
            Ok(()) => {
                debug!(user_id, id = %activity.id, "activity recorded");
                Some(activity)
            }
            Err(err) => {
                error!(user_id, "failed to save activity: {err}");
                None
            }
        }
    }

    pub async fn for_user(&self, user_id: &str) -> Vec<ActivityRecord> {
        let all = match read_as::<Vec<ActivityRecord>>(self.store.as_ref(), ACTIVITIES_KEY).await {
            Ok(all) => all.unwrap_or_default(),
            Err(err) => {
                warn!("activity log unreadable: {err}");
                return Vec::new();
            }
        };

        let mut activities: Vec<_> = all
            .into_iter()
            .filter(|activity| activity.user_id == user_id)
            .collect();
        activities.reverse();
        activities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        activities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WaterLog;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn record_assigns_id_and_timestamp() {
        let log = ActivityLog::new(Arc::new(MemoryStore::new()));
        let stored = log
            .record("u1", ActivityDetails::StreakMilestone { days: 7 })
            .await
            .expect("recorded");

        assert!(stored.id.starts_with("activity-"));
        assert_eq!(stored.user_id, "u1");
        assert_eq!(stored.details, ActivityDetails::StreakMilestone { days: 7 });
    }

    #[tokio::test]
    async fn for_user_filters_and_orders_newest_first() {
        let log = ActivityLog::new(Arc::new(MemoryStore::new()));
        log.record("u1", ActivityDetails::StreakReset { previous_streak: 1 }).await;
        log.record("u2", ActivityDetails::StreakMilestone { days: 7 }).await;
        log.record(
            "u1",
            ActivityDetails::WaterLogged(WaterLog { amount: 250.0, unit: "ml".to_string() }),
        )
        .await;

        let activities = log.for_user("u1").await;
        assert_eq!(activities.len(), 2);
        assert!(activities[0].created_at >= activities[1].created_at);
        assert!(activities.iter().all(|activity| activity.user_id == "u1"));
    }

    #[tokio::test]
    async fn failed_write_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        store.fail_writes(true);
        let log = ActivityLog::new(store);

        let stored = log.record("u1", ActivityDetails::StreakMilestone { days: 30 }).await;
        assert!(stored.is_none());
        assert!(log.for_user("u1").await.is_empty());
    }
}
