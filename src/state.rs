use crate::activity::ActivityLog;
use crate::config::Config;
use crate::reminders::{LogNotifier, Notifier, ReminderHandle, ReminderLoop};
use crate::storage::Store;
use crate::streak::{FreezeAllowance, StreakEngine};
use crate::tasks::DailyTaskScheduler;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub activity: ActivityLog,
    pub streaks: Arc<StreakEngine>,
    pub tasks: DailyTaskScheduler,
    pub reminders: Arc<ReminderLoop>,
    pub sessions: Arc<Mutex<HashMap<String, ReminderHandle>>>,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn Store>) -> Self {
        Self::with_notifier(config, store, Arc::new(LogNotifier))
    }

    pub fn with_notifier(config: &Config, store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        let activity = ActivityLog::new(store.clone());
        let freezes = Arc::new(FreezeAllowance::new(store.clone(), config.freeze_policy));
        let streaks = Arc::new(StreakEngine::new(store.clone(), activity.clone(), freezes));
        let tasks = DailyTaskScheduler::new(store, activity.clone());
        let reminders = Arc::new(ReminderLoop::new(tasks.clone(), notifier, config.reminder_interval));

        Self {
            activity,
            streaks,
            tasks,
            reminders,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn end_all_sessions(&self) {
        let handles: Vec<_> = self.sessions.lock().await.drain().map(|(_, handle)| handle).collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }
}
