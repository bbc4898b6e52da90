use crate::activity::ActivityLog;
use crate::errors::{CoreError, StoreError};
use crate::models::{default_tasks, ActivityDetails, DailyTask};
use crate::storage::{read_as, tasks_key, tasks_last_saved_key, write_as, Store};
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub fn task_for_meal(meal_type: &str) -> Option<&'static str> {
    match meal_type.trim().to_ascii_lowercase().as_str() {
        "breakfast" => Some("breakfast"),
        "lunch" => Some("lunch"),
        "dinner" => Some("dinner"),
        _ => None,
    }
}

#[derive(Clone)]
pub struct DailyTaskScheduler {
    store: Arc<dyn Store>,
    activity: ActivityLog,
}

impl DailyTaskScheduler {
    pub fn new(store: Arc<dyn Store>, activity: ActivityLog) -> Self {
        Self { store, activity }
    }

    pub async fn ensure_fresh_day(&self, user_id: &str) -> Result<Vec<DailyTask>, StoreError> {
        self.ensure_fresh_day_on(user_id, Local::now().date_naive()).await
    }

    pub async fn ensure_fresh_day_on(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<DailyTask>, StoreError> {
        let marker = self.last_saved(user_id).await;
        let stored = self.stored_tasks(user_id).await;

        if let (Some(marker), Some(tasks)) = (marker, &stored) {
            if marker == today {
                return Ok(tasks.clone());
            }
        }

        let tasks = cleared(stored);
        write_as(self.store.as_ref(), &tasks_key(user_id), &tasks).await?;
        write_as(self.store.as_ref(), &tasks_last_saved_key(user_id), &date_key(today)).await?;
        info!(user_id, day = %today, "daily tasks reset");
        Ok(tasks)
    }

    pub async fn reset(&self, user_id: &str) -> Result<Vec<DailyTask>, StoreError> {
        self.reset_on(user_id, Local::now().date_naive()).await
    }

    pub async fn reset_on(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<DailyTask>, StoreError> {
        let tasks = cleared(self.stored_tasks(user_id).await);
        write_as(self.store.as_ref(), &tasks_key(user_id), &tasks).await?;
        write_as(self.store.as_ref(), &tasks_last_saved_key(user_id), &date_key(today)).await?;
        info!(user_id, day = %today, "daily tasks reset on request");
        Ok(tasks)
    }

    pub async fn snapshot_on(&self, user_id: &str, today: NaiveDate) -> Vec<DailyTask> {
        let stored = self.stored_tasks(user_id).await;
        match (self.last_saved(user_id).await, stored) {
            (Some(marker), Some(tasks)) if marker == today => tasks,
            (_, stored) => cleared(stored),
        }
    }

    pub async fn mark_completed(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<Vec<DailyTask>, CoreError> {
        self.mark_completed_on(user_id, task_id, Local::now().date_naive())
            .await
    }

    pub async fn mark_completed_on(
        &self,
        user_id: &str,
        task_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<DailyTask>, CoreError> {
        let mut tasks = self.ensure_fresh_day_on(user_id, today).await?;
        let task = tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| CoreError::UnknownTask(task_id.to_string()))?;

        if task.completed {
            debug!(user_id, task_id, "task already completed");
            return Ok(tasks);
        }
        task.completed = true;
        let details = ActivityDetails::TaskCompleted {
            task_id: task.id.clone(),
            task_name: task.name.clone(),
        };

        write_as(self.store.as_ref(), &tasks_key(user_id), &tasks).await?;
        self.activity.record(user_id, details).await;
        Ok(tasks)
    }

    async fn last_saved(&self, user_id: &str) -> Option<NaiveDate> {
        let key = tasks_last_saved_key(user_id);
        match read_as::<String>(self.store.as_ref(), &key).await {
            Ok(marker) => marker.and_then(|value| value.parse().ok()),
            Err(err) => {
                warn!(user_id, "task marker unreadable: {err}");
                None
            }
        }
    }

    async fn stored_tasks(&self, user_id: &str) -> Option<Vec<DailyTask>> {
        match read_as(self.store.as_ref(), &tasks_key(user_id)).await {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(user_id, "discarding stored tasks: {err}");
                None
            }
        }
    }
}

fn cleared(stored: Option<Vec<DailyTask>>) -> Vec<DailyTask> {
    match stored {
        Some(mut tasks) => {
            for task in &mut tasks {
                task.completed = false;
            }
            tasks
        }
        None => default_tasks(),
    }
}

pub fn incomplete_tasks(tasks: &[DailyTask]) -> Vec<DailyTask> {
    tasks.iter().filter(|task| !task.completed).cloned().collect()
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
