use crate::models::DailyTask;
use crate::tasks::DailyTaskScheduler;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, Timelike};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info};

pub const SUMMARY_HOUR: u32 = 21;

struct TaskReminder {
    task_id: &'static str,
    from_hour: u32,
    title: &'static str,
    message: &'static str,
    label: &'static str,
}

const TASK_REMINDERS: [TaskReminder; 4] = [
    TaskReminder {
        task_id: "breakfast",
        from_hour: 10,
        title: "Breakfast reminder",
        message: "Don't forget to log your breakfast! Starting your day with tracking helps build healthy habits.",
        label: "Log Breakfast",
    },
    TaskReminder {
        task_id: "lunch",
        from_hour: 14,
        title: "Lunch reminder",
        message: "Lunch tracking reminder! Keep up with your nutrition goals by logging your meal.",
        label: "Log Lunch",
    },
    TaskReminder {
        task_id: "dinner",
        from_hour: 20,
        title: "Dinner reminder",
        message: "Don't forget to log your dinner! Complete your day's nutrition tracking.",
        label: "Log Dinner",
    },
    TaskReminder {
        task_id: "water",
        from_hour: 12,
        title: "Hydration reminder",
        message: "Staying hydrated is key to your health goals! Don't forget to log your water intake.",
        label: "Log Water",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderAction {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ReminderAction>,
}

pub fn due_reminders(hour: u32, tasks: &[DailyTask]) -> Vec<Reminder> {
    let is_open = |id: &str| tasks.iter().any(|task| task.id == id && !task.completed);

    let mut reminders: Vec<Reminder> = TASK_REMINDERS
        .iter()
        .filter(|rule| hour >= rule.from_hour && is_open(rule.task_id))
        .map(|rule| Reminder {
            title: rule.title.to_string(),
            message: rule.message.to_string(),
            action: Some(ReminderAction {
                label: rule.label.to_string(),
                task_id: Some(rule.task_id.to_string()),
            }),
        })
        .collect();

    let incomplete = tasks.iter().filter(|task| !task.completed).count();
    if hour >= SUMMARY_HOUR && incomplete > 0 {
        reminders.push(Reminder {
            title: "Daily summary".to_string(),
            message: format!(
                "You have {incomplete} incomplete tasks today. It's not too late to track them!"
            ),
            action: Some(ReminderAction {
                label: "View Tasks".to_string(),
                task_id: None,
            }),
        });
    }

    reminders
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, reminder: &Reminder);
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: &str, reminder: &Reminder) {
        info!(user_id, title = %reminder.title, "{}", reminder.message);
    }
}

pub struct ReminderLoop {
    scheduler: DailyTaskScheduler,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl ReminderLoop {
    pub fn new(scheduler: DailyTaskScheduler, notifier: Arc<dyn Notifier>, interval: Duration) -> Self {
        Self {
            scheduler,
            notifier,
            interval,
            clock: local_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub async fn evaluate_at(&self, user_id: &str, now: NaiveDateTime) -> Vec<Reminder> {
        let tasks = self.scheduler.snapshot_on(user_id, now.date()).await;
        let reminders = due_reminders(now.hour(), &tasks);
        for reminder in &reminders {
            self.notifier.notify(user_id, reminder).await;
        }
        debug!(user_id, count = reminders.len(), "reminders evaluated");
        reminders
    }

    pub fn start(self: Arc<Self>, user_id: String) -> ReminderHandle {
        let (stop, mut stopped) = watch::channel(false);
        info!(user_id = %user_id, interval = ?self.interval, "starting reminders");

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.evaluate_at(&user_id, (self.clock)()).await;
                    }
                    _ = stopped.changed() => break,
                }
            }
            info!(user_id = %user_id, "reminders stopped");
        });

        ReminderHandle { stop, task }
    }
}

pub struct ReminderHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReminderHandle {
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ReminderHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
