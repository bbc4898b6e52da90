use crate::activity::ActivityLog;
use crate::errors::StoreError;
use crate::models::{ActivityDetails, Milestone, MilestoneKind, StreakRecord, MILESTONE_DAYS};
use crate::storage::{freezes_key, read_as, streak_key, write_as, Store};
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait FreezeEntitlement: Send + Sync {
    async fn try_consume(&self, user_id: &str) -> Result<bool, StoreError>;

    // Gives back a freeze whose missed day could not be saved.
    async fn refund(&self, user_id: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezePolicy {
    Unlimited,
    PerUser(u32),
}

pub struct FreezeAllowance {
    store: Arc<dyn Store>,
    policy: FreezePolicy,
}

impl FreezeAllowance {
    pub fn new(store: Arc<dyn Store>, policy: FreezePolicy) -> Self {
        Self { store, policy }
    }

    // None when unlimited.
    pub async fn remaining(&self, user_id: &str) -> Option<u32> {
        match self.policy {
            FreezePolicy::Unlimited => None,
            FreezePolicy::PerUser(allowance) => {
                let stored = read_as::<u32>(self.store.as_ref(), &freezes_key(user_id))
                    .await
                    .unwrap_or_else(|err| {
                        warn!(user_id, "freeze count unreadable: {err}");
                        None
                    });
                Some(stored.unwrap_or(allowance))
            }
        }
    }
}

#[async_trait]
impl FreezeEntitlement for FreezeAllowance {
    async fn try_consume(&self, user_id: &str) -> Result<bool, StoreError> {
        let Some(remaining) = self.remaining(user_id).await else {
            return Ok(true);
        };
        if remaining == 0 {
            return Ok(false);
        }
        write_as(self.store.as_ref(), &freezes_key(user_id), &(remaining - 1)).await?;
        Ok(true)
    }

    async fn refund(&self, user_id: &str) -> Result<(), StoreError> {
        let Some(remaining) = self.remaining(user_id).await else {
            return Ok(());
        };
        write_as(self.store.as_ref(), &freezes_key(user_id), &remaining.saturating_add(1)).await
    }
}

pub struct StreakEngine {
    store: Arc<dyn Store>,
    activity: ActivityLog,
    freezes: Arc<dyn FreezeEntitlement>,
}

impl StreakEngine {
    pub fn new(
        store: Arc<dyn Store>,
        activity: ActivityLog,
        freezes: Arc<dyn FreezeEntitlement>,
    ) -> Self {
        Self {
            store,
            activity,
            freezes,
        }
    }

    pub async fn load(&self, user_id: &str) -> Result<StreakRecord, StoreError> {
        self.load_on(user_id, Local::now().date_naive()).await
    }

    // A missing or unreadable record is replaced by a zeroed one.
    pub async fn load_on(&self, user_id: &str, today: NaiveDate) -> Result<StreakRecord, StoreError> {
        let key = streak_key(user_id);
        match read_as::<StreakRecord>(self.store.as_ref(), &key).await {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => {}
            Err(err) => warn!(user_id, "discarding streak record: {err}"),
        }

        let record = StreakRecord::new(user_id, today);
        write_as(self.store.as_ref(), &key, &record).await?;
        Ok(record)
    }

    pub async fn advance(&self, user_id: &str, goal_met: bool) -> Result<StreakRecord, StoreError> {
        self.advance_on(user_id, goal_met, Local::now().date_naive()).await
    }

    pub async fn advance_on(
        &self,
        user_id: &str,
        goal_met: bool,
        today: NaiveDate,
    ) -> Result<StreakRecord, StoreError> {
        let mut record = self.load_on(user_id, today).await?;
        if record.last_completed_date == Some(today)
            || (!goal_met && record.last_missed_date == Some(today))
        {
            return Ok(record);
        }

        let mut events = Vec::new();
        let mut spent_freeze = false;
        if goal_met {
            self.complete_day(&mut record, today, &mut events);
        } else {
            if record.current_streak > 0 && self.freezes.try_consume(user_id).await? {
                spent_freeze = true;
                info!(user_id, streak = record.current_streak, "streak freeze used");
                events.push(ActivityDetails::StreakFreezeUsed {
                    current_streak: record.current_streak,
                });
            } else {
                events.push(ActivityDetails::StreakReset {
                    previous_streak: record.current_streak,
                });
                record.current_streak = 0;
                record.streak_start_date = today;
            }
            record.last_missed_date = Some(today);
        }

        if let Err(err) = write_as(self.store.as_ref(), &streak_key(user_id), &record).await {
            if spent_freeze {
                if let Err(refund_err) = self.freezes.refund(user_id).await {
                    warn!(user_id, "could not refund streak freeze: {refund_err}");
                }
            }
            return Err(err);
        }

        for event in events {
            self.activity.record(user_id, event).await;
        }
        Ok(record)
    }

    fn complete_day(
        &self,
        record: &mut StreakRecord,
        today: NaiveDate,
        events: &mut Vec<ActivityDetails>,
    ) {
        let previous = record.last_completed_date;
        let yesterday = today - Duration::days(1);

        if !record.completed_on(today) {
            record.completed_dates.push(today);
        }
        record.last_completed_date = Some(today);

        if record.current_streak == 0 {
            record.current_streak = 1;
            record.streak_start_date = today;
        } else if previous == Some(yesterday) {
            record.current_streak += 1;
        } else {
            // Missed at least one day since the last completion.
            events.push(ActivityDetails::StreakReset {
                previous_streak: record.current_streak,
            });
            record.current_streak = 1;
            record.streak_start_date = today;
        }
        record.longest_streak = record.longest_streak.max(record.current_streak);

        events.push(ActivityDetails::StreakUpdated {
            current_streak: record.current_streak,
            longest_streak: record.longest_streak,
        });

        if MILESTONE_DAYS.contains(&record.current_streak) {
            info!(user_id = %record.user_id, days = record.current_streak, "streak milestone");
            record.milestones.push(Milestone {
                date: today,
                days: record.current_streak,
                kind: MilestoneKind::for_days(record.current_streak),
            });
            events.push(ActivityDetails::StreakMilestone {
                days: record.current_streak,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn engine_with(policy: FreezePolicy) -> (Arc<MemoryStore>, ActivityLog, StreakEngine) {
        let store = Arc::new(MemoryStore::new());
        let log = ActivityLog::new(store.clone());
        let freezes = Arc::new(FreezeAllowance::new(store.clone(), policy));
        let engine = StreakEngine::new(store.clone(), log.clone(), freezes);
        (store, log, engine)
    }

    async fn seed(store: &MemoryStore, current: u32, longest: u32, last: Option<NaiveDate>) {
        let mut record = StreakRecord::new("u1", day(1));
        record.current_streak = current;
        record.longest_streak = longest;
        record.last_completed_date = last;
        record.completed_dates = last.into_iter().collect();
        write_as(store, &streak_key("u1"), &record).await.unwrap();
    }

    #[tokio::test]
    async fn first_read_initializes_zeroed_record() {
        let (store, _, engine) = engine_with(FreezePolicy::Unlimited);
        let record = engine.load_on("u1", day(10)).await.unwrap();

        assert_eq!(record.current_streak, 0);
        assert_eq!(record.longest_streak, 0);
        assert_eq!(record.streak_start_date, day(10));
        assert!(record.last_completed_date.is_none());
        assert!(store.read("streak:u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn malformed_record_is_replaced() {
        let (store, _, engine) = engine_with(FreezePolicy::Unlimited);
        store.write("streak:u1", serde_json::json!({"oops": true})).await.unwrap();

        let record = engine.load_on("u1", day(10)).await.unwrap();
        assert_eq!(record, StreakRecord::new("u1", day(10)));
    }

    #[tokio::test]
    async fn advance_twice_same_day_is_idempotent() {
        let (_, _, engine) = engine_with(FreezePolicy::Unlimited);
        let first = engine.advance_on("u1", true, day(10)).await.unwrap();
        let second = engine.advance_on("u1", true, day(10)).await.unwrap();

        assert_eq!(first.current_streak, 1);
        assert_eq!(first, second);
        assert_eq!(second.completed_dates, vec![day(10)]);
    }

    #[tokio::test]
    async fn completion_after_yesterday_continues_streak() {
        let (store, _, engine) = engine_with(FreezePolicy::Unlimited);
        seed(&store, 4, 9, Some(day(9))).await;

        let record = engine.advance_on("u1", true, day(10)).await.unwrap();
        assert_eq!(record.current_streak, 5);
        assert_eq!(record.longest_streak, 9);
        assert_eq!(record.last_completed_date, Some(day(10)));
        assert_eq!(record.completed_dates, vec![day(9), day(10)]);
    }

    #[tokio::test]
    async fn longest_streak_follows_current() {
        let (store, _, engine) = engine_with(FreezePolicy::Unlimited);
        seed(&store, 2, 2, Some(day(9))).await;

        let record = engine.advance_on("u1", true, day(10)).await.unwrap();
        assert_eq!(record.current_streak, 3);
        assert_eq!(record.longest_streak, 3);
    }

    #[tokio::test]
    async fn reaching_seven_records_minor_milestone() {
        let (store, log, engine) = engine_with(FreezePolicy::Unlimited);
        seed(&store, 6, 6, Some(day(9))).await;

        let record = engine.advance_on("u1", true, day(10)).await.unwrap();
        assert_eq!(record.current_streak, 7);
        assert_eq!(
            record.milestones,
            vec![Milestone { date: day(10), days: 7, kind: MilestoneKind::Minor }]
        );

        let milestones: Vec<_> = log
            .for_user("u1")
            .await
            .into_iter()
            .filter(|activity| matches!(activity.details, ActivityDetails::StreakMilestone { .. }))
            .collect();
        assert_eq!(milestones.len(), 1);
        assert_eq!(milestones[0].details, ActivityDetails::StreakMilestone { days: 7 });
    }

    #[tokio::test]
    async fn reaching_one_hundred_records_major_milestone() {
        let (store, _, engine) = engine_with(FreezePolicy::Unlimited);
        seed(&store, 99, 99, Some(day(9))).await;

        let record = engine.advance_on("u1", true, day(10)).await.unwrap();
        assert_eq!(record.milestones.len(), 1);
        assert_eq!(record.milestones[0].days, 100);
        assert_eq!(record.milestones[0].kind, MilestoneKind::Major);
    }

    #[tokio::test]
    async fn non_threshold_day_records_no_milestone() {
        let (store, _, engine) = engine_with(FreezePolicy::Unlimited);
        seed(&store, 7, 7, Some(day(9))).await;

        let record = engine.advance_on("u1", true, day(10)).await.unwrap();
        assert_eq!(record.current_streak, 8);
        assert!(record.milestones.is_empty());
    }

    // Gap of 2+ days: the old streak ends and today starts a new one.
    #[tokio::test]
    async fn completion_after_gap_restarts_streak() {
        let (store, log, engine) = engine_with(FreezePolicy::Unlimited);
        seed(&store, 3, 5, Some(day(7))).await;

        let record = engine.advance_on("u1", true, day(10)).await.unwrap();
        assert_eq!(record.current_streak, 1);
        assert_eq!(record.longest_streak, 5);
        assert_eq!(record.streak_start_date, day(10));
        assert_eq!(record.last_completed_date, Some(day(10)));

        let activities = log.for_user("u1").await;
        assert!(activities
            .iter()
            .any(|a| a.details == ActivityDetails::StreakReset { previous_streak: 3 }));
    }

    #[tokio::test]
    async fn missed_day_without_freeze_resets() {
        let (store, log, engine) = engine_with(FreezePolicy::PerUser(0));
        seed(&store, 4, 4, Some(day(9))).await;

        let record = engine.advance_on("u1", false, day(11)).await.unwrap();
        assert_eq!(record.current_streak, 0);
        assert_eq!(record.longest_streak, 4);
        assert_eq!(record.streak_start_date, day(11));
        assert_eq!(record.completed_dates, vec![day(9)]);

        let activities = log.for_user("u1").await;
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].details, ActivityDetails::StreakReset { previous_streak: 4 });
    }

    #[tokio::test]
    async fn missed_day_with_freeze_keeps_streak_and_spends_freeze() {
        let store = Arc::new(MemoryStore::new());
        let log = ActivityLog::new(store.clone());
        let freezes = Arc::new(FreezeAllowance::new(store.clone(), FreezePolicy::PerUser(1)));
        let engine = StreakEngine::new(store.clone(), log.clone(), freezes.clone());
        seed(&store, 4, 4, Some(day(9))).await;

        let record = engine.advance_on("u1", false, day(11)).await.unwrap();
        assert_eq!(record.current_streak, 4);
        assert_eq!(record.streak_start_date, day(1));
        assert_eq!(freezes.remaining("u1").await, Some(0));
        assert_eq!(
            log.for_user("u1").await[0].details,
            ActivityDetails::StreakFreezeUsed { current_streak: 4 }
        );

        let record = engine.advance_on("u1", false, day(12)).await.unwrap();
        assert_eq!(record.current_streak, 0);
    }

    #[tokio::test]
    async fn idle_streak_does_not_spend_freeze() {
        let store = Arc::new(MemoryStore::new());
        let log = ActivityLog::new(store.clone());
        let freezes = Arc::new(FreezeAllowance::new(store.clone(), FreezePolicy::PerUser(2)));
        let engine = StreakEngine::new(store.clone(), log, freezes.clone());

        let record = engine.advance_on("u1", false, day(11)).await.unwrap();
        assert_eq!(record.current_streak, 0);
        assert_eq!(freezes.remaining("u1").await, Some(2));
    }

    #[tokio::test]
    async fn failed_persist_is_reported() {
        let (store, log, engine) = engine_with(FreezePolicy::Unlimited);
        seed(&store, 2, 2, Some(day(9))).await;
        store.fail_writes(true);

        assert!(engine.advance_on("u1", true, day(10)).await.is_err());
        assert!(log.for_user("u1").await.is_empty());

        store.fail_writes(false);
        let record = engine.load_on("u1", day(10)).await.unwrap();
        assert_eq!(record.current_streak, 2);
    }

    #[tokio::test]
    async fn repeated_miss_same_day_spends_one_freeze() {
        let store = Arc::new(MemoryStore::new());
        let log = ActivityLog::new(store.clone());
        let freezes = Arc::new(FreezeAllowance::new(store.clone(), FreezePolicy::PerUser(2)));
        let engine = StreakEngine::new(store.clone(), log.clone(), freezes.clone());
        seed(&store, 4, 4, Some(day(9))).await;

        for _ in 0..3 {
            let record = engine.advance_on("u1", false, day(11)).await.unwrap();
            assert_eq!(record.current_streak, 4);
        }

        assert_eq!(freezes.remaining("u1").await, Some(1));
        let used = log
            .for_user("u1")
            .await
            .into_iter()
            .filter(|a| matches!(a.details, ActivityDetails::StreakFreezeUsed { .. }))
            .count();
        assert_eq!(used, 1);
    }

    #[tokio::test]
    async fn repeated_miss_same_day_resets_once() {
        let (store, log, engine) = engine_with(FreezePolicy::PerUser(0));
        seed(&store, 4, 4, Some(day(9))).await;

        engine.advance_on("u1", false, day(11)).await.unwrap();
        let record = engine.advance_on("u1", false, day(11)).await.unwrap();

        assert_eq!(record.current_streak, 0);
        assert_eq!(record.last_missed_date, Some(day(11)));
        assert_eq!(log.for_user("u1").await.len(), 1);
    }

    #[tokio::test]
    async fn completion_after_miss_same_day_still_counts() {
        let (store, _, engine) = engine_with(FreezePolicy::Unlimited);
        seed(&store, 4, 4, Some(day(9))).await;

        engine.advance_on("u1", false, day(10)).await.unwrap();
        let record = engine.advance_on("u1", true, day(10)).await.unwrap();
        assert_eq!(record.current_streak, 5);
    }

    struct FailingWrites {
        inner: MemoryStore,
        prefix: &'static str,
    }

    #[async_trait]
    impl Store for FailingWrites {
        async fn read(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
            self.inner.read(key).await
        }

        async fn write(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
            if key.starts_with(self.prefix) {
                return Err(StoreError::Io(std::io::Error::other("store unavailable")));
            }
            self.inner.write(key, value).await
        }

        async fn append(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
            self.inner.append(key, value).await
        }
    }

    fn failing_engine(
        prefix: &'static str,
    ) -> (Arc<FailingWrites>, ActivityLog, Arc<FreezeAllowance>, StreakEngine) {
        let store = Arc::new(FailingWrites {
            inner: MemoryStore::new(),
            prefix,
        });
        let log = ActivityLog::new(store.clone());
        let freezes = Arc::new(FreezeAllowance::new(store.clone(), FreezePolicy::PerUser(1)));
        let engine = StreakEngine::new(store.clone(), log.clone(), freezes.clone());
        (store, log, freezes, engine)
    }

    #[tokio::test]
    async fn freeze_write_failure_keeps_streak() {
        let (store, log, freezes, engine) = failing_engine("streakFreezes:");
        seed(&store.inner, 4, 4, Some(day(9))).await;

        assert!(engine.advance_on("u1", false, day(11)).await.is_err());

        let record = engine.load_on("u1", day(11)).await.unwrap();
        assert_eq!(record.current_streak, 4);
        assert_eq!(record.last_missed_date, None);
        assert_eq!(freezes.remaining("u1").await, Some(1));
        assert!(log.for_user("u1").await.is_empty());
    }

    #[tokio::test]
    async fn record_write_failure_refunds_freeze() {
        let (store, log, freezes, engine) = failing_engine("streak:");
        seed(&store.inner, 4, 4, Some(day(9))).await;

        assert!(engine.advance_on("u1", false, day(11)).await.is_err());

        assert_eq!(freezes.remaining("u1").await, Some(1));
        assert!(log.for_user("u1").await.is_empty());
        let record = engine.load_on("u1", day(11)).await.unwrap();
        assert_eq!(record.current_streak, 4);
    }

    #[tokio::test]
    async fn every_threshold_records_its_milestone() {
        for (days, kind) in [
            (30, Some(MilestoneKind::Minor)),
            (60, Some(MilestoneKind::Minor)),
            (99, None),
            (365, Some(MilestoneKind::Major)),
        ] {
            let (store, _, engine) = engine_with(FreezePolicy::Unlimited);
            seed(&store, days - 1, days - 1, Some(day(9))).await;

            let record = engine.advance_on("u1", true, day(10)).await.unwrap();
            assert_eq!(record.current_streak, days);
            let recorded: Vec<_> = record.milestones.iter().map(|m| (m.days, m.kind)).collect();
            match kind {
                Some(kind) => assert_eq!(recorded, vec![(days, kind)], "streak of {days}"),
                None => assert!(recorded.is_empty(), "streak of {days}"),
            }
        }
    }
}
