use crate::models::{HistoryDay, StreakHistoryResponse, StreakLevel, StreakRecord};
use chrono::{Duration, Local, NaiveDate};

pub const HISTORY_DAYS: i64 = 30;

pub fn build_history(record: &StreakRecord) -> StreakHistoryResponse {
    build_history_at(Local::now().date_naive(), record)
}

pub fn build_history_at(today: NaiveDate, record: &StreakRecord) -> StreakHistoryResponse {
    let mut days = Vec::with_capacity(HISTORY_DAYS as usize);
    for offset in (0..HISTORY_DAYS).rev() {
        let date = today - Duration::days(offset);
        days.push(HistoryDay {
            date,
            completed: record.completed_on(date),
            milestone: record.milestones.iter().find(|m| m.date == date).cloned(),
        });
    }

    let mut weeks: Vec<Vec<HistoryDay>> = Vec::new();
    let mut days = days.into_iter().peekable();
    while days.peek().is_some() {
        weeks.push(days.by_ref().take(7).collect());
    }

    let (level, level_progress) = streak_level(record.current_streak);
    StreakHistoryResponse {
        current_streak: record.current_streak,
        longest_streak: record.longest_streak,
        streak_start_date: record.streak_start_date,
        level,
        level_progress,
        weeks,
        milestones: record.milestones.clone(),
    }
}

pub fn streak_level(current_streak: u32) -> (StreakLevel, f64) {
    let streak = f64::from(current_streak);
    if current_streak >= 8 {
        (StreakLevel::Gold, 100.0)
    } else if current_streak >= 4 {
        (StreakLevel::Silver, (streak - 4.0) / 4.0 * 100.0)
    } else {
        (StreakLevel::Bronze, streak / 4.0 * 100.0)
    }
}
