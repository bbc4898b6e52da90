use crate::errors::AppError;
use crate::history::build_history;
use crate::models::{
    ActivityDetails, ActivityRecord, DailyTask, GoalSettings, MealLog, ProgressResponse,
    ReminderQuery, StreakCheckRequest, StreakHistoryResponse, StreakRecord, WaterLog,
};
use crate::reminders::{due_reminders, Reminder};
use crate::state::AppState;
use crate::tasks::{incomplete_tasks, task_for_meal};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Local, Timelike};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub active: bool,
}

pub async fn get_streak(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<StreakRecord>, AppError> {
    Ok(Json(state.streaks.load(&user_id).await?))
}

pub async fn check_streak(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<StreakCheckRequest>,
) -> Result<Json<StreakRecord>, AppError> {
    Ok(Json(state.streaks.advance(&user_id, payload.goal_met).await?))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<StreakHistoryResponse>, AppError> {
    let record = state.streaks.load(&user_id).await?;
    Ok(Json(build_history(&record)))
}

pub async fn get_tasks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<DailyTask>>, AppError> {
    Ok(Json(state.tasks.ensure_fresh_day(&user_id).await?))
}

pub async fn reset_tasks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<DailyTask>>, AppError> {
    Ok(Json(state.tasks.reset(&user_id).await?))
}

pub async fn get_incomplete_tasks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<DailyTask>>, AppError> {
    let tasks = state.tasks.ensure_fresh_day(&user_id).await?;
    Ok(Json(incomplete_tasks(&tasks)))
}

pub async fn complete_task(
    State(state): State<AppState>,
    Path((user_id, task_id)): Path<(String, String)>,
) -> Result<Json<ProgressResponse>, AppError> {
    let tasks = state.tasks.mark_completed(&user_id, &task_id).await?;
    let streak = state.streaks.advance(&user_id, true).await?;
    Ok(Json(ProgressResponse { tasks, streak }))
}

pub async fn log_meal(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(meal): Json<MealLog>,
) -> Result<Json<ProgressResponse>, AppError> {
    if meal.meal_type.trim().is_empty() {
        return Err(AppError::bad_request("meal_type is required"));
    }
    if !meal.total_calories.is_finite() || meal.total_calories < 0.0 {
        return Err(AppError::bad_request("total_calories must be a non-negative number"));
    }

    let task_id = task_for_meal(&meal.meal_type);
    state
        .activity
        .record(&user_id, ActivityDetails::MealLogged(meal))
        .await;

    let tasks = match task_id {
        Some(task_id) => state.tasks.mark_completed(&user_id, task_id).await?,
        None => state.tasks.ensure_fresh_day(&user_id).await?,
    };
    let streak = state.streaks.advance(&user_id, true).await?;
    Ok(Json(ProgressResponse { tasks, streak }))
}

pub async fn log_water(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(water): Json<WaterLog>,
) -> Result<Json<ProgressResponse>, AppError> {
    if !water.amount.is_finite() || water.amount <= 0.0 {
        return Err(AppError::bad_request("amount must be greater than 0"));
    }

    state
        .activity
        .record(&user_id, ActivityDetails::WaterLogged(water))
        .await;

    let tasks = state.tasks.mark_completed(&user_id, "water").await?;
    let streak = state.streaks.advance(&user_id, true).await?;
    Ok(Json(ProgressResponse { tasks, streak }))
}

pub async fn set_goals(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(goals): Json<GoalSettings>,
) -> Result<Json<Option<ActivityRecord>>, AppError> {
    let values = [goals.calorie_goal, goals.protein_goal, goals.carbs_goal, goals.fat_goal];
    if values.iter().any(|value| !value.is_finite() || *value < 0.0) {
        return Err(AppError::bad_request("goals must be non-negative numbers"));
    }

    let stored = state
        .activity
        .record(&user_id, ActivityDetails::GoalSet(goals))
        .await;
    Ok(Json(stored))
}

pub async fn get_activities(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<ActivityRecord>> {
    Json(state.activity.for_user(&user_id).await)
}

pub async fn get_reminders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ReminderQuery>,
) -> Result<Json<Vec<Reminder>>, AppError> {
    let now = Local::now();
    let hour = query.hour.unwrap_or_else(|| now.hour());
    if hour > 23 {
        return Err(AppError::bad_request("hour must be between 0 and 23"));
    }

    let tasks = state.tasks.snapshot_on(&user_id, now.date_naive()).await;
    Ok(Json(due_reminders(hour, &tasks)))
}

pub async fn start_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<SessionResponse> {
    let mut sessions = state.sessions.lock().await;
    if !sessions.contains_key(&user_id) {
        let handle = Arc::clone(&state.reminders).start(user_id.clone());
        sessions.insert(user_id.clone(), handle);
        info!(user_id = %user_id, "session started");
    }

    Json(SessionResponse {
        user_id,
        active: true,
    })
}

pub async fn end_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<SessionResponse> {
    let handle = state.sessions.lock().await.remove(&user_id);
    if let Some(handle) = handle {
        handle.shutdown().await;
        info!(user_id = %user_id, "session ended");
    }

    Json(SessionResponse {
        user_id,
        active: false,
    })
}
