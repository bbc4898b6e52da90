use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/users/:user_id/streak", get(handlers::get_streak))
        .route("/api/users/:user_id/streak/check", post(handlers::check_streak))
        .route("/api/users/:user_id/streak/history", get(handlers::get_history))
        .route("/api/users/:user_id/tasks", get(handlers::get_tasks))
        .route("/api/users/:user_id/tasks/reset", post(handlers::reset_tasks))
        .route("/api/users/:user_id/tasks/incomplete", get(handlers::get_incomplete_tasks))
        .route(
            "/api/users/:user_id/tasks/:task_id/complete",
            post(handlers::complete_task),
        )
        .route("/api/users/:user_id/meals", post(handlers::log_meal))
        .route("/api/users/:user_id/water", post(handlers::log_water))
        .route("/api/users/:user_id/goals", post(handlers::set_goals))
        .route("/api/users/:user_id/activities", get(handlers::get_activities))
        .route("/api/users/:user_id/reminders", get(handlers::get_reminders))
        .route(
            "/api/users/:user_id/session",
            post(handlers::start_session).delete(handlers::end_session),
        )
        .with_state(state)
}
