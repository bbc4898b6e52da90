use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MILESTONE_DAYS: [u32; 5] = [7, 30, 60, 100, 365];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneKind {
    Minor,
    Major,
}

impl MilestoneKind {
    pub fn for_days(days: u32) -> Self {
        if days >= 100 { Self::Major } else { Self::Minor }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub date: NaiveDate,
    pub days: u32,
    #[serde(rename = "type")]
    pub kind: MilestoneKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub user_id: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub streak_start_date: NaiveDate,
    pub completed_dates: Vec<NaiveDate>,
    pub last_completed_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_missed_date: Option<NaiveDate>,
    pub milestones: Vec<Milestone>,
}

impl StreakRecord {
    pub fn new(user_id: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            current_streak: 0,
            longest_streak: 0,
            streak_start_date: today,
            completed_dates: Vec::new(),
            last_completed_date: None,
            last_missed_date: None,
            milestones: Vec::new(),
        }
    }

    pub fn completed_on(&self, date: NaiveDate) -> bool {
        self.completed_dates.contains(&date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Meal,
    Water,
    Exercise,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTask {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_time: Option<String>,
}

impl DailyTask {
    fn new(id: &str, name: &str, kind: TaskKind, target_time: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            completed: false,
            target_time: target_time.map(str::to_string),
        }
    }
}

pub fn default_tasks() -> Vec<DailyTask> {
    vec![
        DailyTask::new("breakfast", "Log Breakfast", TaskKind::Meal, Some("09:00")),
        DailyTask::new("lunch", "Log Lunch", TaskKind::Meal, Some("13:00")),
        DailyTask::new("dinner", "Log Dinner", TaskKind::Meal, Some("19:00")),
        DailyTask::new("water", "Log Water Intake", TaskKind::Water, None),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLog {
    pub meal_type: String,
    #[serde(default)]
    pub items: Vec<FoodItem>,
    pub total_calories: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterLog {
    pub amount: f64,
    #[serde(default = "default_water_unit")]
    pub unit: String,
}

fn default_water_unit() -> String {
    "ml".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSettings {
    pub calorie_goal: f64,
    pub protein_goal: f64,
    pub carbs_goal: f64,
    pub fat_goal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "activity_type", content = "details", rename_all = "snake_case")]
pub enum ActivityDetails {
    MealLogged(MealLog),
    WaterLogged(WaterLog),
    GoalSet(GoalSettings),
    TaskCompleted { task_id: String, task_name: String },
    StreakUpdated { current_streak: u32, longest_streak: u32 },
    StreakMilestone { days: u32 },
    StreakFreezeUsed { current_streak: u32 },
    StreakReset { previous_streak: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub details: ActivityDetails,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct StreakCheckRequest {
    pub goal_met: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReminderQuery {
    pub hour: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub tasks: Vec<DailyTask>,
    pub streak: StreakRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakLevel {
    Bronze,
    Silver,
    Gold,
}

#[derive(Debug, Serialize)]
pub struct HistoryDay {
    pub date: NaiveDate,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<Milestone>,
}

#[derive(Debug, Serialize)]
pub struct StreakHistoryResponse {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub streak_start_date: NaiveDate,
    pub level: StreakLevel,
    pub level_progress: f64,
    pub weeks: Vec<Vec<HistoryDay>>,
    pub milestones: Vec<Milestone>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_serializes_with_type_and_details() {
        let record = ActivityRecord {
            id: "activity-1".to_string(),
            user_id: "u1".to_string(),
            details: ActivityDetails::StreakReset { previous_streak: 4 },
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["activity_type"], "streak_reset");
        assert_eq!(value["details"]["previous_streak"], 4);
        assert_eq!(value["user_id"], "u1");
    }

    #[test]
    fn milestone_kind_turns_major_at_one_hundred() {
        assert_eq!(MilestoneKind::for_days(7), MilestoneKind::Minor);
        assert_eq!(MilestoneKind::for_days(60), MilestoneKind::Minor);
        assert_eq!(MilestoneKind::for_days(100), MilestoneKind::Major);
        assert_eq!(MilestoneKind::for_days(365), MilestoneKind::Major);
    }

    #[test]
    fn default_tasks_start_incomplete() {
        let tasks = default_tasks();
        let ids: Vec<_> = tasks.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, ["breakfast", "lunch", "dinner", "water"]);
        assert!(tasks.iter().all(|task| !task.completed));
    }
}
