use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MIN_REMINDER_DAYS: i64 = 7;
pub const MAX_REMINDER_DAYS: i64 = 90;
pub const DEFAULT_REMINDER_DAYS: i64 = 14;

pub const LIGHT_LIMIT_MINUTES: u32 = 60;
pub const MODERATE_LIMIT_MINUTES: u32 = 120;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FeasibilityStatus {
    Pending,
    Feasible,
    Challenging,
    Unrealistic,
}

impl FeasibilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Feasible => "feasible",
            Self::Challenging => "challenging",
            Self::Unrealistic => "unrealistic",
        }
    }
}

/// How demanding a goal is, bucketed from the minutes per day it needs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Intensity {
    Light,
    Moderate,
    Intensive,
}

impl Intensity {
    pub fn classify(minutes_per_day: u32) -> Self {
        if minutes_per_day < LIGHT_LIMIT_MINUTES {
            Self::Light
        } else if minutes_per_day < MODERATE_LIMIT_MINUTES {
            Self::Moderate
        } else {
            Self::Intensive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Moderate => "Moderate",
            Self::Intensive => "Intensive",
        }
    }
}

pub fn clamp_reminder_days(days: i64) -> i64 {
    days.clamp(MIN_REMINDER_DAYS, MAX_REMINDER_DAYS)
}

/// Whole weeks between `today` and `deadline`, never less than one.
pub fn total_weeks(today: NaiveDate, deadline: NaiveDate) -> u32 {
    let days = (deadline - today).num_days();
    if days <= 0 {
        return 1;
    }
    let weeks = (days + 6) / 7;
    weeks.max(1) as u32
}

/// Minutes per day needed to spend `total_hours` evenly over `weeks`.
pub fn daily_minutes(total_hours: f64, weeks: u32) -> u32 {
    if !total_hours.is_finite() || total_hours <= 0.0 {
        return 0;
    }
    let days = f64::from(weeks.max(1)) * 7.0;
    (total_hours * 60.0 / days).round() as u32
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approach {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub total_hours: f64,
    #[serde(default)]
    pub weekly_hours: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

/// Typed view of the opaque achievement plan payload. Fields the client
/// does not understand are carried in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AchievementPlan {
    #[serde(default)]
    pub approaches: Vec<Approach>,
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AchievementPlan {
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn approach(&self, id: &str) -> Option<&Approach> {
        self.approaches.iter().find(|approach| approach.id == id)
    }
}

/// Commitment a goal asks for under its selected approach.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Commitment {
    pub daily_minutes: u32,
    pub total_weeks: u32,
    pub intensity: Intensity,
}

impl Commitment {
    pub fn for_approach(approach: &Approach, today: NaiveDate, deadline: NaiveDate) -> Self {
        let weeks = total_weeks(today, deadline);
        let minutes = daily_minutes(approach.total_hours, weeks);
        Self {
            daily_minutes: minutes,
            total_weeks: weeks,
            intensity: Intensity::classify(minutes),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GoalInput {
    pub title: String,
    pub deadline: NaiveDate,
    pub feasibility: Option<FeasibilityStatus>,
    pub achievement_plan: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct GoalChanges {
    pub title: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub feasibility: Option<FeasibilityStatus>,
    pub achievement_plan: Option<String>,
    pub selected_approach_id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TaskInput {
    pub goal_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub phase_number: i32,
    pub order_index: Option<i32>,
}

#[derive(Clone, Debug, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub phase_number: Option<i32>,
    pub order_index: Option<i32>,
    pub completed: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct TaskQuery {
    pub goal_id: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct DailyPlanInput {
    pub plan_date: Option<NaiveDate>,
    pub goal_id: Option<i64>,
    pub summary: String,
    pub planned_minutes: Option<i32>,
}

#[derive(Clone, Debug, Default)]
pub struct DailyPlanChanges {
    pub summary: Option<String>,
    pub planned_minutes: Option<i32>,
    pub completed: Option<bool>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReminderPreference {
    pub enabled: bool,
    pub interval_days: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PromoCodeInput {
    pub code: String,
    pub tokens: i64,
    pub max_uses: Option<i32>,
    pub expires_on: Option<NaiveDate>,
}

pub fn parse_date(label: &str, value: &str) -> Result<NaiveDate, crate::error::AppError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        crate::error::AppError::InvalidInput(format!(
            "{label} must be a date in YYYY-MM-DD form, got `{value}`"
        ))
    })
}

pub fn today_string() -> String {
    chrono::Local::now().date_naive().format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, DATE_FORMAT).expect("date")
    }

    #[test]
    fn classify_uses_two_thresholds() {
        assert_eq!(Intensity::classify(0), Intensity::Light);
        assert_eq!(Intensity::classify(59), Intensity::Light);
        assert_eq!(Intensity::classify(60), Intensity::Moderate);
        assert_eq!(Intensity::classify(119), Intensity::Moderate);
        assert_eq!(Intensity::classify(120), Intensity::Intensive);
        assert_eq!(Intensity::classify(u32::MAX), Intensity::Intensive);
    }

    #[test]
    fn classify_matches_ranges_for_every_minute_of_a_day() {
        for minutes in 0..=1440u32 {
            let expected = if minutes < 60 {
                Intensity::Light
            } else if minutes < 120 {
                Intensity::Moderate
            } else {
                Intensity::Intensive
            };
            assert_eq!(Intensity::classify(minutes), expected, "minutes {minutes}");
        }
    }

    #[test]
    fn clamp_reminder_days_bounds_and_is_idempotent() {
        assert_eq!(clamp_reminder_days(-5), 7);
        assert_eq!(clamp_reminder_days(0), 7);
        assert_eq!(clamp_reminder_days(7), 7);
        assert_eq!(clamp_reminder_days(30), 30);
        assert_eq!(clamp_reminder_days(90), 90);
        assert_eq!(clamp_reminder_days(365), 90);
        for days in -10..120 {
            let once = clamp_reminder_days(days);
            assert_eq!(clamp_reminder_days(once), once);
            assert_eq!(once, days.min(90).max(7));
        }
    }

    #[test]
    fn total_weeks_rounds_up_and_never_drops_below_one() {
        let today = date("2026-01-01");
        assert_eq!(total_weeks(today, date("2025-12-01")), 1);
        assert_eq!(total_weeks(today, today), 1);
        assert_eq!(total_weeks(today, date("2026-01-08")), 1);
        assert_eq!(total_weeks(today, date("2026-01-09")), 2);
        assert_eq!(total_weeks(today, date("2026-03-26")), 12);
    }

    #[test]
    fn daily_minutes_spreads_hours_over_days() {
        assert_eq!(daily_minutes(7.0, 1), 60);
        assert_eq!(daily_minutes(14.0, 1), 120);
        assert_eq!(daily_minutes(10.0, 2), 43);
        assert_eq!(daily_minutes(0.0, 3), 0);
        assert_eq!(daily_minutes(-4.0, 3), 0);
        assert_eq!(daily_minutes(f64::NAN, 3), 0);
        assert_eq!(daily_minutes(7.0, 0), 60);
    }

    #[test]
    fn commitment_combines_weeks_minutes_and_intensity() {
        let approach = Approach {
            id: "steady".to_string(),
            name: "Steady".to_string(),
            total_hours: 42.0,
            weekly_hours: None,
        };
        let commitment =
            Commitment::for_approach(&approach, date("2026-01-01"), date("2026-01-29"));
        assert_eq!(commitment.total_weeks, 4);
        assert_eq!(commitment.daily_minutes, 90);
        assert_eq!(commitment.intensity, Intensity::Moderate);
    }

    #[test]
    fn achievement_plan_keeps_unknown_fields() {
        let raw = r#"{"approaches":[{"id":"a","name":"A","totalHours":12}],"summary":"x"}"#;
        let plan = AchievementPlan::parse(raw).expect("plan");
        assert_eq!(plan.approach("a").map(|a| a.total_hours), Some(12.0));
        assert!(plan.prerequisites.is_empty());
        assert_eq!(plan.extra.get("summary"), Some(&Value::from("x")));
        assert!(AchievementPlan::parse("[1,2]").is_none());
    }

    #[test]
    fn parse_date_rejects_other_formats() {
        assert!(parse_date("deadline", "2026-02-03").is_ok());
        assert!(parse_date("deadline", "03/02/2026").is_err());
        assert!(parse_date("deadline", "").is_err());
    }
}
