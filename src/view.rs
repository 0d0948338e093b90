use chrono::{DateTime, NaiveDate, Utc};

use crate::entities::{daily_plan, goal, profile, task};
use crate::model::{AchievementPlan, Commitment, DATE_FORMAT};

fn has_text(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|text| !text.trim().is_empty())
        .unwrap_or(false)
}

pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

pub fn feasibility_badge(status: &str) -> String {
    format!("[{status}]")
}

pub fn commitment_badge(commitment: &Commitment) -> String {
    format!(
        "{} ({} min/day over {} weeks)",
        commitment.intensity.as_str(),
        commitment.daily_minutes,
        commitment.total_weeks
    )
}

/// Commitment of the goal's selected approach, if the plan names one.
pub fn goal_commitment(goal: &goal::Model, today: NaiveDate) -> Option<Commitment> {
    let plan = AchievementPlan::parse(goal.achievement_plan.as_deref()?)?;
    let approach = plan.approach(goal.selected_approach_id.as_deref()?)?;
    Some(Commitment::for_approach(approach, today, goal.deadline))
}

pub fn prerequisite_checklist(plan: &AchievementPlan) -> Vec<String> {
    plan.prerequisites
        .iter()
        .map(|item| {
            let mark = if item.done { "x" } else { " " };
            format!("[{mark}] {}", item.title)
        })
        .collect()
}

pub fn format_goal_detail(goal: &goal::Model, today: NaiveDate) -> String {
    let mut output = String::new();
    output.push_str(&format!("Goal ID: {}\n", goal.id));
    output.push_str(&format!("Title: {}\n", goal.title));
    output.push_str(&format!(
        "Status: {}\n",
        feasibility_badge(&goal.feasibility_status)
    ));
    output.push_str(&format!("Deadline: {}\n", goal.deadline.format(DATE_FORMAT)));
    if !goal.is_active {
        output.push_str("Archived: yes\n");
    }
    let plan = goal
        .achievement_plan
        .as_deref()
        .and_then(AchievementPlan::parse);
    if let Some(approach_id) = goal.selected_approach_id.as_deref() {
        let name = plan
            .as_ref()
            .and_then(|plan| plan.approach(approach_id))
            .map(|approach| approach.name.as_str())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(approach_id);
        output.push_str(&format!("Approach: {name}\n"));
    }
    if let Some(commitment) = goal_commitment(goal, today) {
        output.push_str(&format!("Commitment: {}\n", commitment_badge(&commitment)));
    }
    output.push_str(&format!("Created: {}\n", format_datetime(goal.created_at)));
    output.push_str(&format!("Updated: {}\n", format_datetime(goal.updated_at)));

    let checklist = plan
        .as_ref()
        .map(prerequisite_checklist)
        .unwrap_or_default();
    if !checklist.is_empty() {
        output.push('\n');
        output.push_str("Prerequisites:\n");
        for line in checklist {
            output.push_str(&format!("- {line}\n"));
        }
    }
    output.trim_end().to_string()
}

/// One line per goal. `>` marks the selected goal.
pub fn format_goal_selector(goals: &[goal::Model], selected: Option<i64>) -> String {
    if goals.is_empty() {
        return "No active goals.".to_string();
    }
    goals
        .iter()
        .map(|goal| {
            let marker = if Some(goal.id) == selected { ">" } else { " " };
            format!(
                "{marker} {} {} (id {}, due {})",
                feasibility_badge(&goal.feasibility_status),
                goal.title,
                goal.id,
                goal.deadline.format(DATE_FORMAT)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tasks grouped under a heading per phase. Input order is kept.
pub fn format_task_list(tasks: &[task::Model]) -> String {
    if tasks.is_empty() {
        return "No tasks.".to_string();
    }
    let mut output = String::new();
    let mut phase = None;
    for task in tasks {
        if phase != Some(task.phase_number) {
            if phase.is_some() {
                output.push('\n');
            }
            output.push_str(&format!("Phase {}:\n", task.phase_number));
            phase = Some(task.phase_number);
        }
        let mark = if task.completed { "x" } else { " " };
        output.push_str(&format!(
            "- [{mark}] {} (task id {}, goal {}, order {})\n",
            task.title, task.id, task.goal_id, task.order_index
        ));
        if has_text(&task.description) {
            output.push_str(&format!(
                "  {}\n",
                task.description.as_deref().unwrap_or("")
            ));
        }
    }
    output.trim_end().to_string()
}

pub fn format_task_detail(task: &task::Model) -> String {
    let mut output = String::new();
    output.push_str(&format!("Task ID: {}\n", task.id));
    output.push_str(&format!("Goal ID: {}\n", task.goal_id));
    output.push_str(&format!("Title: {}\n", task.title));
    output.push_str(&format!(
        "Status: {}\n",
        if task.completed { "done" } else { "todo" }
    ));
    output.push_str(&format!("Phase: {}\n", task.phase_number));
    output.push_str(&format!("Order: {}\n", task.order_index));
    if has_text(&task.description) {
        output.push_str(&format!(
            "Description: {}\n",
            task.description.as_deref().unwrap_or("")
        ));
    }
    output.push_str(&format!("Created: {}\n", format_datetime(task.created_at)));
    output.push_str(&format!("Updated: {}\n", format_datetime(task.updated_at)));
    output.trim_end().to_string()
}

pub fn format_daily_plan(plan: Option<&daily_plan::Model>) -> String {
    let Some(plan) = plan else {
        return "No plan for today.".to_string();
    };
    let mut output = String::new();
    let mark = if plan.completed { "x" } else { " " };
    output.push_str(&format!(
        "[{mark}] {} (plan id {}, {})\n",
        plan.summary, plan.id, plan.plan_date
    ));
    if let Some(minutes) = plan.planned_minutes {
        output.push_str(&format!("Planned: {minutes} min\n"));
    }
    if let Some(goal_id) = plan.goal_id {
        output.push_str(&format!("Goal: {goal_id}\n"));
    }
    output.trim_end().to_string()
}

pub fn format_daily_plan_list(plans: &[daily_plan::Model]) -> String {
    if plans.is_empty() {
        return "No daily plans.".to_string();
    }
    plans
        .iter()
        .map(|plan| {
            let mark = if plan.completed { "x" } else { " " };
            format!("{} [{mark}] {} (plan id {})", plan.plan_date, plan.summary, plan.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_profile(profile: &profile::Model) -> String {
    let mut output = String::new();
    output.push_str(&format!("User: {}\n", profile.user_id));
    if has_text(&profile.display_name) {
        output.push_str(&format!(
            "Name: {}\n",
            profile.display_name.as_deref().unwrap_or("")
        ));
    }
    let reminders = if profile.reminders_enabled {
        format!("every {} days", profile.reminder_interval_days)
    } else {
        "off".to_string()
    };
    output.push_str(&format!("Reminders: {reminders}\n"));
    output.push_str(&format!("Tokens: {}\n", profile.token_balance));
    output.trim_end().to_string()
}

pub fn format_dashboard(
    goals: &[goal::Model],
    tasks: &[task::Model],
    today_plan: Option<&daily_plan::Model>,
    profile: &profile::Model,
) -> String {
    let open_tasks: Vec<task::Model> = tasks
        .iter()
        .filter(|task| !task.completed)
        .cloned()
        .collect();
    let selected = goals.first().map(|goal| goal.id);
    let sections = [
        format!("# Goals\n{}", format_goal_selector(goals, selected)),
        format!("# Today\n{}", format_daily_plan(today_plan)),
        format!("# Open tasks\n{}", format_task_list(&open_tasks)),
        format!("# Profile\n{}", format_profile(profile)),
    ];
    sections.join("\n\n")
}
