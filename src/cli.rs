use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::FeasibilityStatus;

#[derive(Parser, Debug)]
#[command(
    name = "goalpilot",
    version,
    about = "Plan goals, tasks and daily work against a local table store"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Data directory (defaults to $GOALPILOT_HOME or ~/.goalpilot)"
    )]
    pub home: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "ID",
        help = "Act as this user instead of the stored session"
    )]
    pub user_id: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(subcommand)]
    Auth(AuthCommand),
    #[command(subcommand)]
    Goal(GoalCommand),
    #[command(subcommand)]
    Task(TaskCommand),
    #[command(subcommand)]
    Plan(PlanCommand),
    #[command(subcommand)]
    Profile(ProfileCommand),
    #[command(subcommand)]
    Promo(PromoCommand),
    Dashboard,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    Login(AuthLogin),
    Logout,
    Status,
}

#[derive(Subcommand, Debug)]
pub enum GoalCommand {
    Add(GoalAdd),
    List(GoalList),
    Show(GoalShow),
    Update(GoalUpdate),
    Archive(GoalArchive),
    Remove(GoalRemove),
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    Add(TaskAdd),
    List(TaskList),
    Show(TaskShow),
    Update(TaskUpdate),
    Remove(TaskRemove),
}

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    Add(PlanAdd),
    Today,
    List,
    Update(PlanUpdate),
    Remove(PlanRemove),
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    Show,
    Reminders(ProfileReminders),
    Name(ProfileName),
}

#[derive(Subcommand, Debug)]
pub enum PromoCommand {
    Redeem(PromoRedeem),
    Create(PromoCreate),
}

#[derive(Args, Debug)]
pub struct AuthLogin {
    pub user_id: String,
}

#[derive(Args, Debug)]
pub struct GoalAdd {
    pub title: String,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub deadline: String,
    #[arg(long, value_enum)]
    pub feasibility: Option<FeasibilityArg>,
    #[command(flatten)]
    pub plan: PlanPayload,
}

/// Achievement plan JSON, inline or from a file.
#[derive(Args, Debug)]
pub struct PlanPayload {
    #[arg(long = "plan", value_name = "JSON", conflicts_with = "plan_file")]
    pub plan_json: Option<String>,
    #[arg(long, value_name = "PATH")]
    pub plan_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct GoalList {
    #[arg(long, value_name = "ID", help = "Mark this goal as selected")]
    pub select: Option<i64>,
}

#[derive(Args, Debug)]
pub struct GoalShow {
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct GoalUpdate {
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub deadline: Option<String>,
    #[arg(long, value_enum)]
    pub feasibility: Option<FeasibilityArg>,
    #[command(flatten)]
    pub plan: PlanPayload,
    #[arg(long, value_name = "APPROACH_ID")]
    pub approach: Option<String>,
}

#[derive(Args, Debug)]
pub struct GoalArchive {
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct GoalRemove {
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct TaskAdd {
    pub goal_id: i64,
    pub title: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, default_value_t = 1)]
    pub phase: i32,
    #[arg(long, help = "Position within the phase (defaults to the end)")]
    pub order: Option<i32>,
}

#[derive(Args, Debug)]
pub struct TaskList {
    #[arg(long, value_name = "GOAL_ID")]
    pub goal: Option<i64>,
}

#[derive(Args, Debug)]
pub struct TaskShow {
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct TaskUpdate {
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub phase: Option<i32>,
    #[arg(long)]
    pub order: Option<i32>,
    #[command(flatten)]
    pub completion: Completion,
}

#[derive(Args, Debug)]
pub struct TaskRemove {
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct Completion {
    #[arg(long, conflicts_with = "undone")]
    pub done: bool,
    #[arg(long)]
    pub undone: bool,
}

impl Completion {
    pub fn value(&self) -> Option<bool> {
        match (self.done, self.undone) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct PlanAdd {
    pub summary: String,
    #[arg(long, value_name = "YYYY-MM-DD", help = "Plan date (defaults to today)")]
    pub date: Option<String>,
    #[arg(long, value_name = "GOAL_ID")]
    pub goal: Option<i64>,
    #[arg(long)]
    pub minutes: Option<i32>,
}

#[derive(Args, Debug)]
pub struct PlanUpdate {
    pub id: i64,
    #[arg(long)]
    pub summary: Option<String>,
    #[arg(long)]
    pub minutes: Option<i32>,
    #[command(flatten)]
    pub completion: Completion,
}

#[derive(Args, Debug)]
pub struct PlanRemove {
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct ProfileReminders {
    #[arg(long, conflicts_with = "state", help = "Flip reminders on or off")]
    pub toggle: bool,
    #[arg(long, value_enum, value_name = "on|off")]
    pub state: Option<SwitchArg>,
    #[arg(long, help = "Reminder interval, clamped to 7..=90")]
    pub days: Option<i64>,
}

#[derive(Args, Debug)]
pub struct ProfileName {
    #[arg(help = "Display name; omit to clear it")]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct PromoRedeem {
    pub code: String,
}

#[derive(Args, Debug)]
pub struct PromoCreate {
    pub code: String,
    #[arg(long)]
    pub tokens: i64,
    #[arg(long)]
    pub max_uses: Option<i32>,
    #[arg(long, value_name = "YYYY-MM-DD", help = "Last day the code can be redeemed")]
    pub expires: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FeasibilityArg {
    Pending,
    Feasible,
    Challenging,
    Unrealistic,
}

impl From<FeasibilityArg> for FeasibilityStatus {
    fn from(value: FeasibilityArg) -> Self {
        match value {
            FeasibilityArg::Pending => FeasibilityStatus::Pending,
            FeasibilityArg::Feasible => FeasibilityStatus::Feasible,
            FeasibilityArg::Challenging => FeasibilityStatus::Challenging,
            FeasibilityArg::Unrealistic => FeasibilityStatus::Unrealistic,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SwitchArg {
    On,
    Off,
}
