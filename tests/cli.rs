use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement};
use tempfile::TempDir;
use url::Url;

const USER: &str = "cli-user";

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_goalpilot"))
}

fn run_cmd_with_env(home: &Path, user_id: Option<&str>, args: &[&str]) -> Output {
    let mut cmd = Command::new(bin_path());
    cmd.env_remove("GOALPILOT_HOME")
        .env_remove("GOALPILOT_USER_ID")
        .env_remove("GOALPILOT_FUNCTIONS_URL")
        .env_remove("GOALPILOT_LOG");
    cmd.arg("--home").arg(home);
    if let Some(user_id) = user_id {
        cmd.arg("--user-id").arg(user_id);
    }
    cmd.args(args);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.output().expect("run command")
}

fn run_cmd(dir: &TempDir, args: &[&str]) -> Output {
    run_cmd_with_env(dir.path(), Some(USER), args)
}

fn output_stdout(output: Output) -> String {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout utf8")
}

fn output_stderr(output: Output) -> String {
    assert!(!output.status.success(), "command unexpectedly succeeded");
    String::from_utf8(output.stderr).expect("stderr utf8")
}

fn parse_created_id(stdout: &str, prefix: &str) -> i64 {
    let rest = stdout.trim().strip_prefix(prefix).expect("created output");
    let id_str = rest
        .split(|ch: char| ch == ':' || ch.is_whitespace())
        .next()
        .expect("id");
    id_str.parse().expect("id parse")
}

fn add_goal(dir: &TempDir, title: &str) -> i64 {
    let stdout = output_stdout(run_cmd(
        dir,
        &["goal", "add", title, "--deadline", "2099-12-31"],
    ));
    parse_created_id(&stdout, "Created goal ID: ")
}

fn add_task(dir: &TempDir, goal_id: i64, title: &str, phase: &str) -> i64 {
    let stdout = output_stdout(run_cmd(
        dir,
        &["task", "add", &goal_id.to_string(), title, "--phase", phase],
    ));
    parse_created_id(&stdout, "Created task ID: ")
}

#[test]
fn auth_login_persists_session() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd_with_env(dir.path(), None, &["auth", "status"]));
    assert_eq!(stdout.trim(), "Not signed in.");

    let stdout = output_stdout(run_cmd_with_env(dir.path(), None, &["auth", "login", "alice"]));
    assert_eq!(stdout.trim(), "Signed in as alice.");
    let stdout = output_stdout(run_cmd_with_env(dir.path(), None, &["auth", "status"]));
    assert_eq!(stdout.trim(), "Signed in as alice.");

    output_stdout(run_cmd_with_env(
        dir.path(),
        None,
        &["goal", "add", "Session goal", "--deadline", "2099-01-01"],
    ));
    let stdout = output_stdout(run_cmd_with_env(dir.path(), None, &["goal", "list"]));
    assert!(stdout.contains("Session goal"));

    let stdout = output_stdout(run_cmd_with_env(dir.path(), None, &["auth", "logout"]));
    assert_eq!(stdout.trim(), "Signed out.");
    let stdout = output_stdout(run_cmd_with_env(dir.path(), None, &["auth", "logout"]));
    assert_eq!(stdout.trim(), "Not signed in.");
}

#[test]
fn signed_out_commands_fail() {
    let dir = TempDir::new().expect("temp dir");
    let stderr = output_stderr(run_cmd_with_env(dir.path(), None, &["goal", "list"]));
    assert!(stderr.contains("not signed in"));
}

#[test]
fn goals_are_scoped_per_user() {
    let dir = TempDir::new().expect("temp dir");
    add_goal(&dir, "Mine");
    let stdout = output_stdout(run_cmd_with_env(
        dir.path(),
        Some("someone-else"),
        &["goal", "list"],
    ));
    assert_eq!(stdout.trim(), "No active goals.");
}

#[test]
fn goal_show_renders_plan_details() {
    let dir = TempDir::new().expect("temp dir");
    let plan_path = dir.path().join("plan.json");
    std::fs::write(
        &plan_path,
        r#"{
            "approaches": [{"id": "steady", "name": "Steady", "totalHours": 10}],
            "prerequisites": [
                {"title": "Get a library card", "done": true},
                {"title": "Pick books"}
            ]
        }"#,
    )
    .expect("write plan");
    let stdout = output_stdout(run_cmd(
        &dir,
        &[
            "goal",
            "add",
            "Read 20 books",
            "--deadline",
            "2099-06-30",
            "--feasibility",
            "feasible",
            "--plan-file",
            plan_path.to_str().expect("plan path"),
        ],
    ));
    let goal_id = parse_created_id(&stdout, "Created goal ID: ");

    let stderr = output_stderr(run_cmd(
        &dir,
        &["goal", "update", &goal_id.to_string(), "--approach", "sprint"],
    ));
    assert!(stderr.contains("sprint"));
    output_stdout(run_cmd(
        &dir,
        &["goal", "update", &goal_id.to_string(), "--approach", "steady"],
    ));

    let stdout = output_stdout(run_cmd(&dir, &["goal", "show", &goal_id.to_string()]));
    assert!(stdout.contains("Status: [feasible]"));
    assert!(stdout.contains("Approach: Steady"));
    assert!(stdout.contains("Commitment: Light"));
    assert!(stdout.contains("- [x] Get a library card"));
    assert!(stdout.contains("- [ ] Pick books"));
}

#[test]
fn archived_goals_leave_the_list() {
    let dir = TempDir::new().expect("temp dir");
    let keep = add_goal(&dir, "Keep");
    let archive = add_goal(&dir, "Archive me");

    let stdout = output_stdout(run_cmd(&dir, &["goal", "archive", &archive.to_string()]));
    assert_eq!(stdout.trim(), format!("Goal ID: {archive} archived."));

    let stdout = output_stdout(run_cmd(
        &dir,
        &["goal", "list", "--select", &keep.to_string()],
    ));
    assert!(stdout.contains("> [pending] Keep"));
    assert!(!stdout.contains("Archive me"));

    let stdout = output_stdout(run_cmd(&dir, &["goal", "show", &archive.to_string()]));
    assert!(stdout.contains("Archived: yes"));
}

#[test]
fn task_list_orders_by_phase_then_index() {
    let dir = TempDir::new().expect("temp dir");
    let goal_id = add_goal(&dir, "Ship it");
    let late = add_task(&dir, goal_id, "Launch", "2");
    let first = add_task(&dir, goal_id, "Design", "1");
    let second = add_task(&dir, goal_id, "Build", "1");

    let stdout = output_stdout(run_cmd(
        &dir,
        &["task", "list", "--goal", &goal_id.to_string()],
    ));
    let design = stdout.find("Design").expect("design");
    let build = stdout.find("Build").expect("build");
    let launch = stdout.find("Launch").expect("launch");
    assert!(design < build && build < launch, "stdout: {stdout}");
    assert!(stdout.contains(&format!("(task id {second}, goal {goal_id}, order 1)")));

    output_stdout(run_cmd(&dir, &["task", "update", &first.to_string(), "--done"]));
    let stdout = output_stdout(run_cmd(&dir, &["task", "list"]));
    assert!(stdout.contains("- [x] Design"));
    let stdout = output_stdout(run_cmd(&dir, &["task", "show", &first.to_string()]));
    assert!(stdout.contains("Status: done"));
    assert!(stdout.contains("Phase: 1"));

    output_stdout(run_cmd(&dir, &["task", "remove", &late.to_string()]));
    let stdout = output_stdout(run_cmd(&dir, &["task", "list"]));
    assert!(!stdout.contains("Launch"));
}

#[test]
fn today_plan_uses_local_date() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(&dir, &["plan", "today"]));
    assert_eq!(stdout.trim(), "No plan for today.");

    output_stdout(run_cmd(
        &dir,
        &["plan", "add", "Old news", "--date", "2001-01-01"],
    ));
    output_stdout(run_cmd(&dir, &["plan", "add", "Write report", "--minutes", "90"]));

    let stdout = output_stdout(run_cmd(&dir, &["plan", "today"]));
    assert!(stdout.contains("Write report"));
    assert!(stdout.contains("Planned: 90 min"));

    let stderr = output_stderr(run_cmd(&dir, &["plan", "add", "Bad", "--date", "01/02/2001"]));
    assert!(stderr.contains("YYYY-MM-DD"));
}

#[test]
fn reminder_interval_is_clamped() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(
        &dir,
        &["profile", "reminders", "--state", "on", "--days", "365"],
    ));
    assert!(stdout.contains("Reminders: every 90 days"));

    let stdout = output_stdout(run_cmd(&dir, &["profile", "reminders", "--days", "1"]));
    assert!(stdout.contains("Reminders: every 7 days"));

    let stdout = output_stdout(run_cmd(&dir, &["profile", "reminders", "--toggle"]));
    assert!(stdout.contains("Reminders updated"));
    assert!(stdout.contains("Reminders: off"));
}

#[test]
fn promo_redeem_credits_once() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(
        &dir,
        &["promo", "create", "welcome", "--tokens", "40"],
    ));
    assert_eq!(stdout.trim(), "Created promo code WELCOME worth 40 tokens.");

    let stdout = output_stdout(run_cmd(&dir, &["promo", "redeem", "Welcome"]));
    assert!(stdout.contains("Redeemed 40 tokens. Balance: 40"));
    assert!(stdout.contains("Promo code redeemed"));

    let stderr = output_stderr(run_cmd(&dir, &["promo", "redeem", "WELCOME"]));
    assert!(stderr.contains("already redeemed"));

    let stdout = output_stdout(run_cmd(&dir, &["profile", "show"]));
    assert!(stdout.contains("Tokens: 40"));
}

#[test]
fn promo_redeem_rejects_blank_and_signed_out() {
    let dir = TempDir::new().expect("temp dir");
    let stderr = output_stderr(run_cmd(&dir, &["promo", "redeem", "   "]));
    assert!(stderr.contains("promo code cannot be empty"));

    let stderr = output_stderr(run_cmd_with_env(dir.path(), None, &["promo", "redeem", "X"]));
    assert!(stderr.contains("Sign in required"));
}

#[test]
fn dashboard_shows_every_section() {
    let dir = TempDir::new().expect("temp dir");
    let goal_id = add_goal(&dir, "Learn piano");
    add_task(&dir, goal_id, "Scales", "1");
    output_stdout(run_cmd(&dir, &["plan", "add", "Practice 20 minutes"]));

    let stdout = output_stdout(run_cmd(&dir, &["dashboard"]));
    assert!(stdout.contains("# Goals\n> [pending] Learn piano"));
    assert!(stdout.contains("# Today\n[ ] Practice 20 minutes"));
    assert!(stdout.contains("- [ ] Scales"));
    assert!(stdout.contains(&format!("User: {USER}")));
}

#[tokio::test]
async fn goal_remove_cascades_tasks_and_detaches_plans() {
    let dir = TempDir::new().expect("temp dir");
    let goal_id = add_goal(&dir, "Temporary");
    add_task(&dir, goal_id, "Step", "1");
    output_stdout(run_cmd(
        &dir,
        &["plan", "add", "Linked", "--goal", &goal_id.to_string()],
    ));

    let stdout = output_stdout(run_cmd(&dir, &["goal", "remove", &goal_id.to_string()]));
    assert_eq!(stdout.trim(), format!("Goal ID: {goal_id} removed."));

    let db_path = dir.path().join("goalpilot.db");
    let mut url = Url::from_file_path(&db_path).expect("db path");
    url.set_query(Some("mode=rwc"));
    let sqlite_url = url.as_str().replacen("file://", "sqlite://", 1);
    let db = Database::connect(&sqlite_url).await.expect("connect db");

    let tasks = db
        .query_one(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT COUNT(*) AS total FROM tasks;".to_string(),
        ))
        .await
        .expect("count tasks")
        .expect("row");
    assert_eq!(tasks.try_get::<i64>("", "total").expect("total"), 0);

    let plan = db
        .query_one(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT goal_id FROM daily_plans;".to_string(),
        ))
        .await
        .expect("select plan")
        .expect("row");
    assert_eq!(plan.try_get::<Option<i64>>("", "goal_id").expect("goal id"), None);
}
