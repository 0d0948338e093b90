mod app;
mod cache;
mod cli;
mod config;
mod db;
mod entities;
mod error;
mod forms;
mod functions;
mod hooks;
mod logging;
mod model;
mod notify;
mod scope;
mod view;

use std::fs;
use std::sync::Arc;

use clap::Parser;
use tracing::debug;

use crate::app::App;
use crate::cli::{
    AuthCommand, Cli, Command, GoalAdd, GoalCommand, GoalList, GoalUpdate, PlanAdd, PlanCommand,
    PlanPayload, PlanUpdate, ProfileCommand, ProfileReminders, PromoCommand, PromoCreate,
    PromoRedeem, SwitchArg, TaskAdd, TaskCommand, TaskUpdate,
};
use crate::config::Config;
use crate::error::AppError;
use crate::forms::{RedeemForm, ReminderForm};
use crate::functions::HttpRedeemFunction;
use crate::model::{
    parse_date, DailyPlanChanges, DailyPlanInput, GoalChanges, GoalInput, PromoCodeInput,
    ReminderPreference, TaskChanges, TaskInput, TaskQuery,
};
use crate::notify::NoticeKind;
use crate::scope::ViewScope;
use crate::view::{
    format_daily_plan, format_daily_plan_list, format_dashboard, format_goal_detail,
    format_goal_selector, format_profile, format_task_detail, format_task_list,
};

#[tokio::main]
async fn main() {
    logging::init();
    if let Err(err) = run().await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let Cli {
        home,
        user_id,
        command,
    } = Cli::parse();
    let config = Config::resolve(home, user_id)?;
    debug!(home = %config.home.display(), user = ?config.user_id, "configuration resolved");

    let command = match command {
        Command::Auth(command) => return handle_auth(&config, command),
        command => command,
    };

    let db_path = config.db_path();
    db::ensure_parent_dir(&db_path)?;
    let mut lock = db::open_lock(&db_path)?;
    let _guard = lock.write()?;

    let db = db::connect(&db_path).await?;
    db::ensure_schema(&db).await?;
    let mut app = App::new(db, config.user_id.clone());
    if let Some(url) = &config.functions_url {
        let function = HttpRedeemFunction::new(url)?;
        debug!(endpoint = %function.endpoint(), "using hosted redemption function");
        app = app.with_redeemer(Arc::new(function));
    }

    let result = match command {
        Command::Goal(command) => handle_goal(&app, command).await,
        Command::Task(command) => handle_task(&app, command).await,
        Command::Plan(command) => handle_plan(&app, command).await,
        Command::Profile(command) => handle_profile(&app, command).await,
        Command::Promo(command) => handle_promo(&app, command).await,
        Command::Dashboard => handle_dashboard(&app).await,
        Command::Auth(_) => Ok(()),
    };
    print_notices(&app);
    result
}

fn handle_auth(config: &Config, command: AuthCommand) -> Result<(), AppError> {
    match command {
        AuthCommand::Login(args) => {
            let session = config::save_session(&config.home, &args.user_id)?;
            println!("Signed in as {}.", session.user_id);
        }
        AuthCommand::Logout => {
            if config::clear_session(&config.home)? {
                println!("Signed out.");
            } else {
                println!("Not signed in.");
            }
        }
        AuthCommand::Status => match &config.user_id {
            Some(user_id) => println!("Signed in as {user_id}."),
            None => println!("Not signed in."),
        },
    }
    Ok(())
}

async fn handle_goal(app: &App, command: GoalCommand) -> Result<(), AppError> {
    match command {
        GoalCommand::Add(args) => handle_goal_add(app, args).await,
        GoalCommand::List(args) => handle_goal_list(app, args).await,
        GoalCommand::Show(args) => {
            let goal = app.goals().get(args.id).await?;
            println!("{}", format_goal_detail(&goal, local_today()));
            Ok(())
        }
        GoalCommand::Update(args) => handle_goal_update(app, args).await,
        GoalCommand::Archive(args) => {
            let goal = app.goals().archive(args.id).await?;
            println!("Goal ID: {} archived.", goal.id);
            Ok(())
        }
        GoalCommand::Remove(args) => {
            app.goals().delete(args.id).await?;
            println!("Goal ID: {} removed.", args.id);
            Ok(())
        }
    }
}

async fn handle_goal_add(app: &App, args: GoalAdd) -> Result<(), AppError> {
    let goal = app
        .goals()
        .create(GoalInput {
            title: args.title,
            deadline: parse_date("deadline", &args.deadline)?,
            feasibility: args.feasibility.map(Into::into),
            achievement_plan: read_plan_payload(args.plan)?,
        })
        .await?;
    println!("Created goal ID: {}: {}", goal.id, goal.title);
    Ok(())
}

async fn handle_goal_list(app: &App, args: GoalList) -> Result<(), AppError> {
    let goals = app.goals().list().await?;
    println!("{}", format_goal_selector(&goals, args.select));
    Ok(())
}

async fn handle_goal_update(app: &App, args: GoalUpdate) -> Result<(), AppError> {
    let deadline = args
        .deadline
        .as_deref()
        .map(|value| parse_date("deadline", value))
        .transpose()?;
    let goal = app
        .goals()
        .update(
            args.id,
            GoalChanges {
                title: args.title,
                deadline,
                feasibility: args.feasibility.map(Into::into),
                achievement_plan: read_plan_payload(args.plan)?,
                selected_approach_id: args.approach,
            },
        )
        .await?;
    println!("Updated goal {}.", goal.id);
    Ok(())
}

fn read_plan_payload(payload: PlanPayload) -> Result<Option<String>, AppError> {
    if let Some(path) = payload.plan_file {
        return Ok(Some(fs::read_to_string(path)?));
    }
    Ok(payload.plan_json)
}

async fn handle_task(app: &App, command: TaskCommand) -> Result<(), AppError> {
    match command {
        TaskCommand::Add(args) => handle_task_add(app, args).await,
        TaskCommand::List(args) => {
            let tasks = app.tasks().list(TaskQuery { goal_id: args.goal }).await?;
            println!("{}", format_task_list(&tasks));
            Ok(())
        }
        TaskCommand::Show(args) => {
            let task = app.tasks().get(args.id).await?;
            println!("{}", format_task_detail(&task));
            Ok(())
        }
        TaskCommand::Update(args) => handle_task_update(app, args).await,
        TaskCommand::Remove(args) => {
            app.tasks().delete(args.id).await?;
            println!("Task ID: {} removed.", args.id);
            Ok(())
        }
    }
}

async fn handle_task_add(app: &App, args: TaskAdd) -> Result<(), AppError> {
    let task = app
        .tasks()
        .create(TaskInput {
            goal_id: args.goal_id,
            title: args.title,
            description: args.description,
            phase_number: args.phase,
            order_index: args.order,
        })
        .await?;
    println!(
        "Created task ID: {} for goal ID: {} (phase {}, order {})",
        task.id, task.goal_id, task.phase_number, task.order_index
    );
    Ok(())
}

async fn handle_task_update(app: &App, args: TaskUpdate) -> Result<(), AppError> {
    let task = app
        .tasks()
        .update(
            args.id,
            TaskChanges {
                title: args.title,
                description: args.description,
                phase_number: args.phase,
                order_index: args.order,
                completed: args.completion.value(),
            },
        )
        .await?;
    println!("Updated task {}.", task.id);
    Ok(())
}

async fn handle_plan(app: &App, command: PlanCommand) -> Result<(), AppError> {
    match command {
        PlanCommand::Add(args) => handle_plan_add(app, args).await,
        PlanCommand::Today => {
            let plan = app.daily_plans().today().await?;
            println!("{}", format_daily_plan(plan.as_ref()));
            Ok(())
        }
        PlanCommand::List => {
            let plans = app.daily_plans().list().await?;
            println!("{}", format_daily_plan_list(&plans));
            Ok(())
        }
        PlanCommand::Update(args) => handle_plan_update(app, args).await,
        PlanCommand::Remove(args) => {
            app.daily_plans().delete(args.id).await?;
            println!("Daily plan ID: {} removed.", args.id);
            Ok(())
        }
    }
}

async fn handle_plan_add(app: &App, args: PlanAdd) -> Result<(), AppError> {
    let plan_date = args
        .date
        .as_deref()
        .map(|value| parse_date("plan date", value))
        .transpose()?;
    let plan = app
        .daily_plans()
        .create(DailyPlanInput {
            plan_date,
            goal_id: args.goal,
            summary: args.summary,
            planned_minutes: args.minutes,
        })
        .await?;
    println!("Created daily plan ID: {} for {}", plan.id, plan.plan_date);
    Ok(())
}

async fn handle_plan_update(app: &App, args: PlanUpdate) -> Result<(), AppError> {
    let plan = app
        .daily_plans()
        .update(
            args.id,
            DailyPlanChanges {
                summary: args.summary,
                planned_minutes: args.minutes,
                completed: args.completion.value(),
            },
        )
        .await?;
    println!("Updated daily plan {}.", plan.id);
    Ok(())
}

async fn handle_profile(app: &App, command: ProfileCommand) -> Result<(), AppError> {
    match command {
        ProfileCommand::Show => app.profile().refresh()?,
        ProfileCommand::Reminders(args) => handle_profile_reminders(app, args).await?,
        ProfileCommand::Name(args) => {
            app.profile().update_display_name(args.name).await?;
        }
    }
    let profile = app.profile().get().await?;
    println!("{}", format_profile(&profile));
    Ok(())
}

async fn handle_profile_reminders(app: &App, args: ProfileReminders) -> Result<(), AppError> {
    let hook = app.profile();
    if let Some(state) = args.state {
        let current = hook.get().await?;
        hook.update_reminders(ReminderPreference {
            enabled: matches!(state, SwitchArg::On),
            interval_days: args
                .days
                .unwrap_or_else(|| i64::from(current.reminder_interval_days)),
        })
        .await?;
        return Ok(());
    }

    let mut form = ReminderForm::load(hook).await?;
    if args.toggle && !form.toggle().await {
        return Err(AppError::InvalidInput(
            "reminder settings were not saved".to_string(),
        ));
    }
    if let Some(days) = args.days {
        form.set_interval_days(days).await;
    }
    debug!(
        enabled = form.enabled(),
        days = form.interval_days(),
        "reminder form settled"
    );
    Ok(())
}

async fn handle_promo(app: &App, command: PromoCommand) -> Result<(), AppError> {
    match command {
        PromoCommand::Redeem(args) => handle_promo_redeem(app, args).await,
        PromoCommand::Create(args) => handle_promo_create(app, args).await,
    }
}

async fn handle_promo_redeem(app: &App, args: PromoRedeem) -> Result<(), AppError> {
    let mut form = RedeemForm::new(app.promo());
    form.set_code(args.code.as_str());
    let outcome = form.submit().await;
    if outcome.success {
        let balance = app.profile().get().await?.token_balance;
        println!(
            "Redeemed {} tokens. Balance: {balance}",
            outcome.tokens_received.unwrap_or(0)
        );
        return Ok(());
    }
    let state = form.state();
    let code = state.code.trim();
    if code.is_empty() {
        return Err(AppError::InvalidInput("promo code cannot be empty".to_string()));
    }
    Err(AppError::InvalidInput(format!("promo code {code} was not redeemed")))
}

async fn handle_promo_create(app: &App, args: PromoCreate) -> Result<(), AppError> {
    let expires_on = args
        .expires
        .as_deref()
        .map(|value| parse_date("expiry date", value))
        .transpose()?;
    let code = app
        .promo()
        .create_code(PromoCodeInput {
            code: args.code,
            tokens: args.tokens,
            max_uses: args.max_uses,
            expires_on,
        })
        .await?;
    println!("Created promo code {} worth {} tokens.", code.code, code.tokens);
    Ok(())
}

async fn handle_dashboard(app: &App) -> Result<(), AppError> {
    let mut scope = ViewScope::new();
    let goals = {
        let hook = app.goals();
        scope.spawn_query("goals", async move { hook.list().await })
    };
    let tasks = {
        let hook = app.tasks();
        scope.spawn_query("tasks", async move { hook.list(TaskQuery::default()).await })
    };
    let today = {
        let hook = app.daily_plans();
        scope.spawn_query("today", async move { hook.today().await })
    };
    let profile = {
        let hook = app.profile();
        scope.spawn_query("profile", async move { hook.get().await })
    };

    let goals = goals.wait().await?;
    let tasks = tasks.wait().await?;
    let today = today.wait().await?;
    let profile = profile.wait().await?;
    println!(
        "{}",
        format_dashboard(&goals, &tasks, today.as_ref(), &profile)
    );
    Ok(())
}

fn print_notices(app: &App) {
    for notice in app.notices().drain() {
        match notice.kind {
            NoticeKind::Success => println!("{}: {}", notice.title, notice.description),
            NoticeKind::Error => eprintln!("{}: {}", notice.title, notice.description),
        }
    }
}

fn local_today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
