use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Schema, Statement};
use url::Url;

use crate::entities::{daily_plan, goal, profile, promo_code, promo_redemption, task};
use crate::error::AppError;

pub fn resolve_db_path(home: &Path) -> PathBuf {
    home.join("goalpilot.db")
}

pub fn resolve_session_path(home: &Path) -> PathBuf {
    home.join("session.json")
}

pub fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub fn open_lock(path: &Path) -> Result<fd_lock::RwLock<File>, AppError> {
    let lock_path = path.with_extension("lock");
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(lock_path)?;
    Ok(fd_lock::RwLock::new(file))
}

pub async fn connect(path: &Path) -> Result<DatabaseConnection, AppError> {
    let mut url = Url::from_file_path(path)
        .map_err(|_| AppError::InvalidInput(format!("invalid sqlite path: {}", path.display())))?;
    url.set_query(Some("mode=rwc"));
    let sqlite_url = url.as_str().replacen("file://", "sqlite://", 1);
    Ok(Database::connect(&sqlite_url).await?)
}

pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), AppError> {
    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        "PRAGMA foreign_keys = ON;",
    ))
    .await?;

    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut goal_stmt = schema.create_table_from_entity(goal::Entity);
    goal_stmt.if_not_exists();
    db.execute(builder.build(&goal_stmt)).await?;

    let mut task_stmt = schema.create_table_from_entity(task::Entity);
    task_stmt.if_not_exists();
    db.execute(builder.build(&task_stmt)).await?;

    let mut plan_stmt = schema.create_table_from_entity(daily_plan::Entity);
    plan_stmt.if_not_exists();
    db.execute(builder.build(&plan_stmt)).await?;

    let mut profile_stmt = schema.create_table_from_entity(profile::Entity);
    profile_stmt.if_not_exists();
    db.execute(builder.build(&profile_stmt)).await?;

    let mut promo_stmt = schema.create_table_from_entity(promo_code::Entity);
    promo_stmt.if_not_exists();
    db.execute(builder.build(&promo_stmt)).await?;

    let mut redemption_stmt = schema.create_table_from_entity(promo_redemption::Entity);
    redemption_stmt.if_not_exists();
    db.execute(builder.build(&redemption_stmt)).await?;

    let mut goal_index = Index::create()
        .name("idx_goals_user_active")
        .table(goal::Entity)
        .col(goal::Column::UserId)
        .col(goal::Column::IsActive)
        .to_owned();
    goal_index.if_not_exists();
    db.execute(builder.build(&goal_index)).await?;

    let mut task_index = Index::create()
        .name("idx_tasks_user_goal_order")
        .table(task::Entity)
        .col(task::Column::UserId)
        .col(task::Column::GoalId)
        .col(task::Column::PhaseNumber)
        .col(task::Column::OrderIndex)
        .to_owned();
    task_index.if_not_exists();
    db.execute(builder.build(&task_index)).await?;

    let mut plan_index = Index::create()
        .name("idx_daily_plans_user_date")
        .table(daily_plan::Entity)
        .col(daily_plan::Column::UserId)
        .col(daily_plan::Column::PlanDate)
        .to_owned();
    plan_index.if_not_exists();
    db.execute(builder.build(&plan_index)).await?;

    let mut redemption_index = Index::create()
        .name("idx_promo_redemptions_code_user")
        .table(promo_redemption::Entity)
        .col(promo_redemption::Column::Code)
        .col(promo_redemption::Column::UserId)
        .unique()
        .to_owned();
    redemption_index.if_not_exists();
    db.execute(builder.build(&redemption_index)).await?;

    Ok(())
}
