use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{debug, info};

use crate::app::{ensure_non_empty, scoped_update_error, Context};
use crate::cache::{CacheKey, EntityKind};
use crate::entities::task;
use crate::error::AppError;
use crate::hooks::goals::find_owned_goal;
use crate::model::{TaskChanges, TaskInput, TaskQuery};

#[derive(Clone)]
pub struct TasksHook {
    ctx: Arc<Context>,
}

impl TasksHook {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Tasks of the signed-in user in (phase, index) order, optionally
    /// narrowed to one goal.
    pub async fn list(&self, query: TaskQuery) -> Result<Arc<Vec<task::Model>>, AppError> {
        let user_id = self.ctx.user_id()?;
        let scope = match query.goal_id {
            Some(goal_id) => format!("goal:{goal_id}"),
            None => "all".to_string(),
        };
        self.ctx
            .cache
            .load(CacheKey::new(EntityKind::Tasks, user_id).scoped(scope), || {
                fetch_tasks(&self.ctx.db, user_id, query.goal_id)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<task::Model, AppError> {
        let user_id = self.ctx.user_id()?;
        find_owned_task(&self.ctx.db, user_id, id).await
    }

    /// Adds a task to one of the user's goals. Without an explicit index the
    /// task goes after the last task of its phase.
    pub async fn create(&self, input: TaskInput) -> Result<task::Model, AppError> {
        let user_id = self.ctx.user_id()?;
        ensure_non_empty("task title", &input.title)?;
        ensure_ordering("phase number", input.phase_number)?;
        if let Some(index) = input.order_index {
            ensure_ordering("order index", index)?;
        }

        let _guard = self.ctx.cache.mutation_lock(EntityKind::Tasks, user_id).await;
        find_owned_goal(&self.ctx.db, user_id, input.goal_id).await?;
        let order_index = match input.order_index {
            Some(index) => index,
            None => {
                let last = task::Entity::find()
                    .filter(task::Column::UserId.eq(user_id))
                    .filter(task::Column::GoalId.eq(input.goal_id))
                    .filter(task::Column::PhaseNumber.eq(input.phase_number))
                    .order_by_desc(task::Column::OrderIndex)
                    .one(&self.ctx.db)
                    .await?;
                match last {
                    Some(task) => task.order_index.checked_add(1).ok_or_else(|| {
                        AppError::InvalidInput(format!(
                            "phase {} has no order index left after {}",
                            input.phase_number, task.order_index
                        ))
                    })?,
                    None => 0,
                }
            }
        };

        let now = Utc::now();
        let active = task::ActiveModel {
            user_id: Set(user_id.to_string()),
            goal_id: Set(input.goal_id),
            title: Set(input.title.trim().to_string()),
            description: Set(input.description.filter(|text| !text.trim().is_empty())),
            phase_number: Set(input.phase_number),
            order_index: Set(order_index),
            completed: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let insert = task::Entity::insert(active).exec(&self.ctx.db).await?;
        let created = find_owned_task(&self.ctx.db, user_id, insert.last_insert_id).await?;

        self.ctx.cache.invalidate(EntityKind::Tasks, user_id);
        info!(%user_id, task_id = created.id, goal_id = created.goal_id, "task created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, changes: TaskChanges) -> Result<task::Model, AppError> {
        let user_id = self.ctx.user_id()?;
        if let Some(title) = changes.title.as_deref() {
            ensure_non_empty("task title", title)?;
        }
        if let Some(phase) = changes.phase_number {
            ensure_ordering("phase number", phase)?;
        }
        if let Some(index) = changes.order_index {
            ensure_ordering("order index", index)?;
        }

        let _guard = self.ctx.cache.mutation_lock(EntityKind::Tasks, user_id).await;
        let existing = find_owned_task(&self.ctx.db, user_id, id).await?;
        let mut active: task::ActiveModel = existing.into();
        if let Some(title) = changes.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = changes.description {
            let description = description.trim().to_string();
            active.description = Set((!description.is_empty()).then_some(description));
        }
        if let Some(phase) = changes.phase_number {
            active.phase_number = Set(phase);
        }
        if let Some(index) = changes.order_index {
            active.order_index = Set(index);
        }
        if let Some(completed) = changes.completed {
            active.completed = Set(completed);
        }
        active.updated_at = Set(Utc::now());
        let updated = task::Entity::update(active)
            .filter(task::Column::UserId.eq(user_id))
            .exec(&self.ctx.db)
            .await
            .map_err(|err| scoped_update_error(err, format!("task id {id}")))?;

        self.ctx.cache.invalidate(EntityKind::Tasks, user_id);
        info!(%user_id, task_id = id, "task updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let user_id = self.ctx.user_id()?;
        let _guard = self.ctx.cache.mutation_lock(EntityKind::Tasks, user_id).await;
        let result = task::Entity::delete_many()
            .filter(task::Column::Id.eq(id))
            .filter(task::Column::UserId.eq(user_id))
            .exec(&self.ctx.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("task id {id}")));
        }

        self.ctx.cache.invalidate(EntityKind::Tasks, user_id);
        info!(%user_id, task_id = id, "task deleted");
        Ok(())
    }
}

async fn fetch_tasks(
    db: &DatabaseConnection,
    user_id: &str,
    goal_id: Option<i64>,
) -> Result<Vec<task::Model>, AppError> {
    debug!(%user_id, ?goal_id, "fetching tasks");
    let mut select = task::Entity::find().filter(task::Column::UserId.eq(user_id));
    if let Some(goal_id) = goal_id {
        select = select.filter(task::Column::GoalId.eq(goal_id));
    }
    Ok(select
        .order_by_asc(task::Column::PhaseNumber)
        .order_by_asc(task::Column::OrderIndex)
        .order_by_asc(task::Column::Id)
        .all(db)
        .await?)
}

async fn find_owned_task(
    db: &DatabaseConnection,
    user_id: &str,
    id: i64,
) -> Result<task::Model, AppError> {
    task::Entity::find_by_id(id)
        .filter(task::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("task id {id}")))
}

fn ensure_ordering(label: &str, value: i32) -> Result<(), AppError> {
    if value < 0 {
        return Err(AppError::InvalidInput(format!(
            "{label} cannot be negative (got {value})"
        )));
    }
    Ok(())
}
