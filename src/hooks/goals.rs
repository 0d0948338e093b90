use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, Value,
};
use tracing::{debug, info};

use crate::app::{ensure_non_empty, finalize_transaction, scoped_update_error, Context};
use crate::cache::{CacheKey, EntityKind};
use crate::entities::{daily_plan, goal, task};
use crate::error::AppError;
use crate::model::{AchievementPlan, FeasibilityStatus, GoalChanges, GoalInput};

#[derive(Clone)]
pub struct GoalsHook {
    ctx: Arc<Context>,
}

impl GoalsHook {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Active goals of the signed-in user, newest first.
    pub async fn list(&self) -> Result<Arc<Vec<goal::Model>>, AppError> {
        let user_id = self.ctx.user_id()?;
        self.ctx
            .cache
            .load(CacheKey::new(EntityKind::Goals, user_id), || {
                fetch_active_goals(&self.ctx.db, user_id)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<goal::Model, AppError> {
        let user_id = self.ctx.user_id()?;
        find_owned_goal(&self.ctx.db, user_id, id).await
    }

    pub async fn create(&self, input: GoalInput) -> Result<goal::Model, AppError> {
        let user_id = self.ctx.user_id()?;
        ensure_non_empty("goal title", &input.title)?;
        if let Some(plan) = input.achievement_plan.as_deref() {
            validate_achievement_plan(plan)?;
        }

        let _guard = self.ctx.cache.mutation_lock(EntityKind::Goals, user_id).await;
        let now = Utc::now();
        let active = goal::ActiveModel {
            user_id: Set(user_id.to_string()),
            title: Set(input.title.trim().to_string()),
            deadline: Set(input.deadline),
            is_active: Set(true),
            feasibility_status: Set(input
                .feasibility
                .unwrap_or(FeasibilityStatus::Pending)
                .as_str()
                .to_string()),
            achievement_plan: Set(input.achievement_plan),
            selected_approach_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let insert = goal::Entity::insert(active).exec(&self.ctx.db).await?;
        let created = find_owned_goal(&self.ctx.db, user_id, insert.last_insert_id).await?;

        self.ctx.cache.invalidate(EntityKind::Goals, user_id);
        info!(%user_id, goal_id = created.id, "goal created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, changes: GoalChanges) -> Result<goal::Model, AppError> {
        let user_id = self.ctx.user_id()?;
        if let Some(title) = changes.title.as_deref() {
            ensure_non_empty("goal title", title)?;
        }
        if let Some(plan) = changes.achievement_plan.as_deref() {
            validate_achievement_plan(plan)?;
        }

        let _guard = self.ctx.cache.mutation_lock(EntityKind::Goals, user_id).await;
        let existing = find_owned_goal(&self.ctx.db, user_id, id).await?;
        if let Some(approach_id) = changes.selected_approach_id.as_deref() {
            let plan = changes
                .achievement_plan
                .as_deref()
                .or(existing.achievement_plan.as_deref());
            ensure_approach_exists(plan, approach_id)?;
        }

        let mut active: goal::ActiveModel = existing.into();
        if let Some(title) = changes.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(deadline) = changes.deadline {
            active.deadline = Set(deadline);
        }
        if let Some(feasibility) = changes.feasibility {
            active.feasibility_status = Set(feasibility.as_str().to_string());
        }
        if let Some(plan) = changes.achievement_plan {
            active.achievement_plan = Set(Some(plan));
        }
        if let Some(approach_id) = changes.selected_approach_id {
            active.selected_approach_id = Set(Some(approach_id.trim().to_string()));
        }
        active.updated_at = Set(Utc::now());
        let updated = update_owned_goal(&self.ctx.db, user_id, id, active).await?;

        self.ctx.cache.invalidate(EntityKind::Goals, user_id);
        info!(%user_id, goal_id = id, "goal updated");
        Ok(updated)
    }

    /// Marks the goal inactive; it stays readable through [`Self::get`].
    pub async fn archive(&self, id: i64) -> Result<goal::Model, AppError> {
        let user_id = self.ctx.user_id()?;
        let _guard = self.ctx.cache.mutation_lock(EntityKind::Goals, user_id).await;
        let existing = find_owned_goal(&self.ctx.db, user_id, id).await?;
        if !existing.is_active {
            return Ok(existing);
        }
        let mut active: goal::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());
        let archived = update_owned_goal(&self.ctx.db, user_id, id, active).await?;

        self.ctx.cache.invalidate(EntityKind::Goals, user_id);
        info!(%user_id, goal_id = id, "goal archived");
        Ok(archived)
    }

    /// Deletes the goal with its tasks. Daily plans that pointed at it keep
    /// existing without a goal.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let user_id = self.ctx.user_id()?;
        let _goals = self.ctx.cache.mutation_lock(EntityKind::Goals, user_id).await;
        let _tasks = self.ctx.cache.mutation_lock(EntityKind::Tasks, user_id).await;
        let _plans = self
            .ctx
            .cache
            .mutation_lock(EntityKind::DailyPlans, user_id)
            .await;

        let txn = self.ctx.db.begin().await?;
        let result: Result<(), AppError> = async {
            find_owned_goal(&txn, user_id, id).await?;
            task::Entity::delete_many()
                .filter(task::Column::GoalId.eq(id))
                .filter(task::Column::UserId.eq(user_id))
                .exec(&txn)
                .await?;
            daily_plan::Entity::update_many()
                .col_expr(daily_plan::Column::GoalId, Expr::value(Value::BigInt(None)))
                .filter(daily_plan::Column::GoalId.eq(id))
                .filter(daily_plan::Column::UserId.eq(user_id))
                .exec(&txn)
                .await?;
            goal::Entity::delete_many()
                .filter(goal::Column::Id.eq(id))
                .filter(goal::Column::UserId.eq(user_id))
                .exec(&txn)
                .await?;
            Ok(())
        }
        .await;
        finalize_transaction(txn, result).await?;

        self.ctx.cache.invalidate(EntityKind::Goals, user_id);
        self.ctx.cache.invalidate(EntityKind::Tasks, user_id);
        self.ctx.cache.invalidate(EntityKind::DailyPlans, user_id);
        info!(%user_id, goal_id = id, "goal deleted");
        Ok(())
    }
}

async fn fetch_active_goals(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<goal::Model>, AppError> {
    debug!(%user_id, "fetching active goals");
    Ok(goal::Entity::find()
        .filter(goal::Column::UserId.eq(user_id))
        .filter(goal::Column::IsActive.eq(true))
        .order_by_desc(goal::Column::CreatedAt)
        .order_by_desc(goal::Column::Id)
        .all(db)
        .await?)
}

pub(crate) async fn find_owned_goal<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    id: i64,
) -> Result<goal::Model, AppError> {
    goal::Entity::find_by_id(id)
        .filter(goal::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("goal id {id}")))
}

/// Writes `active` only if the row still belongs to `user_id`.
async fn update_owned_goal<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    id: i64,
    active: goal::ActiveModel,
) -> Result<goal::Model, AppError> {
    goal::Entity::update(active)
        .filter(goal::Column::UserId.eq(user_id))
        .exec(db)
        .await
        .map_err(|err| scoped_update_error(err, format!("goal id {id}")))
}

fn validate_achievement_plan(raw: &str) -> Result<(), AppError> {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(|_| ())
        .map_err(|err| AppError::InvalidInput(format!("achievement plan is not valid JSON: {err}")))
}

fn ensure_approach_exists(plan: Option<&str>, approach_id: &str) -> Result<(), AppError> {
    ensure_non_empty("approach id", approach_id)?;
    let Some(plan) = plan.and_then(AchievementPlan::parse) else {
        return Ok(());
    };
    if plan.approaches.is_empty() || plan.approach(approach_id.trim()).is_some() {
        return Ok(());
    }
    let known: Vec<&str> = plan
        .approaches
        .iter()
        .map(|approach| approach.id.as_str())
        .collect();
    Err(AppError::InvalidInput(format!(
        "approach `{}` is not part of the achievement plan (known: {})",
        approach_id.trim(),
        known.join(", ")
    )))
}
