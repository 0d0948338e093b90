use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tracing::{debug, info};

use crate::app::{ensure_non_empty, scoped_update_error, Context};
use crate::cache::{CacheKey, EntityKind};
use crate::entities::daily_plan;
use crate::error::AppError;
use crate::hooks::goals::find_owned_goal;
use crate::model::{today_string, DailyPlanChanges, DailyPlanInput, DATE_FORMAT};

#[derive(Clone)]
pub struct DailyPlansHook {
    ctx: Arc<Context>,
}

impl DailyPlansHook {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Plans of the signed-in user, latest date first.
    pub async fn list(&self) -> Result<Arc<Vec<daily_plan::Model>>, AppError> {
        let user_id = self.ctx.user_id()?;
        self.ctx
            .cache
            .load(CacheKey::new(EntityKind::DailyPlans, user_id), || {
                fetch_daily_plans(&self.ctx.db, user_id)
            })
            .await
    }

    /// The plan whose date string equals the local date, if any.
    pub async fn today(&self) -> Result<Option<daily_plan::Model>, AppError> {
        self.for_date(&today_string()).await
    }

    pub async fn for_date(&self, date: &str) -> Result<Option<daily_plan::Model>, AppError> {
        let plans = self.list().await?;
        Ok(plans.iter().find(|plan| plan.plan_date == date).cloned())
    }

    pub async fn create(&self, input: DailyPlanInput) -> Result<daily_plan::Model, AppError> {
        let user_id = self.ctx.user_id()?;
        ensure_non_empty("plan summary", &input.summary)?;
        ensure_minutes(input.planned_minutes)?;
        let plan_date = match input.plan_date {
            Some(date) => date.format(DATE_FORMAT).to_string(),
            None => today_string(),
        };

        let _guard = self
            .ctx
            .cache
            .mutation_lock(EntityKind::DailyPlans, user_id)
            .await;
        if let Some(goal_id) = input.goal_id {
            find_owned_goal(&self.ctx.db, user_id, goal_id).await?;
        }
        let now = Utc::now();
        let active = daily_plan::ActiveModel {
            user_id: Set(user_id.to_string()),
            plan_date: Set(plan_date),
            goal_id: Set(input.goal_id),
            summary: Set(input.summary.trim().to_string()),
            planned_minutes: Set(input.planned_minutes),
            completed: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let insert = daily_plan::Entity::insert(active).exec(&self.ctx.db).await?;
        let created = find_owned_plan(&self.ctx.db, user_id, insert.last_insert_id).await?;

        self.ctx.cache.invalidate(EntityKind::DailyPlans, user_id);
        info!(%user_id, plan_id = created.id, date = %created.plan_date, "daily plan created");
        Ok(created)
    }

    pub async fn update(
        &self,
        id: i64,
        changes: DailyPlanChanges,
    ) -> Result<daily_plan::Model, AppError> {
        let user_id = self.ctx.user_id()?;
        if let Some(summary) = changes.summary.as_deref() {
            ensure_non_empty("plan summary", summary)?;
        }
        ensure_minutes(changes.planned_minutes)?;

        let _guard = self
            .ctx
            .cache
            .mutation_lock(EntityKind::DailyPlans, user_id)
            .await;
        let existing = find_owned_plan(&self.ctx.db, user_id, id).await?;
        let mut active: daily_plan::ActiveModel = existing.into();
        if let Some(summary) = changes.summary {
            active.summary = Set(summary.trim().to_string());
        }
        if let Some(minutes) = changes.planned_minutes {
            active.planned_minutes = Set(Some(minutes));
        }
        if let Some(completed) = changes.completed {
            active.completed = Set(completed);
        }
        active.updated_at = Set(Utc::now());
        let updated = daily_plan::Entity::update(active)
            .filter(daily_plan::Column::UserId.eq(user_id))
            .exec(&self.ctx.db)
            .await
            .map_err(|err| scoped_update_error(err, format!("daily plan id {id}")))?;

        self.ctx.cache.invalidate(EntityKind::DailyPlans, user_id);
        info!(%user_id, plan_id = id, "daily plan updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let user_id = self.ctx.user_id()?;
        let _guard = self
            .ctx
            .cache
            .mutation_lock(EntityKind::DailyPlans, user_id)
            .await;
        let result = daily_plan::Entity::delete_many()
            .filter(daily_plan::Column::Id.eq(id))
            .filter(daily_plan::Column::UserId.eq(user_id))
            .exec(&self.ctx.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("daily plan id {id}")));
        }

        self.ctx.cache.invalidate(EntityKind::DailyPlans, user_id);
        info!(%user_id, plan_id = id, "daily plan deleted");
        Ok(())
    }
}

async fn fetch_daily_plans(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<daily_plan::Model>, AppError> {
    debug!(%user_id, "fetching daily plans");
    Ok(daily_plan::Entity::find()
        .filter(daily_plan::Column::UserId.eq(user_id))
        .order_by_desc(daily_plan::Column::PlanDate)
        .order_by_desc(daily_plan::Column::CreatedAt)
        .order_by_desc(daily_plan::Column::Id)
        .all(db)
        .await?)
}

async fn find_owned_plan(
    db: &DatabaseConnection,
    user_id: &str,
    id: i64,
) -> Result<daily_plan::Model, AppError> {
    daily_plan::Entity::find_by_id(id)
        .filter(daily_plan::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("daily plan id {id}")))
}

fn ensure_minutes(minutes: Option<i32>) -> Result<(), AppError> {
    match minutes {
        Some(value) if value < 0 => Err(AppError::InvalidInput(format!(
            "planned minutes cannot be negative (got {value})"
        ))),
        _ => Ok(()),
    }
}
