use sea_orm::entity::prelude::*;

use super::{daily_plan, task};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "goals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub deadline: Date,
    pub is_active: bool,
    pub feasibility_status: String,
    pub achievement_plan: Option<String>,
    pub selected_approach_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Task,
    DailyPlan,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Task => Entity::has_many(task::Entity).into(),
            Self::DailyPlan => Entity::has_many(daily_plan::Entity).into(),
        }
    }
}

impl Related<task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl Related<daily_plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DailyPlan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
