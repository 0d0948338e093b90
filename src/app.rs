use std::sync::Arc;

use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr};

use crate::cache::QueryCache;
use crate::error::AppError;
use crate::functions::{LocalRedeemFunction, RedeemFunction};
use crate::hooks::{DailyPlansHook, GoalsHook, ProfileHook, PromoHook, TasksHook};
use crate::notify::Notifier;

/// State shared by every hook of one signed-in client.
pub struct Context {
    pub(crate) db: DatabaseConnection,
    pub(crate) cache: QueryCache,
    pub(crate) notices: Notifier,
    user_id: Option<String>,
}

impl Context {
    pub fn new(db: DatabaseConnection, user_id: Option<String>) -> Self {
        Self {
            db,
            cache: QueryCache::new(),
            notices: Notifier::new(),
            user_id,
        }
    }

    pub fn current_user(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn user_id(&self) -> Result<&str, AppError> {
        self.current_user().ok_or(AppError::Unauthenticated)
    }
}

pub struct App {
    ctx: Arc<Context>,
    redeemer: Arc<dyn RedeemFunction>,
}

impl App {
    pub fn new(db: DatabaseConnection, user_id: Option<String>) -> Self {
        let redeemer = Arc::new(LocalRedeemFunction::new(db.clone()));
        Self {
            ctx: Arc::new(Context::new(db, user_id)),
            redeemer,
        }
    }

    pub fn with_redeemer(mut self, redeemer: Arc<dyn RedeemFunction>) -> Self {
        self.redeemer = redeemer;
        self
    }

    pub fn notices(&self) -> &Notifier {
        &self.ctx.notices
    }

    #[cfg(test)]
    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.ctx.db
    }

    pub fn goals(&self) -> GoalsHook {
        GoalsHook::new(self.ctx.clone())
    }

    pub fn tasks(&self) -> TasksHook {
        TasksHook::new(self.ctx.clone())
    }

    pub fn daily_plans(&self) -> DailyPlansHook {
        DailyPlansHook::new(self.ctx.clone())
    }

    pub fn profile(&self) -> ProfileHook {
        ProfileHook::new(self.ctx.clone())
    }

    pub fn promo(&self) -> PromoHook {
        PromoHook::new(self.ctx.clone(), self.redeemer.clone())
    }
}

pub(crate) async fn finalize_transaction<T>(
    txn: DatabaseTransaction,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                return Err(rollback_err.into());
            }
            Err(err)
        }
    }
}

/// An owner-scoped update that matched no row reports the record as missing.
pub(crate) fn scoped_update_error(err: DbErr, what: String) -> AppError {
    match err {
        DbErr::RecordNotUpdated => AppError::NotFound(what),
        err => err.into(),
    }
}

pub(crate) fn ensure_non_empty(label: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{label} cannot be empty")));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    pub const TEST_USER: &str = "user-a";
    pub const OTHER_USER: &str = "user-b";

    pub async fn setup_db() -> (TempDir, DatabaseConnection) {
        let dir = TempDir::new().expect("temp dir");
        let db_path = db::resolve_db_path(dir.path());
        db::ensure_parent_dir(&db_path).expect("ensure parent");
        let db = db::connect(&db_path).await.expect("connect db");
        db::ensure_schema(&db).await.expect("ensure schema");
        (dir, db)
    }

    pub async fn setup_app() -> (TempDir, App) {
        let (dir, db) = setup_db().await;
        (dir, App::new(db, Some(TEST_USER.to_string())))
    }
}
