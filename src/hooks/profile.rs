use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use tracing::{debug, info};

use crate::app::Context;
use crate::cache::{CacheKey, EntityKind};
use crate::entities::profile;
use crate::error::AppError;
use crate::model::{clamp_reminder_days, ReminderPreference, DEFAULT_REMINDER_DAYS};
use crate::notify::Notifier;

#[derive(Clone)]
pub struct ProfileHook {
    ctx: Arc<Context>,
}

impl ProfileHook {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    pub fn notices(&self) -> &Notifier {
        &self.ctx.notices
    }

    pub async fn get(&self) -> Result<Arc<profile::Model>, AppError> {
        let user_id = self.ctx.user_id()?;
        self.ctx
            .cache
            .load(CacheKey::new(EntityKind::Profile, user_id), || {
                fetch_profile(&self.ctx.db, user_id)
            })
            .await
    }

    /// Persists both reminder settings. The interval is clamped first.
    pub async fn update_reminders(
        &self,
        preference: ReminderPreference,
    ) -> Result<profile::Model, AppError> {
        let days = clamp_reminder_days(preference.interval_days);
        self.write(|active| {
            active.reminders_enabled = Set(preference.enabled);
            active.reminder_interval_days = Set(days as i32);
        })
        .await
    }

    pub async fn update_reminder_days(&self, days: i64) -> Result<profile::Model, AppError> {
        let days = clamp_reminder_days(days);
        self.write(|active| {
            active.reminder_interval_days = Set(days as i32);
        })
        .await
    }

    pub async fn update_display_name(
        &self,
        name: Option<String>,
    ) -> Result<profile::Model, AppError> {
        let name = name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        self.write(|active| {
            active.display_name = Set(name);
        })
        .await
    }

    /// Drops the cached profile so the next read sees backend-side changes
    /// such as a new token balance.
    pub fn refresh(&self) -> Result<(), AppError> {
        let user_id = self.ctx.user_id()?;
        self.ctx.cache.invalidate(EntityKind::Profile, user_id);
        Ok(())
    }

    async fn write<F>(&self, apply: F) -> Result<profile::Model, AppError>
    where
        F: FnOnce(&mut profile::ActiveModel),
    {
        let user_id = self.ctx.user_id()?;
        let _guard = self.ctx.cache.mutation_lock(EntityKind::Profile, user_id).await;
        let existing = ensure_profile_with_conn(&self.ctx.db, user_id).await?;
        let mut active: profile::ActiveModel = existing.into();
        apply(&mut active);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&self.ctx.db).await?;

        self.ctx.cache.invalidate(EntityKind::Profile, user_id);
        info!(%user_id, "profile updated");
        Ok(updated)
    }
}

async fn fetch_profile(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<profile::Model, AppError> {
    debug!(%user_id, "fetching profile");
    Ok(ensure_profile_with_conn(db, user_id).await?)
}

/// Returns the user's profile, creating the default row on first access.
pub(crate) async fn ensure_profile_with_conn<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
) -> Result<profile::Model, DbErr> {
    if let Some(existing) = profile::Entity::find_by_id(user_id.to_string()).one(db).await? {
        return Ok(existing);
    }
    let now = Utc::now();
    let active = profile::ActiveModel {
        user_id: Set(user_id.to_string()),
        display_name: Set(None),
        reminders_enabled: Set(false),
        reminder_interval_days: Set(DEFAULT_REMINDER_DAYS as i32),
        token_balance: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };
    profile::Entity::insert(active)
        .on_conflict(
            OnConflict::column(profile::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    profile::Entity::find_by_id(user_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("profile {user_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{setup_app, TEST_USER};
    use crate::app::App;

    #[tokio::test]
    async fn first_read_creates_default_profile() {
        let (_dir, app) = setup_app().await;
        let profile = app.profile().get().await.expect("profile");
        assert_eq!(profile.user_id, TEST_USER);
        assert!(!profile.reminders_enabled);
        assert_eq!(i64::from(profile.reminder_interval_days), DEFAULT_REMINDER_DAYS);
        assert_eq!(profile.token_balance, 0);

        let again = app.profile().get().await.expect("profile");
        assert_eq!(again.created_at, profile.created_at);
    }

    #[tokio::test]
    async fn reminder_interval_is_clamped_before_persisting() {
        let (_dir, app) = setup_app().await;
        let saved = app
            .profile()
            .update_reminders(ReminderPreference {
                enabled: true,
                interval_days: 365,
            })
            .await
            .expect("update");
        assert!(saved.reminders_enabled);
        assert_eq!(saved.reminder_interval_days, 90);

        let saved = app.profile().update_reminder_days(2).await.expect("update");
        assert_eq!(saved.reminder_interval_days, 7);
        assert!(saved.reminders_enabled);

        let stored = profile::Entity::find_by_id(TEST_USER.to_string())
            .one(app.db())
            .await
            .expect("query")
            .expect("row");
        assert_eq!(stored.reminder_interval_days, 7);
    }

    #[tokio::test]
    async fn writes_refresh_cached_profile() {
        let (_dir, app) = setup_app().await;
        let before = app.profile().get().await.expect("profile");
        assert_eq!(before.display_name, None);

        app.profile()
            .update_display_name(Some("  Ada ".to_string()))
            .await
            .expect("rename");

        let after = app.profile().get().await.expect("profile");
        assert_eq!(after.display_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn signed_out_profile_access_fails() {
        let (_dir, app) = setup_app().await;
        let anonymous = App::new(app.db().clone(), None);
        assert!(matches!(
            anonymous.profile().get().await.unwrap_err(),
            AppError::Unauthenticated
        ));
        assert!(matches!(
            anonymous.profile().refresh().unwrap_err(),
            AppError::Unauthenticated
        ));
    }
}
