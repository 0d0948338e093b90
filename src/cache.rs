//! Query cache owned by an [`crate::app::App`] context.
//!
//! Entries are keyed by entity, user and an optional sub-scope (for example a
//! goal filter on the task list). Invalidation always drops every scope of an
//! (entity, user) pair and bumps its generation so that a fetch which started
//! earlier cannot write stale rows back.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::AppError;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EntityKind {
    Goals,
    Tasks,
    DailyPlans,
    Profile,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Goals => "goals",
            Self::Tasks => "tasks",
            Self::DailyPlans => "daily_plans",
            Self::Profile => "profile",
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CacheKey {
    pub entity: EntityKind,
    pub user_id: String,
    pub scope: Option<String>,
}

impl CacheKey {
    pub fn new(entity: EntityKind, user_id: &str) -> Self {
        Self {
            entity,
            user_id: user_id.to_string(),
            scope: None,
        }
    }

    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    fn slot(&self) -> Slot {
        (self.entity, self.user_id.clone())
    }
}

type Slot = (EntityKind, String);
type Entry = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, Entry>,
    generations: HashMap<Slot, u64>,
    locks: HashMap<Slot, Arc<AsyncMutex<()>>>,
}

#[derive(Default)]
pub struct QueryCache {
    state: Mutex<CacheState>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &CacheKey) -> Option<Arc<T>> {
        let entry = self.state().entries.get(key).cloned()?;
        entry.downcast::<T>().ok()
    }

    pub fn generation(&self, entity: EntityKind, user_id: &str) -> u64 {
        self.state()
            .generations
            .get(&(entity, user_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Stores `value` unless the slot was invalidated after `generation` was
    /// read. The value is returned to the caller either way.
    pub fn put<T: Any + Send + Sync>(&self, key: CacheKey, generation: u64, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut state = self.state();
        let current = state.generations.get(&key.slot()).copied().unwrap_or(0);
        if current == generation {
            state.entries.insert(key, value.clone() as Entry);
        } else {
            debug!(
                entity = key.entity.as_str(),
                user_id = %key.user_id,
                "discarding fetch that raced an invalidation"
            );
        }
        value
    }

    pub fn invalidate(&self, entity: EntityKind, user_id: &str) {
        let mut state = self.state();
        state
            .entries
            .retain(|key, _| !(key.entity == entity && key.user_id == user_id));
        *state
            .generations
            .entry((entity, user_id.to_string()))
            .or_insert(0) += 1;
        debug!(entity = entity.as_str(), %user_id, "cache invalidated");
    }

    /// Serialises mutations of one (entity, user) pair.
    pub async fn mutation_lock(&self, entity: EntityKind, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut state = self.state();
            state
                .locks
                .entry((entity, user_id.to_string()))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Returns the cached value for `key`, or runs `fetch` and caches it.
    pub async fn load<T, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Arc<T>, AppError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(hit) = self.get::<T>(&key) {
            debug!(entity = key.entity.as_str(), user_id = %key.user_id, "cache hit");
            return Ok(hit);
        }
        let generation = self.generation(key.entity, &key.user_id);
        let value = fetch().await?;
        Ok(self.put(key, generation, value))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn invalidate_drops_all_scopes_of_one_user() {
        let cache = QueryCache::new();
        let plain = CacheKey::new(EntityKind::Tasks, "u1");
        let scoped = CacheKey::new(EntityKind::Tasks, "u1").scoped("goal:3");
        let other_user = CacheKey::new(EntityKind::Tasks, "u2");
        let other_entity = CacheKey::new(EntityKind::Goals, "u1");
        for key in [&plain, &scoped, &other_user, &other_entity] {
            cache.put(key.clone(), 0, vec![1u8]);
        }
        assert_eq!(cache.len(), 4);

        cache.invalidate(EntityKind::Tasks, "u1");

        assert!(cache.get::<Vec<u8>>(&plain).is_none());
        assert!(cache.get::<Vec<u8>>(&scoped).is_none());
        assert!(cache.get::<Vec<u8>>(&other_user).is_some());
        assert!(cache.get::<Vec<u8>>(&other_entity).is_some());
    }

    #[test]
    fn get_with_wrong_type_misses() {
        let cache = QueryCache::new();
        let key = CacheKey::new(EntityKind::Profile, "u1");
        cache.put(key.clone(), 0, 5i64);
        assert!(cache.get::<String>(&key).is_none());
        assert_eq!(cache.get::<i64>(&key).as_deref(), Some(&5));
    }

    #[test]
    fn stale_generation_is_not_stored() {
        let cache = QueryCache::new();
        let key = CacheKey::new(EntityKind::Goals, "u1");
        let generation = cache.generation(EntityKind::Goals, "u1");
        cache.invalidate(EntityKind::Goals, "u1");

        let returned = cache.put(key.clone(), generation, "old".to_string());

        assert_eq!(returned.as_str(), "old");
        assert!(cache.get::<String>(&key).is_none());
    }

    #[tokio::test]
    async fn load_fetches_once_until_invalidated() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);
        let key = CacheKey::new(EntityKind::DailyPlans, "u1");

        for _ in 0..3 {
            let value = cache
                .load(key.clone(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, AppError>(7u32)
                })
                .await
                .expect("load");
            assert_eq!(*value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(EntityKind::DailyPlans, "u1");
        cache
            .load(key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AppError>(8u32)
            })
            .await
            .expect("reload");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn mutation_lock_serialises_same_key() {
        let cache = Arc::new(QueryCache::new());
        let guard = cache.mutation_lock(EntityKind::Goals, "u1").await;

        let other_key = cache.mutation_lock(EntityKind::Goals, "u2");
        let other_key = tokio::time::timeout(Duration::from_millis(50), other_key).await;
        assert!(other_key.is_ok(), "different user must not wait");

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move {
                let _guard = cache.mutation_lock(EntityKind::Goals, "u1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter finished")
            .expect("join");
    }
}
