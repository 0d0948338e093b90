//! Form state that sits between user input and the hooks.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::AppError;
use crate::hooks::{ProfileHook, PromoHook, RedeemOutcome};
use crate::model::{clamp_reminder_days, ReminderPreference};

/// How long the "redeemed" confirmation stays up after a successful submit.
pub const REDEEMED_RESET_DELAY: Duration = Duration::from_millis(3000);

/// Local copy of the reminder settings with optimistic toggling.
pub struct ReminderForm {
    hook: ProfileHook,
    enabled: bool,
    interval_days: i64,
}

impl ReminderForm {
    pub fn new(hook: ProfileHook, enabled: bool, interval_days: i64) -> Self {
        Self {
            hook,
            enabled,
            interval_days: clamp_reminder_days(interval_days),
        }
    }

    pub async fn load(hook: ProfileHook) -> Result<Self, AppError> {
        let profile = hook.get().await?;
        Ok(Self::new(
            hook,
            profile.reminders_enabled,
            i64::from(profile.reminder_interval_days),
        ))
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn interval_days(&self) -> i64 {
        self.interval_days
    }

    /// Flips reminders on or off. Returns whether the change was saved; on
    /// failure the flag is restored and an error notice is raised.
    pub async fn toggle(&mut self) -> bool {
        let previous = self.enabled;
        self.enabled = !previous;
        let preference = ReminderPreference {
            enabled: self.enabled,
            interval_days: self.interval_days,
        };
        match self.hook.update_reminders(preference).await {
            Ok(saved) => {
                self.interval_days = i64::from(saved.reminder_interval_days);
                let description = if saved.reminders_enabled {
                    format!("You will be reminded every {} days", self.interval_days)
                } else {
                    "Reminders are turned off".to_string()
                };
                self.hook.notices().success("Reminders updated", description);
                true
            }
            Err(err) => {
                self.enabled = previous;
                self.hook
                    .notices()
                    .error("Could not update reminders", err.to_string());
                false
            }
        }
    }

    /// Stores a new interval. Failures are logged and otherwise ignored.
    pub async fn set_interval_days(&mut self, days: i64) {
        self.interval_days = clamp_reminder_days(days);
        if let Err(err) = self.hook.update_reminder_days(self.interval_days).await {
            debug!(error = %err, days = self.interval_days, "reminder interval not saved");
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RedeemFormState {
    pub code: String,
    pub redeeming: bool,
    pub redeemed: bool,
}

/// Promo code input with a short-lived success flag.
pub struct RedeemForm {
    hook: PromoHook,
    state: Arc<Mutex<RedeemFormState>>,
    reset: Option<JoinHandle<()>>,
}

fn lock_state(state: &Mutex<RedeemFormState>) -> MutexGuard<'_, RedeemFormState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RedeemForm {
    pub fn new(hook: PromoHook) -> Self {
        Self {
            hook,
            state: Arc::new(Mutex::new(RedeemFormState::default())),
            reset: None,
        }
    }

    pub fn set_code(&self, code: impl Into<String>) {
        lock_state(&self.state).code = code.into();
    }

    pub fn state(&self) -> RedeemFormState {
        lock_state(&self.state).clone()
    }

    pub async fn submit(&mut self) -> RedeemOutcome {
        let code = {
            let mut state = lock_state(&self.state);
            if state.redeeming {
                return RedeemOutcome::default();
            }
            state.redeeming = true;
            state.code.clone()
        };

        let outcome = self.hook.redeem(&code).await;

        {
            let mut state = lock_state(&self.state);
            state.redeeming = false;
            if outcome.success {
                state.code.clear();
                state.redeemed = true;
            }
        }
        if outcome.success {
            self.schedule_reset();
        }
        outcome
    }

    fn schedule_reset(&mut self) {
        if let Some(previous) = self.reset.take() {
            previous.abort();
        }
        let state = self.state.clone();
        self.reset = Some(tokio::spawn(async move {
            tokio::time::sleep(REDEEMED_RESET_DELAY).await;
            lock_state(&state).redeemed = false;
        }));
    }
}

impl Drop for RedeemForm {
    fn drop(&mut self) {
        if let Some(reset) = self.reset.take() {
            reset.abort();
        }
    }
}
