//! Data hooks: user-scoped adapters over the table store.
//!
//! Every hook filters by the authenticated user, and every successful
//! mutation invalidates the cached lists of the entities it touched. Failed
//! mutations are returned to the caller untouched; nothing is retried.

pub mod daily_plans;
pub mod goals;
pub mod profile;
pub mod promo;
pub mod tasks;

pub use daily_plans::DailyPlansHook;
pub use goals::GoalsHook;
pub use profile::ProfileHook;
pub use promo::{PromoHook, RedeemOutcome};
pub use tasks::TasksHook;
