pub mod daily_plan;
pub mod goal;
pub mod profile;
pub mod promo_code;
pub mod promo_redemption;
pub mod task;
