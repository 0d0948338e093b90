use std::sync::Arc;

use chrono::Utc;
use sea_orm::{EntityTrait, Set};
use tracing::{info, warn};

use crate::app::{ensure_non_empty, Context};
use crate::cache::EntityKind;
use crate::entities::promo_code;
use crate::error::AppError;
use crate::functions::{normalize_code, RedeemFunction};
use crate::model::PromoCodeInput;

/// What the redemption form needs to know after a submit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RedeemOutcome {
    pub success: bool,
    pub tokens_received: Option<i64>,
    pub message: Option<String>,
}

impl RedeemOutcome {
    fn failed(message: Option<String>) -> Self {
        Self {
            success: false,
            tokens_received: None,
            message,
        }
    }
}

#[derive(Clone)]
pub struct PromoHook {
    ctx: Arc<Context>,
    redeemer: Arc<dyn RedeemFunction>,
}

impl PromoHook {
    pub(crate) fn new(ctx: Arc<Context>, redeemer: Arc<dyn RedeemFunction>) -> Self {
        Self { ctx, redeemer }
    }

    /// Redeems `code` for the signed-in user. Blank codes and signed-out
    /// clients fail without calling the function.
    pub async fn redeem(&self, code: &str) -> RedeemOutcome {
        let code = code.trim();
        if code.is_empty() {
            return RedeemOutcome::failed(None);
        }
        let Some(user_id) = self.ctx.current_user() else {
            self.ctx
                .notices
                .error("Sign in required", "Sign in to redeem a promo code");
            return RedeemOutcome::failed(None);
        };

        let _guard = self.ctx.cache.mutation_lock(EntityKind::Profile, user_id).await;
        let response = match self.redeemer.invoke(user_id, code).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%user_id, error = %err, "promo redemption call failed");
                let message = err.to_string();
                self.ctx.notices.error("Redemption failed", message.clone());
                return RedeemOutcome::failed(Some(message));
            }
        };
        if let Some(error) = response.error {
            warn!(%user_id, %error, "promo code rejected");
            self.ctx.notices.error("Redemption failed", error.clone());
            return RedeemOutcome::failed(Some(error));
        }

        let tokens = response.tokens_received.unwrap_or(0);
        let message = response
            .message
            .unwrap_or_else(|| format!("You received {tokens} tokens"));
        self.ctx
            .notices
            .success("Promo code redeemed", message.clone());
        self.ctx.cache.invalidate(EntityKind::Profile, user_id);
        info!(%user_id, tokens, "promo code redeemed");
        RedeemOutcome {
            success: true,
            tokens_received: Some(tokens),
            message: Some(message),
        }
    }

    /// Registers a code with the local backend.
    pub async fn create_code(&self, input: PromoCodeInput) -> Result<promo_code::Model, AppError> {
        ensure_non_empty("promo code", &input.code)?;
        if input.tokens <= 0 {
            return Err(AppError::InvalidInput(format!(
                "promo tokens must be positive (got {})",
                input.tokens
            )));
        }
        if let Some(max_uses) = input.max_uses {
            if max_uses <= 0 {
                return Err(AppError::InvalidInput(format!(
                    "max uses must be positive (got {max_uses})"
                )));
            }
        }
        let code = normalize_code(&input.code);
        if promo_code::Entity::find_by_id(code.clone())
            .one(&self.ctx.db)
            .await?
            .is_some()
        {
            return Err(AppError::InvalidInput(format!(
                "promo code {code} already exists"
            )));
        }

        let expires_at = input
            .expires_on
            .and_then(|date| date.and_hms_opt(23, 59, 59))
            .map(|at| at.and_utc());
        let active = promo_code::ActiveModel {
            code: Set(code.clone()),
            tokens: Set(input.tokens),
            max_uses: Set(input.max_uses),
            uses: Set(0),
            expires_at: Set(expires_at),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        };
        promo_code::Entity::insert(active)
            .exec_without_returning(&self.ctx.db)
            .await?;
        info!(%code, tokens = input.tokens, "promo code created");
        promo_code::Entity::find_by_id(code.clone())
            .one(&self.ctx.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("promo code {code}")))
    }
}
