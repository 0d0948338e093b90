//! Serverless functions the client calls. Only promo redemption exists.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::entities::{profile, promo_code, promo_redemption};
use crate::hooks::profile::ensure_profile_with_conn;

pub const REDEEM_FUNCTION_NAME: &str = "redeem-promo-code";
pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("function returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend error: {0}")]
    Backend(#[from] sea_orm::DbErr),
    #[error("invalid function url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_received: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RedeemResponse {
    fn rejected(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait RedeemFunction: Send + Sync {
    async fn invoke(&self, user_id: &str, code: &str) -> Result<RedeemResponse, FunctionError>;
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Runs redemption against the local table store in one transaction.
pub struct LocalRedeemFunction {
    db: DatabaseConnection,
}

impl LocalRedeemFunction {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RedeemFunction for LocalRedeemFunction {
    async fn invoke(&self, user_id: &str, code: &str) -> Result<RedeemResponse, FunctionError> {
        let code = normalize_code(code);
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let Some(promo) = promo_code::Entity::find_by_id(code.clone()).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(RedeemResponse::rejected("Invalid promo code"));
        };
        if !promo.is_active {
            txn.rollback().await?;
            return Ok(RedeemResponse::rejected("Invalid promo code"));
        }
        if promo.expires_at.is_some_and(|expires_at| expires_at <= now) {
            txn.rollback().await?;
            return Ok(RedeemResponse::rejected("This promo code has expired"));
        }
        if promo.max_uses.is_some_and(|max_uses| promo.uses >= max_uses) {
            txn.rollback().await?;
            return Ok(RedeemResponse::rejected(
                "This promo code has reached its usage limit",
            ));
        }
        let already = promo_redemption::Entity::find()
            .filter(promo_redemption::Column::Code.eq(code.as_str()))
            .filter(promo_redemption::Column::UserId.eq(user_id))
            .one(&txn)
            .await?;
        if already.is_some() {
            txn.rollback().await?;
            return Ok(RedeemResponse::rejected(
                "You have already redeemed this promo code",
            ));
        }

        let tokens = promo.tokens;
        let current = ensure_profile_with_conn(&txn, user_id).await?;
        let (Some(uses), Some(balance)) = (
            promo.uses.checked_add(1),
            current.token_balance.checked_add(tokens),
        ) else {
            txn.rollback().await?;
            return Ok(RedeemResponse::rejected(
                "This promo code cannot be applied to your balance",
            ));
        };

        let redemption = promo_redemption::ActiveModel {
            code: Set(code.clone()),
            user_id: Set(user_id.to_string()),
            tokens: Set(tokens),
            redeemed_at: Set(now),
            ..Default::default()
        };
        promo_redemption::Entity::insert(redemption).exec(&txn).await?;

        let mut promo_active: promo_code::ActiveModel = promo.into();
        promo_active.uses = Set(uses);
        promo_active.update(&txn).await?;

        let mut profile_active: profile::ActiveModel = current.into();
        profile_active.token_balance = Set(balance);
        profile_active.updated_at = Set(now);
        profile_active.update(&txn).await?;

        txn.commit().await?;
        debug!(%user_id, %code, tokens, "promo code redeemed");
        Ok(RedeemResponse {
            tokens_received: Some(tokens),
            message: Some(format!("Added {tokens} tokens to your balance")),
            error: None,
        })
    }
}

/// Calls the hosted redemption function over HTTP.
pub struct HttpRedeemFunction {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpRedeemFunction {
    pub fn new(base: &Url) -> Result<Self, FunctionError> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(REDEEM_FUNCTION_NAME)?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RedeemFunction for HttpRedeemFunction {
    async fn invoke(&self, user_id: &str, code: &str) -> Result<RedeemResponse, FunctionError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(USER_HEADER, user_id)
            .json(&RedeemRequest {
                code: code.trim().to_string(),
            })
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        match serde_json::from_str::<RedeemResponse>(&body) {
            Ok(parsed) if status.is_success() || parsed.error.is_some() => Ok(parsed),
            _ => Err(FunctionError::Status {
                status: status.as_u16(),
                body,
            }),
        }
    }
}
