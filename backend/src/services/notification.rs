//! Push notifications to staff devices
//!
//! Delivery goes through the FCM HTTP v1 API. Failures never reach the
//! caller: they are logged, and tokens the provider reports as dead are
//! removed from the user.

use serde::Deserialize;
use shared::notification::{chunk_tokens, is_invalid_token_error, PushMessage, SendReport};
use shared::{AuthContext, PushToken};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::PushConfig;
use crate::error::AppResult;
use crate::repo;

/// Notification service for device registrations and pushes
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    fcm: Option<FcmClient>,
}

/// FCM HTTP v1 client
#[derive(Clone)]
pub struct FcmClient {
    send_url: String,
    access_token: String,
    http_client: reqwest::Client,
}

/// Input for registering a device token
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterTokenInput {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    pub device_type: Option<String>,
    pub platform: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorResponse {
    error: FcmErrorBody,
}

#[derive(Debug, Deserialize)]
struct FcmErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

/// Outcome of a single token delivery
enum Delivery {
    Sent,
    InvalidToken,
    Failed(String),
}

impl FcmClient {
    pub fn new(endpoint: &str, project_id: &str, access_token: String) -> Self {
        Self {
            send_url: format!(
                "{}/projects/{}/messages:send",
                endpoint.trim_end_matches('/'),
                project_id
            ),
            access_token,
            http_client: reqwest::Client::new(),
        }
    }

    /// Client for an enabled and fully configured push section
    pub fn from_config(config: &PushConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let project_id = config.project_id.as_deref()?;
        let access_token = config.access_token.clone()?;
        Some(Self::new(&config.endpoint, project_id, access_token))
    }

    async fn deliver(&self, token: &str, message: &PushMessage) -> Delivery {
        let body = serde_json::json!({
            "message": {
                "token": token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": message.data,
            }
        });

        let response = match self
            .http_client
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Delivery::Failed(format!("Failed to reach FCM: {}", e)),
        };

        if response.status().is_success() {
            return Delivery::Sent;
        }

        match response.json::<FcmErrorResponse>().await {
            Ok(err) => {
                let invalid = err
                    .error
                    .details
                    .iter()
                    .filter_map(|d| d.error_code.as_deref())
                    .chain(err.error.status.as_deref())
                    .any(is_invalid_token_error);
                if invalid {
                    Delivery::InvalidToken
                } else {
                    Delivery::Failed(err.error.message.unwrap_or_else(|| "Unknown error".to_string()))
                }
            }
            Err(_) => Delivery::Failed("Unknown error".to_string()),
        }
    }

    /// Sends `message` to every token, in batches.
    pub async fn send(&self, tokens: &[String], message: &PushMessage) -> SendReport {
        let mut report = SendReport::default();
        for batch in chunk_tokens(tokens) {
            let mut batch_report = SendReport::default();
            for token in batch {
                match self.deliver(token, message).await {
                    Delivery::Sent => batch_report.success_count += 1,
                    Delivery::InvalidToken => {
                        batch_report.failure_count += 1;
                        batch_report.invalid_tokens.push(token.clone());
                    }
                    Delivery::Failed(reason) => {
                        batch_report.failure_count += 1;
                        tracing::warn!("Push delivery failed: {}", reason);
                    }
                }
            }
            report.absorb(batch_report);
        }
        report
    }
}

impl NotificationService {
    pub fn new(db: PgPool, config: &PushConfig) -> Self {
        Self {
            db,
            fcm: FcmClient::from_config(config),
        }
    }

    pub fn push_enabled(&self) -> bool {
        self.fcm.is_some()
    }

    /// Pushes to every device of `user_id` and prunes dead tokens.
    pub async fn notify_user(&self, user_id: Uuid, message: PushMessage) -> SendReport {
        match self.try_notify_user(user_id, &message).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Failed to notify user {}: {}", user_id, e);
                SendReport::default()
            }
        }
    }

    async fn try_notify_user(&self, user_id: Uuid, message: &PushMessage) -> AppResult<SendReport> {
        let Some(fcm) = &self.fcm else {
            tracing::debug!("Push disabled; skipping \"{}\" for {}", message.title, user_id);
            return Ok(SendReport::default());
        };

        let mut conn = self.db.acquire().await?;
        let tokens = repo::users::push_tokens(&mut conn, user_id).await?;
        if tokens.is_empty() {
            return Ok(SendReport::default());
        }

        let report = fcm.send(&tokens, message).await;
        if !report.invalid_tokens.is_empty() {
            let removed = repo::users::remove_tokens(&mut conn, user_id, &report.invalid_tokens).await?;
            tracing::info!("Removed {} invalid push token(s) for user {}", removed, user_id);
        }

        tracing::info!(
            "Push \"{}\" to user {}: {} sent, {} failed",
            message.title,
            user_id,
            report.success_count,
            report.failure_count
        );
        Ok(report)
    }

    pub async fn register_token(&self, ctx: &AuthContext, input: RegisterTokenInput) -> AppResult<()> {
        input.validate()?;
        let token = PushToken {
            token: input.token,
            device_type: input.device_type,
            platform: input.platform,
        };
        let mut conn = self.db.acquire().await?;
        repo::users::upsert_token(&mut conn, ctx.user_id, &token).await
    }

    pub async fn remove_token(&self, ctx: &AuthContext, token: &str) -> AppResult<bool> {
        let mut conn = self.db.acquire().await?;
        let removed = repo::users::remove_tokens(&mut conn, ctx.user_id, &[token.to_string()]).await?;
        Ok(removed > 0)
    }
}
