//! Chat Platform Boundary
//!
//! The core only needs five primitives from the chat platform and is
//! agnostic to transport: outbound text, single-use time-limited invite
//! links, member status, kick (ban then immediate unban), and the group
//! title for log/reply context.
//!
//! [`BotApiChat`] implements the trait against the Telegram Bot API over
//! HTTPS; tests substitute their own mock.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::models::{ErrorCode, GateError, GateResult};

/// Invite links are single-use and short-lived (10 minutes)
pub const INVITE_TTL_SECS: i64 = 600;

/// Membership state of a user in a group, collapsed to what the gate needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    /// member / administrator / creator
    In,
    /// left / kicked / restricted out
    Out,
}

/// Outbound chat-platform primitives required by the gate
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Deliver a plain text message to a chat (group or DM)
    async fn send_message(&self, chat_id: &str, text: &str) -> GateResult<()>;

    /// Create a single-use invite link expiring at `expire_at` (unix seconds)
    async fn create_invite_link(
        &self,
        group_id: &str,
        name: &str,
        expire_at: i64,
    ) -> GateResult<String>;

    /// Current membership state of a user in a group
    async fn member_status(&self, group_id: &str, user_id: &str) -> GateResult<MemberStatus>;

    /// Remove a member without a permanent ban (ban then immediately unban)
    async fn kick_member(&self, group_id: &str, user_id: &str) -> GateResult<()>;

    /// Group title for replies and log lines
    async fn group_title(&self, group_id: &str) -> GateResult<String>;
}

// ============================================
// TELEGRAM BOT API CLIENT
// ============================================

/// Telegram Bot API implementation of [`ChatPlatform`]
pub struct BotApiChat {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InviteLinkResult {
    invite_link: String,
}

#[derive(Debug, Deserialize)]
struct ChatMemberResult {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ChatResult {
    title: Option<String>,
}

impl BotApiChat {
    /// Build a client for a bot token
    pub fn new(bot_token: &str) -> GateResult<Self> {
        if bot_token.is_empty() {
            return Err(GateError::missing_credential("TELEGRAM_BOT_TOKEN"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .gzip(true)
            .build()
            .map_err(|e| {
                GateError::new(
                    ErrorCode::ChatCallFailed,
                    format!("Failed to build HTTP client: {}", e),
                )
            })?;
        Ok(Self {
            base_url: format!("https://api.telegram.org/bot{}", bot_token),
            client,
        })
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> GateResult<T> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .json(&params)
            .send()
            .await
            .map_err(|e| {
                GateError::new(ErrorCode::ChatCallFailed, format!("{} failed: {}", method, e))
            })?;

        let body: ApiResponse<T> = response.json().await.map_err(|e| {
            GateError::new(
                ErrorCode::ChatCallFailed,
                format!("{} malformed response: {}", method, e),
            )
        })?;

        if !body.ok {
            let why = body.description.unwrap_or_else(|| "no description".to_string());
            return Err(GateError::new(
                ErrorCode::ChatCallFailed,
                format!("{} rejected: {}", method, why),
            ));
        }
        body.result.ok_or_else(|| {
            GateError::new(ErrorCode::ChatCallFailed, format!("{}: empty result", method))
        })
    }
}

#[async_trait]
impl ChatPlatform for BotApiChat {
    async fn send_message(&self, chat_id: &str, text: &str) -> GateResult<()> {
        debug!("💬 sendMessage to {}", chat_id);
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                serde_json::json!({ "chat_id": chat_id, "text": text }),
            )
            .await?;
        Ok(())
    }

    async fn create_invite_link(
        &self,
        group_id: &str,
        name: &str,
        expire_at: i64,
    ) -> GateResult<String> {
        let result: InviteLinkResult = self
            .call(
                "createChatInviteLink",
                serde_json::json!({
                    "chat_id": group_id,
                    "name": name,
                    "member_limit": 1,
                    "creates_join_request": false,
                    "expire_date": expire_at,
                }),
            )
            .await
            .map_err(|e| {
                GateError::new(
                    ErrorCode::ChatInviteFailed,
                    format!("Invite for {}: {}", group_id, e),
                )
            })?;
        Ok(result.invite_link)
    }

    async fn member_status(&self, group_id: &str, user_id: &str) -> GateResult<MemberStatus> {
        let result: ChatMemberResult = self
            .call(
                "getChatMember",
                serde_json::json!({ "chat_id": group_id, "user_id": user_id }),
            )
            .await?;
        Ok(match result.status.as_str() {
            "member" | "administrator" | "creator" => MemberStatus::In,
            _ => MemberStatus::Out,
        })
    }

    async fn kick_member(&self, group_id: &str, user_id: &str) -> GateResult<()> {
        // Ban then unban: removes the member without leaving a permanent ban.
        // A failed unban leaves the member banned, so it surfaces as an error
        // instead of letting the caller tally a clean removal.
        let _: serde_json::Value = self
            .call(
                "banChatMember",
                serde_json::json!({ "chat_id": group_id, "user_id": user_id }),
            )
            .await?;
        let _: serde_json::Value = self
            .call(
                "unbanChatMember",
                serde_json::json!({ "chat_id": group_id, "user_id": user_id }),
            )
            .await?;
        Ok(())
    }

    async fn group_title(&self, group_id: &str) -> GateResult<String> {
        let result: ChatResult = self
            .call("getChat", serde_json::json!({ "chat_id": group_id }))
            .await?;
        Ok(result.title.unwrap_or_else(|| group_id.to_string()))
    }
}
