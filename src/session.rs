//! Verification State Machine
//!
//! The per-user session that walks a candidate from a deep link to a
//! group invite:
//!
//! awaiting_address -> checking_balance -> awaiting_transfer -> terminal
//!
//! The balance check is synchronous inside address submission and has no
//! retry loop: an insufficient balance terminates the session and the user
//! restarts from a fresh link. The transfer check retries under a 60-second
//! cooldown and a 300-second hard timeout measured from the first failed
//! check. Both clocks are wall-clock comparisons evaluated lazily on each
//! incoming action; nothing runs on background timers.
//!
//! Sessions live in memory only. A restart loses them and the user restarts
//! from the link, which is the accepted recovery path.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chat::{ChatPlatform, MemberStatus, INVITE_TTL_SECS};
use crate::links::LinkRegistry;
use crate::models::{GateResult, GroupConfig, UserRecord};
use crate::providers::{BalanceChain, TransferChain, REQUIRED_TRANSFER_AMOUNT};
use crate::store::{put_user_record, user_record, Store};
use crate::utils::address::is_valid_address;
use crate::utils::chains::resolve_chain;
use crate::utils::unix_now;

/// Hard timeout for the transfer check, measured from the first failure
pub const SESSION_TIMEOUT_SECS: i64 = 300;

/// Minimum interval between transfer rechecks
pub const RETRY_COOLDOWN_SECS: i64 = 60;

// ============================================
// SESSION TYPES
// ============================================

/// Where a verification session currently waits for input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    AwaitingAddress,
    AwaitingTransfer,
}

/// In-flight verification state for one (user, group) pair
#[derive(Debug, Clone)]
pub struct VerificationSession {
    pub group_id: String,
    pub step: SessionStep,
    pub address: Option<String>,
    /// Unix seconds of the first failed transfer check
    pub first_failure_at: Option<i64>,
    /// Unix seconds of the most recent transfer recheck
    pub last_retry_at: Option<i64>,
}

impl VerificationSession {
    fn open(group_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            step: SessionStep::AwaitingAddress,
            address: None,
            first_failure_at: None,
            last_retry_at: None,
        }
    }
}

/// Which input the admin setup flow expects next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Token,
    MinBalance,
    Verifier,
}

/// In-flight group setup state for one admin
#[derive(Debug, Clone)]
pub struct SetupSession {
    pub group_id: String,
    pub chain_id: String,
    pub step: SetupStep,
    pub token: Option<String>,
    pub min_balance: Option<f64>,
}

/// Process-wide session maps. One active session of each kind per user;
/// a second activation replaces the first.
#[derive(Default)]
pub struct SessionStore {
    pub verification: DashMap<String, VerificationSession>,
    pub setup: DashMap<String, SetupSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================
// OUTCOMES
// ============================================

/// Result of activating a verification link
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// Session opened, prompt for a wallet address
    SessionOpened { group_id: String },
    /// Already verified and still in the group
    AlreadyMember,
    /// Owner bypass or a verified user who left: invite issued directly
    Invite(String),
    /// Token did not resolve to a group
    UnknownLink,
    /// Link resolved but the group has no configuration
    GroupNotConfigured,
}

/// Result of submitting a wallet address
#[derive(Debug, Clone, PartialEq)]
pub enum AddressOutcome {
    /// No session awaiting an address for this user
    NoSession,
    /// Malformed for the chain family; session stays, re-prompt
    InvalidAddress,
    /// Wallet already bound to another verified user; session terminated
    AddressTaken,
    /// Balance below the group minimum; session terminated
    InsufficientBalance,
    /// Advanced: show the verifier wallet and required amount
    AwaitingTransfer { verifier: String, amount: f64 },
}

/// Result of a transfer recheck
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// No session awaiting a transfer for this user
    NoSession,
    /// Recheck arrived inside the cooldown; no state change
    RetryTooSoon { wait_secs: i64 },
    /// Hard timeout exceeded; session terminated
    TimedOut,
    /// No qualifying transfer yet; session stays open
    NotFound,
    /// Wallet was claimed by another user between check and write
    Conflict,
    /// Verified: record persisted and invite issued
    Verified { invite: String },
}

/// Result of a group join event
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    /// Group is not gated, nothing to enforce
    NotGated,
    /// Member is verified (or the owner), allowed to stay
    Allowed,
    /// Unverified member kicked; a fresh link token was issued
    Ejected { link_token: String },
}

/// Result of a setup-flow input
#[derive(Debug, Clone, PartialEq)]
pub enum SetupOutcome {
    NoSession,
    UnsupportedChain,
    /// Malformed input for the current step; session stays, re-prompt
    InvalidInput { step: SetupStep },
    /// Prompt for the token address
    PromptToken,
    /// Prompt for the minimum balance
    PromptMinBalance,
    /// Prompt for the verifier wallet
    PromptVerifier,
    /// Config committed; a fresh verification link token was issued
    Completed { link_token: String },
}

// ============================================
// VERIFIER ENGINE
// ============================================

/// Drives verification sessions against the store, the provider chains and
/// the chat platform. Owned by the orchestrator for the process lifetime.
pub struct Verifier {
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatPlatform>,
    balances: Arc<BalanceChain>,
    transfers: Arc<TransferChain>,
    links: Arc<LinkRegistry>,
    pub sessions: SessionStore,
    owner_id: String,
}

impl Verifier {
    pub fn new(
        store: Arc<dyn Store>,
        chat: Arc<dyn ChatPlatform>,
        balances: Arc<BalanceChain>,
        transfers: Arc<TransferChain>,
        links: Arc<LinkRegistry>,
        owner_id: String,
    ) -> Self {
        Self {
            store,
            chat,
            balances,
            transfers,
            links,
            sessions: SessionStore::new(),
            owner_id,
        }
    }

    fn group_config(&self, group_id: &str) -> GateResult<Option<GroupConfig>> {
        Ok(self.store.load_groups()?.get(group_id).cloned())
    }

    /// Single-use invite, expiring after [`INVITE_TTL_SECS`]
    async fn issue_invite(&self, group_id: &str) -> GateResult<String> {
        self.chat
            .create_invite_link(group_id, "Verification", unix_now() + INVITE_TTL_SECS)
            .await
    }

    /// Whether `address` is already bound to a different verified user in
    /// the group (case-insensitive)
    fn address_taken(&self, group_id: &str, user_id: &str, address: &str) -> GateResult<bool> {
        let users = self.store.load_users()?;
        let Some(group_users) = users.get(group_id) else {
            return Ok(false);
        };
        Ok(group_users.iter().any(|(uid, rec)| {
            uid != user_id && rec.verified && rec.address.eq_ignore_ascii_case(address)
        }))
    }

    /// Activate a verification link for a user.
    ///
    /// Opening a second link for the same user replaces any existing
    /// session rather than creating a duplicate.
    pub async fn start(&self, user_id: &str, link_token: &str) -> GateResult<StartOutcome> {
        let Some(group_id) = self.links.resolve(link_token)? else {
            return Ok(StartOutcome::UnknownLink);
        };
        if self.group_config(&group_id)?.is_none() {
            return Ok(StartOutcome::GroupNotConfigured);
        }

        // Owner never verifies
        if !self.owner_id.is_empty() && user_id == self.owner_id {
            info!("👑 Owner bypass for group {}", group_id);
            let invite = self.issue_invite(&group_id).await?;
            return Ok(StartOutcome::Invite(invite));
        }

        // Already verified: nothing to do while still a member, otherwise
        // a fresh invite without re-running the machine
        let users = self.store.load_users()?;
        if let Some(rec) = user_record(&users, &group_id, user_id) {
            if rec.verified {
                return match self.chat.member_status(&group_id, user_id).await? {
                    MemberStatus::In => Ok(StartOutcome::AlreadyMember),
                    MemberStatus::Out => {
                        let invite = self.issue_invite(&group_id).await?;
                        Ok(StartOutcome::Invite(invite))
                    }
                };
            }
        }

        self.sessions
            .verification
            .insert(user_id.to_string(), VerificationSession::open(&group_id));
        Ok(StartOutcome::SessionOpened { group_id })
    }

    /// Submit a wallet address for the session's awaiting_address step.
    /// Runs the balance check synchronously on success.
    pub async fn submit_address(&self, user_id: &str, input: &str) -> GateResult<AddressOutcome> {
        let Some(session) = self
            .sessions
            .verification
            .get(user_id)
            .map(|s| s.value().clone())
        else {
            return Ok(AddressOutcome::NoSession);
        };
        if session.step != SessionStep::AwaitingAddress {
            return Ok(AddressOutcome::NoSession);
        }

        let Some(cfg) = self.group_config(&session.group_id)? else {
            self.sessions.verification.remove(user_id);
            return Ok(AddressOutcome::NoSession);
        };
        let Some(chain) = resolve_chain(&cfg.chain_id) else {
            warn!("❌ Unknown chain {} in group {}", cfg.chain_id, session.group_id);
            self.sessions.verification.remove(user_id);
            return Ok(AddressOutcome::NoSession);
        };

        let address = input.trim();
        if !is_valid_address(chain.family, address) {
            // Recoverable: session stays on the same step
            return Ok(AddressOutcome::InvalidAddress);
        }

        if self.address_taken(&session.group_id, user_id, address)? {
            self.sessions.verification.remove(user_id);
            return Ok(AddressOutcome::AddressTaken);
        }

        if !self.balances.verify_balance(&cfg, address).await {
            // No retry loop at the balance step
            self.sessions.verification.remove(user_id);
            return Ok(AddressOutcome::InsufficientBalance);
        }

        let mut advanced = session;
        advanced.step = SessionStep::AwaitingTransfer;
        advanced.address = Some(address.to_string());
        self.sessions
            .verification
            .insert(user_id.to_string(), advanced);

        Ok(AddressOutcome::AwaitingTransfer {
            verifier: cfg.verifier,
            amount: REQUIRED_TRANSFER_AMOUNT,
        })
    }

    /// Recheck the ownership transfer for a session's awaiting_transfer step.
    ///
    /// The hard timeout is evaluated before the cooldown: a session past its
    /// deadline terminates even when the cooldown has separately elapsed.
    pub async fn confirm_transfer(&self, user_id: &str) -> GateResult<TransferOutcome> {
        let Some(session) = self
            .sessions
            .verification
            .get(user_id)
            .map(|s| s.value().clone())
        else {
            return Ok(TransferOutcome::NoSession);
        };
        let (SessionStep::AwaitingTransfer, Some(address)) =
            (session.step, session.address.clone())
        else {
            return Ok(TransferOutcome::NoSession);
        };

        let now = unix_now();
        if let Some(first_failure) = session.first_failure_at {
            if now - first_failure > SESSION_TIMEOUT_SECS {
                info!("⏳ Session timed out for user {}", user_id);
                self.sessions.verification.remove(user_id);
                return Ok(TransferOutcome::TimedOut);
            }
        }
        if let Some(last_retry) = session.last_retry_at {
            let elapsed = now - last_retry;
            if elapsed < RETRY_COOLDOWN_SECS {
                return Ok(TransferOutcome::RetryTooSoon {
                    wait_secs: RETRY_COOLDOWN_SECS - elapsed,
                });
            }
        }

        let Some(cfg) = self.group_config(&session.group_id)? else {
            self.sessions.verification.remove(user_id);
            return Ok(TransferOutcome::NoSession);
        };

        let mut updated = session.clone();
        updated.last_retry_at = Some(now);

        if !self.transfers.verify_transfer(&cfg, &address).await {
            if updated.first_failure_at.is_none() {
                updated.first_failure_at = Some(now);
            }
            self.sessions
                .verification
                .insert(user_id.to_string(), updated);
            return Ok(TransferOutcome::NotFound);
        }

        // Guard the check-then-act race: the wallet may have been claimed
        // between the address step and this write
        if self.address_taken(&session.group_id, user_id, &address)? {
            self.sessions.verification.remove(user_id);
            return Ok(TransferOutcome::Conflict);
        }

        let mut users = self.store.load_users()?;
        put_user_record(
            &mut users,
            &session.group_id,
            user_id,
            UserRecord {
                address: address.clone(),
                verified: true,
                last_verified: now,
                verification_tx: true,
            },
        );
        self.store.save_users(&users)?;
        self.sessions.verification.remove(user_id);

        let invite = self.issue_invite(&session.group_id).await?;
        info!("✅ User {} verified for group {}", user_id, session.group_id);
        Ok(TransferOutcome::Verified { invite })
    }

    /// Explicit cancel from any non-terminal state. No persisted side
    /// effects. Returns whether a session existed.
    pub fn cancel(&self, user_id: &str) -> bool {
        self.sessions.verification.remove(user_id).is_some()
    }

    /// Enforce the gate on a join event: unverified joiners of a configured
    /// group are kicked and handed a fresh verification link token.
    pub async fn handle_join(&self, group_id: &str, user_id: &str) -> GateResult<JoinOutcome> {
        if self.group_config(group_id)?.is_none() {
            return Ok(JoinOutcome::NotGated);
        }
        if !self.owner_id.is_empty() && user_id == self.owner_id {
            return Ok(JoinOutcome::Allowed);
        }

        let users = self.store.load_users()?;
        if user_record(&users, group_id, user_id)
            .map(|r| r.verified)
            .unwrap_or(false)
        {
            return Ok(JoinOutcome::Allowed);
        }

        info!("🚷 Ejecting unverified joiner {} from {}", user_id, group_id);
        self.chat.kick_member(group_id, user_id).await?;
        let link_token = self.links.issue(group_id)?;
        Ok(JoinOutcome::Ejected { link_token })
    }

    // ============================================
    // SETUP FLOW
    // ============================================

    /// Begin group setup for an admin. Replaces any setup session the admin
    /// already had open.
    pub fn begin_setup(
        &self,
        admin_id: &str,
        group_id: &str,
        chain_alias: &str,
    ) -> GateResult<SetupOutcome> {
        let Some(chain) = resolve_chain(chain_alias) else {
            return Ok(SetupOutcome::UnsupportedChain);
        };
        self.sessions.setup.insert(
            admin_id.to_string(),
            SetupSession {
                group_id: group_id.to_string(),
                chain_id: chain.canonical.to_string(),
                step: SetupStep::Token,
                token: None,
                min_balance: None,
            },
        );
        Ok(SetupOutcome::PromptToken)
    }

    /// Feed one input into the admin's setup session. Each step validates
    /// its input and re-prompts on failure; completion commits the group
    /// config and issues a fresh verification link.
    pub fn setup_input(&self, admin_id: &str, input: &str) -> GateResult<SetupOutcome> {
        let Some(session) = self.sessions.setup.get(admin_id).map(|s| s.value().clone()) else {
            return Ok(SetupOutcome::NoSession);
        };
        // Canonical aliases always resolve
        let Some(chain) = resolve_chain(&session.chain_id) else {
            self.sessions.setup.remove(admin_id);
            return Ok(SetupOutcome::UnsupportedChain);
        };
        let input = input.trim();

        let mut session = session;
        let outcome = match session.step {
            SetupStep::Token => {
                if !is_valid_address(chain.family, input) {
                    return Ok(SetupOutcome::InvalidInput { step: SetupStep::Token });
                }
                session.token = Some(input.to_string());
                session.step = SetupStep::MinBalance;
                SetupOutcome::PromptMinBalance
            }
            SetupStep::MinBalance => {
                let Ok(amount) = input.parse::<f64>() else {
                    return Ok(SetupOutcome::InvalidInput { step: SetupStep::MinBalance });
                };
                if !amount.is_finite() || amount <= 0.0 {
                    return Ok(SetupOutcome::InvalidInput { step: SetupStep::MinBalance });
                }
                session.min_balance = Some(amount);
                session.step = SetupStep::Verifier;
                SetupOutcome::PromptVerifier
            }
            SetupStep::Verifier => {
                if !is_valid_address(chain.family, input) {
                    return Ok(SetupOutcome::InvalidInput { step: SetupStep::Verifier });
                }
                let cfg = GroupConfig {
                    chain_id: session.chain_id.clone(),
                    // Both set by the earlier steps
                    token: session.token.clone().unwrap_or_default(),
                    min_balance: session.min_balance.unwrap_or_default(),
                    verifier: input.to_string(),
                };
                let mut groups = self.store.load_groups()?;
                groups.insert(session.group_id.clone(), cfg);
                self.store.save_groups(&groups)?;

                let link_token = self.links.issue(&session.group_id)?;
                self.sessions.setup.remove(admin_id);
                info!("⚙️ Group {} configured", session.group_id);
                return Ok(SetupOutcome::Completed { link_token });
            }
        };
        self.sessions.setup.insert(admin_id.to_string(), session);
        Ok(outcome)
    }
}
