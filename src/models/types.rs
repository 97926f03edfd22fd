//! Persisted Data Model
//!
//! All durable entities owned by the [`Store`](crate::store::Store). Field
//! names are part of the on-disk format, so every struct here must round-trip
//! exactly through serde (booleans and integer timestamps included).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-group gating configuration. One per gated group, created by the admin
/// setup flow and mutated only by re-running setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupConfig {
    /// Chain alias as entered at setup (resolved through the chain registry)
    pub chain_id: String,
    /// Token contract address (EVM) or mint address (Solana)
    pub token: String,
    /// Minimum normalized balance required to pass verification
    pub min_balance: f64,
    /// Wallet the candidate must send exactly 1 token to
    pub verifier: String,
}

/// Per-user verification record, keyed by (group id, user id).
///
/// `address` is immutable once verified: within a group no two users may hold
/// the same verified wallet address (case-insensitively).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    pub address: String,
    pub verified: bool,
    /// Unix seconds of the last successful verification
    pub last_verified: i64,
    /// Whether the ownership-transfer check confirmed a real transaction
    pub verification_tx: bool,
}

/// 3-strike rejection tracking per group.
///
/// `blocked` flips to true at the third rejection and stays true until an
/// explicit [`reset`](crate::admission::GroupAdmission::reset_count).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectionRecord {
    pub rejection_count: u32,
    pub group_name: String,
    pub last_admin_id: Option<String>,
    pub last_admin_name: String,
    /// Unix seconds of the first rejection
    pub first_rejection: i64,
    /// Unix seconds of the most recent rejection
    pub last_rejection: i64,
    pub blocked: bool,
}

impl RejectionRecord {
    /// Fresh record for a group's first rejection
    pub fn new(group_id: &str, group_name: Option<&str>, now: i64) -> Self {
        Self {
            rejection_count: 0,
            group_name: group_name
                .map(String::from)
                .unwrap_or_else(|| format!("Group {}", group_id)),
            last_admin_id: None,
            last_admin_name: "Unknown".to_string(),
            first_rejection: now,
            last_rejection: now,
            blocked: false,
        }
    }
}

/// A group waiting for owner approval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingGroup {
    pub group_name: String,
    pub admin_id: String,
    pub admin_name: String,
    /// Unix seconds when the request was filed
    pub timestamp: i64,
}

/// A verification deep-link token mapped to its group.
///
/// Many tokens may map to the same group. Expiry is optional and evaluated
/// lazily against `created_at` when the link is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationLink {
    pub group_id: String,
    /// Unix seconds when the link was generated
    pub created_at: i64,
}

// ============================================
// Collection aliases (one JSON snapshot each)
// ============================================

/// groups.json: group id -> config
pub type GroupConfigs = HashMap<String, GroupConfig>;

/// user_data.json: group id -> user id -> record
pub type UserRecords = HashMap<String, HashMap<String, UserRecord>>;

/// whitelist.json: group id -> whitelisted
pub type Whitelist = HashMap<String, bool>;

/// pending_whitelist.json: group id -> pending request
pub type PendingWhitelist = HashMap<String, PendingGroup>;

/// rejected_groups.json: group id -> rejection record
pub type RejectedGroups = HashMap<String, RejectionRecord>;

/// verification_links.json: opaque token -> link
pub type VerificationLinks = HashMap<String, VerificationLink>;
