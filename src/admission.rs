//! Group Admission Control
//!
//! The gate only serves groups the owner has approved. Admission runs a
//! request/approve/reject workflow with a 3-strike rejection policy:
//! - Every rejection increments the group's rejection count
//! - At the third rejection the group flips to `blocked`
//! - Blocked groups are silently dropped on future requests
//! - Only an explicit reset clears the count and the block
//!
//! `is_blocked` fails open to "not blocked" so a storage hiccup never
//! turns every group request into a silent drop.

use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{GateResult, PendingGroup, RejectedGroups, RejectionRecord};
use crate::store::Store;
use crate::utils::unix_now;

/// Rejections before a group is permanently blocked
pub const MAX_REJECTIONS: u32 = 3;

/// Whitelist and rejection workflow over the persistent store
pub struct GroupAdmission {
    store: Arc<dyn Store>,
}

impl GroupAdmission {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Whether the group is currently approved
    pub fn is_whitelisted(&self, group_id: &str) -> bool {
        self.store
            .load_whitelist()
            .map(|w| w.get(group_id).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    /// Whether the group has struck out. Errors read as "not blocked".
    pub fn is_blocked(&self, group_id: &str) -> bool {
        match self.store.load_rejections() {
            Ok(rejections) => rejections.get(group_id).map(|r| r.blocked).unwrap_or(false),
            Err(e) => {
                warn!("⚠️ Rejection lookup failed, treating as not blocked: {}", e);
                false
            }
        }
    }

    /// File an approval request from a group admin.
    ///
    /// Returns false when the group is blocked (the request is silently
    /// dropped) or already whitelisted; true when it was queued.
    pub fn request(
        &self,
        group_id: &str,
        group_name: &str,
        admin_id: &str,
        admin_name: &str,
    ) -> GateResult<bool> {
        if self.is_blocked(group_id) {
            info!("🚫 Dropping request from blocked group {}", group_id);
            return Ok(false);
        }
        if self.is_whitelisted(group_id) {
            return Ok(false);
        }

        let mut pending = self.store.load_pending()?;
        pending.insert(
            group_id.to_string(),
            PendingGroup {
                group_name: group_name.to_string(),
                admin_id: admin_id.to_string(),
                admin_name: admin_name.to_string(),
                timestamp: unix_now(),
            },
        );
        self.store.save_pending(&pending)?;
        info!("📝 Queued whitelist request for {} ({})", group_name, group_id);
        Ok(true)
    }

    /// Approve a group: add to the whitelist and clear any pending request
    pub fn approve(&self, group_id: &str) -> GateResult<()> {
        let mut whitelist = self.store.load_whitelist()?;
        whitelist.insert(group_id.to_string(), true);
        self.store.save_whitelist(&whitelist)?;

        let mut pending = self.store.load_pending()?;
        if pending.remove(group_id).is_some() {
            self.store.save_pending(&pending)?;
        }
        info!("✅ Whitelisted group {}", group_id);
        Ok(())
    }

    /// Reject a group's request, advancing its strike count.
    ///
    /// Returns true when this rejection crossed the 3-strike threshold and
    /// the group is now blocked.
    pub fn reject(
        &self,
        group_id: &str,
        group_name: Option<&str>,
        admin_id: Option<&str>,
        admin_name: Option<&str>,
    ) -> GateResult<bool> {
        let now = unix_now();
        let mut rejections = self.store.load_rejections()?;
        let record = rejections
            .entry(group_id.to_string())
            .or_insert_with(|| RejectionRecord::new(group_id, group_name, now));

        record.rejection_count += 1;
        record.last_rejection = now;
        if let Some(name) = group_name {
            record.group_name = name.to_string();
        }
        if let Some(id) = admin_id {
            record.last_admin_id = Some(id.to_string());
        }
        if let Some(name) = admin_name {
            record.last_admin_name = name.to_string();
        }
        if record.rejection_count >= MAX_REJECTIONS {
            record.blocked = true;
        }
        let blocked = record.blocked;
        let count = record.rejection_count;
        self.store.save_rejections(&rejections)?;

        // Rejection also clears any pending request
        let mut pending = self.store.load_pending()?;
        if pending.remove(group_id).is_some() {
            self.store.save_pending(&pending)?;
        }

        if blocked {
            warn!("🚫 Group {} blocked after {} rejections", group_id, count);
        } else {
            info!("❌ Rejected group {} ({}/{})", group_id, count, MAX_REJECTIONS);
        }
        Ok(blocked)
    }

    /// Clear a group's strikes and block flag in place, keeping the record
    /// so the rejection ledger retains its history. Idempotent: resetting a
    /// group with no record is a no-op.
    pub fn reset_count(&self, group_id: &str) -> GateResult<()> {
        let mut rejections = self.store.load_rejections()?;
        if let Some(record) = rejections.get_mut(group_id) {
            record.rejection_count = 0;
            record.blocked = false;
            self.store.save_rejections(&rejections)?;
            info!("🔄 Reset rejection count for group {}", group_id);
        }
        Ok(())
    }

    /// Current strike count for a group
    pub fn rejection_count(&self, group_id: &str) -> u32 {
        self.store
            .load_rejections()
            .ok()
            .and_then(|r| r.get(group_id).map(|rec| rec.rejection_count))
            .unwrap_or(0)
    }

    /// All currently blocked groups, for the owner listing
    pub fn blocked_groups(&self) -> GateResult<RejectedGroups> {
        let mut rejections = self.store.load_rejections()?;
        rejections.retain(|_, r| r.blocked);
        Ok(rejections)
    }

    /// Full rejection ledger, blocked or not
    pub fn all_rejections(&self) -> GateResult<RejectedGroups> {
        self.store.load_rejections()
    }

    /// Approved group ids, for the owner listing
    pub fn whitelisted(&self) -> GateResult<Vec<String>> {
        let whitelist = self.store.load_whitelist()?;
        Ok(whitelist
            .into_iter()
            .filter(|(_, approved)| *approved)
            .map(|(id, _)| id)
            .collect())
    }

    /// Pending requests awaiting an owner decision
    pub fn pending(&self) -> GateResult<crate::models::PendingWhitelist> {
        self.store.load_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn admission() -> GroupAdmission {
        GroupAdmission::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_request_then_approve() {
        let adm = admission();
        assert!(adm.request("-100", "Test Group", "7", "alice").unwrap());
        assert!(!adm.is_whitelisted("-100"));
        assert_eq!(adm.pending().unwrap().len(), 1);

        adm.approve("-100").unwrap();
        assert!(adm.is_whitelisted("-100"));
        assert!(adm.pending().unwrap().is_empty());
    }

    #[test]
    fn test_three_strikes_blocks() {
        let adm = admission();
        assert!(!adm.reject("-100", Some("G"), Some("7"), Some("alice")).unwrap());
        assert!(!adm.reject("-100", None, None, None).unwrap());
        assert!(!adm.is_blocked("-100"));

        // Third strike blocks
        assert!(adm.reject("-100", None, None, None).unwrap());
        assert!(adm.is_blocked("-100"));
        assert_eq!(adm.rejection_count("-100"), 3);
    }

    #[test]
    fn test_blocked_group_requests_are_dropped() {
        let adm = admission();
        for _ in 0..3 {
            adm.reject("-100", None, None, None).unwrap();
        }
        assert!(!adm.request("-100", "G", "7", "alice").unwrap());
        assert!(adm.pending().unwrap().is_empty());
    }

    #[test]
    fn test_block_is_sticky_past_three() {
        let adm = admission();
        for _ in 0..5 {
            adm.reject("-100", None, None, None).unwrap();
        }
        assert!(adm.is_blocked("-100"));
        assert_eq!(adm.rejection_count("-100"), 5);
    }

    #[test]
    fn test_reset_clears_block_and_is_idempotent() {
        let adm = admission();
        for _ in 0..3 {
            adm.reject("-100", Some("G"), Some("7"), Some("alice")).unwrap();
        }
        adm.reset_count("-100").unwrap();
        assert!(!adm.is_blocked("-100"));
        assert_eq!(adm.rejection_count("-100"), 0);

        // History survives the reset in the ledger
        let ledger = adm.all_rejections().unwrap();
        let record = ledger.get("-100").unwrap();
        assert_eq!(record.last_admin_name, "alice");
        assert!(record.first_rejection > 0);

        // Reset with no record is a no-op
        adm.reset_count("-100").unwrap();
        adm.reset_count("-999").unwrap();
    }

    #[test]
    fn test_reject_after_reset_restarts_count() {
        let adm = admission();
        for _ in 0..3 {
            adm.reject("-100", None, None, None).unwrap();
        }
        adm.reset_count("-100").unwrap();

        // The next rejection starts a fresh count, nowhere near a block
        assert!(!adm.reject("-100", None, None, None).unwrap());
        assert_eq!(adm.rejection_count("-100"), 1);
        assert!(!adm.is_blocked("-100"));
    }

    #[test]
    fn test_rejection_clears_pending() {
        let adm = admission();
        adm.request("-100", "G", "7", "alice").unwrap();
        adm.reject("-100", Some("G"), Some("7"), Some("alice")).unwrap();
        assert!(adm.pending().unwrap().is_empty());
    }

    #[test]
    fn test_blocked_listing_filters() {
        let adm = admission();
        adm.reject("-1", None, None, None).unwrap();
        for _ in 0..3 {
            adm.reject("-2", None, None, None).unwrap();
        }
        let blocked = adm.blocked_groups().unwrap();
        assert!(blocked.contains_key("-2"));
        assert!(!blocked.contains_key("-1"));
        assert_eq!(adm.all_rejections().unwrap().len(), 2);
    }
}
