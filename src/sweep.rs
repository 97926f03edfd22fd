//! Periodic Re-verification Sweep
//!
//! Walks every configured group's verified members and revokes access for
//! wallets that dropped below the group minimum: kick, flip the record to
//! unverified, persist. Persistence is per user, not batched, so a crash
//! mid-sweep never loses completed removals. One member's failure never
//! stops the sweep; it is tallied and the loop moves on.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::chat::ChatPlatform;
use crate::models::GateResult;
use crate::providers::BalanceChain;
use crate::store::Store;

/// Tally of one sweep run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Configured groups visited
    pub groups: usize,
    /// Members whose balance still qualifies
    pub verified: usize,
    /// Members kicked and flipped to unverified
    pub removed: usize,
    /// Members whose check or removal failed
    pub errors: usize,
}

/// Re-checks every verified member against the group threshold
pub struct ReverificationSweep {
    store: Arc<dyn Store>,
    chat: Arc<dyn ChatPlatform>,
    balances: Arc<BalanceChain>,
    /// Permanently exempt from removal
    owner_id: String,
}

impl ReverificationSweep {
    pub fn new(
        store: Arc<dyn Store>,
        chat: Arc<dyn ChatPlatform>,
        balances: Arc<BalanceChain>,
        owner_id: String,
    ) -> Self {
        Self {
            store,
            chat,
            balances,
            owner_id,
        }
    }

    /// Run one full sweep across all configured groups
    pub async fn run(&self) -> GateResult<SweepReport> {
        let groups = self.store.load_groups()?;
        let users = self.store.load_users()?;
        let mut report = SweepReport::default();

        info!("🔄 Sweep starting over {} group(s)", groups.len());
        for (group_id, cfg) in &groups {
            report.groups += 1;
            let Some(group_users) = users.get(group_id) else {
                continue;
            };

            for (user_id, record) in group_users {
                if !record.verified {
                    continue;
                }
                if !self.owner_id.is_empty() && user_id == &self.owner_id {
                    continue;
                }

                if self.balances.verify_balance(cfg, &record.address).await {
                    report.verified += 1;
                    continue;
                }

                warn!(
                    "📉 Wallet {} below threshold in group {}, removing user {}",
                    record.address, group_id, user_id
                );
                match self.remove_member(group_id, user_id).await {
                    Ok(()) => report.removed += 1,
                    Err(e) => {
                        error!(
                            "❌ [{}] Removal of {} from {} failed: {}",
                            e.code_str(),
                            user_id,
                            group_id,
                            e
                        );
                        report.errors += 1;
                    }
                }
            }
        }

        info!(
            "✅ Sweep done: {} group(s), {} verified, {} removed, {} error(s)",
            report.groups, report.verified, report.removed, report.errors
        );
        Ok(report)
    }

    /// Kick the member and persist the flipped record immediately
    async fn remove_member(&self, group_id: &str, user_id: &str) -> GateResult<()> {
        self.chat.kick_member(group_id, user_id).await?;

        // Re-read before mutating so this write only touches one record
        let mut users = self.store.load_users()?;
        if let Some(record) = users
            .get_mut(group_id)
            .and_then(|g| g.get_mut(user_id))
        {
            record.verified = false;
            self.store.save_users(&users)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MemberStatus;
    use crate::models::{GroupConfig, GroupConfigs, UserRecord, UserRecords};
    use crate::providers::BalanceProvider;
    use crate::store::{put_user_record, user_record, MemoryStore};
    use crate::utils::chains::ChainInfo;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const GROUP: &str = "-100777";

    /// Balance provider scripted per wallet address
    struct ScriptedBalance {
        balances: HashMap<String, f64>,
    }

    #[async_trait]
    impl BalanceProvider for ScriptedBalance {
        fn name(&self) -> &'static str {
            "scripted"
        }
        fn is_configured(&self) -> bool {
            true
        }
        fn supports(&self, _chain: &ChainInfo) -> bool {
            true
        }
        async fn token_balance(
            &self,
            wallet: &str,
            _token: &str,
            _chain: &ChainInfo,
        ) -> GateResult<f64> {
            Ok(self.balances.get(wallet).copied().unwrap_or(0.0))
        }
    }

    struct MockChat {
        kicked: Mutex<Vec<String>>,
        fail_kicks: bool,
    }

    #[async_trait]
    impl ChatPlatform for MockChat {
        async fn send_message(&self, _c: &str, _t: &str) -> GateResult<()> {
            Ok(())
        }
        async fn create_invite_link(&self, _g: &str, _n: &str, _e: i64) -> GateResult<String> {
            Ok("https://invite.test".to_string())
        }
        async fn member_status(&self, _g: &str, _u: &str) -> GateResult<MemberStatus> {
            Ok(MemberStatus::In)
        }
        async fn kick_member(&self, _group_id: &str, user_id: &str) -> GateResult<()> {
            if self.fail_kicks {
                return Err(crate::models::GateError::new(
                    crate::models::ErrorCode::ChatCallFailed,
                    "scripted kick failure",
                ));
            }
            self.kicked.lock().unwrap().push(user_id.to_string());
            Ok(())
        }
        async fn group_title(&self, group_id: &str) -> GateResult<String> {
            Ok(group_id.to_string())
        }
    }

    fn record(address: &str, verified: bool) -> UserRecord {
        UserRecord {
            address: address.to_string(),
            verified,
            last_verified: 1_700_000_000,
            verification_tx: true,
        }
    }

    fn seed_store(members: &[(&str, &str, bool)]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let mut groups = GroupConfigs::new();
        groups.insert(
            GROUP.to_string(),
            GroupConfig {
                chain_id: "eth".to_string(),
                token: "0xToken".to_string(),
                min_balance: 5.0,
                verifier: "0xVerifier".to_string(),
            },
        );
        store.save_groups(&groups).unwrap();

        let mut users = UserRecords::new();
        for (user_id, address, verified) in members {
            put_user_record(&mut users, GROUP, user_id, record(address, *verified));
        }
        store.save_users(&users).unwrap();
        store
    }

    fn sweep_with(
        store: Arc<MemoryStore>,
        balances: HashMap<String, f64>,
        fail_kicks: bool,
    ) -> (ReverificationSweep, Arc<MockChat>) {
        let chat = Arc::new(MockChat {
            kicked: Mutex::new(Vec::new()),
            fail_kicks,
        });
        let chain = Arc::new(BalanceChain::new(vec![Arc::new(ScriptedBalance {
            balances,
        })]));
        let sweep = ReverificationSweep::new(store, chat.clone(), chain, "owner-1".to_string());
        (sweep, chat)
    }

    #[tokio::test]
    async fn test_removes_below_threshold_only() {
        let store = seed_store(&[("1", "0xRich", true), ("2", "0xPoor", true)]);
        let balances = HashMap::from([("0xRich".to_string(), 10.0), ("0xPoor".to_string(), 3.0)]);
        let (sweep, chat) = sweep_with(store.clone(), balances, false);

        let report = sweep.run().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                groups: 1,
                verified: 1,
                removed: 1,
                errors: 0
            }
        );
        assert_eq!(chat.kicked.lock().unwrap().as_slice(), &["2".to_string()]);

        let users = store.load_users().unwrap();
        assert!(user_record(&users, GROUP, "1").unwrap().verified);
        assert!(!user_record(&users, GROUP, "2").unwrap().verified);
    }

    #[tokio::test]
    async fn test_skips_unverified_and_owner() {
        let store = seed_store(&[("owner-1", "0xOwner", true), ("9", "0xGone", false)]);
        let (sweep, chat) = sweep_with(store.clone(), HashMap::new(), false);

        let report = sweep.run().await.unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(report.errors, 0);
        assert!(chat.kicked.lock().unwrap().is_empty());

        // Owner stays verified even with zero balance
        let users = store.load_users().unwrap();
        assert!(user_record(&users, GROUP, "owner-1").unwrap().verified);
    }

    #[tokio::test]
    async fn test_kick_failure_is_isolated() {
        let store = seed_store(&[("1", "0xPoor", true), ("2", "0xAlsoPoor", true)]);
        let (sweep, _) = sweep_with(store.clone(), HashMap::new(), true);

        let report = sweep.run().await.unwrap();
        assert_eq!(report.errors, 2);
        assert_eq!(report.removed, 0);

        // Failed removals keep their records untouched
        let users = store.load_users().unwrap();
        assert!(user_record(&users, GROUP, "1").unwrap().verified);
        assert!(user_record(&users, GROUP, "2").unwrap().verified);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = seed_store(&[("1", "0xPoor", true)]);
        let (sweep, chat) = sweep_with(store.clone(), HashMap::new(), false);

        let first = sweep.run().await.unwrap();
        assert_eq!(first.removed, 1);

        // Second pass finds the record already unverified
        let second = sweep.run().await.unwrap();
        assert_eq!(second.removed, 0);
        assert_eq!(second.verified, 0);
        assert_eq!(chat.kicked.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_group_without_members_is_counted() {
        let store = Arc::new(MemoryStore::new());
        let mut groups = GroupConfigs::new();
        groups.insert(
            GROUP.to_string(),
            GroupConfig {
                chain_id: "eth".to_string(),
                token: "0xToken".to_string(),
                min_balance: 5.0,
                verifier: "0xVerifier".to_string(),
            },
        );
        store.save_groups(&groups).unwrap();

        let (sweep, _) = sweep_with(store, HashMap::new(), false);
        let report = sweep.run().await.unwrap();
        assert_eq!(report.groups, 1);
        assert_eq!(report.verified + report.removed + report.errors, 0);
    }
}
