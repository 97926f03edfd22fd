//! Persistent Store
//!
//! Six logical collections, each independently loadable and saveable as a
//! whole-collection snapshot (admin tooling and diagnostics dump them
//! wholesale): groups, user_data, whitelist, pending_whitelist,
//! rejected_groups, verification_links.
//!
//! The backend is selected once at startup, not detected per call:
//! [`JsonFileStore`] keeps one JSON blob per collection under a data
//! directory; [`MemoryStore`] backs tests and diagnostics.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use crate::models::{
    GateError, GateResult, GroupConfigs, PendingWhitelist, RejectedGroups, UserRecords,
    VerificationLinks, Whitelist,
};

/// Durable storage for the six gate collections.
///
/// Implementations must preserve exact round-trip of all fields, booleans and
/// integer timestamps included.
pub trait Store: Send + Sync {
    fn load_groups(&self) -> GateResult<GroupConfigs>;
    fn save_groups(&self, groups: &GroupConfigs) -> GateResult<()>;

    fn load_users(&self) -> GateResult<UserRecords>;
    fn save_users(&self, users: &UserRecords) -> GateResult<()>;

    fn load_whitelist(&self) -> GateResult<Whitelist>;
    fn save_whitelist(&self, whitelist: &Whitelist) -> GateResult<()>;

    fn load_pending(&self) -> GateResult<PendingWhitelist>;
    fn save_pending(&self, pending: &PendingWhitelist) -> GateResult<()>;

    fn load_rejections(&self) -> GateResult<RejectedGroups>;
    fn save_rejections(&self, rejections: &RejectedGroups) -> GateResult<()>;

    fn load_links(&self) -> GateResult<VerificationLinks>;
    fn save_links(&self, links: &VerificationLinks) -> GateResult<()>;
}

// ============================================
// JSON FILE BACKEND
// ============================================

/// One JSON file per collection under a data directory
pub struct JsonFileStore {
    data_dir: PathBuf,
    /// Serializes read-modify-write cycles from concurrent tasks
    write_lock: Mutex<()>,
}

const GROUPS_FILE: &str = "config.json";
const USERS_FILE: &str = "user_data.json";
const WHITELIST_FILE: &str = "whitelist.json";
const PENDING_FILE: &str = "pending_whitelist.json";
const REJECTED_FILE: &str = "rejected_groups.json";
const LINKS_FILE: &str = "verification_links.json";

impl JsonFileStore {
    /// Open (creating the directory if needed) a file-backed store
    pub fn open(data_dir: impl AsRef<Path>) -> GateResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|e| {
            GateError::storage_write(format!(
                "Cannot create data dir {}: {}",
                data_dir.display(),
                e
            ))
        })?;
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn load_collection<T: DeserializeOwned + Default>(&self, file: &str) -> GateResult<T> {
        let path = self.data_dir.join(file);
        if !path.exists() {
            return Ok(T::default());
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| GateError::storage_read(format!("Error loading {}: {}", file, e)))?;
        serde_json::from_str(&raw).map_err(|e| {
            error!("❌ Corrupt collection {}: {}", file, e);
            GateError::storage_read(format!("Corrupt collection {}: {}", file, e))
        })
    }

    fn save_collection<T: Serialize>(&self, file: &str, data: &T) -> GateResult<()> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let path = self.data_dir.join(file);
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| GateError::storage_write(format!("Serialize {}: {}", file, e)))?;
        // Write to a sibling temp file first so a crash never truncates the live snapshot
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| GateError::storage_write(format!("Error saving {}: {}", file, e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| GateError::storage_write(format!("Error saving {}: {}", file, e)))?;
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn load_groups(&self) -> GateResult<GroupConfigs> {
        self.load_collection(GROUPS_FILE)
    }
    fn save_groups(&self, groups: &GroupConfigs) -> GateResult<()> {
        self.save_collection(GROUPS_FILE, groups)
    }

    fn load_users(&self) -> GateResult<UserRecords> {
        self.load_collection(USERS_FILE)
    }
    fn save_users(&self, users: &UserRecords) -> GateResult<()> {
        self.save_collection(USERS_FILE, users)
    }

    fn load_whitelist(&self) -> GateResult<Whitelist> {
        self.load_collection(WHITELIST_FILE)
    }
    fn save_whitelist(&self, whitelist: &Whitelist) -> GateResult<()> {
        self.save_collection(WHITELIST_FILE, whitelist)
    }

    fn load_pending(&self) -> GateResult<PendingWhitelist> {
        self.load_collection(PENDING_FILE)
    }
    fn save_pending(&self, pending: &PendingWhitelist) -> GateResult<()> {
        self.save_collection(PENDING_FILE, pending)
    }

    fn load_rejections(&self) -> GateResult<RejectedGroups> {
        self.load_collection(REJECTED_FILE)
    }
    fn save_rejections(&self, rejections: &RejectedGroups) -> GateResult<()> {
        self.save_collection(REJECTED_FILE, rejections)
    }

    fn load_links(&self) -> GateResult<VerificationLinks> {
        self.load_collection(LINKS_FILE)
    }
    fn save_links(&self, links: &VerificationLinks) -> GateResult<()> {
        self.save_collection(LINKS_FILE, links)
    }
}

// ============================================
// IN-MEMORY BACKEND
// ============================================

/// In-memory store for tests and diagnostics
#[derive(Default)]
pub struct MemoryStore {
    groups: Mutex<GroupConfigs>,
    users: Mutex<UserRecords>,
    whitelist: Mutex<Whitelist>,
    pending: Mutex<PendingWhitelist>,
    rejections: Mutex<RejectedGroups>,
    links: Mutex<VerificationLinks>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn clone_of<T: Clone>(m: &Mutex<T>) -> GateResult<T> {
    Ok(m.lock().expect("store lock poisoned").clone())
}

fn replace_with<T: Clone>(m: &Mutex<T>, value: &T) -> GateResult<()> {
    *m.lock().expect("store lock poisoned") = value.clone();
    Ok(())
}

impl Store for MemoryStore {
    fn load_groups(&self) -> GateResult<GroupConfigs> {
        clone_of(&self.groups)
    }
    fn save_groups(&self, groups: &GroupConfigs) -> GateResult<()> {
        replace_with(&self.groups, groups)
    }

    fn load_users(&self) -> GateResult<UserRecords> {
        clone_of(&self.users)
    }
    fn save_users(&self, users: &UserRecords) -> GateResult<()> {
        replace_with(&self.users, users)
    }

    fn load_whitelist(&self) -> GateResult<Whitelist> {
        clone_of(&self.whitelist)
    }
    fn save_whitelist(&self, whitelist: &Whitelist) -> GateResult<()> {
        replace_with(&self.whitelist, whitelist)
    }

    fn load_pending(&self) -> GateResult<PendingWhitelist> {
        clone_of(&self.pending)
    }
    fn save_pending(&self, pending: &PendingWhitelist) -> GateResult<()> {
        replace_with(&self.pending, pending)
    }

    fn load_rejections(&self) -> GateResult<RejectedGroups> {
        clone_of(&self.rejections)
    }
    fn save_rejections(&self, rejections: &RejectedGroups) -> GateResult<()> {
        replace_with(&self.rejections, rejections)
    }

    fn load_links(&self) -> GateResult<VerificationLinks> {
        clone_of(&self.links)
    }
    fn save_links(&self, links: &VerificationLinks) -> GateResult<()> {
        replace_with(&self.links, links)
    }
}

// ============================================
// SHARED HELPERS
// ============================================

/// Look up one user's record inside the nested user_data collection
pub fn user_record<'a>(
    users: &'a UserRecords,
    group_id: &str,
    user_id: &str,
) -> Option<&'a crate::models::UserRecord> {
    users.get(group_id).and_then(|g| g.get(user_id))
}

/// Insert/overwrite one user's record, creating the group bucket if needed
pub fn put_user_record(
    users: &mut UserRecords,
    group_id: &str,
    user_id: &str,
    record: crate::models::UserRecord,
) {
    users
        .entry(group_id.to_string())
        .or_insert_with(HashMap::new)
        .insert(user_id.to_string(), record);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupConfig, UserRecord};

    fn sample_config() -> GroupConfig {
        GroupConfig {
            chain_id: "eth".to_string(),
            token: "0xToken".to_string(),
            min_balance: 5.0,
            verifier: "0xVerifier".to_string(),
        }
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let mut groups = GroupConfigs::new();
        groups.insert("-100".to_string(), sample_config());
        store.save_groups(&groups).unwrap();
        assert_eq!(store.load_groups().unwrap(), groups);
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("tokengate-store-{}", std::process::id()));
        let store = JsonFileStore::open(&dir).unwrap();

        let mut users = UserRecords::new();
        put_user_record(
            &mut users,
            "-100",
            "42",
            UserRecord {
                address: "0xabc".to_string(),
                verified: true,
                last_verified: 1_700_000_000,
                verification_tx: true,
            },
        );
        store.save_users(&users).unwrap();
        let loaded = store.load_users().unwrap();
        assert_eq!(loaded, users);
        assert!(user_record(&loaded, "-100", "42").unwrap().verified);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_collection_loads_empty() {
        let dir = std::env::temp_dir().join(format!("tokengate-empty-{}", std::process::id()));
        let store = JsonFileStore::open(&dir).unwrap();
        assert!(store.load_whitelist().unwrap().is_empty());
        assert!(store.load_links().unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
