//! Verification Link Registry
//!
//! Deep-link tokens that carry a candidate from a group into a private
//! verification conversation. Tokens are opaque random strings mapped to a
//! group id in the persistent store; expiry (when configured) is evaluated
//! lazily at resolution time, never by a background job.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{GateResult, VerificationLink};
use crate::store::Store;
use crate::utils::unix_now;

/// Length of the random deep-link token
const TOKEN_LEN: usize = 22;

/// Issues and resolves deep-link verification tokens
pub struct LinkRegistry {
    store: Arc<dyn Store>,
    /// None means links never expire
    ttl_secs: Option<u64>,
}

impl LinkRegistry {
    pub fn new(store: Arc<dyn Store>, ttl_secs: Option<u64>) -> Self {
        Self { store, ttl_secs }
    }

    /// Mint a fresh token bound to `group_id` and persist it
    pub fn issue(&self, group_id: &str) -> GateResult<String> {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();

        let mut links = self.store.load_links()?;
        links.insert(
            token.clone(),
            VerificationLink {
                group_id: group_id.to_string(),
                created_at: unix_now(),
            },
        );
        self.store.save_links(&links)?;
        info!("🔗 Issued verification link for group {}", group_id);
        Ok(token)
    }

    /// Resolve a token back to its group id.
    ///
    /// Unknown tokens resolve to `None`. With a TTL configured, an expired
    /// token is deleted on sight and also resolves to `None`.
    pub fn resolve(&self, token: &str) -> GateResult<Option<String>> {
        let mut links = self.store.load_links()?;
        let Some(link) = links.get(token) else {
            return Ok(None);
        };

        if let Some(ttl) = self.ttl_secs {
            let age = unix_now() - link.created_at;
            if age > ttl as i64 {
                debug!("🔗 Link expired after {}s, discarding", age);
                links.remove(token);
                self.store.save_links(&links)?;
                return Ok(None);
            }
        }
        Ok(Some(link.group_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_issue_and_resolve() {
        let store = Arc::new(MemoryStore::new());
        let registry = LinkRegistry::new(store, None);

        let token = registry.issue("-100123").unwrap();
        assert_eq!(token.len(), TOKEN_LEN);
        assert_eq!(registry.resolve(&token).unwrap().as_deref(), Some("-100123"));
    }

    #[test]
    fn test_unknown_token_resolves_none() {
        let registry = LinkRegistry::new(Arc::new(MemoryStore::new()), None);
        assert!(registry.resolve("nope").unwrap().is_none());
    }

    #[test]
    fn test_no_ttl_means_no_expiry() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let registry = LinkRegistry::new(store.clone(), None);
        let token = registry.issue("-100").unwrap();

        // Backdate the link far past any plausible TTL
        let mut links = store.load_links().unwrap();
        links.get_mut(&token).unwrap().created_at = 0;
        store.save_links(&links).unwrap();

        assert!(registry.resolve(&token).unwrap().is_some());
    }

    #[test]
    fn test_ttl_expiry_deletes_token() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let registry = LinkRegistry::new(store.clone(), Some(60));
        let token = registry.issue("-100").unwrap();

        let mut links = store.load_links().unwrap();
        links.get_mut(&token).unwrap().created_at = unix_now() - 61;
        store.save_links(&links).unwrap();

        assert!(registry.resolve(&token).unwrap().is_none());
        // Expired token was removed from the collection
        assert!(store.load_links().unwrap().is_empty());
    }

    #[test]
    fn test_fresh_token_within_ttl_resolves() {
        let registry = LinkRegistry::new(Arc::new(MemoryStore::new()), Some(600));
        let token = registry.issue("-100").unwrap();
        assert_eq!(registry.resolve(&token).unwrap().as_deref(), Some("-100"));
    }
}
