//! Credential rotation with round-robin selection and failure cooldown.
//!
//! [`AuthRotator`] holds the resolved credential ring (`oracle.credentials`)
//! and hands slots out via [`AuthRotator::next_key`] in round-robin order.
//! When a credential causes a failure, callers invoke
//! [`AuthRotator::mark_failed`] to put it into a cooldown window; slots in
//! cooldown are skipped during rotation, and if every slot is cooling down
//! the least-recently-failed one is returned instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use forge_domain::config::CredentialConfig;
use forge_domain::{Error, Result};

const DEFAULT_COOLDOWN_SECS: u64 = 60;

struct KeySlot {
    id: String,
    base_url: String,
    model: Option<String>,
    key: String,
    failed_at: Option<Instant>,
}

/// Thread-safe round-robin credential rotator with failure cooldown.
pub struct AuthRotator {
    slots: Mutex<Vec<KeySlot>>,
    index: AtomicUsize,
    cooldown: Duration,
}

impl AuthRotator {
    fn new(resolved: Vec<(CredentialConfig, String)>, cooldown: Duration) -> Result<Self> {
        if resolved.is_empty() {
            return Err(Error::Validation("AuthRotator requires at least one resolved credential".into()));
        }
        let slots = resolved
            .into_iter()
            .map(|(cred, key)| KeySlot { id: cred.id, base_url: cred.base_url, model: cred.model, key, failed_at: None })
            .collect();
        Ok(AuthRotator { slots: Mutex::new(slots), index: AtomicUsize::new(0), cooldown })
    }

    /// Resolves each configured credential's API key via
    /// [`crate::util::resolve_api_key`] and builds the ring.
    pub fn from_credentials(credentials: &[CredentialConfig]) -> Result<Self> {
        let mut resolved = Vec::with_capacity(credentials.len());
        for cred in credentials {
            let key = crate::util::resolve_api_key(&cred.auth, &cred.id)?;
            resolved.push((cred.clone(), key));
        }
        Self::new(resolved, Duration::from_secs(DEFAULT_COOLDOWN_SECS))
    }

    /// Returns the next healthy credential using round-robin, skipping
    /// slots still within their cooldown window. If every slot is in
    /// cooldown, returns the one that failed longest ago.
    pub fn next_key(&self) -> ResolvedCredential {
        let slots = self.slots.lock().expect("AuthRotator lock poisoned");
        let len = slots.len();
        let now = Instant::now();

        if len == 1 {
            return ResolvedCredential::from_slot(0, &slots[0]);
        }

        let start = self.index.fetch_add(1, Ordering::Relaxed) % len;
        for offset in 0..len {
            let idx = (start + offset) % len;
            let slot = &slots[idx];
            if let Some(failed_at) = slot.failed_at {
                if now.duration_since(failed_at) < self.cooldown {
                    continue;
                }
            }
            return ResolvedCredential::from_slot(idx, slot);
        }

        let (idx, slot) = slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.failed_at.unwrap_or(now))
            .expect("slots is non-empty");
        ResolvedCredential::from_slot(idx, slot)
    }

    pub fn mark_failed(&self, index: usize) {
        let mut slots = self.slots.lock().expect("AuthRotator lock poisoned");
        if let Some(slot) = slots.get_mut(index) {
            slot.failed_at = Some(Instant::now());
            tracing::warn!(credential_id = %slot.id, cooldown_secs = self.cooldown.as_secs(), "credential marked failed, entering cooldown");
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().expect("AuthRotator lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for AuthRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.slots.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("AuthRotator").field("credential_count", &len).field("cooldown", &self.cooldown).finish()
    }
}

/// A resolved credential returned by [`AuthRotator::next_key`]. Callers hold
/// `index` to report failures via [`AuthRotator::mark_failed`].
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub index: usize,
    pub id: String,
    pub base_url: String,
    pub model: Option<String>,
    pub key: String,
}

impl ResolvedCredential {
    fn from_slot(index: usize, slot: &KeySlot) -> Self {
        ResolvedCredential { index, id: slot.id.clone(), base_url: slot.base_url.clone(), model: slot.model.clone(), key: slot.key.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cred(id: &str) -> CredentialConfig {
        CredentialConfig {
            id: id.into(),
            base_url: "https://api.example.com/v1".into(),
            model: None,
            auth: forge_domain::config::AuthMode::ApiKey { key: format!("{id}-key") },
        }
    }

    fn rotator(ids: &[&str], cooldown: Duration) -> AuthRotator {
        let resolved = ids.iter().map(|id| (cred(id), format!("{id}-key"))).collect();
        AuthRotator::new(resolved, cooldown).unwrap()
    }

    #[test]
    fn single_key_always_returns_same() {
        let r = rotator(&["a"], Duration::from_secs(60));
        assert_eq!(r.next_key().id, "a");
        assert_eq!(r.next_key().id, "a");
    }

    #[test]
    fn round_robin_cycles_through_keys() {
        let r = rotator(&["a", "b", "c"], Duration::from_secs(60));
        let seen: Vec<_> = (0..6).map(|_| r.next_key().id).collect();
        assert_eq!(seen, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn mark_failed_skips_credential() {
        let r = rotator(&["a", "b", "c"], Duration::from_secs(60));
        assert_eq!(r.next_key().id, "a");
        r.mark_failed(1);
        assert_eq!(r.next_key().id, "c");
        assert_eq!(r.next_key().id, "c");
        assert_eq!(r.next_key().id, "a");
    }

    #[test]
    fn all_failed_returns_least_recently_failed() {
        let r = rotator(&["a", "b"], Duration::from_secs(60));
        r.mark_failed(0);
        std::thread::sleep(Duration::from_millis(10));
        r.mark_failed(1);
        assert_eq!(r.next_key().id, "a");
    }

    #[test]
    fn expired_cooldown_credential_is_available() {
        let r = rotator(&["a", "b"], Duration::from_millis(50));
        r.mark_failed(0);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(r.next_key().id, "a");
    }

    #[test]
    fn empty_credentials_returns_error() {
        assert!(AuthRotator::new(vec![], Duration::from_secs(60)).is_err());
    }

    #[test]
    fn debug_does_not_leak_keys() {
        let r = rotator(&["a"], Duration::from_secs(60));
        let s = format!("{r:?}");
        assert!(!s.contains("a-key"));
        assert!(s.contains("credential_count: 1"));
    }
}
