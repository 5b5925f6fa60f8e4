use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use chrono::Utc;

use crate::session::AuthGrant;

/// Tokens are never reused this close to their expiry.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

struct CachedGrant {
    grant: AuthGrant,
    valid_until: Instant,
}

/// Short-lived identity tokens keyed by config fingerprint.
pub struct SessionCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedGrant>>,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, fingerprint: &str) -> Option<AuthGrant> {
        let mut entries = self.entries.lock().ok()?;
        let now = Instant::now();
        match entries.get(fingerprint) {
            Some(cached) if cached.valid_until > now => Some(cached.grant.clone()),
            Some(_) => {
                entries.remove(fingerprint);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, fingerprint: String, grant: AuthGrant) {
        let mut lifetime = self.ttl;
        if let Some(expires_at) = grant.expires_at {
            let remaining = (expires_at - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .saturating_sub(EXPIRY_MARGIN);
            lifetime = lifetime.min(remaining);
        }
        if lifetime.is_zero() {
            return;
        }

        if let Ok(mut entries) = self.entries.lock() {
            // Entries for configs that are no longer in use are never looked
            // up again, so expired ones are dropped here.
            let now = Instant::now();
            entries.retain(|_, cached| cached.valid_until > now);
            entries.insert(
                fingerprint,
                CachedGrant {
                    grant,
                    valid_until: now + lifetime,
                },
            );
        }
    }

    pub fn invalidate(&self, fingerprint: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(fingerprint);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
