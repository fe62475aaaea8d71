//! Token storage with expiry arithmetic and a generation guard.
//!
//! The in-memory mirror is authoritative for the running process. Writes are
//! mirrored to a [`PersistedStorage`] backend on a best-effort basis: a
//! failing backend is logged and never turns into a caller-visible error.
//! Backend I/O runs after the state lock is released, so a slow backend
//! never stalls token reads.

use crate::Clock;
use chrono::{DateTime, Utc};
use identity_storage::{MemoryStorage, PersistedStorage, StorageKeys, StorageResult};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default token type for the `Authorization` header.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

// Ten years either side of now; keeps chrono arithmetic in range.
const MAX_LIFETIME_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// How long an issued access token lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLifetime {
    /// Seconds from issuance. Negative values produce an already expired pair.
    ExpiresIn(i64),
    /// Explicit expiry, accepted verbatim.
    ExpiresAt(DateTime<Utc>),
}

/// Tokens as issued by a login or refresh, before expiry is resolved.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub lifetime: TokenLifetime,
}

impl TokenGrant {
    /// Bearer grant expiring `expires_in_secs` after it is stored.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_secs: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            lifetime: TokenLifetime::ExpiresIn(expires_in_secs),
        }
    }

    /// Bearer grant with an explicit expiry.
    pub fn expiring_at(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: DEFAULT_TOKEN_TYPE.to_string(),
            lifetime: TokenLifetime::ExpiresAt(expires_at),
        }
    }

    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Resolve the grant against `now`.
    pub fn into_pair(self, now: DateTime<Utc>) -> TokenPair {
        let expires_at = match self.lifetime {
            TokenLifetime::ExpiresAt(at) => at,
            TokenLifetime::ExpiresIn(secs) => {
                let secs = secs.clamp(-MAX_LIFETIME_SECS, MAX_LIFETIME_SECS);
                now + chrono::Duration::seconds(secs)
            }
        };
        TokenPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            token_type: self.token_type,
        }
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("token_type", &self.token_type)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// The current access/refresh token pair.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl TokenPair {
    /// True when `now` is at or past `expires_at - margin`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match chrono::Duration::from_std(margin)
            .ok()
            .and_then(|margin| self.expires_at.checked_sub_signed(margin))
        {
            Some(threshold) => now >= threshold,
            None => true,
        }
    }

    /// `Authorization` header value, e.g. `Bearer <token>`.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Persisted metadata stored next to the two tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionMeta {
    expires_at: DateTime<Utc>,
    token_type: String,
}

#[derive(Debug, Default)]
struct StoreState {
    tokens: Option<TokenPair>,
    generation: u64,
}

/// Holder of the current [`TokenPair`].
///
/// Every `set` and `clear` advances a generation counter. Operations that
/// started under one generation use [`TokenStore::commit_if_generation`] and
/// [`TokenStore::clear_if_generation`] so their results are discarded when
/// the session was replaced or ended in the meantime.
pub struct TokenStore {
    state: Mutex<StoreState>,
    /// Serializes backend writes in generation order.
    writer: Mutex<()>,
    storage: Arc<dyn PersistedStorage>,
    namespace: String,
    clock: Arc<dyn Clock>,
}

impl TokenStore {
    /// Create an empty store over `storage`. Nothing is read from the backend.
    pub fn new(
        storage: Arc<dyn PersistedStorage>,
        namespace: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            writer: Mutex::new(()),
            storage,
            namespace: namespace.into(),
            clock,
        }
    }

    /// Create a store with no persistence.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            identity_config_and_utils::DEFAULT_STORAGE_NAMESPACE,
            clock,
        )
    }

    /// Create a store hydrated from `storage`.
    ///
    /// A missing session yields an empty store. A partial or unreadable one is
    /// logged, removed from the backend, and also yields an empty store.
    pub fn load(
        storage: Arc<dyn PersistedStorage>,
        namespace: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Self::new(storage, namespace, clock);

        match store.read_persisted() {
            Ok(Some(pair)) => {
                debug!(expires_at = %pair.expires_at, "Restored persisted session");
                store.state.lock().tokens = Some(pair);
            }
            Ok(None) => {}
            Err(reason) => {
                warn!(namespace = %store.namespace, reason = %reason, "Discarding malformed persisted session");
                store.delete_persisted();
            }
        }

        store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn get(&self) -> Option<TokenPair> {
        self.state.lock().tokens.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Current tokens together with the generation they belong to.
    pub fn snapshot(&self) -> (Option<TokenPair>, u64) {
        let state = self.state.lock();
        (state.tokens.clone(), state.generation)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().tokens.as_ref().map(|pair| pair.expires_at)
    }

    /// True if there are no tokens or `now >= expires_at - margin`.
    pub fn is_expired(&self, margin: Duration) -> bool {
        let now = self.clock.now();
        self.state
            .lock()
            .tokens
            .as_ref()
            .map_or(true, |pair| pair.is_expired_at(now, margin))
    }

    /// Replace the stored tokens.
    pub fn set(&self, grant: TokenGrant) -> TokenPair {
        let pair = grant.into_pair(self.clock.now());
        let mut state = self.state.lock();
        state.tokens = Some(pair.clone());
        state.generation += 1;

        let _writer = self.hand_over(state);
        self.persist(&pair);
        pair
    }

    /// Replace the tokens only if no `set`/`clear` happened since `expected`.
    pub fn commit_if_generation(&self, expected: u64, grant: TokenGrant) -> Option<TokenPair> {
        let pair = grant.into_pair(self.clock.now());
        let mut state = self.state.lock();
        if state.generation != expected {
            debug!(
                expected,
                current = state.generation,
                "Discarding tokens from a superseded generation"
            );
            return None;
        }
        state.tokens = Some(pair.clone());
        state.generation += 1;

        let _writer = self.hand_over(state);
        self.persist(&pair);
        Some(pair)
    }

    /// Remove the tokens. Idempotent.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.tokens = None;
        state.generation += 1;

        let _writer = self.hand_over(state);
        self.delete_persisted();
    }

    /// Remove the tokens only if no `set`/`clear` happened since `expected`.
    pub fn clear_if_generation(&self, expected: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != expected {
            return false;
        }
        state.tokens = None;
        state.generation += 1;

        let _writer = self.hand_over(state);
        self.delete_persisted();
        true
    }

    /// Trade the state lock for the writer lock.
    ///
    /// The writer is taken before the state is released, so backend writes
    /// happen in the same order as the in-memory updates.
    fn hand_over<'a>(&'a self, state: MutexGuard<'a, StoreState>) -> MutexGuard<'a, ()> {
        let writer = self.writer.lock();
        drop(state);
        writer
    }

    fn key(&self, name: &str) -> String {
        StorageKeys::namespaced(&self.namespace, name)
    }

    fn persist(&self, pair: &TokenPair) {
        if let Err(e) = self.write_persisted(pair) {
            warn!(error = %e, "Failed to persist tokens, keeping in-memory session");
        }
    }

    fn write_persisted(&self, pair: &TokenPair) -> StorageResult<()> {
        let meta = serde_json::to_string(&SessionMeta {
            expires_at: pair.expires_at,
            token_type: pair.token_type.clone(),
        })?;
        self.storage
            .set(&self.key(StorageKeys::ACCESS_TOKEN), &pair.access_token)?;
        self.storage
            .set(&self.key(StorageKeys::REFRESH_TOKEN), &pair.refresh_token)?;
        self.storage.set(&self.key(StorageKeys::SESSION_META), &meta)?;
        Ok(())
    }

    fn delete_persisted(&self) {
        for name in [
            StorageKeys::ACCESS_TOKEN,
            StorageKeys::REFRESH_TOKEN,
            StorageKeys::SESSION_META,
        ] {
            if let Err(e) = self.storage.delete(&self.key(name)) {
                warn!(key = name, error = %e, "Failed to delete persisted session key");
            }
        }
    }

    /// `Err` carries the reason a persisted session is unusable.
    fn read_persisted(&self) -> Result<Option<TokenPair>, String> {
        let read = |name: &str| {
            self.storage
                .get(&self.key(name))
                .map_err(|e| format!("failed to read {}: {}", name, e))
        };

        let access = read(StorageKeys::ACCESS_TOKEN)?;
        let refresh = read(StorageKeys::REFRESH_TOKEN)?;
        let meta = read(StorageKeys::SESSION_META)?;

        match (access, refresh, meta) {
            (None, None, None) => Ok(None),
            (Some(access_token), Some(refresh_token), Some(meta)) => {
                let meta: SessionMeta = serde_json::from_str(&meta)
                    .map_err(|e| format!("invalid session metadata: {}", e))?;
                Ok(Some(TokenPair {
                    access_token,
                    refresh_token,
                    expires_at: meta.expires_at,
                    token_type: meta.token_type,
                }))
            }
            _ => Err("incomplete session key set".to_string()),
        }
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TokenStore")
            .field("namespace", &self.namespace)
            .field("generation", &state.generation)
            .field("tokens", &state.tokens)
            .finish()
    }
}
