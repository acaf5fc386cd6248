//! Key-scoped registry of cancellation tokens for in-flight attempts

use crate::tracker::AttemptId;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use warmup_core::ResourceKey;

/// At most one registered token per key; the latest attempt owns it
#[derive(Debug, Default)]
pub(crate) struct ActiveAttempts {
    tokens: DashMap<ResourceKey, (AttemptId, CancellationToken)>,
}

impl ActiveAttempts {
    /// Register `token` for `key`, displacing any older attempt's token
    pub fn register(&self, key: &ResourceKey, attempt: AttemptId, token: CancellationToken) {
        if let Some((previous, _)) = self.tokens.insert(key.clone(), (attempt, token)) {
            tracing::trace!(key = %key, previous_attempt = previous, attempt, "Displaced active prefetch");
        }
    }

    /// Remove the registration if `attempt` still owns it
    pub fn release_if_owner(&self, key: &ResourceKey, attempt: AttemptId) -> bool {
        self.tokens
            .remove_if(key, |_, (owner, _)| *owner == attempt)
            .is_some()
    }

    /// Cancel the registered token if `attempt` still owns it
    pub fn cancel_if_owner(&self, key: &ResourceKey, attempt: AttemptId) -> bool {
        let token = match self.tokens.get(key) {
            Some(entry) if entry.0 == attempt => entry.1.clone(),
            _ => return false,
        };
        token.cancel();
        true
    }

    /// Cancel whatever token is registered for `key`
    pub fn abort(&self, key: &ResourceKey) -> bool {
        let token = match self.tokens.get(key) {
            Some(entry) => entry.1.clone(),
            None => return false,
        };
        token.cancel();
        true
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}
