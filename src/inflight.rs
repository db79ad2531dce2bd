use crate::errors::Error;
use crate::model::endpoint::Endpoint;
use crate::model::response::CallResult;
use crate::token::CancelToken;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;

/// One pending completion: the caller's token plus its one-shot result
/// channel. A consumed sender cannot fire again, so exactly-once delivery
/// is structural rather than a convention.
pub struct Waiter {
    pub token: CancelToken,
    pub tx: oneshot::Sender<CallResult>,
}

impl Waiter {
    pub fn new(token: CancelToken, tx: oneshot::Sender<CallResult>) -> Self {
        Waiter { token, tx }
    }

    /// Delivers the terminal result. A waiter whose token was cancelled
    /// receives a synthesized cancellation error instead of `result`.
    pub fn deliver(self, result: CallResult) {
        let result = if self.token.is_cancelled() {
            Err(Error::cancelled())
        } else {
            result
        };
        // The receiver side may already be gone (caller dropped the future);
        // that is its choice, not a lost completion.
        let _ = self.tx.send(result);
    }
}

/// Shared table collapsing concurrent identical requests.
///
/// An endpoint key is present iff at least one call for it is outstanding.
/// Registration (check + insert) and fan-out (remove + deliver) each hold
/// the map lock for their full duration, so a registration racing a fan-out
/// either makes it into that fan-out's waiter list or starts a fresh
/// in-flight cycle; a waiter is never lost.
#[derive(Default)]
pub struct InflightRegistry {
    entries: Mutex<HashMap<Endpoint, Vec<Waiter>>>,
}

impl InflightRegistry {
    pub fn new() -> Self {
        InflightRegistry::default()
    }

    /// Registers a waiter under `key`. Returns `true` when an operation for
    /// this endpoint was already in flight (the waiter joined it) and
    /// `false` when the caller is now the representative for the key.
    pub fn try_register(&self, key: &Endpoint, waiter: Waiter) -> bool {
        let mut entries = self.lock_entries();
        match entries.get_mut(key) {
            Some(waiters) => {
                waiters.push(waiter);
                debug!(
                    "joined in-flight call: method={} url={} waiters={}",
                    key.method,
                    key.url,
                    waiters.len()
                );
                true
            }
            None => {
                entries.insert(key.clone(), vec![waiter]);
                false
            }
        }
    }

    /// Removes the entry for `key` and delivers `result` to every waiter in
    /// registration order. Cancelled waiters receive a cancellation error.
    pub fn fan_out(&self, key: &Endpoint, result: CallResult) {
        let mut entries = self.lock_entries();
        let waiters = match entries.remove(key) {
            Some(waiters) => waiters,
            None => return,
        };
        debug!(
            "fanning out result: method={} url={} waiters={}",
            key.method,
            key.url,
            waiters.len()
        );
        // Deliver while still holding the lock; sends are non-blocking and
        // this keeps late registrants on a fresh cycle.
        for waiter in waiters {
            waiter.deliver(result.clone());
        }
    }

    /// Whether any non-cancelled waiter remains for `key`. Drives the
    /// last-waiter cancellation policy.
    pub fn has_live_waiters(&self, key: &Endpoint) -> bool {
        let entries = self.lock_entries();
        entries
            .get(key)
            .map(|waiters| waiters.iter().any(|w| !w.token.is_cancelled()))
            .unwrap_or(false)
    }

    pub fn contains(&self, key: &Endpoint) -> bool {
        self.lock_entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<Endpoint, Vec<Waiter>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
