use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type CancelAction = Box<dyn FnOnce() + Send>;

/// Internal token state machine. The cancel action is usually assigned
/// after creation, once the transport task exists.
enum TokenState {
    Unarmed,
    Armed(CancelAction),
    Cancelled,
}

/// Caller-held handle to one logical request.
///
/// `cancel()` is idempotent and thread-safe; each assigned cancel action is
/// invoked at most once. Once cancelled the token never reverts. A cancel
/// requested before the action exists is honored the moment the pipeline
/// arms the token.
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<Mutex<TokenState>>,
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken {
            state: Arc::new(Mutex::new(TokenState::Unarmed)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Marks the token cancelled and runs the armed action, if any.
    pub fn cancel(&self) {
        let action = {
            let mut state = self.lock_state();
            self.cancelled.store(true, Ordering::Release);
            match std::mem::replace(&mut *state, TokenState::Cancelled) {
                TokenState::Armed(action) => Some(action),
                _ => None,
            }
        };
        // Run outside the lock: the action may take other locks (registry).
        if let Some(action) = action {
            action();
        }
    }

    /// Assigns the cancel action. If the token was cancelled before the
    /// action became available the action runs immediately.
    pub(crate) fn arm(&self, action: CancelAction) {
        let run_now = {
            let mut state = self.lock_state();
            if matches!(*state, TokenState::Cancelled) {
                true
            } else {
                *state = TokenState::Armed(action);
                return;
            }
        };
        debug_assert!(run_now);
        action();
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        CancelToken::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
