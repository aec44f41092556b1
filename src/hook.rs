//! Hook registry for circuit breaker events.

use crate::state::{State, Transition};
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::error::Error;
use std::sync::Arc;

type TransitionHook = Arc<dyn Fn(Transition) + Send + Sync + 'static>;
type CallHook = Arc<dyn Fn() + Send + Sync + 'static>;
type FailureHook = Arc<dyn Fn(&(dyn Error + Send + Sync + 'static)) + Send + Sync + 'static>;

/// A registry for circuit breaker event hooks.
///
/// Hooks run on the calling thread after the breaker lock has been released,
/// so they may query the breaker or register more hooks.
pub struct HookRegistry {
    on_transition: RwLock<SmallVec<[TransitionHook; 4]>>,
    on_success: RwLock<Option<CallHook>>,
    on_failure: RwLock<Option<FailureHook>>,
    on_rejected: RwLock<Option<CallHook>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("on_transition", &self.on_transition.read().len())
            .field("on_success", &self.on_success.read().is_some())
            .field("on_failure", &self.on_failure.read().is_some())
            .field("on_rejected", &self.on_rejected.read().is_some())
            .finish()
    }
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self {
            on_transition: RwLock::new(SmallVec::new()),
            on_success: RwLock::new(None),
            on_failure: RwLock::new(None),
            on_rejected: RwLock::new(None),
        }
    }

    /// Adds a listener for every state transition, forced ones included.
    pub fn on_transition<F>(&self, f: F)
    where
        F: Fn(Transition) + Send + Sync + 'static,
    {
        self.on_transition.write().push(Arc::new(f));
    }

    /// Adds a listener for transitions into the open state.
    pub fn set_on_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_entering(State::Open, f);
    }

    /// Adds a listener for transitions into the closed state.
    pub fn set_on_close<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_entering(State::Closed, f);
    }

    /// Adds a listener for transitions into the half-open state.
    pub fn set_on_half_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_entering(State::HalfOpen, f);
    }

    /// Sets the hook to call when a guarded operation succeeds.
    pub fn set_on_success<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_success.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call with the error of a failed guarded operation.
    pub fn set_on_failure<F>(&self, f: F)
    where
        F: Fn(&(dyn Error + Send + Sync + 'static)) + Send + Sync + 'static,
    {
        *self.on_failure.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when an open circuit blocks an attempt.
    pub fn set_on_rejected<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_rejected.write() = Some(Arc::new(f));
    }

    fn on_entering<F>(&self, target: State, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_transition(move |t| {
            if t.to == target {
                f();
            }
        });
    }

    pub(crate) fn execute_transition_hooks(&self, transition: Transition) {
        let hooks = self.on_transition.read().clone();
        for hook in hooks.iter() {
            hook(transition);
        }
    }

    pub(crate) fn execute_success_hook(&self) {
        let hook = self.on_success.read().clone();
        if let Some(hook) = hook {
            hook();
        }
    }

    pub(crate) fn execute_failure_hook(&self, error: &(dyn Error + Send + Sync + 'static)) {
        let hook = self.on_failure.read().clone();
        if let Some(hook) = hook {
            hook(error);
        }
    }

    pub(crate) fn execute_rejected_hook(&self) {
        let hook = self.on_rejected.read().clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn state_filters_only_fire_for_their_target() {
        let hooks = HookRegistry::new();
        let opened = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));
        let all = Arc::new(AtomicUsize::new(0));

        let o = Arc::clone(&opened);
        hooks.set_on_open(move || {
            o.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&closed);
        hooks.set_on_close(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let a = Arc::clone(&all);
        hooks.on_transition(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });

        hooks.execute_transition_hooks(Transition {
            from: State::Closed,
            to: State::Open,
        });
        hooks.execute_transition_hooks(Transition {
            from: State::Open,
            to: State::HalfOpen,
        });

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
        assert_eq!(all.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failure_hook_sees_the_error() {
        let hooks = HookRegistry::new();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let s = Arc::clone(&seen);
        hooks.set_on_failure(move |e| {
            *s.lock() = Some(e.to_string());
        });

        let err = io::Error::new(io::ErrorKind::TimedOut, "slow backend");
        hooks.execute_failure_hook(&err);
        assert_eq!(seen.lock().as_deref(), Some("slow backend"));
    }

    #[test]
    fn hook_may_register_another_hook() {
        let hooks = Arc::new(HookRegistry::new());
        let inner = Arc::clone(&hooks);
        hooks.set_on_rejected(move || {
            inner.set_on_success(|| {});
        });

        hooks.execute_rejected_hook();
        assert!(hooks.on_success.read().is_some());
    }
}
