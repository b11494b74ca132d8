//! Process lifecycle state.
//!
//! ```text
//! Initializing → Serving → Draining → Terminated
//! ```
//!
//! Transitions only move forward; the orchestrator is the only writer.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

/// Process-wide phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Initializing,
    Serving,
    Draining,
    Terminated,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Initializing => "initializing",
            LifecycleState::Serving => "serving",
            LifecycleState::Draining => "draining",
            LifecycleState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Observable lifecycle cell. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LifecycleState::Initializing);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Receiver that is notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move to `next` if it lies ahead of the current state.
    ///
    /// Returns whether a transition happened.
    pub(crate) fn advance(&self, next: LifecycleState) -> bool {
        let mut from = None;
        let moved = self.tx.send_if_modified(|state| {
            if next > *state {
                from = Some(*state);
                *state = next;
                true
            } else {
                false
            }
        });
        if let Some(from) = from {
            tracing::info!(from = %from, to = %next, "lifecycle transition");
        }
        moved
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_initializing() {
        assert_eq!(Lifecycle::new().current(), LifecycleState::Initializing);
    }

    #[test]
    fn only_moves_forward() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.advance(LifecycleState::Serving));
        assert!(lifecycle.advance(LifecycleState::Draining));
        assert!(!lifecycle.advance(LifecycleState::Serving));
        assert!(!lifecycle.advance(LifecycleState::Draining));
        assert_eq!(lifecycle.current(), LifecycleState::Draining);
    }

    #[test]
    fn may_skip_ahead() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.advance(LifecycleState::Terminated));
        assert_eq!(lifecycle.current(), LifecycleState::Terminated);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let lifecycle = Lifecycle::new();
        let mut rx = lifecycle.subscribe();

        lifecycle.advance(LifecycleState::Serving);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), LifecycleState::Serving);
    }
}
