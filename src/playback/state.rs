//! Source state machine and its observable property.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Lifecycle state of a media source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Opened, pipeline not yet producing frames
    Initializing,
    /// Decoding and delivering frames
    Live,
    /// Pipeline finished, either at end of input or on stop
    Ended,
}

impl SourceState {
    pub fn is_live(&self) -> bool {
        matches!(self, SourceState::Live)
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, SourceState::Ended)
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceState::Initializing => "initializing",
            SourceState::Live => "live",
            SourceState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Current state plus change notification.
///
/// Listeners subscribe with [`StateProperty::subscribe`] and unsubscribe by
/// dropping the receiver.
#[derive(Debug, Clone)]
pub struct StateProperty {
    tx: Arc<watch::Sender<SourceState>>,
}

impl StateProperty {
    pub fn new(initial: SourceState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> SourceState {
        *self.tx.borrow()
    }

    /// Update the state, notifying listeners only on an actual change
    pub fn set(&self, state: SourceState) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!(%state, "source state changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SourceState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(SourceState::Live.is_live());
        assert!(!SourceState::Initializing.is_live());
        assert!(SourceState::Ended.is_ended());
        assert_eq!(SourceState::Initializing.to_string(), "initializing");
    }

    #[test]
    fn test_property_without_listeners() {
        let property = StateProperty::new(SourceState::Initializing);
        property.set(SourceState::Live);
        assert_eq!(property.get(), SourceState::Live);
    }

    #[test]
    fn test_listener_sees_changes_only() {
        let property = StateProperty::new(SourceState::Initializing);
        let mut rx = property.subscribe();
        assert!(!rx.has_changed().unwrap());

        property.set(SourceState::Initializing);
        assert!(!rx.has_changed().unwrap());

        property.set(SourceState::Live);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SourceState::Live);
    }

    #[tokio::test]
    async fn test_wait_for_ended() {
        let property = StateProperty::new(SourceState::Live);
        let mut rx = property.subscribe();

        let setter = property.clone();
        std::thread::spawn(move || setter.set(SourceState::Ended));

        let state = rx.wait_for(|state| state.is_ended()).await.map(|s| *s);
        assert_eq!(state.ok(), Some(SourceState::Ended));
    }
}
