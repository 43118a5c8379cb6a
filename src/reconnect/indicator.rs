use crate::reconnect::machine::ConnectionState;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// One visible status change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub state: ConnectionState,
    pub text: String,
    /// Transient statuses fade after this long; persistent ones keep showing.
    pub fade_after: Option<Duration>,
}

/// The single on-page status surface.
///
/// Created once per engine context and reused; repeated initialization of the
/// engine never produces a second indicator. Updates are last-write-wins:
/// whichever event fires last owns the display, which is the intended
/// semantics since the indicator reflects only current connection status.
#[derive(Debug)]
pub struct Indicator {
    tx: watch::Sender<StatusUpdate>,
}

impl Indicator {
    pub fn new() -> Self {
        let initial = StatusUpdate {
            state: ConnectionState::Disconnected,
            text: String::new(),
            fade_after: None,
        };
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the displayed status.
    pub fn set(&self, update: StatusUpdate) {
        debug!(state = ?update.state, text = %update.text, "indicator update");
        self.tx.send_replace(update);
    }

    /// The status currently displayed.
    pub fn current(&self) -> StatusUpdate {
        self.tx.borrow().clone()
    }

    /// Observe status changes.
    pub fn subscribe(&self) -> watch::Receiver<StatusUpdate> {
        self.tx.subscribe()
    }
}

impl Default for Indicator {
    fn default() -> Self {
        Self::new()
    }
}
