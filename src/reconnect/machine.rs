use crate::config::ReconnectConfig;
use crate::reconnect::indicator::StatusUpdate;
use std::time::Duration;

/// How long transient statuses ("Connected", the startup notice) stay visible
/// before the indicator fades.
pub const STATUS_FADE: Duration = Duration::from_secs(2);

/// Logical connection state, reflected verbatim by the visible indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
    Failed,
}

/// What happens to retry timers that are still pending when a fresh
/// connection opens mid-wait.
///
/// The original behavior lets stale timers fire regardless, which can create
/// duplicate connections; a freshly opened connection resets the counter so
/// the stale attempt is self-limiting rather than unbounded. Both policies
/// are kept selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Pending retries fire even after a newer connection succeeded.
    #[default]
    FireRegardless,
    /// Pending retries are cancelled as soon as a connection opens.
    CancelOnSuccess,
}

/// Lifecycle input consumed by the state machine.
///
/// `Opened`/`Closed`/`Errored` are raised per socket attempt; the network
/// variants are page-level connectivity notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Closed { clean: bool },
    Errored(String),
    NetworkOnline,
    NetworkOffline,
}

/// Side effect requested by a transition. The supervisor executes these; the
/// machine itself never touches timers or the indicator.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Status(StatusUpdate),
    ScheduleRetry { attempt: u32, delay: Duration },
    CancelPendingRetries,
}

/// Pure reconnect state machine.
///
/// One instance covers one page lifetime: the retry counter is shared across
/// every wrapped socket, reset on each successful open, and once the budget
/// is consumed the machine parks in [`ConnectionState::Failed`] until a new
/// instance is constructed (the analogue of a full page reload).
#[derive(Debug)]
pub struct ReconnectMachine {
    config: ReconnectConfig,
    policy: RetryPolicy,
    state: ConnectionState,
    retries: u32,
}

impl ReconnectMachine {
    pub fn new(config: ReconnectConfig, policy: RetryPolicy) -> Self {
        Self {
            config,
            policy,
            state: ConnectionState::Disconnected,
            retries: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Retries consumed in the current reconnect sequence. Never exceeds
    /// `max_reconnect_attempts`.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Effects for first initialization: the transient "ready" notice.
    pub fn startup_effects(&self) -> Vec<Effect> {
        vec![Effect::Status(StatusUpdate {
            state: self.state,
            text: "Gateway reconnect ready".to_string(),
            fade_after: Some(STATUS_FADE),
        })]
    }

    /// Apply one lifecycle event. State transition and the resulting
    /// indicator update are produced together so no failure can leave a
    /// half-updated status behind.
    pub fn handle(&mut self, event: SocketEvent) -> Vec<Effect> {
        match event {
            SocketEvent::Opened => self.on_open(),
            SocketEvent::Closed { clean: true } => self.on_clean_close(),
            SocketEvent::Closed { clean: false } => self.on_unclean_close(),
            SocketEvent::Errored(message) => vec![Effect::Status(StatusUpdate {
                state: self.state,
                text: format!("Connection error: {}", message),
                fade_after: Some(STATUS_FADE),
            })],
            SocketEvent::NetworkOnline => vec![Effect::Status(StatusUpdate {
                state: self.state,
                text: "Network back online".to_string(),
                fade_after: Some(STATUS_FADE),
            })],
            SocketEvent::NetworkOffline => vec![Effect::Status(StatusUpdate {
                state: self.state,
                text: "Network offline".to_string(),
                fade_after: None,
            })],
        }
    }

    fn on_open(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Connected;
        self.retries = 0;

        let mut effects = Vec::with_capacity(2);
        if self.policy == RetryPolicy::CancelOnSuccess {
            effects.push(Effect::CancelPendingRetries);
        }
        effects.push(Effect::Status(StatusUpdate {
            state: self.state,
            text: "Connected".to_string(),
            fade_after: Some(STATUS_FADE),
        }));
        effects
    }

    fn on_clean_close(&mut self) -> Vec<Effect> {
        self.state = ConnectionState::Disconnected;
        vec![Effect::Status(StatusUpdate {
            state: self.state,
            text: "Disconnected".to_string(),
            fade_after: None,
        })]
    }

    fn on_unclean_close(&mut self) -> Vec<Effect> {
        let max = self.config.max_reconnect_attempts;
        if self.retries < max {
            self.retries += 1;
            self.state = ConnectionState::Reconnecting;
            vec![
                Effect::Status(StatusUpdate {
                    state: self.state,
                    text: format!("Reconnecting ({}/{})", self.retries, max),
                    fade_after: None,
                }),
                Effect::ScheduleRetry {
                    attempt: self.retries,
                    delay: Duration::from_millis(self.config.reconnect_interval_ms),
                },
            ]
        } else {
            // Budget consumed: terminal for this sequence. Only a reload
            // (a fresh machine) recovers.
            self.state = ConnectionState::Failed;
            vec![Effect::Status(StatusUpdate {
                state: self.state,
                text: "Connection lost. Reload the page to reconnect.".to_string(),
                fade_after: None,
            })]
        }
    }
}
