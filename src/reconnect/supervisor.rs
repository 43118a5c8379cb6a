use crate::config::ReconnectConfig;
use crate::reconnect::indicator::Indicator;
use crate::reconnect::machine::{Effect, ReconnectMachine, RetryPolicy, SocketEvent};
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Input consumed by the supervisor loop.
#[derive(Debug)]
pub(crate) enum Input {
    /// A lifecycle event raised by one socket attempt.
    Lifecycle { socket: Uuid, event: SocketEvent },
    /// A page-level connectivity notification.
    Network(SocketEvent),
    /// Open a new connection attempt (startup, retry timer, or caller).
    Dial,
}

/// Event reporter handed to each socket attempt.
#[derive(Debug, Clone)]
pub struct SocketReporter {
    id: Uuid,
    tx: mpsc::UnboundedSender<Input>,
}

impl SocketReporter {
    /// Id of the attempt this reporter belongs to.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn opened(&self) {
        self.send(SocketEvent::Opened);
    }

    pub fn closed(&self, clean: bool) {
        self.send(SocketEvent::Closed { clean });
    }

    pub fn errored(&self, message: impl Into<String>) {
        self.send(SocketEvent::Errored(message.into()));
    }

    fn send(&self, event: SocketEvent) {
        // The supervisor may already be gone during shutdown; events from
        // orphaned sockets are dropped.
        let _ = self.tx.send(Input::Lifecycle {
            socket: self.id,
            event,
        });
    }
}

/// Dials socket attempts. The production implementation connects with
/// tokio-tungstenite; tests substitute a double that raises each lifecycle
/// event deterministically.
pub trait SocketFactory: Send + Sync + 'static {
    /// Start a new connection attempt. Must not block; lifecycle events for
    /// the attempt are raised through `reporter`.
    fn dial(&self, url: &str, reporter: SocketReporter);
}

/// Real WebSocket dialer.
pub struct NativeSocketFactory;

impl SocketFactory for NativeSocketFactory {
    fn dial(&self, url: &str, reporter: SocketReporter) {
        let url = url.to_string();
        tokio::spawn(async move {
            match connect_async(url.as_str()).await {
                Ok((mut stream, _)) => {
                    reporter.opened();
                    // Drain frames until the peer goes away. A Close frame is
                    // a clean shutdown; an error or a vanished peer is not.
                    loop {
                        match stream.next().await {
                            Some(Ok(Message::Close(_))) => {
                                reporter.closed(true);
                                return;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                reporter.errored(e.to_string());
                                reporter.closed(false);
                                return;
                            }
                            None => {
                                reporter.closed(false);
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "socket dial failed");
                    reporter.errored(e.to_string());
                    reporter.closed(false);
                }
            }
        });
    }
}

/// Handle for feeding the supervisor from outside its loop.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Input>,
}

impl SupervisorHandle {
    /// Open an additional wrapped connection, the analogue of page code
    /// constructing another socket. All attempts share one retry counter.
    pub fn open_socket(&self) {
        let _ = self.tx.send(Input::Dial);
    }

    pub fn notify_online(&self) {
        let _ = self.tx.send(Input::Network(SocketEvent::NetworkOnline));
    }

    pub fn notify_offline(&self) {
        let _ = self.tx.send(Input::Network(SocketEvent::NetworkOffline));
    }
}

/// Drives one reconnect sequence: dials attempts through the injected
/// [`SocketFactory`], feeds lifecycle events to the [`ReconnectMachine`], and
/// executes the resulting effects (indicator updates, retry timers).
///
/// Each scheduled retry is an independent timer task. Under
/// [`RetryPolicy::FireRegardless`] nothing cancels a pending timer when a
/// fresh connection opens mid-wait, so a stale retry can still dial; the
/// opened connection has already reset the counter, which keeps the stale
/// attempt self-limiting. [`RetryPolicy::CancelOnSuccess`] aborts pending
/// timers instead.
pub struct Supervisor {
    url: String,
    config: ReconnectConfig,
    policy: RetryPolicy,
    machine: ReconnectMachine,
    indicator: Arc<Indicator>,
    factory: Arc<dyn SocketFactory>,
    active: Arc<DashMap<Uuid, ()>>,
    pending_retries: Vec<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<Input>,
    rx: mpsc::UnboundedReceiver<Input>,
}

impl Supervisor {
    pub fn new(
        url: impl Into<String>,
        config: ReconnectConfig,
        policy: RetryPolicy,
        factory: Arc<dyn SocketFactory>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            url: url.into(),
            machine: ReconnectMachine::new(config.clone(), policy),
            config,
            policy,
            indicator: Arc::new(Indicator::new()),
            factory,
            active: Arc::new(DashMap::new()),
            pending_retries: Vec::new(),
            tx,
            rx,
        }
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            tx: self.tx.clone(),
        }
    }

    /// The singleton indicator for this sequence.
    pub fn indicator(&self) -> Arc<Indicator> {
        Arc::clone(&self.indicator)
    }

    /// Currently open wrapped sockets.
    pub fn active_sockets(&self) -> Arc<DashMap<Uuid, ()>> {
        Arc::clone(&self.active)
    }

    /// Run the supervision loop. Dials the first attempt immediately and
    /// never returns; spawn it as a background task for the page lifetime.
    pub async fn run(mut self) {
        info!(
            url = %self.url,
            interval_ms = self.config.reconnect_interval_ms,
            max_attempts = self.config.max_reconnect_attempts,
            policy = ?self.policy,
            "reconnect engine starting"
        );
        let startup = self.machine.startup_effects();
        self.apply(startup);
        self.dial();

        while let Some(input) = self.rx.recv().await {
            match input {
                Input::Lifecycle { socket, event } => {
                    match event {
                        SocketEvent::Opened => {
                            self.active.insert(socket, ());
                        }
                        SocketEvent::Closed { .. } => {
                            self.active.remove(&socket);
                        }
                        _ => {}
                    }
                    let effects = self.machine.handle(event);
                    self.apply(effects);
                }
                Input::Network(event) => {
                    let effects = self.machine.handle(event);
                    self.apply(effects);
                }
                Input::Dial => self.dial(),
            }
        }
    }

    fn dial(&mut self) {
        let reporter = SocketReporter {
            id: Uuid::new_v4(),
            tx: self.tx.clone(),
        };
        debug!(socket = %reporter.id, url = %self.url, "dialing");
        self.factory.dial(&self.url, reporter);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Status(update) => self.indicator.set(update),
                Effect::ScheduleRetry { attempt, delay } => {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "retry scheduled");
                    let tx = self.tx.clone();
                    self.pending_retries.push(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(Input::Dial);
                    }));
                }
                Effect::CancelPendingRetries => {
                    for handle in self.pending_retries.drain(..) {
                        handle.abort();
                    }
                }
            }
        }
        self.pending_retries.retain(|handle| !handle.is_finished());
    }
}
