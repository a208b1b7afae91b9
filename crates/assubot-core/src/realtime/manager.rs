use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use super::backoff::ReconnectPolicy;
use super::bus::{EventBus, Subscription};
use super::events::{ConnectionStatus, EventKind, RealtimeEvent};
use super::transport::{ConnectOptions, Connector, OutboundFrame, SocketSignal};

/// Connect errors meaning the push channel does not exist on this deployment
const MISSING_NAMESPACE_MARKERS: [&str; 2] = ["Invalid namespace", "Namespace not found"];

fn is_missing_namespace(message: &str) -> bool {
    MISSING_NAMESPACE_MARKERS.iter().any(|m| message.contains(m))
}

struct LiveSocket {
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    listener: Option<JoinHandle<()>>,
}

impl LiveSocket {
    fn close(self) {
        let _ = self.outbound.send(OutboundFrame::Close);
        if let Some(listener) = self.listener {
            listener.abort();
        }
    }
}

struct ConnectionState {
    status: ConnectionStatus,
    attempts: u32,
    max_attempts: u32,
    socket: Option<LiveSocket>,
    reconnect_timer: Option<JoinHandle<()>>,
    listeners_installed: bool,
    /// Bumped on every new socket and on teardown; signals carrying an older
    /// generation come from a socket we no longer own.
    generation: u64,
    token: Option<String>,
    opened_sockets: u64,
}

struct Inner {
    connector: Arc<dyn Connector>,
    url: Url,
    namespace: String,
    policy: ReconnectPolicy,
    bus: EventBus,
    state: Mutex<ConnectionState>,
}

/// Owns the single push-channel connection of a runtime.
///
/// Cheap to clone; clones drive the same connection. Every operation must be
/// called from within a tokio runtime because sockets and timers are tasks.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        url: Url,
        namespace: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> Self {
        let max_attempts = policy.max_attempts;
        Self {
            inner: Arc::new(Inner {
                connector,
                url,
                namespace: namespace.into(),
                policy,
                bus: EventBus::new(),
                state: Mutex::new(ConnectionState {
                    status: ConnectionStatus::Disconnected,
                    attempts: 0,
                    max_attempts,
                    socket: None,
                    reconnect_timer: None,
                    listeners_installed: false,
                    generation: 0,
                    token: None,
                    opened_sockets: 0,
                }),
            }),
        }
    }

    /// Open the connection unless one is live or being established
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Close the connection and cancel any pending reconnect. Idempotent.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Drop the current connection and start over with a fresh retry budget
    pub fn reconnect(&self) {
        self.inner.disconnect();
        {
            let mut state = self.inner.state.lock();
            state.max_attempts = self.inner.policy.max_attempts;
        }
        tracing::info!("Manual reconnect requested");
        self.inner.connect();
    }

    /// Send an event to the server. Dropped (returns `false`) unless connected.
    pub fn emit(&self, name: &str, data: Value) -> bool {
        let state = self.inner.state.lock();
        let socket = match (&state.status, &state.socket) {
            (ConnectionStatus::Connected, Some(socket)) => socket,
            _ => {
                tracing::warn!(event = name, "Socket not connected, dropping emit");
                return false;
            }
        };
        socket
            .outbound
            .send(OutboundFrame::Event {
                name: name.to_string(),
                data,
            })
            .is_ok()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(kind, handler)
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Credentials for the next handshake
    pub fn set_token(&self, token: Option<String>) {
        self.inner.state.lock().token = token;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn attempts(&self) -> u32 {
        self.inner.state.lock().attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.inner.state.lock().max_attempts
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.inner.state.lock().reconnect_timer.is_some()
    }

    /// Sockets opened over the manager's lifetime
    pub fn opened_sockets(&self) -> u64 {
        self.inner.state.lock().opened_sockets
    }
}

impl Inner {
    fn connect(self: &Arc<Self>) {
        self.connect_locked(self.state.lock());
    }

    /// Body of [`Inner::connect`] for callers that already hold the state lock
    fn connect_locked(self: &Arc<Self>, mut state: MutexGuard<'_, ConnectionState>) {
        if matches!(
            state.status,
            ConnectionStatus::Connected | ConnectionStatus::Connecting
        ) {
            tracing::debug!(status = ?state.status, "connect ignored");
            return;
        }

        if let Some(timer) = state.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(stale) = state.socket.take() {
            stale.close();
            state.listeners_installed = false;
        }
        state.generation += 1;
        let generation = state.generation;

        let options = ConnectOptions {
            url: self.url.clone(),
            namespace: self.namespace.clone(),
            token: state.token.clone(),
        };
        let handle = self.connector.open(&options);
        state.opened_sockets += 1;
        state.status = ConnectionStatus::Connecting;

        let listener = if state.listeners_installed {
            None
        } else {
            state.listeners_installed = true;
            Some(self.install_listeners(generation, handle.signals))
        };
        state.socket = Some(LiveSocket {
            outbound: handle.outbound,
            listener,
        });
        drop(state);

        tracing::info!(url = %self.url, generation, "Connecting push channel");
        self.bus
            .publish(&RealtimeEvent::ConnectionChanged(ConnectionStatus::Connecting));
    }

    fn install_listeners(
        self: &Arc<Self>,
        generation: u64,
        mut signals: mpsc::UnboundedReceiver<SocketSignal>,
    ) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.handle_signal(generation, signal);
            }
        })
    }

    fn handle_signal(self: &Arc<Self>, generation: u64, signal: SocketSignal) {
        if self.state.lock().generation != generation {
            tracing::trace!(generation, "ignoring signal from stale socket");
            return;
        }

        match signal {
            SocketSignal::Connected => {
                {
                    let mut state = self.state.lock();
                    state.status = ConnectionStatus::Connected;
                    state.attempts = 0;
                }
                tracing::info!("Push channel connected");
                self.bus
                    .publish(&RealtimeEvent::ConnectionChanged(ConnectionStatus::Connected));
            }
            SocketSignal::Disconnected { reason } => {
                self.mark_disconnected();
                tracing::warn!(%reason, "Push channel disconnected");
                self.bus
                    .publish(&RealtimeEvent::ConnectionChanged(ConnectionStatus::Disconnected));
                self.schedule_reconnect();
            }
            SocketSignal::ConnectError { message } => {
                self.mark_disconnected();
                if is_missing_namespace(&message) {
                    self.state.lock().max_attempts = 0;
                    tracing::warn!(%message, "Push channel unavailable on this server, automatic reconnection disabled");
                } else {
                    tracing::warn!(%message, "Push channel connection error");
                }
                self.bus
                    .publish(&RealtimeEvent::ConnectionChanged(ConnectionStatus::Disconnected));
                self.schedule_reconnect();
            }
            SocketSignal::Event { name, data } => match RealtimeEvent::from_wire(&name, data) {
                Ok(Some(event)) => {
                    tracing::debug!(event = %name, "push event received");
                    self.bus.publish(&event);
                }
                Ok(None) => tracing::debug!(event = %name, "ignoring unhandled push event"),
                Err(e) => tracing::warn!(event = %name, error = %e, "malformed push event"),
            },
            SocketSignal::Error { message } => {
                tracing::error!(%message, "Push channel error");
                self.bus.publish(&RealtimeEvent::ServerError(message));
            }
        }
    }

    fn mark_disconnected(&self) {
        let mut state = self.state.lock();
        state.status = ConnectionStatus::Disconnected;
        // The listener task is the caller; let it run out instead of aborting it
        state.socket = None;
        state.listeners_installed = false;
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let mut state = self.state.lock();

        if state.reconnect_timer.is_some() {
            tracing::debug!("reconnect already scheduled");
            return;
        }
        if state.status != ConnectionStatus::Disconnected {
            return;
        }
        if state.attempts >= state.max_attempts {
            tracing::warn!(
                attempts = state.attempts,
                max = state.max_attempts,
                "Max reconnect attempts reached, giving up"
            );
            return;
        }

        let delay = self.policy.delay_for_attempt(state.attempts);
        state.attempts += 1;
        tracing::info!(
            attempt = state.attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        let weak = Arc::downgrade(self);
        let generation = state.generation;
        state.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire_reconnect(generation);
            }
        }));
    }

    /// Timer expiry. Aborting the timer task cannot stop it once `sleep` has
    /// returned, so a `disconnect` or `connect` that raced the wake-up is
    /// detected through the generation it bumped.
    fn fire_reconnect(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!(generation, "reconnect timer outlived its connection");
            return;
        }
        state.reconnect_timer = None;
        self.connect_locked(state);
    }

    fn disconnect(&self) {
        let previous = {
            let mut state = self.state.lock();
            if let Some(timer) = state.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(socket) = state.socket.take() {
                socket.close();
            }
            state.generation += 1;
            state.attempts = 0;
            state.listeners_installed = false;
            std::mem::replace(&mut state.status, ConnectionStatus::Disconnected)
        };

        if previous != ConnectionStatus::Disconnected {
            tracing::info!("Push channel disconnected by client");
            self.bus
                .publish(&RealtimeEvent::ConnectionChanged(ConnectionStatus::Disconnected));
        }
    }
}
