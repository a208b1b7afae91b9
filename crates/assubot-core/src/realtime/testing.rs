//! In-memory connector for driving the connection manager in tests

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::transport::{ConnectOptions, Connector, OutboundFrame, SocketHandle, SocketSignal};

#[derive(Default)]
struct FakeState {
    opens: Vec<Instant>,
    options: Vec<ConnectOptions>,
    signal_senders: Vec<mpsc::UnboundedSender<SocketSignal>>,
    outbound: Vec<mpsc::UnboundedReceiver<OutboundFrame>>,
}

/// Records every `open` and lets the test push signals into the newest socket.
/// With an auto reply configured, each socket immediately reports that signal.
#[derive(Default)]
pub(crate) struct FakeConnector {
    auto_reply: Option<SocketSignal>,
    state: Mutex<FakeState>,
}

impl FakeConnector {
    /// Every socket fails its handshake with `message`
    pub(crate) fn failing(message: &str) -> Self {
        Self::replying(SocketSignal::ConnectError {
            message: message.to_string(),
        })
    }

    pub(crate) fn replying(signal: SocketSignal) -> Self {
        Self {
            auto_reply: Some(signal),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub(crate) fn open_count(&self) -> usize {
        self.state.lock().opens.len()
    }

    pub(crate) fn open_times(&self) -> Vec<Instant> {
        self.state.lock().opens.clone()
    }

    pub(crate) fn last_options(&self) -> Option<ConnectOptions> {
        self.state.lock().options.last().cloned()
    }

    pub(crate) fn last_signal_sender(&self) -> Option<mpsc::UnboundedSender<SocketSignal>> {
        self.state.lock().signal_senders.last().cloned()
    }

    /// Push a signal into the most recently opened socket
    pub(crate) fn signal(&self, signal: SocketSignal) {
        if let Some(sender) = self.last_signal_sender() {
            let _ = sender.send(signal);
        }
    }

    /// Drain every frame the manager wrote, oldest socket first
    pub(crate) fn take_outbound(&self) -> Vec<OutboundFrame> {
        let mut state = self.state.lock();
        let mut frames = Vec::new();
        for rx in state.outbound.iter_mut() {
            while let Ok(frame) = rx.try_recv() {
                frames.push(frame);
            }
        }
        frames
    }
}

impl Connector for FakeConnector {
    fn open(&self, options: &ConnectOptions) -> SocketHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        if let Some(reply) = &self.auto_reply {
            let _ = signal_tx.send(reply.clone());
        }

        let mut state = self.state.lock();
        state.opens.push(Instant::now());
        state.options.push(options.clone());
        state.signal_senders.push(signal_tx);
        state.outbound.push(outbound_rx);

        SocketHandle {
            outbound: outbound_tx,
            signals: signal_rx,
        }
    }
}
