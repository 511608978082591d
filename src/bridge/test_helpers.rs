//! In-memory bus used by the bridge tests.
//!
//! `FakeTransport` records what the bridge does (sessions opened, dials,
//! subscriptions, calls sent) and lets a test play the screen-reader service
//! by pushing replies and signals into the connection inbox.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use super::protocol::{CallSerial, CommandId, Incoming, ReadReply, ReadingSignal};
use super::transport::{BusConnection, DiscoverySession, Inbox, RemoteObject, Transport};
use crate::config::Endpoint;
use crate::error::{CallError, TransportError};

/// A ReadCommand call as the fake service received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentCall {
    pub(crate) serial: CallSerial,
    pub(crate) text: String,
    pub(crate) interruptible: bool,
}

struct Behaviour {
    session_error: Option<String>,
    address: Result<String, TransportError>,
    dial_error: Option<String>,
    object_error: Option<String>,
    subscribe_error: Option<String>,
    send_error: Option<String>,
    prepare_error: Option<TransportError>,
}

struct FakeBus {
    behaviour: Mutex<Behaviour>,
    session_opens: AtomicUsize,
    session_releases: AtomicUsize,
    dials: AtomicUsize,
    live_connections: AtomicUsize,
    sent: AtomicUsize,
    next_serial: AtomicU32,
    subscriptions: Mutex<Vec<&'static str>>,
    inbox_tx: Mutex<Option<mpsc::UnboundedSender<Incoming>>>,
    sent_tx: mpsc::UnboundedSender<SentCall>,
    sent_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SentCall>>,
    discovery_held: watch::Sender<bool>,
}

#[derive(Clone)]
pub(crate) struct FakeTransport {
    bus: Arc<FakeBus>,
}

impl FakeTransport {
    /// Address every successful discovery returns.
    pub(crate) const ADDRESS: &'static str = "unix:path=/tmp/fake-a11y-bus";

    pub(crate) fn new() -> Self {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (discovery_held, _) = watch::channel(false);
        Self {
            bus: Arc::new(FakeBus {
                behaviour: Mutex::new(Behaviour {
                    session_error: None,
                    address: Ok(Self::ADDRESS.to_string()),
                    dial_error: None,
                    object_error: None,
                    subscribe_error: None,
                    send_error: None,
                    prepare_error: None,
                }),
                session_opens: AtomicUsize::new(0),
                session_releases: AtomicUsize::new(0),
                dials: AtomicUsize::new(0),
                live_connections: AtomicUsize::new(0),
                sent: AtomicUsize::new(0),
                next_serial: AtomicU32::new(1),
                subscriptions: Mutex::new(Vec::new()),
                inbox_tx: Mutex::new(None),
                sent_tx,
                sent_rx: tokio::sync::Mutex::new(sent_rx),
                discovery_held,
            }),
        }
    }

    fn configure(self, f: impl FnOnce(&mut Behaviour)) -> Self {
        f(&mut *self.bus.behaviour.lock().unwrap());
        self
    }

    pub(crate) fn with_session_error(self, reason: &str) -> Self {
        self.configure(|b| b.session_error = Some(reason.to_string()))
    }

    pub(crate) fn with_address(self, address: Result<String, TransportError>) -> Self {
        self.configure(|b| b.address = address)
    }

    pub(crate) fn with_dial_error(self, reason: &str) -> Self {
        self.configure(|b| b.dial_error = Some(reason.to_string()))
    }

    pub(crate) fn with_object_error(self, reason: &str) -> Self {
        self.configure(|b| b.object_error = Some(reason.to_string()))
    }

    pub(crate) fn with_subscribe_error(self, reason: &str) -> Self {
        self.configure(|b| b.subscribe_error = Some(reason.to_string()))
    }

    pub(crate) fn with_send_error(self, reason: &str) -> Self {
        self.configure(|b| b.send_error = Some(reason.to_string()))
    }

    pub(crate) fn with_prepare_error(self, error: TransportError) -> Self {
        self.configure(|b| b.prepare_error = Some(error))
    }

    /// Keep `GetAddress` unanswered until the returned gate is dropped.
    pub(crate) fn hold_discovery(&self) -> DiscoveryGate {
        self.bus.discovery_held.send_replace(true);
        DiscoveryGate {
            bus: Arc::clone(&self.bus),
        }
    }

    pub(crate) fn session_opens(&self) -> usize {
        self.bus.session_opens.load(Ordering::SeqCst)
    }

    pub(crate) fn session_releases(&self) -> usize {
        self.bus.session_releases.load(Ordering::SeqCst)
    }

    pub(crate) fn dials(&self) -> usize {
        self.bus.dials.load(Ordering::SeqCst)
    }

    pub(crate) fn live_connections(&self) -> usize {
        self.bus.live_connections.load(Ordering::SeqCst)
    }

    /// ReadCommand calls that reached the bus so far.
    pub(crate) fn sent_count(&self) -> usize {
        self.bus.sent.load(Ordering::SeqCst)
    }

    pub(crate) fn subscriptions(&self) -> Vec<&'static str> {
        self.bus.subscriptions.lock().unwrap().clone()
    }

    /// Wait (bounded) for the next ReadCommand the bridge puts on the bus.
    pub(crate) async fn next_sent(&self) -> SentCall {
        let mut rx = self.bus.sent_rx.lock().await;
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no ReadCommand was sent")
            .expect("sent channel lives as long as the bus")
    }

    /// Answer a call as an accepting service would.
    pub(crate) fn reply(&self, serial: CallSerial, command_id: i32, text: &str) {
        self.reply_with(
            serial,
            ReadReply {
                text: text.to_string(),
                accepted: true,
                command_id: CommandId::new(command_id),
            },
        );
    }

    pub(crate) fn reply_with(&self, serial: CallSerial, reply: ReadReply) {
        self.push(Incoming::Reply {
            serial,
            outcome: Ok(reply),
        });
    }

    pub(crate) fn reply_error(&self, serial: CallSerial, name: &str, message: &str) {
        self.push(Incoming::Reply {
            serial,
            outcome: Err(CallError::Remote {
                name: name.to_string(),
                message: message.to_string(),
            }),
        });
    }

    /// Broadcast a reading signal from the service.
    pub(crate) fn emit(&self, signal: ReadingSignal) {
        self.push(Incoming::Signal(signal));
    }

    /// Drop the service side of the inbox, as a lost connection would.
    pub(crate) fn close_inbox(&self) {
        self.bus.inbox_tx.lock().unwrap().take();
    }

    fn push(&self, incoming: Incoming) {
        let inbox = self.bus.inbox_tx.lock().unwrap();
        inbox
            .as_ref()
            .expect("no inbox is open")
            .send(incoming)
            .expect("inbox receiver dropped");
    }
}

/// Releases a held discovery call when dropped.
pub(crate) struct DiscoveryGate {
    bus: Arc<FakeBus>,
}

impl Drop for DiscoveryGate {
    fn drop(&mut self) {
        self.bus.discovery_held.send_replace(false);
    }
}

impl Transport for FakeTransport {
    type Session = FakeSession;
    type Connection = FakeConnection;

    async fn open_session(&self) -> Result<FakeSession, TransportError> {
        if let Some(reason) = self.bus.behaviour.lock().unwrap().session_error.clone() {
            return Err(TransportError::Link(reason));
        }
        self.bus.session_opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            bus: Arc::clone(&self.bus),
        })
    }

    async fn dial(&self, _address: &str) -> Result<FakeConnection, TransportError> {
        self.bus.dials.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.bus.behaviour.lock().unwrap().dial_error.clone() {
            return Err(TransportError::Link(reason));
        }
        self.bus.live_connections.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            bus: Arc::clone(&self.bus),
        })
    }
}

pub(crate) struct FakeSession {
    bus: Arc<FakeBus>,
}

impl DiscoverySession for FakeSession {
    async fn get_address(&self, _endpoint: &Endpoint) -> Result<String, TransportError> {
        let mut gate = self.bus.discovery_held.subscribe();
        let _ = gate.wait_for(|held| !*held).await;
        self.bus.behaviour.lock().unwrap().address.clone()
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.bus.session_releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakeConnection {
    bus: Arc<FakeBus>,
}

impl BusConnection for FakeConnection {
    type Object = FakeObject;
    type Inbox = FakeInbox;

    async fn open_inbox(&self, _reader: &Endpoint) -> Result<FakeInbox, TransportError> {
        let (tx, inbox) = FakeInbox::channel();
        *self.bus.inbox_tx.lock().unwrap() = Some(tx);
        Ok(inbox)
    }

    async fn resolve_object(&self, _reader: &Endpoint) -> Result<FakeObject, TransportError> {
        if let Some(reason) = self.bus.behaviour.lock().unwrap().object_error.clone() {
            return Err(TransportError::Remote {
                name: "org.freedesktop.DBus.Error.ServiceUnknown".to_string(),
                message: reason,
            });
        }
        Ok(FakeObject {
            bus: Arc::clone(&self.bus),
        })
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.bus.live_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakeObject {
    bus: Arc<FakeBus>,
}

impl RemoteObject for FakeObject {
    type Call = SentCall;

    async fn subscribe(&self, members: &[&'static str]) -> Result<(), TransportError> {
        if let Some(reason) = self.bus.behaviour.lock().unwrap().subscribe_error.clone() {
            return Err(TransportError::Link(reason));
        }
        self.bus
            .subscriptions
            .lock()
            .unwrap()
            .extend_from_slice(members);
        Ok(())
    }

    fn prepare_read_command(
        &self,
        text: &str,
        interruptible: bool,
    ) -> Result<(CallSerial, SentCall), TransportError> {
        if let Some(err) = self.bus.behaviour.lock().unwrap().prepare_error.clone() {
            return Err(err);
        }
        let serial = CallSerial::new(self.bus.next_serial.fetch_add(1, Ordering::SeqCst));
        Ok((
            serial,
            SentCall {
                serial,
                text: text.to_string(),
                interruptible,
            },
        ))
    }

    async fn send(&self, call: SentCall) -> Result<(), TransportError> {
        if let Some(reason) = self.bus.behaviour.lock().unwrap().send_error.clone() {
            return Err(TransportError::Link(reason));
        }
        self.bus.sent.fetch_add(1, Ordering::SeqCst);
        let _ = self.bus.sent_tx.send(call);
        Ok(())
    }
}

pub(crate) struct FakeInbox {
    rx: mpsc::UnboundedReceiver<Incoming>,
}

impl FakeInbox {
    /// A standalone inbox fed through the returned sender.
    pub(crate) fn channel() -> (mpsc::UnboundedSender<Incoming>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

impl Inbox for FakeInbox {
    async fn next(&mut self) -> Option<Incoming> {
        self.rx.recv().await
    }
}
