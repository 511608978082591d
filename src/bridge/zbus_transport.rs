//! D-Bus transport backed by `zbus`.
//!
//! Replies are not awaited per call. Every message on the accessibility-bus
//! connection is read from one [`MessageStream`], so a ReadCommand reply is
//! always seen before a signal that names its command id.

use std::pin::Pin;

use log::{debug, warn};
use tokio_stream::StreamExt;
use zbus::fdo::DBusProxy;
use zbus::message::Type as MessageType;
use zbus::{Connection, MatchRule, Message, MessageStream};

use super::protocol::{
    CallSerial, CommandId, Incoming, READ_COMMAND, ReadReply, ReadingSignal, SignalKind,
};
use super::transport::{BusConnection, DiscoverySession, Inbox, RemoteObject, Transport};
use crate::config::Endpoint;
use crate::config::defaults::GET_ADDRESS;
use crate::error::{CallError, TransportError};

impl From<zbus::Error> for TransportError {
    fn from(err: zbus::Error) -> Self {
        match err {
            zbus::Error::MethodError(name, detail, _) => TransportError::Remote {
                name: name.to_string(),
                message: detail.unwrap_or_default(),
            },
            zbus::Error::Variant(err) => TransportError::Malformed(err.to_string()),
            other => TransportError::Link(other.to_string()),
        }
    }
}

impl From<zbus::fdo::Error> for TransportError {
    fn from(err: zbus::fdo::Error) -> Self {
        TransportError::from(zbus::Error::from(err))
    }
}

/// Production transport talking to the real session and accessibility buses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZbusTransport;

impl Transport for ZbusTransport {
    type Session = ZbusSession;
    type Connection = ZbusConnection;

    async fn open_session(&self) -> Result<ZbusSession, TransportError> {
        let connection = Connection::session().await?;
        Ok(ZbusSession { connection })
    }

    async fn dial(&self, address: &str) -> Result<ZbusConnection, TransportError> {
        let connection = zbus::connection::Builder::address(address)?.build().await?;
        debug!(
            target: "yomiage::bootstrap",
            "Connected to accessibility bus at {}",
            address
        );
        Ok(ZbusConnection { connection })
    }
}

/// Session-bus connection held for the duration of discovery.
pub struct ZbusSession {
    connection: Connection,
}

impl DiscoverySession for ZbusSession {
    async fn get_address(&self, endpoint: &Endpoint) -> Result<String, TransportError> {
        let reply = self
            .connection
            .call_method(
                Some(endpoint.service.as_str()),
                endpoint.path.as_str(),
                Some(endpoint.interface.as_str()),
                GET_ADDRESS,
                &(),
            )
            .await?;
        let address: String = reply.body().deserialize()?;
        Ok(address)
    }
}

/// Connection to the accessibility bus.
pub struct ZbusConnection {
    connection: Connection,
}

impl BusConnection for ZbusConnection {
    type Object = ZbusObject;
    type Inbox = ZbusInbox;

    async fn open_inbox(&self, reader: &Endpoint) -> Result<ZbusInbox, TransportError> {
        Ok(ZbusInbox {
            stream: Box::pin(MessageStream::from(&self.connection)),
            reader: reader.clone(),
        })
    }

    async fn resolve_object(&self, reader: &Endpoint) -> Result<ZbusObject, TransportError> {
        // Validates the three names against the bus grammar.
        let proxy = zbus::Proxy::new(
            &self.connection,
            reader.service.clone(),
            reader.path.clone(),
            reader.interface.clone(),
        )
        .await?;
        Ok(ZbusObject {
            connection: self.connection.clone(),
            proxy,
            reader: reader.clone(),
        })
    }
}

/// The reader object on the accessibility bus.
pub struct ZbusObject {
    connection: Connection,
    proxy: zbus::Proxy<'static>,
    reader: Endpoint,
}

impl RemoteObject for ZbusObject {
    type Call = Message;

    async fn subscribe(&self, members: &[&'static str]) -> Result<(), TransportError> {
        let dbus = DBusProxy::new(&self.connection).await?;
        for member in members {
            let rule = MatchRule::builder()
                .msg_type(MessageType::Signal)
                .interface(self.proxy.interface().as_str())?
                .path(self.proxy.path().as_str())?
                .member(*member)?
                .build();
            dbus.add_match_rule(rule).await?;
        }
        Ok(())
    }

    fn prepare_read_command(
        &self,
        text: &str,
        interruptible: bool,
    ) -> Result<(CallSerial, Message), TransportError> {
        let message = Message::method_call(self.reader.path.as_str(), READ_COMMAND)?
            .destination(self.reader.service.as_str())?
            .interface(self.reader.interface.as_str())?
            .build(&(text, interruptible))?;
        let serial = CallSerial::new(message.primary_header().serial_num().get());
        Ok((serial, message))
    }

    async fn send(&self, call: Message) -> Result<(), TransportError> {
        self.connection.send(&call).await?;
        Ok(())
    }
}

/// Every message received on the accessibility-bus connection.
pub struct ZbusInbox {
    stream: Pin<Box<MessageStream>>,
    reader: Endpoint,
}

/// Keep replies and the reader's own signals, skip everything else.
///
/// A signal counts only when both its interface and its object path are the
/// reader's, the same pair the match rules in `subscribe` select on.
fn classify(reader: &Endpoint, message: &Message) -> Option<Incoming> {
    let header = message.header();
    match message.message_type() {
        MessageType::MethodReturn => {
            let serial = CallSerial::new(header.reply_serial()?.get());
            let outcome = message
                .body()
                .deserialize::<(String, bool, i32)>()
                .map(ReadReply::from)
                .map_err(|err| CallError::MalformedReply(err.to_string()));
            Some(Incoming::Reply { serial, outcome })
        }
        MessageType::Error => {
            let serial = CallSerial::new(header.reply_serial()?.get());
            let name = header
                .error_name()
                .map(|name| name.to_string())
                .unwrap_or_default();
            let detail = message.body().deserialize::<String>().unwrap_or_default();
            Some(Incoming::Reply {
                serial,
                outcome: Err(CallError::Remote {
                    name,
                    message: detail,
                }),
            })
        }
        MessageType::Signal => {
            if header.interface()?.as_str() != reader.interface
                || header.path()?.as_str() != reader.path
            {
                return None;
            }
            let kind = SignalKind::from_member(header.member()?.as_str())?;
            match message.body().deserialize::<i32>() {
                Ok(id) => Some(Incoming::Signal(ReadingSignal::new(
                    kind,
                    CommandId::new(id),
                ))),
                Err(err) => {
                    debug!(
                        target: "yomiage::signal",
                        "Ignoring {} with unexpected body: {}",
                        kind.member(),
                        err
                    );
                    None
                }
            }
        }
        _ => None,
    }
}

impl Inbox for ZbusInbox {
    async fn next(&mut self) -> Option<Incoming> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => {
                    warn!(
                        target: "yomiage::signal",
                        "Dropping unreadable bus message: {}",
                        err
                    );
                    continue;
                }
            };
            if let Some(incoming) = classify(&self.reader, &message) {
                return Some(incoming);
            }
        }
    }
}
